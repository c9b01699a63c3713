//! Bound-constrained derivative-free local minimization used to seed the
//! candidate allele list. Nelder-Mead with every trial point clamped into
//! the box; no gradients are ever requested from the objective.

/// Relative tolerance on the search variables.
const XTOL_REL: f64 = 1e-5;
/// Hard cap on objective evaluations, so an all-infinite plateau terminates.
const MAX_EVALS: usize = 200;

/// Minimizes `objective` over the box `[lower, upper]^n` starting from
/// `start` (clamped into the box). Returns the best point seen and its
/// value, or `None` if no finite value was found within the budget.
pub fn minimize<F>(
    mut objective: F,
    start: &[f64],
    lower: f64,
    upper: f64,
) -> Option<(Vec<f64>, f64)>
where
    F: FnMut(&[f64]) -> f64,
{
    let n = start.len();
    debug_assert!(n == 1 || n == 2);
    if !(lower < upper) {
        return None;
    }
    let clamp = |point: &mut Vec<f64>| {
        for x in point.iter_mut() {
            *x = x.clamp(lower, upper);
        }
    };

    let mut evals = 0usize;
    let mut eval = |point: &mut Vec<f64>, evals: &mut usize| {
        clamp(point);
        *evals += 1;
        objective(point)
    };

    // Initial simplex: the start point plus one offset vertex per dimension.
    // A wide step lets the search escape an infeasible start, where the
    // objective is infinite until an allele grows past the read length.
    let step = (0.25 * (upper - lower)).max(1.0);
    let mut start = start.to_vec();
    clamp(&mut start);
    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    let f0 = eval(&mut start, &mut evals);
    simplex.push((start.clone(), f0));
    for dim in 0..n {
        let mut vertex = start.clone();
        vertex[dim] = if vertex[dim] + step <= upper {
            vertex[dim] + step
        } else {
            vertex[dim] - step
        };
        let value = eval(&mut vertex, &mut evals);
        simplex.push((vertex, value));
    }

    while evals < MAX_EVALS {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        if converged(&simplex) {
            break;
        }

        // Centroid of all vertices except the worst.
        let worst = simplex.len() - 1;
        let mut centroid = vec![0.0; n];
        for (vertex, _) in &simplex[..worst] {
            for (c, x) in centroid.iter_mut().zip(vertex) {
                *c += x / worst as f64;
            }
        }

        let blend = |from: &[f64], coeff: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, x)| c + coeff * (c - x))
                .collect()
        };

        let mut reflected = blend(&simplex[worst].0, 1.0);
        let f_reflected = eval(&mut reflected, &mut evals);

        if f_reflected < simplex[0].1 {
            // Try to expand past the reflection.
            let mut expanded = blend(&simplex[worst].0, 2.0);
            let f_expanded = eval(&mut expanded, &mut evals);
            simplex[worst] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
        } else if f_reflected < simplex[worst - 1].1 {
            simplex[worst] = (reflected, f_reflected);
        } else {
            let mut contracted = blend(&simplex[worst].0, -0.5);
            let f_contracted = eval(&mut contracted, &mut evals);
            if f_contracted < simplex[worst].1.min(f_reflected) {
                simplex[worst] = (contracted, f_contracted);
            } else {
                // Shrink everything toward the best vertex.
                let best = simplex[0].0.clone();
                for entry in simplex.iter_mut().skip(1) {
                    let mut vertex: Vec<f64> = best
                        .iter()
                        .zip(&entry.0)
                        .map(|(b, x)| b + 0.5 * (x - b))
                        .collect();
                    let value = eval(&mut vertex, &mut evals);
                    *entry = (vertex, value);
                }
            }
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (best_x, best_f) = simplex.swap_remove(0);
    best_f.is_finite().then_some((best_x, best_f))
}

fn converged(simplex: &[(Vec<f64>, f64)]) -> bool {
    let best = &simplex[0].0;
    simplex.iter().skip(1).all(|(vertex, _)| {
        vertex
            .iter()
            .zip(best)
            .all(|(x, b)| (x - b).abs() <= XTOL_REL * (1.0 + b.abs()))
    })
}
