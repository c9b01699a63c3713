use super::engine::GenotypeEngine;
use super::models::LocusParams;
use super::search::find_best_genotype;
use statrs::statistics::{Data, OrderStatistics};

/// Central coverage of the reported interval.
const CONFIDENCE: f64 = 0.95;

/// Bootstrap confidence intervals for the two allele positions.
///
/// Runs the genotype search `num_boot_samp` times against resampled read
/// pools and summarizes the empirical allele distributions. Samples are
/// binned positionally: the smaller allele of each resampled call goes
/// into the first stream, the larger into the second (the search already
/// returns diploid calls in canonical order). Iterations that fail to
/// produce a finite genotype are discarded; if fewer than
/// `min_valid_samples` remain, no interval is reported and the point
/// estimate stands on its own.
pub fn confidence_intervals(
    engine: &mut GenotypeEngine,
    params: &LocusParams,
    num_boot_samp: u32,
) -> Option<((i32, i32), (i32, i32))> {
    let mut small = Vec::with_capacity(num_boot_samp as usize);
    let mut large = Vec::with_capacity(num_boot_samp as usize);
    for _ in 0..num_boot_samp {
        match find_best_genotype(engine, params, true) {
            Ok(call) => {
                small.push(call.allele1);
                large.push(call.allele2);
            }
            Err(err) => log::debug!("Discarded bootstrap sample: {}", err),
        }
    }

    if small.len() < min_valid_samples(num_boot_samp) {
        log::warn!(
            "Only {} of {} bootstrap samples produced a genotype; withholding confidence interval",
            small.len(),
            num_boot_samp
        );
        return None;
    }

    Some((percentile_interval(&small), percentile_interval(&large)))
}

fn min_valid_samples(num_boot_samp: u32) -> usize {
    (num_boot_samp as usize / 2).max(2)
}

fn percentile_interval(samples: &[i32]) -> (i32, i32) {
    let mut data = Data::new(samples.iter().map(|&s| s as f64).collect::<Vec<_>>());
    let alpha = (1.0 - CONFIDENCE) / 2.0;
    let low = data.quantile(alpha).round() as i32;
    let high = data.quantile(1.0 - alpha).round() as i32;
    (low, high)
}
