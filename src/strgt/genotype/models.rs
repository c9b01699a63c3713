use crate::strgt::locus::Ploidy;
use crate::strgt::options::Options;
use itertools::Itertools;
use statrs::distribution::{Continuous, Normal};

/// Per-locus quantities threaded through every likelihood evaluation.
#[derive(Debug, Clone, Copy)]
pub struct LocusParams {
    pub read_len: i32,
    pub motif_len: i32,
    pub ref_count: i32,
    pub ploidy: Ploidy,
    pub offtarget_share: f64,
}

/// One evidence class: a vector of per-read data points and a probability
/// model for a single data point given one allele.
///
/// The likelihood of the class under a diploid genotype {a1, a2} is the
/// per-read mixture 0.5*P(r|a1) + 0.5*P(r|a2); under a haploid genotype the
/// second allele is ignored. An empty data vector contributes log(1) = 0.
/// The log-likelihood is -inf only when an observation is impossible under
/// both alleles.
pub trait ClassModel {
    fn data(&self) -> &[i32];
    fn data_mut(&mut self) -> &mut Vec<i32>;

    fn add(&mut self, datum: i32) {
        self.data_mut().push(datum);
    }

    fn reset(&mut self) {
        self.data_mut().clear();
    }

    fn len(&self) -> usize {
        self.data().len()
    }

    /// P(datum | allele), in linear space.
    fn allele_density(&self, datum: i32, allele: i32, params: &LocusParams) -> f64;

    fn class_log_likelihood(&self, a1: i32, a2: i32, params: &LocusParams) -> f64 {
        self.data()
            .iter()
            .map(|&datum| match params.ploidy {
                Ploidy::One => self.allele_density(datum, a1, params).ln(),
                Ploidy::Two => {
                    let p1 = self.allele_density(datum, a1, params);
                    let p2 = self.allele_density(datum, a2, params);
                    (0.5 * p1 + 0.5 * p2).ln()
                }
            })
            .sum()
    }
}

/// Reads that contain the entire repeat tract; the datum is the copy count
/// observed in the read. Modeled as a stutter process: the true count is
/// seen with probability 1 - stutter_prob, counts below it with
/// geometrically decaying probability. Counts above the allele cannot be
/// produced and have density zero.
#[derive(Debug, Clone)]
pub struct EnclosingModel {
    data: Vec<i32>,
    stutter_prob: f64,
    stutter_decay: f64,
}

impl EnclosingModel {
    pub fn new(options: &Options) -> Self {
        EnclosingModel {
            data: Vec::new(),
            stutter_prob: options.stutter_prob,
            stutter_decay: options.stutter_decay,
        }
    }

    /// Distinct copy counts seen in enclosing reads, ascending.
    pub fn extract_alleles(&self) -> Vec<i32> {
        self.data.iter().copied().sorted().dedup().collect()
    }
}

impl ClassModel for EnclosingModel {
    fn data(&self) -> &[i32] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut Vec<i32> {
        &mut self.data
    }

    fn allele_density(&self, datum: i32, allele: i32, _params: &LocusParams) -> f64 {
        if allele < 0 || datum > allele {
            return 0.0;
        }
        if datum == allele {
            1.0 - self.stutter_prob
        } else {
            let step = (allele - datum) as f64;
            self.stutter_prob * self.stutter_decay * (1.0 - self.stutter_decay).powf(step - 1.0)
                / 2.0
        }
    }
}

/// Read pairs whose template straddles the repeat; the datum is the mapped
/// template length. Against the reference the template of an allele with
/// more copies maps shorter, so the expected length shifts by
/// -(allele - ref_count) * motif_len around the library mean.
#[derive(Debug, Clone)]
pub struct SpanningModel {
    data: Vec<i32>,
    dist_mean: f64,
    residual: Normal,
}

impl SpanningModel {
    pub fn new(options: &Options) -> crate::utils::Result<Self> {
        let residual = Normal::new(0.0, options.dist_sdev)
            .map_err(|e| format!("Invalid insert size distribution: {}", e))?;
        Ok(SpanningModel {
            data: Vec::new(),
            dist_mean: options.dist_mean,
            residual,
        })
    }
}

impl ClassModel for SpanningModel {
    fn data(&self) -> &[i32] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut Vec<i32> {
        &mut self.data
    }

    fn allele_density(&self, datum: i32, allele: i32, params: &LocusParams) -> f64 {
        let shift = ((allele - params.ref_count) * params.motif_len) as f64;
        let expected = self.dist_mean - shift;
        self.residual.pdf(datum as f64 - expected)
    }
}

/// Fully repetitive reads; the datum is the read's offset (in bases) from
/// the start of the repeat tract. An allele can produce such a read only if
/// its tract holds an entire read, in which case the offset is uniform over
/// the feasible window. Off-target repeat copies elsewhere in the genome
/// contribute a uniform background weighted by the locus off-target share.
#[derive(Debug, Clone)]
pub struct FrrModel {
    data: Vec<i32>,
    regionsize: f64,
}

impl FrrModel {
    pub fn new(options: &Options) -> Self {
        FrrModel {
            data: Vec::new(),
            regionsize: options.regionsize as f64,
        }
    }
}

impl ClassModel for FrrModel {
    fn data(&self) -> &[i32] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut Vec<i32> {
        &mut self.data
    }

    fn allele_density(&self, datum: i32, allele: i32, params: &LocusParams) -> f64 {
        let tract = allele as i64 * params.motif_len as i64;
        let window = tract - params.read_len as i64;
        let on_target = if window >= 0 && datum as i64 <= window {
            1.0 / (window + 1) as f64
        } else {
            0.0
        };
        let share = params.offtarget_share;
        (1.0 - share) * on_target + share / self.regionsize
    }
}

/// Reads that anchor one flank and run into the repeat without reaching the
/// other side; the datum is the partial copy count. The count a read can
/// show is capped by the read length, so the model is a censored uniform:
/// every count below the cap keeps mass 1/(allele+1) and the cap absorbs
/// the tail. Reads are assigned to the allele that explains them best
/// rather than mixed, which keeps long partial counts from being averaged
/// away by a short second allele.
#[derive(Debug, Clone, Default)]
pub struct FlankingModel {
    data: Vec<i32>,
}

impl FlankingModel {
    pub fn new(_options: &Options) -> Self {
        FlankingModel::default()
    }
}

impl ClassModel for FlankingModel {
    fn data(&self) -> &[i32] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut Vec<i32> {
        &mut self.data
    }

    fn allele_density(&self, datum: i32, allele: i32, params: &LocusParams) -> f64 {
        if allele < 0 || datum < 0 {
            return 0.0;
        }
        let cap = params.read_len / params.motif_len;
        let observable = allele.min(cap);
        if datum > observable {
            0.0
        } else if datum < observable {
            1.0 / (allele + 1) as f64
        } else {
            (allele - observable + 1) as f64 / (allele + 1) as f64
        }
    }

    fn class_log_likelihood(&self, a1: i32, a2: i32, params: &LocusParams) -> f64 {
        self.data
            .iter()
            .map(|&datum| match params.ploidy {
                Ploidy::One => self.allele_density(datum, a1, params).ln(),
                Ploidy::Two => {
                    let p1 = self.allele_density(datum, a1, params);
                    let p2 = self.allele_density(datum, a2, params);
                    p1.max(p2).ln()
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(ploidy: Ploidy) -> LocusParams {
        LocusParams {
            read_len: 150,
            motif_len: 3,
            ref_count: 10,
            ploidy,
            offtarget_share: 0.0,
        }
    }

    #[test]
    fn empty_class_contributes_zero() {
        let opts = Options::default();
        let model = EnclosingModel::new(&opts);
        assert_eq!(model.class_log_likelihood(10, 12, &params(Ploidy::Two)), 0.0);
    }

    #[test]
    fn enclosing_exact_match_density() {
        let opts = Options::default();
        let model = EnclosingModel::new(&opts);
        let p = params(Ploidy::Two);
        assert_eq!(model.allele_density(10, 10, &p), 1.0 - opts.stutter_prob);
    }

    #[test]
    fn enclosing_above_allele_is_impossible() {
        let opts = Options::default();
        let mut model = EnclosingModel::new(&opts);
        model.add(12);
        let p = params(Ploidy::Two);
        assert_eq!(model.allele_density(12, 10, &p), 0.0);
        assert!(model.class_log_likelihood(10, 10, &p).is_infinite());
        // still possible under the larger allele of a het genotype
        assert!(model.class_log_likelihood(10, 12, &p).is_finite());
    }

    #[test]
    fn enclosing_stutter_decays_with_distance() {
        let opts = Options::default();
        let model = EnclosingModel::new(&opts);
        let p = params(Ploidy::Two);
        assert!(model.allele_density(9, 10, &p) > model.allele_density(8, 10, &p));
        assert!(model.allele_density(8, 10, &p) > 0.0);
    }

    #[test]
    fn extract_alleles_sorts_and_dedups() {
        let opts = Options::default();
        let mut model = EnclosingModel::new(&opts);
        for datum in [12, 8, 12, 8, 8, 20] {
            model.add(datum);
        }
        assert_eq!(model.extract_alleles(), vec![8, 12, 20]);
    }

    #[test]
    fn spanning_density_peaks_at_shifted_mean() {
        let opts = Options::default();
        let model = SpanningModel::new(&opts).unwrap();
        let p = params(Ploidy::Two);
        // ref allele peaks at the library mean
        assert!(model.allele_density(400, 10, &p) > model.allele_density(360, 10, &p));
        // an expanded allele maps shorter
        assert!(model.allele_density(370, 20, &p) > model.allele_density(400, 20, &p));
    }

    #[test]
    fn frr_infeasible_without_expansion() {
        let opts = Options::default();
        let mut model = FrrModel::new(&opts);
        model.add(0);
        let p = params(Ploidy::Two);
        // 10 copies of a 3-mer cannot hold a 150 bp read
        assert!(model.class_log_likelihood(10, 10, &p).is_infinite());
        // 60 copies can
        assert!(model.class_log_likelihood(10, 60, &p).is_finite());
    }

    #[test]
    fn frr_offset_window_is_uniform() {
        let opts = Options::default();
        let model = FrrModel::new(&opts);
        let p = params(Ploidy::Two);
        let window = 60 * 3 - 150; // 30 feasible offsets past zero
        assert_eq!(
            model.allele_density(0, 60, &p),
            model.allele_density(window, 60, &p)
        );
        assert_eq!(model.allele_density(window + 1, 60, &p), 0.0);
    }

    #[test]
    fn frr_offtarget_share_keeps_density_finite() {
        let opts = Options::default();
        let mut model = FrrModel::new(&opts);
        model.add(5);
        let p = LocusParams {
            offtarget_share: 1.0,
            ..params(Ploidy::Two)
        };
        // fully off-target reads carry no allele signal but stay finite
        let small = model.class_log_likelihood(5, 5, &p);
        let large = model.class_log_likelihood(80, 80, &p);
        assert!(small.is_finite());
        assert!((small - large).abs() < 1e-12);
    }

    #[test]
    fn flanking_density_sums_to_one() {
        let opts = Options::default();
        let model = FlankingModel::new(&opts);
        let p = params(Ploidy::Two);
        for allele in [0, 5, 30, 80] {
            let cap = p.read_len / p.motif_len;
            let total: f64 = (0..=allele.min(cap))
                .map(|f| model.allele_density(f, allele, &p))
                .sum();
            assert!((total - 1.0).abs() < 1e-12, "allele {}", allele);
        }
    }

    #[test]
    fn flanking_count_above_both_alleles_is_impossible() {
        let opts = Options::default();
        let mut model = FlankingModel::new(&opts);
        model.add(25);
        let p = params(Ploidy::Two);
        assert!(model.class_log_likelihood(10, 20, &p).is_infinite());
        assert!(model.class_log_likelihood(10, 30, &p).is_finite());
    }

    #[test]
    fn flanking_class_likelihood_is_symmetric() {
        let opts = Options::default();
        let mut model = FlankingModel::new(&opts);
        for datum in [3, 7, 12, 12] {
            model.add(datum);
        }
        let p = params(Ploidy::Two);
        let ab = model.class_log_likelihood(8, 20, &p);
        let ba = model.class_log_likelihood(20, 8, &p);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn haploid_ignores_second_allele() {
        let opts = Options::default();
        let mut model = EnclosingModel::new(&opts);
        model.add(10);
        let p = params(Ploidy::One);
        let with_zero = model.class_log_likelihood(10, 0, &p);
        let with_junk = model.class_log_likelihood(10, 99, &p);
        assert_eq!(with_zero, with_junk);
    }
}
