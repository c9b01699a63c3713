use crate::utils::Result;

/// Genotyping parameters shared by the read classifier and the likelihood
/// engine. Weights scale the contribution of each evidence class; a weight
/// of zero masks the class entirely.
#[derive(Debug, Clone)]
pub struct Options {
    pub enclosing_weight: f64,
    pub spanning_weight: f64,
    pub frr_weight: f64,
    pub flanking_weight: f64,
    /// Read length of the sequencing run (all reads are assumed equal).
    pub read_len: i32,
    /// Half-width of the window around a locus that reads are drawn from.
    pub regionsize: i32,
    /// Minimum number of bases a read must anchor in a flank.
    pub min_match: i32,
    /// Insert-size distribution of the library.
    pub dist_mean: f64,
    pub dist_sdev: f64,
    /// Probability that an enclosing read picks up a stutter error, and the
    /// geometric step of the stutter size distribution.
    pub stutter_prob: f64,
    pub stutter_decay: f64,
    /// Length of reference flank loaded next to each locus.
    pub flank_len: i32,
    /// Number of bootstrap resamples used for confidence intervals;
    /// zero disables interval estimation.
    pub num_boot_samp: u32,
    /// RNG seed for the engine; entropy-seeded when unset.
    pub seed: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            enclosing_weight: 1.0,
            spanning_weight: 1.0,
            frr_weight: 1.0,
            flanking_weight: 1.0,
            read_len: 150,
            regionsize: 1500,
            min_match: 8,
            dist_mean: 400.0,
            dist_sdev: 100.0,
            stutter_prob: 0.05,
            stutter_decay: 0.9,
            flank_len: 100,
            num_boot_samp: 0,
            seed: None,
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<()> {
        if self.read_len <= 0 {
            return Err(format!("Read length must be positive: {}", self.read_len));
        }
        if self.regionsize <= 0 {
            return Err(format!("Region size must be positive: {}", self.regionsize));
        }
        if self.min_match < 0 {
            return Err(format!("Minimum match cannot be negative: {}", self.min_match));
        }
        if self.flank_len <= 0 {
            return Err(format!("Flank length must be positive: {}", self.flank_len));
        }
        if self.dist_sdev <= 0.0 {
            return Err(format!(
                "Insert size standard deviation must be positive: {}",
                self.dist_sdev
            ));
        }
        for (name, weight) in [
            ("enclosing", self.enclosing_weight),
            ("spanning", self.spanning_weight),
            ("frr", self.frr_weight),
            ("flanking", self.flanking_weight),
        ] {
            if !(weight >= 0.0) {
                return Err(format!("The {} weight cannot be negative: {}", name, weight));
            }
        }
        if !(0.0..1.0).contains(&self.stutter_prob) {
            return Err(format!(
                "Stutter probability must be in [0, 1): {}",
                self.stutter_prob
            ));
        }
        if !(0.0 < self.stutter_decay && self.stutter_decay <= 1.0) {
            return Err(format!(
                "Stutter decay must be in (0, 1]: {}",
                self.stutter_decay
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        assert!(Options::default().validate().is_ok());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let opts = Options {
            frr_weight: -0.5,
            ..Options::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn zero_weight_is_accepted() {
        let opts = Options {
            frr_weight: 0.0,
            ..Options::default()
        };
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn bad_sdev_is_rejected() {
        let opts = Options {
            dist_sdev: 0.0,
            ..Options::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn bad_read_len_is_rejected() {
        let opts = Options {
            read_len: 0,
            ..Options::default()
        };
        assert!(opts.validate().is_err());
    }
}
