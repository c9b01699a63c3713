use super::models::{
    ClassModel, EnclosingModel, FlankingModel, FrrModel, LocusParams, SpanningModel,
};
use crate::strgt::options::Options;
use crate::utils::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadClass {
    Enclosing,
    Spanning,
    Frr,
    Flanking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRecord {
    pub class: ReadClass,
    pub datum: i32,
}

/// Per-worker genotyping state: the four evidence classes, a read pool that
/// remembers every data point in insertion order, a resampled mirror of
/// both, and the RNG that drives bootstrap resampling.
///
/// Evaluation consults either the original or the resampled class models,
/// selected by a flag, so bootstrap passes reuse the same engine without
/// cloning it.
pub struct GenotypeEngine {
    options: Options,
    enclosing: EnclosingModel,
    spanning: SpanningModel,
    frr: FrrModel,
    flanking: FlankingModel,
    rs_enclosing: EnclosingModel,
    rs_spanning: SpanningModel,
    rs_frr: FrrModel,
    rs_flanking: FlankingModel,
    read_pool: Vec<ReadRecord>,
    resampled_pool: Vec<ReadRecord>,
    rng: StdRng,
}

impl GenotypeEngine {
    pub fn new(options: Options) -> Result<Self> {
        options.validate()?;
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(GenotypeEngine {
            enclosing: EnclosingModel::new(&options),
            spanning: SpanningModel::new(&options)?,
            frr: FrrModel::new(&options),
            flanking: FlankingModel::new(&options),
            rs_enclosing: EnclosingModel::new(&options),
            rs_spanning: SpanningModel::new(&options)?,
            rs_frr: FrrModel::new(&options),
            rs_flanking: FlankingModel::new(&options),
            read_pool: Vec::new(),
            resampled_pool: Vec::new(),
            rng,
            options,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Clears all per-locus state: both pools and all eight class models.
    pub fn reset(&mut self) {
        self.enclosing.reset();
        self.spanning.reset();
        self.frr.reset();
        self.flanking.reset();
        self.rs_enclosing.reset();
        self.rs_spanning.reset();
        self.rs_frr.reset();
        self.rs_flanking.reset();
        self.read_pool.clear();
        self.resampled_pool.clear();
    }

    pub fn add_enclosing(&mut self, datum: i32) {
        self.enclosing.add(datum);
        self.push_record(ReadClass::Enclosing, datum);
    }

    pub fn add_spanning(&mut self, datum: i32) {
        self.spanning.add(datum);
        self.push_record(ReadClass::Spanning, datum);
    }

    pub fn add_frr(&mut self, datum: i32) {
        self.frr.add(datum);
        self.push_record(ReadClass::Frr, datum);
    }

    pub fn add_flanking(&mut self, datum: i32) {
        self.flanking.add(datum);
        self.push_record(ReadClass::Flanking, datum);
    }

    fn push_record(&mut self, class: ReadClass, datum: i32) {
        self.read_pool.push(ReadRecord { class, datum });
    }

    pub fn enclosing_reads(&self) -> usize {
        self.enclosing.len()
    }

    pub fn spanning_reads(&self) -> usize {
        self.spanning.len()
    }

    pub fn frr_reads(&self) -> usize {
        self.frr.len()
    }

    pub fn flanking_reads(&self) -> usize {
        self.flanking.len()
    }

    pub fn depth(&self) -> usize {
        self.read_pool.len()
    }

    #[cfg(test)]
    pub(crate) fn resampled_depth(&self) -> usize {
        self.resampled_pool.len()
    }

    #[cfg(test)]
    pub(crate) fn resampled_class_sizes(&self) -> [usize; 4] {
        [
            self.rs_enclosing.len(),
            self.rs_spanning.len(),
            self.rs_frr.len(),
            self.rs_flanking.len(),
        ]
    }

    /// Distinct copy counts observed in enclosing reads, ascending. Seeds
    /// the candidate allele list.
    pub fn extract_enclosing_alleles(&self) -> Vec<i32> {
        self.enclosing.extract_alleles()
    }

    /// Redraws |pool| records from the pool with replacement and rebuilds
    /// the resampled class models from the draw.
    pub fn resample(&mut self) {
        self.rs_enclosing.reset();
        self.rs_spanning.reset();
        self.rs_frr.reset();
        self.rs_flanking.reset();
        self.resampled_pool.clear();

        let pool_size = self.read_pool.len();
        for _ in 0..pool_size {
            let record = self.read_pool[self.rng.gen_range(0..pool_size)];
            self.resampled_pool.push(record);
            match record.class {
                ReadClass::Enclosing => self.rs_enclosing.add(record.datum),
                ReadClass::Spanning => self.rs_spanning.add(record.datum),
                ReadClass::Frr => self.rs_frr.add(record.datum),
                ReadClass::Flanking => self.rs_flanking.add(record.datum),
            }
        }
    }

    /// The weighted negative log-likelihood of the genotype {a1, a2}.
    ///
    /// Classes with zero weight are skipped outright rather than multiplied
    /// in, so an impossible observation in a masked class cannot poison the
    /// result (0 * -inf is NaN). +inf marks an infeasible genotype.
    pub fn neg_log_likelihood(
        &self,
        allele1: i32,
        allele2: i32,
        params: &LocusParams,
        resampled: bool,
    ) -> f64 {
        let mut total = 0.0;
        let w = &self.options;
        if w.enclosing_weight > 0.0 {
            let model = if resampled { &self.rs_enclosing } else { &self.enclosing };
            total += w.enclosing_weight * model.class_log_likelihood(allele1, allele2, params);
        }
        if w.spanning_weight > 0.0 {
            let model = if resampled { &self.rs_spanning } else { &self.spanning };
            total += w.spanning_weight * model.class_log_likelihood(allele1, allele2, params);
        }
        if w.frr_weight > 0.0 {
            let model = if resampled { &self.rs_frr } else { &self.frr };
            total += w.frr_weight * model.class_log_likelihood(allele1, allele2, params);
        }
        if w.flanking_weight > 0.0 {
            let model = if resampled { &self.rs_flanking } else { &self.flanking };
            total += w.flanking_weight * model.class_log_likelihood(allele1, allele2, params);
        }
        -total
    }
}
