use crate::strgt::genotype::{
    confidence_intervals, find_best_genotype, GenotypeEngine, LocusParams, ReadClass,
};
use crate::strgt::locus::{Locus, Ploidy};
use crate::strgt::reads::extract_and_classify;
use crate::utils::Result;
use arrayvec::ArrayVec;
use rust_htslib::bam;

/// Loci with fewer informative reads than this are skipped. Spanning pairs
/// alone cannot support a call, so they do not count toward the floor.
const MIN_INFORMATIVE_READS: usize = 4;

#[derive(Debug, PartialEq, Clone)]
pub struct StrAllele {
    pub copies: i32,
    pub ci: Option<(i32, i32)>,
}

pub type Gt = ArrayVec<StrAllele, 2>;

#[derive(Debug, PartialEq, Clone)]
pub struct LocusResult {
    /// Empty when the locus was skipped or failed.
    pub genotype: Gt,
    pub min_neg_lik: f64,
    pub enclosing_reads: usize,
    pub spanning_reads: usize,
    pub frr_reads: usize,
    pub flanking_reads: usize,
    pub depth: usize,
}

impl LocusResult {
    pub fn empty() -> LocusResult {
        LocusResult {
            genotype: Gt::new(),
            min_neg_lik: 0.0,
            enclosing_reads: 0,
            spanning_reads: 0,
            frr_reads: 0,
            flanking_reads: 0,
            depth: 0,
        }
    }
}

/// Genotypes one locus: routes classified reads into the engine, finds the
/// maximum-likelihood genotype, and attaches bootstrap intervals when they
/// are requested.
pub fn analyze(
    locus: &Locus,
    engine: &mut GenotypeEngine,
    bam: &mut bam::IndexedReader,
) -> Result<LocusResult> {
    engine.reset();

    let reads = extract_and_classify(bam, locus, engine.options())?;
    for read in &reads {
        match read.class {
            ReadClass::Enclosing => engine.add_enclosing(read.datum),
            ReadClass::Spanning => engine.add_spanning(read.datum),
            ReadClass::Frr => engine.add_frr(read.datum),
            ReadClass::Flanking => engine.add_flanking(read.datum),
        }
    }

    if !has_sufficient_evidence(engine) {
        log::warn!(
            "{}: not enough reads (enclosing: {}, spanning: {}, FRR: {}, flanking: {}), skipping",
            locus.id,
            engine.enclosing_reads(),
            engine.spanning_reads(),
            engine.frr_reads(),
            engine.flanking_reads()
        );
        return Ok(LocusResult::empty());
    }

    let params = LocusParams {
        read_len: engine.options().read_len,
        motif_len: locus.motif.len() as i32,
        ref_count: locus.ref_count,
        ploidy: locus.ploidy,
        offtarget_share: locus.offtarget_share,
    };

    let call = find_best_genotype(engine, &params, false)?;
    log::debug!(
        "{}: called ({}, {}) with negative log-likelihood {:.4}",
        locus.id,
        call.allele1,
        call.allele2,
        call.neg_log_lik
    );

    let num_boot_samp = engine.options().num_boot_samp;
    let intervals = if num_boot_samp > 0 {
        confidence_intervals(engine, &params, num_boot_samp)
    } else {
        None
    };

    let mut genotype = Gt::new();
    genotype.push(StrAllele {
        copies: call.allele1,
        ci: intervals.map(|(ci1, _)| ci1),
    });
    if locus.ploidy == Ploidy::Two {
        genotype.push(StrAllele {
            copies: call.allele2,
            ci: intervals.map(|(_, ci2)| ci2),
        });
    }

    Ok(LocusResult {
        genotype,
        min_neg_lik: call.neg_log_lik,
        enclosing_reads: engine.enclosing_reads(),
        spanning_reads: engine.spanning_reads(),
        frr_reads: engine.frr_reads(),
        flanking_reads: engine.flanking_reads(),
        depth: engine.depth(),
    })
}

fn has_sufficient_evidence(engine: &GenotypeEngine) -> bool {
    engine.enclosing_reads() + engine.frr_reads() + engine.flanking_reads()
        >= MIN_INFORMATIVE_READS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strgt::options::Options;

    fn test_engine() -> GenotypeEngine {
        GenotypeEngine::new(Options {
            seed: Some(5),
            ..Options::default()
        })
        .unwrap()
    }

    #[test]
    fn two_flanking_reads_are_insufficient() {
        let mut engine = test_engine();
        engine.add_flanking(3);
        engine.add_flanking(5);
        assert!(!has_sufficient_evidence(&engine));
    }

    #[test]
    fn spanning_reads_do_not_count_toward_the_floor() {
        let mut engine = test_engine();
        for _ in 0..10 {
            engine.add_spanning(400);
        }
        assert!(!has_sufficient_evidence(&engine));
    }

    #[test]
    fn four_informative_reads_suffice() {
        let mut engine = test_engine();
        engine.add_enclosing(10);
        engine.add_enclosing(10);
        engine.add_frr(2);
        engine.add_flanking(4);
        assert!(has_sufficient_evidence(&engine));
    }
}
