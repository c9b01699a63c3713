use super::cigar::net_indel_in_window;
use crate::strgt::genotype::ReadClass;
use crate::strgt::locus::Locus;
use crate::strgt::options::Options;
use crate::utils::Result;
use rust_htslib::bam::{self, record::Cigar, Read, Record};

/// Fraction of read bases that must follow the motif for a read to count
/// as fully repetitive.
const FRR_PURITY: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedRead {
    pub class: ReadClass,
    pub datum: i32,
}

/// Fetches primary alignments around the locus and classifies each one
/// into an evidence class from its coordinates, CIGAR, and mate.
pub fn extract_and_classify(
    bam: &mut bam::IndexedReader,
    locus: &Locus,
    options: &Options,
) -> Result<Vec<ClassifiedRead>> {
    let tract_start = locus.start - 1; // 0-based half-open tract window
    let tract_end = locus.end;
    let fetch_start = (tract_start - options.regionsize as i64).max(0);
    let fetch_end = tract_end + options.regionsize as i64;

    let mut reads = Vec::new();
    if let Err(msg) = bam.fetch((locus.chrom.as_str(), fetch_start, fetch_end)) {
        log::warn!("{}: fetch error: {}", locus.id, msg);
        return Ok(reads);
    }

    let mut record = Record::new();
    while let Some(result) = bam.read(&mut record) {
        result.map_err(|e| e.to_string())?;
        if record.is_secondary()
            || record.is_supplementary()
            || record.is_duplicate()
            || record.is_unmapped()
            || record.is_quality_check_failed()
        {
            continue;
        }

        let cigar_view = record.cigar();
        let end_pos = cigar_view.end_pos();
        let ops: Vec<Cigar> = cigar_view.iter().copied().collect();
        let mate = if record.is_paired() && record.mtid() >= 0 && record.mtid() == record.tid() {
            Some((record.mpos(), record.insert_size()))
        } else {
            None
        };

        if let Some(classified) = classify_alignment(
            record.pos(),
            end_pos,
            &record.seq().as_bytes(),
            &ops,
            mate,
            locus,
            options,
        ) {
            reads.push(classified);
        }
    }

    log::debug!("{}: classified {} reads", locus.id, reads.len());
    Ok(reads)
}

/// Classifies one alignment. Coordinates are 0-based, `end_pos` exclusive;
/// `mate` is `(mate_pos, template_len)` when the mate maps to the same
/// contig. Returns `None` for reads that carry no usable evidence.
fn classify_alignment(
    pos: i64,
    end_pos: i64,
    seq: &[u8],
    cigar: &[Cigar],
    mate: Option<(i64, i64)>,
    locus: &Locus,
    options: &Options,
) -> Option<ClassifiedRead> {
    let tract_start = locus.start - 1;
    let tract_end = locus.end;
    let min_match = options.min_match as i64;
    let motif_len = locus.motif.len() as i64;

    let anchors_left = pos <= tract_start - min_match && end_pos > tract_start;
    let anchors_right = end_pos >= tract_end + min_match && pos < tract_end;

    if anchors_left && anchors_right {
        let net = net_indel_in_window(cigar, pos, tract_start, tract_end);
        let tract_len = tract_end - tract_start;
        let copies = ((tract_len + net) as f64 / motif_len as f64).round() as i32;
        return Some(ClassifiedRead {
            class: ReadClass::Enclosing,
            datum: copies.max(0),
        });
    }

    if motif_fraction(seq, locus.motif.as_bytes()) >= FRR_PURITY {
        let offset = (pos - tract_start).max(0) as i32;
        return Some(ClassifiedRead {
            class: ReadClass::Frr,
            datum: offset,
        });
    }

    if anchors_left != anchors_right {
        let into_tract = if anchors_left {
            end_pos - tract_start
        } else {
            tract_end - pos
        };
        let cap = options.read_len / locus.motif.len() as i32;
        let copies = ((into_tract / motif_len) as i32).clamp(0, cap);
        return Some(ClassifiedRead {
            class: ReadClass::Flanking,
            datum: copies,
        });
    }

    if let Some((mate_pos, template_len)) = mate {
        // count each straddling pair once, from its leftmost read
        if end_pos <= tract_start && mate_pos >= tract_end && template_len > 0 {
            return Some(ClassifiedRead {
                class: ReadClass::Spanning,
                datum: template_len as i32,
            });
        }
    }

    None
}

/// Fraction of bases matching a tandem run of the motif, maximized over
/// the motif phase.
fn motif_fraction(seq: &[u8], motif: &[u8]) -> f64 {
    if seq.is_empty() || motif.is_empty() {
        return 0.0;
    }
    let mut best = 0usize;
    for phase in 0..motif.len() {
        let matches = seq
            .iter()
            .enumerate()
            .filter(|(i, &base)| base == motif[(i + phase) % motif.len()])
            .count();
        best = best.max(matches);
    }
    best as f64 / seq.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strgt::locus::Ploidy;

    fn test_locus() -> Locus {
        Locus {
            id: "chr1_1001".to_string(),
            chrom: "chr1".to_string(),
            start: 1001,
            end: 1030,
            motif: "CAG".to_string(),
            ref_count: 10,
            offtarget_share: 0.0,
            ploidy: Ploidy::Two,
            pre_flank: "T".repeat(100),
            post_flank: "T".repeat(100),
        }
    }

    fn non_repeat_seq(len: usize) -> Vec<u8> {
        b"TGCATTAG".iter().copied().cycle().take(len).collect()
    }

    #[test]
    fn enclosing_read_matching_reference() {
        let locus = test_locus();
        let options = Options::default();
        // spans 950..1100, well past both flanks (tract is 1000..1030)
        let read = classify_alignment(
            950,
            1100,
            &non_repeat_seq(150),
            &[Cigar::Match(150)],
            None,
            &locus,
            &options,
        )
        .unwrap();
        assert_eq!(read.class, ReadClass::Enclosing);
        assert_eq!(read.datum, 10);
    }

    #[test]
    fn enclosing_read_with_expansion_insertion() {
        let locus = test_locus();
        let options = Options::default();
        // 6 inserted bases inside the tract add two CAG copies
        let cigar = [Cigar::Match(60), Cigar::Ins(6), Cigar::Match(90)];
        let read = classify_alignment(
            950,
            1100,
            &non_repeat_seq(156),
            &cigar,
            None,
            &locus,
            &options,
        )
        .unwrap();
        assert_eq!(read.class, ReadClass::Enclosing);
        assert_eq!(read.datum, 12);
    }

    #[test]
    fn enclosing_read_with_contraction_deletion() {
        let locus = test_locus();
        let options = Options::default();
        let cigar = [Cigar::Match(60), Cigar::Del(9), Cigar::Match(90)];
        let read = classify_alignment(
            950,
            1109,
            &non_repeat_seq(150),
            &cigar,
            None,
            &locus,
            &options,
        )
        .unwrap();
        assert_eq!(read.class, ReadClass::Enclosing);
        assert_eq!(read.datum, 7);
    }

    #[test]
    fn left_flanking_read() {
        let locus = test_locus();
        let options = Options::default();
        // anchors the left flank and runs 15 bases into the tract
        let read = classify_alignment(
            900,
            1015,
            &non_repeat_seq(115),
            &[Cigar::Match(115)],
            None,
            &locus,
            &options,
        )
        .unwrap();
        assert_eq!(read.class, ReadClass::Flanking);
        assert_eq!(read.datum, 5);
    }

    #[test]
    fn right_flanking_read() {
        let locus = test_locus();
        let options = Options::default();
        // starts 9 bases inside the tract and anchors the right flank
        let read = classify_alignment(
            1021,
            1100,
            &non_repeat_seq(79),
            &[Cigar::Match(79)],
            None,
            &locus,
            &options,
        )
        .unwrap();
        assert_eq!(read.class, ReadClass::Flanking);
        assert_eq!(read.datum, 3);
    }

    #[test]
    fn fully_repetitive_read() {
        let locus = test_locus();
        let options = Options::default();
        let seq: Vec<u8> = b"CAG".iter().copied().cycle().take(150).collect();
        let read = classify_alignment(
            1006,
            1156,
            &seq,
            &[Cigar::Match(150)],
            None,
            &locus,
            &options,
        )
        .unwrap();
        assert_eq!(read.class, ReadClass::Frr);
        assert_eq!(read.datum, 6);
    }

    #[test]
    fn spanning_pair() {
        let locus = test_locus();
        let options = Options::default();
        let read = classify_alignment(
            700,
            850,
            &non_repeat_seq(150),
            &[Cigar::Match(150)],
            Some((1100, 550)),
            &locus,
            &options,
        )
        .unwrap();
        assert_eq!(read.class, ReadClass::Spanning);
        assert_eq!(read.datum, 550);
    }

    #[test]
    fn spanning_pair_counted_once() {
        let locus = test_locus();
        let options = Options::default();
        // the rightmost mate reports a negative template length
        let read = classify_alignment(
            1100,
            1250,
            &non_repeat_seq(150),
            &[Cigar::Match(150)],
            Some((700, -550)),
            &locus,
            &options,
        );
        assert!(read.is_none());
    }

    #[test]
    fn distant_read_is_ignored() {
        let locus = test_locus();
        let options = Options::default();
        let read = classify_alignment(
            200,
            350,
            &non_repeat_seq(150),
            &[Cigar::Match(150)],
            None,
            &locus,
            &options,
        );
        assert!(read.is_none());
    }

    #[test]
    fn motif_fraction_handles_phase() {
        let seq: Vec<u8> = b"AGCAGCAGCAGC".to_vec();
        assert_eq!(motif_fraction(&seq, b"CAG"), 1.0);
        assert!(motif_fraction(&non_repeat_seq(60), b"CAG") < FRR_PURITY);
    }
}
