use crate::strgt::locus::Locus;
use crate::strgt::workflows::{Gt, LocusResult};
use crate::utils::Result;
use itertools::Itertools;
use rust_htslib::{
    bam,
    bcf::{self, record::GenotypeAllele, Format, Record},
};
use std::env;

const VCF_LINES: [&str; 9] = [
    r#"##INFO=<ID=END,Number=1,Type=Integer,Description="End position of the repeat">"#,
    r#"##INFO=<ID=RU,Number=1,Type=String,Description="Repeat motif">"#,
    r#"##INFO=<ID=REF,Number=1,Type=Integer,Description="Reference copy number">"#,
    r#"##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#,
    r#"##FORMAT=<ID=REPCN,Number=.,Type=Integer,Description="Repeat copy number per allele">"#,
    r#"##FORMAT=<ID=REPCI,Number=.,Type=String,Description="Confidence interval per allele">"#,
    r#"##FORMAT=<ID=DP,Number=1,Type=Integer,Description="Number of reads in the locus read pool">"#,
    r#"##FORMAT=<ID=RC,Number=1,Type=String,Description="Reads per class: enclosing,spanning,FRR,flanking">"#,
    r#"##FORMAT=<ID=NL,Number=1,Type=Float,Description="Negative log-likelihood of the genotype">"#,
];

pub struct VcfWriter {
    writer: bcf::Writer,
}

impl VcfWriter {
    pub fn new(output_path: &str, sample_name: &str, bam_header: &bam::Header) -> Result<VcfWriter> {
        let mut vcf_header = bcf::header::Header::new();
        for line in VCF_LINES.iter() {
            vcf_header.push_record(line.as_bytes());
        }

        if let Some(records) = bam_header.to_hashmap().get("SQ") {
            for record in records {
                let contig_line =
                    format!(r#"##contig=<ID={},length={}>"#, record["SN"], record["LN"]);
                vcf_header.push_record(contig_line.as_bytes());
            }
        }

        let line = format!(
            "##{}Version={}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
        vcf_header.push_record(line.as_bytes());
        let args: Vec<String> = env::args().collect();
        let line = format!("##{}Command={}", env!("CARGO_PKG_NAME"), args.join(" "));
        vcf_header.push_record(line.as_bytes());

        vcf_header.push_sample(sample_name.as_bytes());

        let writer = bcf::Writer::from_path(output_path, &vcf_header, false, Format::Vcf)
            .map_err(|_| format!("Invalid VCF output path: {}", output_path))?;

        Ok(VcfWriter { writer })
    }

    pub fn write(&mut self, locus: &Locus, results: &LocusResult) {
        let mut record = self.writer.empty_record();

        let rid = self
            .writer
            .header()
            .name2rid(locus.chrom.as_bytes())
            .unwrap();
        record.set_rid(Some(rid));
        // the record is anchored one base before the repeat tract
        record.set_pos(locus.start - 2);
        record
            .push_info_integer(b"END", &[locus.end as i32])
            .unwrap();
        record
            .push_info_string(b"RU", &[locus.motif.as_bytes()])
            .unwrap();
        record
            .push_info_integer(b"REF", &[locus.ref_count])
            .unwrap();

        if results.genotype.is_empty() {
            self.add_missing_allele_info(locus, &mut record);
        } else {
            self.add_allele_info(locus, results, &mut record);
        }

        self.writer.write(&record).unwrap();
    }

    fn add_allele_info(&mut self, locus: &Locus, results: &LocusResult, record: &mut Record) {
        let (allele_seqs, genotype_indices) = build_alleles(locus, &results.genotype);
        let seq_refs: Vec<&[u8]> = allele_seqs.iter().map(|seq| seq.as_slice()).collect();
        record.set_alleles(&seq_refs).expect("Failed to set alleles");

        let genotypes: Vec<GenotypeAllele> = genotype_indices
            .iter()
            .map(|&index| GenotypeAllele::Unphased(index as i32))
            .collect();
        record.push_genotypes(&genotypes).unwrap();

        let copies: Vec<i32> = results.genotype.iter().map(|a| a.copies).collect();
        record.push_format_integer(b"REPCN", &copies).unwrap();

        let intervals = results
            .genotype
            .iter()
            .map(|allele| match allele.ci {
                Some((low, high)) => format!("{}-{}", low, high),
                None => ".".to_string(),
            })
            .join(",");
        record
            .push_format_string(b"REPCI", &[intervals.as_bytes()])
            .unwrap();

        record
            .push_format_integer(b"DP", &[results.depth as i32])
            .unwrap();
        let class_counts = format!(
            "{},{},{},{}",
            results.enclosing_reads,
            results.spanning_reads,
            results.frr_reads,
            results.flanking_reads
        );
        record
            .push_format_string(b"RC", &[class_counts.as_bytes()])
            .unwrap();
        record
            .push_format_float(b"NL", &[results.min_neg_lik as f32])
            .unwrap();
    }

    fn add_missing_allele_info(&mut self, locus: &Locus, record: &mut Record) {
        let reference = reference_allele(locus);
        record
            .set_alleles(&[reference.as_slice()])
            .expect("Failed to set alleles");
        record
            .push_genotypes(&[GenotypeAllele::UnphasedMissing])
            .unwrap();
        record.push_format_string(b"REPCI", &[".".as_bytes()]).unwrap();
        record.push_format_integer(b"DP", &[0]).unwrap();
        record
            .push_format_string(b"RC", &["0,0,0,0".as_bytes()])
            .unwrap();
    }
}

fn reference_allele(locus: &Locus) -> Vec<u8> {
    let pad_base = *locus
        .pre_flank
        .as_bytes()
        .last()
        .expect("Empty flanks are not allowed");
    let mut seq = vec![pad_base];
    seq.extend(locus.motif.repeat(locus.ref_count as usize).into_bytes());
    seq
}

/// Builds the REF/ALT allele sequences as canonical motif runs and maps
/// each called allele to its index. The reference allele is always first;
/// called copy numbers equal to the reference map to it.
fn build_alleles(locus: &Locus, genotype: &Gt) -> (Vec<Vec<u8>>, Vec<usize>) {
    let pad_base = *locus
        .pre_flank
        .as_bytes()
        .last()
        .expect("Empty flanks are not allowed");
    let motif_run = |copies: i32| {
        let mut seq = vec![pad_base];
        seq.extend(locus.motif.repeat(copies.max(0) as usize).into_bytes());
        seq
    };

    let mut allele_seqs = vec![motif_run(locus.ref_count)];
    let mut genotype_indices = Vec::with_capacity(genotype.len());
    for allele in genotype {
        if allele.copies == locus.ref_count {
            genotype_indices.push(0);
            continue;
        }
        let seq = motif_run(allele.copies);
        let index = match allele_seqs.iter().position(|existing| *existing == seq) {
            Some(index) => index,
            None => {
                allele_seqs.push(seq);
                allele_seqs.len() - 1
            }
        };
        genotype_indices.push(index);
    }

    (allele_seqs, genotype_indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strgt::locus::Ploidy;
    use crate::strgt::workflows::StrAllele;

    fn test_locus() -> Locus {
        Locus {
            id: "chr1_101".to_string(),
            chrom: "chr1".to_string(),
            start: 101,
            end: 112,
            motif: "CAG".to_string(),
            ref_count: 4,
            offtarget_share: 0.0,
            ploidy: Ploidy::Two,
            pre_flank: "TTTA".to_string(),
            post_flank: "TTTT".to_string(),
        }
    }

    fn allele(copies: i32) -> StrAllele {
        StrAllele { copies, ci: None }
    }

    #[test]
    fn homozygous_reference_uses_a_single_allele() {
        let locus = test_locus();
        let genotype = Gt::from_iter([allele(4), allele(4)]);
        let (seqs, indices) = build_alleles(&locus, &genotype);
        assert_eq!(seqs, vec![b"ACAGCAGCAGCAG".to_vec()]);
        assert_eq!(indices, vec![0, 0]);
    }

    #[test]
    fn heterozygous_alt_gets_its_own_allele() {
        let locus = test_locus();
        let genotype = Gt::from_iter([allele(4), allele(6)]);
        let (seqs, indices) = build_alleles(&locus, &genotype);
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[1], b"ACAGCAGCAGCAGCAGCAG".to_vec());
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn homozygous_alt_shares_one_alt_allele() {
        let locus = test_locus();
        let genotype = Gt::from_iter([allele(2), allele(2)]);
        let (seqs, indices) = build_alleles(&locus, &genotype);
        assert_eq!(seqs.len(), 2);
        assert_eq!(indices, vec![1, 1]);
    }

    #[test]
    fn haploid_genotype_maps_to_one_index() {
        let locus = test_locus();
        let genotype = Gt::from_iter([allele(7)]);
        let (seqs, indices) = build_alleles(&locus, &genotype);
        assert_eq!(seqs.len(), 2);
        assert_eq!(indices, vec![1]);
    }
}
