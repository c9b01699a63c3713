use crate::utils::{open_catalog_reader, open_genome_reader, Result};
use crossbeam_channel::Sender;
use rust_htslib::faidx;
use std::{collections::HashMap, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ploidy {
    One,
    Two,
}

/// A repeat locus: a 1-based inclusive reference span, the repeat motif,
/// and the flanking reference sequence loaded next to it.
#[derive(Debug)]
pub struct Locus {
    pub id: String,
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub motif: String,
    pub ref_count: i32,
    pub offtarget_share: f64,
    pub ploidy: Ploidy,
    pub pre_flank: String,
    pub post_flank: String,
}

impl Locus {
    pub fn new(
        genome_reader: &faidx::Reader,
        chrom_lookup: &HashMap<String, u64>,
        line: &str,
        flank_len: i32,
        haploid_chroms: &[String],
    ) -> Result<Self> {
        let (chrom, start, end, motif, offtarget_share) = parse_catalog_line(line)?;

        let chrom_length = *chrom_lookup
            .get(&chrom)
            .ok_or_else(|| format!("Reference is missing chromosome '{}'", chrom))?;

        let flank_len = flank_len as i64;
        if start <= flank_len {
            return Err(format!(
                "Locus {}:{}-{} starts too close to the chromosome edge for flank length {}",
                chrom, start, end, flank_len
            ));
        }
        if end + flank_len > chrom_length as i64 {
            return Err(format!(
                "Locus {}:{}-{} ends too close to the chromosome edge for flank length {}",
                chrom, start, end, flank_len
            ));
        }

        let ref_count = ((end - start + 1) / motif.len() as i64) as i32;

        let fetch = |begin: i64, stop: i64| {
            genome_reader
                .fetch_seq_string(&chrom, begin as usize, stop as usize)
                .map_err(|e| format!("Error fetching {}:{}-{}: {}", chrom, begin + 1, stop + 1, e))
                .map(|seq| seq.to_uppercase())
        };

        // fetch_seq_string takes 0-based inclusive coordinates
        let pre_flank = fetch(start - 1 - flank_len, start - 2)?;
        let post_flank = fetch(end, end + flank_len - 1)?;

        let ploidy = if haploid_chroms.iter().any(|c| *c == chrom) {
            Ploidy::One
        } else {
            Ploidy::Two
        };

        Ok(Locus {
            id: format!("{}_{}", chrom, start),
            chrom,
            start,
            end,
            motif,
            ref_count,
            offtarget_share,
            ploidy,
            pre_flank,
            post_flank,
        })
    }
}

fn parse_catalog_line(line: &str) -> Result<(String, i64, i64, String, f64)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 4 && fields.len() != 5 {
        return Err(format!(
            "Expected 'chrom start end motif [offtarget_share]', found {} fields: {}",
            fields.len(),
            line
        ));
    }

    let chrom = fields[0].to_string();
    let start: i64 = fields[1]
        .parse()
        .map_err(|_| format!("Invalid start coordinate: {}", fields[1]))?;
    let end: i64 = fields[2]
        .parse()
        .map_err(|_| format!("Invalid end coordinate: {}", fields[2]))?;
    if start < 1 || end < start {
        return Err(format!("Invalid locus span: {}-{}", start, end));
    }

    let motif = fields[3].to_uppercase();
    if motif.is_empty() || !motif.bytes().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T')) {
        return Err(format!("Invalid motif: {}", fields[3]));
    }
    if end - start + 1 < motif.len() as i64 {
        return Err(format!(
            "Motif {} is longer than locus span {}-{}",
            motif, start, end
        ));
    }

    let offtarget_share: f64 = if fields.len() == 5 {
        fields[4]
            .parse()
            .map_err(|_| format!("Invalid off-target share: {}", fields[4]))?
    } else {
        0.0
    };
    if !(0.0..=1.0).contains(&offtarget_share) {
        return Err(format!(
            "Off-target share must be within [0, 1]: {}",
            offtarget_share
        ));
    }

    Ok((chrom, start, end, motif, offtarget_share))
}

pub fn create_chrom_lookup(reader: &faidx::Reader) -> Result<HashMap<String, u64>> {
    let num_seqs = reader.n_seqs() as usize;
    let mut map = HashMap::with_capacity(num_seqs);
    for i in 0..num_seqs {
        let name = reader.seq_name(i as i32).map_err(|e| e.to_string())?;
        let len = reader.fetch_seq_len(&name);
        let len_u64 = u64::try_from(len)
            .map_err(|_| format!("Invalid length for sequence '{}'", &name))?;
        map.insert(name, len_u64);
    }
    Ok(map)
}

pub fn stream_loci_into_channel(
    repeats_path: &Path,
    genome_path: &Path,
    flank_len: i32,
    haploid_chroms: &[String],
    sender: Sender<Result<Locus>>,
) {
    use std::io::BufRead;

    let catalog_reader = open_catalog_reader(repeats_path).unwrap();
    let genome_reader = open_genome_reader(genome_path).unwrap();
    let chrom_lookup = create_chrom_lookup(&genome_reader).unwrap();

    for (line_number, result_line) in catalog_reader.lines().enumerate() {
        let line = match result_line {
            Ok(line) => line,
            Err(err) => {
                let error = format!("Error at catalog line {}: {}", line_number + 1, err);
                sender
                    .send(Err(error))
                    .expect("Failed to send error through channel");
                return;
            }
        };
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let locus = Locus::new(
            &genome_reader,
            &chrom_lookup,
            &line,
            flank_len,
            haploid_chroms,
        )
        .map_err(|e| format!("Error at catalog line {}: {}", line_number + 1, e));

        sender
            .send(locus)
            .expect("Failed to send locus through channel");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_four_field_line() {
        let (chrom, start, end, motif, share) =
            parse_catalog_line("chr4 3074877 3074933 CAG").unwrap();
        assert_eq!(chrom, "chr4");
        assert_eq!(start, 3074877);
        assert_eq!(end, 3074933);
        assert_eq!(motif, "CAG");
        assert_eq!(share, 0.0);
    }

    #[test]
    fn parse_line_with_offtarget_share() {
        let (_, _, _, _, share) = parse_catalog_line("chr9 27573485 27573546 GGGGCC 0.8").unwrap();
        assert_eq!(share, 0.8);
    }

    #[test]
    fn offtarget_share_endpoints_are_legal() {
        assert!(parse_catalog_line("chr1 100 160 CAG 0.0").is_ok());
        assert!(parse_catalog_line("chr1 100 160 CAG 1.0").is_ok());
    }

    #[test]
    fn offtarget_share_outside_unit_interval_is_rejected() {
        assert!(parse_catalog_line("chr1 100 160 CAG 1.5").is_err());
        assert!(parse_catalog_line("chr1 100 160 CAG -0.1").is_err());
    }

    #[test]
    fn lowercase_motif_is_normalized() {
        let (_, _, _, motif, _) = parse_catalog_line("chr1 100 160 cag").unwrap();
        assert_eq!(motif, "CAG");
    }

    #[test]
    fn invalid_motif_is_rejected() {
        assert!(parse_catalog_line("chr1 100 160 CAX").is_err());
        assert!(parse_catalog_line("chr1 100 160 .").is_err());
    }

    #[test]
    fn motif_longer_than_locus_is_rejected() {
        assert!(parse_catalog_line("chr1 100 103 GGGGCC").is_err());
    }

    #[test]
    fn inverted_span_is_rejected() {
        assert!(parse_catalog_line("chr1 200 100 CAG").is_err());
    }

    #[test]
    fn field_count_is_checked() {
        assert!(parse_catalog_line("chr1 100 160").is_err());
        assert!(parse_catalog_line("chr1 100 160 CAG 0.5 extra").is_err());
    }
}
