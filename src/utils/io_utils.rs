use super::Result;
use flate2::read::MultiGzDecoder;
use rust_htslib::{bam, faidx};
use std::fs::File;
use std::io::{BufReader, Read as ioRead, Seek, SeekFrom};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Opens the repeat catalog, transparently decoding gzip. Compression is
/// detected from the file's magic bytes, not its name.
pub fn open_catalog_reader(path: &Path) -> Result<BufReader<Box<dyn ioRead>>> {
    let catalog_error = |e: &dyn std::fmt::Display| format!("Catalog {}: {}", path.display(), e);

    let mut file = File::open(path).map_err(|e| catalog_error(&e))?;
    let mut magic = [0u8; 2];
    let sniffed = file.read(&mut magic).map_err(|e| catalog_error(&e))?;
    file.seek(SeekFrom::Start(0)).map_err(|e| catalog_error(&e))?;

    let reader: Box<dyn ioRead> = if sniffed == magic.len() && magic == GZIP_MAGIC {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(BufReader::new(reader))
}

/// Opens the reference genome. Genotyping fetches flanks for every locus,
/// so a missing faidx index is reported up front rather than at the first
/// catalog line.
pub fn open_genome_reader(path: &Path) -> Result<faidx::Reader> {
    let mut fai = path.as_os_str().to_owned();
    fai.push(".fai");
    if !Path::new(&fai).exists() {
        return Err(format!(
            "Reference {} has no .fai index; run 'samtools faidx' before genotyping",
            path.display()
        ));
    }
    faidx::Reader::from_path(path).map_err(|e| format!("Reference {}: {}", path.display(), e))
}

/// Opens the aligned reads once up front and pulls out what the run needs:
/// the header, for the VCF contig lines, and the sample name. Reads
/// without @SQ records cannot cover any locus, so an unmapped BAM is
/// rejected here.
pub fn inspect_reads(
    reads_path: &Path,
    sample_override: Option<String>,
) -> Result<(bam::Header, String)> {
    let reader = bam::IndexedReader::from_path(reads_path)
        .map_err(|e| format!("Reads {}: {}", reads_path.display(), e))?;
    let header = bam::Header::from_template(bam::Read::header(&reader));
    let header_map = header.to_hashmap();

    if !header_map.contains_key("SQ") {
        return Err(format!(
            "Reads {} are not mapped to a reference",
            reads_path.display()
        ));
    }

    if let Some(name) = sample_override {
        return Ok((header, name));
    }

    let mut names: Vec<String> = header_map
        .get("RG")
        .into_iter()
        .flatten()
        .filter_map(|read_group| read_group.get("SM").cloned())
        .collect();
    names.sort();
    names.dedup();

    let sample = if names.len() == 1 {
        names.pop().unwrap()
    } else {
        if names.is_empty() {
            log::warn!("Reads {} name no sample", reads_path.display());
        } else {
            log::warn!(
                "Reads {} name {} samples",
                reads_path.display(),
                names.len()
            );
        }
        reads_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| {
                format!(
                    "Cannot derive a sample name from {}",
                    reads_path.display()
                )
            })?
            .to_string()
    };

    Ok((header, sample))
}

pub fn create_writer<T, F>(output_prefix: &str, output_suffix: &str, f: F) -> Result<T>
where
    F: FnOnce(&str) -> Result<T>,
{
    f(&format!("{}.{}", output_prefix, output_suffix))
}
