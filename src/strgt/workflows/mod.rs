mod str_locus;

pub use str_locus::{analyze, Gt, LocusResult, StrAllele};
