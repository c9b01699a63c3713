pub mod genotype;
pub mod locus;
pub mod options;
pub mod reads;
pub mod workflows;
pub mod writers;
