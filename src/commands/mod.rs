pub mod genotype;
