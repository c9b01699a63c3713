mod cigar;
mod classify;

pub use classify::{extract_and_classify, ClassifiedRead};
