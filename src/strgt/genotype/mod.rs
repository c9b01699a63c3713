mod bootstrap;
mod engine;
mod models;
mod optimize;
mod search;

pub use bootstrap::confidence_intervals;
pub use engine::{GenotypeEngine, ReadClass, ReadRecord};
pub use models::LocusParams;
pub use search::{find_best_genotype, GenotypeCall, MARGIN};
