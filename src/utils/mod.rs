mod io_utils;
mod util;

pub use io_utils::{create_writer, inspect_reads, open_catalog_reader, open_genome_reader};
pub use util::{handle_error_and_exit, Result};
