pub mod cli;
pub mod commands;
pub mod strgt;
pub mod utils;
