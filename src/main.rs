use clap::Parser;
use strgt::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::genotype,
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    log::info!(
        "Running {}-{} [genotype]",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION
    );
    match cli.command {
        Command::Genotype(args) => genotype::genotype(args)?,
    }
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
