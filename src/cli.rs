use crate::utils::Result;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| env!("CARGO_PKG_VERSION").to_string());

#[derive(Parser)]
#[command(name="strgt",
          version=&**FULL_VERSION,
          about="Short tandem repeat genotyper for paired-end sequencing data",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Genotype short tandem repeats")]
    Genotype(GenotypeArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("genotype")))]
#[command(arg_required_else_help(true))]
pub struct GenotypeArgs {
    #[clap(required = true)]
    #[clap(short = 'g')]
    #[clap(long = "genome")]
    #[clap(help = "Path to reference genome FASTA")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub genome_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reads")]
    #[clap(help = "BAM file with aligned paired-end reads")]
    #[clap(value_name = "READS")]
    #[arg(value_parser = check_file_exists)]
    pub reads_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'b')]
    #[clap(long = "repeats")]
    #[clap(help = "BED file with repeat coordinates and motifs")]
    #[clap(value_name = "REPEATS")]
    #[arg(value_parser = check_file_exists)]
    pub repeats_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(long = "read-len")]
    #[clap(value_name = "READ_LEN")]
    #[clap(help = "Read length of the sequencing run")]
    #[clap(default_value = "150")]
    #[arg(value_parser = positive_i32)]
    pub read_len: i32,

    #[clap(long = "insert-mean")]
    #[clap(value_name = "MEAN")]
    #[clap(help = "Mean of the template insert size distribution")]
    #[clap(default_value = "400.0")]
    pub insert_mean: f64,

    #[clap(long = "insert-sdev")]
    #[clap(value_name = "SDEV")]
    #[clap(help = "Standard deviation of the template insert size distribution")]
    #[clap(default_value = "100.0")]
    pub insert_sdev: f64,

    #[clap(long = "num-bootstraps")]
    #[clap(value_name = "NUM")]
    #[clap(help = "Number of bootstrap resamples behind each confidence interval (0 disables)")]
    #[clap(default_value = "100")]
    pub num_bootstraps: u32,

    #[clap(long = "seed")]
    #[clap(value_name = "SEED")]
    #[clap(help = "RNG seed for reproducible runs")]
    pub seed: Option<u64>,

    #[clap(long = "haploid-chroms")]
    #[clap(value_name = "CHROMS")]
    #[clap(help = "Comma-separated chromosomes to call as haploid (e.g. chrX,chrY)")]
    #[clap(value_delimiter = ',')]
    #[clap(default_value = None)]
    pub haploid_chroms: Option<Vec<String>>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "sample-name")]
    #[clap(value_name = "SAMPLE_NAME")]
    #[clap(help = "Sample name")]
    #[clap(default_value = None)]
    #[arg(value_parser = check_sample_name_nonempty)]
    pub sample_name: Option<String>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "flank-len")]
    #[clap(value_name = "FLANK_LEN")]
    #[clap(help = "Length of reference flank loaded next to each locus")]
    #[clap(default_value = "100")]
    #[arg(value_parser = positive_i32)]
    pub flank_len: i32,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "regionsize")]
    #[clap(value_name = "REGIONSIZE")]
    #[clap(help = "Half-width of the read extraction window around each locus")]
    #[clap(default_value = "1500")]
    #[arg(value_parser = positive_i32)]
    pub regionsize: i32,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-match")]
    #[clap(value_name = "MIN_MATCH")]
    #[clap(help = "Minimum number of bases a read must anchor in a flank")]
    #[clap(default_value = "8")]
    #[arg(value_parser = positive_i32)]
    pub min_match: i32,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "class-weights")]
    #[clap(value_name = "WEIGHTS")]
    #[clap(help = "Weights of the evidence classes: ENCLOSING,SPANNING,FRR,FLANKING")]
    #[clap(default_value = "1.0,1.0,1.0,1.0")]
    #[arg(value_parser = weights_from_string)]
    pub class_weights: ClassWeights,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "stutter-prob")]
    #[clap(value_name = "PROB")]
    #[clap(help = "Probability that an enclosing read carries a stutter error")]
    #[clap(default_value = "0.05")]
    #[arg(value_parser = ensure_unit_float)]
    pub stutter_prob: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "stutter-decay")]
    #[clap(value_name = "DECAY")]
    #[clap(help = "Geometric step of the stutter size distribution")]
    #[clap(default_value = "0.9")]
    #[arg(value_parser = ensure_unit_float)]
    pub stutter_decay: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassWeights {
    pub enclosing: f64,
    pub spanning: f64,
    pub frr: f64,
    pub flanking: f64,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<String> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(s.to_string())
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn check_sample_name_nonempty(s: &str) -> Result<String> {
    if s.trim().is_empty() {
        Err("Sample name cannot be an empty string".to_string())
    } else {
        Ok(s.to_string())
    }
}

fn positive_i32(s: &str) -> Result<i32> {
    let value: i32 = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid number", s))?;
    if value > 0 {
        Ok(value)
    } else {
        Err(format!("The value must be positive, got: {}", value))
    }
}

fn ensure_unit_float(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "The value must be between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}

fn weights_from_string(s: &str) -> Result<ClassWeights> {
    const NUM_EXPECTED_VALUES: usize = 4;
    let values: Vec<f64> = s.split(',').filter_map(|x| x.parse().ok()).collect();
    if values.len() != NUM_EXPECTED_VALUES {
        return Err(format!(
            "Expected {} comma-separated values in class weights. Got {} -> {}",
            NUM_EXPECTED_VALUES,
            values.len(),
            s
        ));
    }

    if values.iter().any(|&val| val < 0.0) {
        return Err(format!(
            "Negative values are not allowed in class weights. Got {}.",
            s
        ));
    }

    Ok(ClassWeights {
        enclosing: values[0],
        spanning: values[1],
        frr: values[2],
        flanking: values[3],
    })
}
