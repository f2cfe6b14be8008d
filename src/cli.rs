//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// A k-mer counting and enrichment engine for nucleotide sequences, with
/// iterative knockout (IKKE) and bootstrap significance testing.
#[derive(Parser, Debug)]
#[command(name = "katss")]
#[command(version, author, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Count every k-mer in a file.
    Count(CountArgs),
    /// Score every k-mer in `test` against its frequency in `control`.
    Enrich(EnrichArgs),
    /// Score every k-mer in `test` against a Markov-model prediction.
    ProbEnrich(ProbEnrichArgs),
    /// Iteratively knock out the top-enriched k-mer and recount.
    Ikke(IkkeArgs),
    /// Resample a file's k-mer counts and report per-k-mer mean/stdev.
    Bootstrap(BootstrapArgs),
}

fn parse_k(s: &str) -> Result<usize, String> {
    let k: usize = s.parse().map_err(|_| format!("'{s}' is not a valid number"))?;
    if k == 0 || k > 16 {
        return Err("k-mer length must be in 1..=16".to_string());
    }
    Ok(k)
}

#[derive(Parser, Debug)]
pub struct CountArgs {
    /// K-mer length, 1..=16.
    #[arg(value_parser = parse_k)]
    pub k: usize,
    pub path: PathBuf,
    /// Worker thread count. 1 runs the single-threaded path.
    #[arg(short, long, default_value_t = 1)]
    pub threads: usize,
}

#[derive(Parser, Debug)]
pub struct EnrichArgs {
    #[arg(value_parser = parse_k)]
    pub k: usize,
    pub test: PathBuf,
    pub control: PathBuf,
    /// Report log2(rval) instead of the raw ratio.
    #[arg(short, long)]
    pub normalize: bool,
}

#[derive(Parser, Debug)]
pub struct ProbEnrichArgs {
    #[arg(value_parser = parse_k)]
    pub k: usize,
    pub test: PathBuf,
    #[arg(short, long)]
    pub normalize: bool,
}

#[derive(Parser, Debug)]
pub struct IkkeArgs {
    #[arg(value_parser = parse_k)]
    pub k: usize,
    pub test: PathBuf,
    pub control: PathBuf,
    /// Number of knockout rounds.
    #[arg(short, long, default_value_t = 1)]
    pub iterations: usize,
    #[arg(short, long, default_value_t = 1)]
    pub threads: usize,
}

#[derive(Parser, Debug)]
pub struct BootstrapArgs {
    #[arg(value_parser = parse_k)]
    pub k: usize,
    pub test: PathBuf,
    /// Required when scoring enrichment ratios instead of plain counts.
    #[arg(long)]
    pub control: Option<PathBuf>,
    #[arg(short = 'i', long, default_value_t = 10)]
    pub bs_iters: usize,
    /// Sample size, thousandths of a percent, 1..=100000.
    #[arg(short, long, default_value_t = 10_000)]
    pub sample: i32,
    #[arg(short, long, default_value_t = 8)]
    pub threads: usize,
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
}
