use std::process;

use clap::Parser;

use katss::bootstrap::{bootstrap, BootstrapAlgo, BootstrapOptions};
use katss::cli::{BootstrapArgs, Cli, Command, CountArgs, EnrichArgs, IkkeArgs, ProbEnrichArgs};
use katss::count_table::NumericType;
use katss::counter::{count_kmers, count_kmers_mt};
use katss::enrichment::{enrichments, ikke, ikke_mt, prob_enrichments};

/// Initialize the tracing subscriber with environment filter.
///
/// Set `RUST_LOG=katss=debug` to see debug output.
#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

fn main() {
    #[cfg(feature = "tracing")]
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Count(args) => run_count(&args),
        Command::Enrich(args) => run_enrich(&args),
        Command::ProbEnrich(args) => run_prob_enrich(&args),
        Command::Ikke(args) => run_ikke(&args),
        Command::Bootstrap(args) => run_bootstrap(&args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run_count(args: &CountArgs) -> Result<(), katss::KatssError> {
    let table = if args.threads <= 1 {
        count_kmers(&args.path, args.k)?
    } else {
        count_kmers_mt(&args.path, args.k, args.threads)?
    };
    for hash in 0..=u32::try_from(table.capacity()).unwrap_or(u32::MAX) {
        let count = table.read(hash, NumericType::UInt64)?.as_f64();
        if count > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            println!("{}\t{}", table.unhash(hash, true), count as u64);
        }
    }
    Ok(())
}

fn run_enrich(args: &EnrichArgs) -> Result<(), katss::KatssError> {
    let ranked = enrichments(&args.test, &args.control, args.k, args.normalize)?;
    for entry in ranked {
        println!("{}\t{}", entry.kmer, entry.enrichment);
    }
    Ok(())
}

fn run_prob_enrich(args: &ProbEnrichArgs) -> Result<(), katss::KatssError> {
    let ranked = prob_enrichments(&args.test, args.k, args.normalize)?;
    for entry in ranked {
        println!("{}\t{}", entry.kmer, entry.enrichment);
    }
    Ok(())
}

fn run_ikke(args: &IkkeArgs) -> Result<(), katss::KatssError> {
    let rounds = if args.threads <= 1 {
        ikke(&args.test, &args.control, args.k, args.iterations)?
    } else {
        ikke_mt(&args.test, &args.control, args.k, args.iterations, args.threads)?
    };
    for (round, r) in rounds.iter().enumerate() {
        println!("{}\t{}\t{}", round + 1, r.kmer, r.enrichment);
    }
    Ok(())
}

fn run_bootstrap(args: &BootstrapArgs) -> Result<(), katss::KatssError> {
    let algo = if args.control.is_some() {
        BootstrapAlgo::Enrichments
    } else {
        BootstrapAlgo::Counting
    };
    let opts = BootstrapOptions {
        k: args.k,
        bs_iters: args.bs_iters,
        sample: args.sample,
        threads: args.threads,
        seed: args.seed,
        algo,
    };
    let results = bootstrap(&args.test, args.control.as_deref(), &opts)?;
    for r in results {
        println!("{}\t{}\t{}", r.kmer, r.mean, r.stdev);
    }
    Ok(())
}
