//! Bootstrap significance demo.
//!
//! Resamples a file's k-mer counts (or enrichment ratio against a control
//! file) and prints each k-mer's mean and standard deviation across
//! resamples, sorted descending by mean.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example bootstrap_demo -- test.fa 5 [control.fa]
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::env;
use std::path::Path;
use std::process;

use katss::bootstrap::{bootstrap, BootstrapAlgo, BootstrapOptions};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <test_file> [k] [control_file]", args[0]);
        process::exit(1);
    }

    let test_path = Path::new(&args[1]);
    let k: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5);
    let control_path = args.get(3).map(Path::new);

    let algo = if control_path.is_some() {
        BootstrapAlgo::Enrichments
    } else {
        BootstrapAlgo::Counting
    };
    let opts = BootstrapOptions {
        k,
        algo,
        ..BootstrapOptions::default()
    };

    let results = match bootstrap(test_path, control_path, &opts) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Error running bootstrap: {e}");
            process::exit(1);
        }
    };

    println!("Bootstrap complete: {} k-mer(s), {} iterations", results.len(), opts.bs_iters);
    for r in results.into_iter().take(10) {
        println!("  {}: mean={:.4} stdev={:.4}", r.kmer, r.mean, r.stdev);
    }
}
