//! Iterative k-mer knockout enrichment (IKKE) demo.
//!
//! Repeatedly finds the most enriched k-mer in a test file relative to a
//! control file, prints it, then masks it out of both files before looking
//! for the next one.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example ikke_demo -- test.fa control.fa 7 5
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::env;
use std::path::Path;
use std::process;

use katss::enrichment::ikke;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <test_file> <control_file> [k] [iterations]", args[0]);
        process::exit(1);
    }

    let test_path = Path::new(&args[1]);
    let control_path = Path::new(&args[2]);
    let k: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(5);
    let iterations: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(1);

    let rounds = match ikke(test_path, control_path, k, iterations) {
        Ok(rounds) => rounds,
        Err(e) => {
            eprintln!("Error running IKKE: {e}");
            process::exit(1);
        }
    };

    println!("IKKE complete: {} round(s)", rounds.len());
    for (i, round) in rounds.iter().enumerate() {
        println!("  round {}: knocked out {} (enrichment {:.4})", i + 1, round.kmer, round.enrichment);
    }
}
