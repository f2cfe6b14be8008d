//! Basic k-mer counting demo.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example basic_count -- sequences.fa 11
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::env;
use std::path::Path;
use std::process;

use katss::count_table::NumericType;
use katss::counter::count_kmers;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <sequence_file> [k]", args[0]);
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  sequence_file  Path to a fasta, fastq, or raw file");
        eprintln!("  k              K-mer length (default: 5)");
        process::exit(1);
    }

    let path = Path::new(&args[1]);
    let k: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5);

    let table = match count_kmers(path, k) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Error counting k-mers: {e}");
            process::exit(1);
        }
    };

    let mut counts: Vec<(String, u64)> = Vec::new();
    for hash in 0..=u32::try_from(table.capacity()).unwrap() {
        let count = table.read(hash, NumericType::UInt64).unwrap().as_f64();
        if count > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            counts.push((table.unhash(hash, true), count as u64));
        }
    }

    println!("K-mer counting complete!");
    println!("  K-mer length: {k}");
    println!("  Unique k-mers observed: {}", counts.len());
    println!("  Total k-mers counted: {}", table.total());

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    println!("\nTop 10 most frequent k-mers:");
    for (kmer, count) in counts.into_iter().take(10) {
        println!("  {kmer}: {count}");
    }
}
