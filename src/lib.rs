//! # katss
//!
//! A k-mer counting and enrichment engine for nucleotide sequences.
//!
//! `katss` reads FASTA, FASTQ, or raw (one-sequence-per-line) files,
//! optionally gzip/zlib compressed, and counts every overlapping k-mer
//! (`k` in `1..=16`) into a dense table indexed by a 2-bit-per-base hash.
//! On top of that counting core it offers:
//!
//! - **Enrichment scoring**: how over-represented is each k-mer in a test
//!   file relative to a control file, or relative to a first-order Markov
//!   model built from the test file itself?
//! - **Iterative knockout (IKKE)**: repeatedly find the top-enriched
//!   k-mer, mask every occurrence of it out of both files, and recount,
//!   to see what the next-most-enriched k-mer is once the first is no
//!   longer driving the signal.
//! - **Bootstrap significance**: resample a file's k-mer counts (or
//!   enrichment ratio) many times and report each k-mer's mean and
//!   standard deviation across resamples.
//!
//! ```no_run
//! use std::path::Path;
//! use katss::counter::count_kmers;
//!
//! let table = count_kmers(Path::new("reads.fq"), 6)?;
//! println!("total k-mers counted: {}", table.total());
//! # Ok::<(), katss::error::KatssError>(())
//! ```

pub mod bootstrap;
pub mod cli;
pub mod count_table;
pub mod counter;
pub mod enrichment;
pub mod error;
pub mod format_classifier;
pub mod hasher;
pub mod knockout;
pub mod options;
pub mod seq_search;
pub mod seq_stream;
pub mod shuffle;
pub mod stats;

pub use count_table::{CountTable, NumericType, NumericValue};
pub use enrichment::{Enrichment, KnockoutRound};
pub use error::KatssError;
pub use format_classifier::RecordFormat;
pub use options::Options;
