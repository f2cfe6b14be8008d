//! Error types for katss.
//!
//! A single `thiserror`-derived enum covers every failure kind in spec §7
//! (`IoError`, `CompressionError`, `BadMode`, `UnknownFormat`, `BufTooSmall`,
//! `OutOfMemory`, `BadArgs`, `BadChar`, `WrongLength`, `OutOfRange`). Leaf
//! operations return `Result<T, KatssError>` instead of setting a
//! thread-local error slot; `strerror`-equivalent behavior is just
//! `Display`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur anywhere in the counting/enrichment pipeline.
#[derive(Debug, Error)]
pub enum KatssError {
    /// Open/read/seek/close failed at the OS level.
    #[error("I/O error on '{path}': {source}")]
    IoError {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// gzip/zlib decompressor init or inflate failed.
    #[error("decompression error on '{path}': {source}")]
    CompressionError {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Unrecognized or conflicting stream mode flag.
    #[error("unrecognized mode '{mode}': expected one of a, q, s, b")]
    BadMode { mode: char },

    /// The format classifier could not decide fasta/fastq/raw.
    #[error("could not classify input format for '{path}'")]
    UnknownFormat { path: PathBuf },

    /// A record, or its trim carryover, exceeded the caller's buffer.
    #[error("record exceeds buffer capacity ({capacity} bytes)")]
    BufTooSmall { capacity: usize },

    /// Allocation failed.
    #[error("out of memory requesting {requested} bytes")]
    OutOfMemory { requested: usize },

    /// An argument (k, iters, sample, table shape) is out of range.
    #[error("bad argument: {details}")]
    BadArgs { details: String },

    /// A non-nucleotide character appeared in a kmer key lookup.
    #[error("invalid character '{0}' in k-mer key")]
    BadChar(char),

    /// A kmer key's length didn't match the table's k.
    #[error("k-mer key length {actual} does not match table k={expected}")]
    WrongLength { expected: usize, actual: usize },

    /// A hash value exceeded the table's capacity.
    #[error("hash {hash} exceeds table capacity {capacity}")]
    OutOfRange { hash: u64, capacity: u64 },
}

impl KatssError {
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::IoError {
            source,
            path: path.into(),
        }
    }

    pub fn bad_args(details: impl Into<String>) -> Self {
        Self::BadArgs {
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_mode_display() {
        let err = KatssError::BadMode { mode: 'x' };
        assert_eq!(
            err.to_string(),
            "unrecognized mode 'x': expected one of a, q, s, b"
        );
    }

    #[test]
    fn wrong_length_display() {
        let err = KatssError::WrongLength {
            expected: 4,
            actual: 5,
        };
        assert!(err.to_string().contains("4"));
        assert!(err.to_string().contains("5"));
    }

    #[test]
    fn bad_args_helper() {
        let err = KatssError::bad_args("k must be 1..=16");
        assert!(matches!(err, KatssError::BadArgs { .. }));
    }
}
