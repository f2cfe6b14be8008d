//! Property-based tests using proptest.
//!
//! These verify invariants that should hold across all valid inputs,
//! not just the example-based cases covered by each module's unit tests.

use std::io::Write;

use katss::count_table::NumericType;
use katss::counter::count_kmers;
use katss::hasher::{hash_kmer, unhash};
use katss::shuffle::{seeded_rng, shuffle};
use proptest::prelude::*;
use rustc_hash::FxHashMap;

/// Strategy for generating valid nucleotide sequences of length `min..=max`.
fn dna_sequence(min_len: usize, max_len: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![Just('A'), Just('C'), Just('G'), Just('T')],
        min_len..=max_len,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn klet_counts(seq: &[u8], klet: usize) -> FxHashMap<Vec<u8>, usize> {
    let mut counts = FxHashMap::default();
    if klet == 0 || seq.len() < klet {
        return counts;
    }
    for i in 0..=seq.len() - klet {
        *counts.entry(seq[i..i + klet].to_vec()).or_insert(0) += 1;
    }
    counts
}

proptest! {
    /// Hashing a kmer and unhashing the result should recover the original
    /// string, for any length in 1..=16.
    #[test]
    fn hash_unhash_roundtrip(seq in dna_sequence(1, 16)) {
        let hash = hash_kmer(seq.as_bytes()).unwrap();
        let recovered = unhash(hash, seq.len(), true);
        prop_assert_eq!(recovered, seq);
    }

    /// Shuffling preserves the exact multiset of `klet`-length substrings,
    /// for every klet from 1 up to the sequence length.
    #[test]
    fn shuffle_preserves_klet_counts(seq in dna_sequence(4, 64), klet in 1usize..5) {
        let mut rng = seeded_rng();
        let shuffled = shuffle(seq.as_bytes(), klet, &mut rng).unwrap();
        prop_assert_eq!(shuffled.len(), seq.len());
        prop_assert_eq!(klet_counts(seq.as_bytes(), klet), klet_counts(&shuffled, klet));
    }

    /// A count table's running total always equals the sum of every cell,
    /// for k-mer counting over an arbitrary raw-format file.
    #[test]
    fn counted_total_equals_sum_of_cells(seq in dna_sequence(50, 200)) {
        // Repeat the line ten times so format_classifier's raw-format
        // heuristic (>=90% nucleotide content across the first 10 lines) is
        // satisfied.
        let mut body = Vec::new();
        for _ in 0..10 {
            body.extend_from_slice(seq.as_bytes());
            body.push(b'\n');
        }
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&body).unwrap();
        tmp.flush().unwrap();

        let k = 3;
        let table = count_kmers(tmp.path(), k).unwrap();
        let mut sum = 0u64;
        for hash in 0..=u32::try_from(table.capacity()).unwrap() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let count = table.read(hash, NumericType::UInt64).unwrap().as_f64() as u64;
            sum += count;
        }
        prop_assert_eq!(sum, table.total());
    }
}
