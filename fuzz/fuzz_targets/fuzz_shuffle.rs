//! Fuzz target for the k-let-preserving shuffler.
//!
//! Tests that `shuffle` never panics on arbitrary sequences and `klet`
//! values, and that when it succeeds the shuffled output preserves the
//! exact multiset of `klet`-length substrings from the input.

#![no_main]

use katss::shuffle::{seeded_rng, shuffle};
use libfuzzer_sys::fuzz_target;
use rustc_hash::FxHashMap;

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

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let klet = usize::from(data[0] % 6) + 1;
    let seq: Vec<u8> = data[1..]
        .iter()
        .copied()
        .map(|b| match b % 4 {
            0 => b'A',
            1 => b'C',
            2 => b'G',
            _ => b'T',
        })
        .collect();
    if seq.is_empty() || seq.len() > 512 {
        return;
    }

    let mut rng = seeded_rng();
    let Ok(shuffled) = shuffle(&seq, klet, &mut rng) else {
        return;
    };
    assert_eq!(shuffled.len(), seq.len());
    assert_eq!(klet_counts(&seq, klet), klet_counts(&shuffled, klet));
});
