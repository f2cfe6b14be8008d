//! Fuzz target for the rolling hasher.
//!
//! Tests that `Hasher::set_seq` never panics on arbitrary bytes in any
//! format, and that every hash it yields round-trips through `unhash` back
//! to a k-length string of valid bases.

#![no_main]

use katss::format_classifier::RecordFormat;
use katss::hasher::{base_code, unhash, Hasher};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 4096 {
        return;
    }

    for (k, format) in [
        (2, RecordFormat::Raw),
        (5, RecordFormat::Fasta),
        (3, RecordFormat::Fastq),
    ] {
        let Ok(mut hasher) = Hasher::new(k, format) else {
            continue;
        };
        for hash in hasher.set_seq(data) {
            assert!(hash <= hasher_mask(k), "hash {hash} exceeds {k}-mer mask");
            let kmer = unhash(hash, k, true);
            assert_eq!(kmer.len(), k);
            for b in kmer.bytes() {
                assert!(base_code(b).is_some(), "unhash produced non-nucleotide byte");
            }
        }
    }
});

fn hasher_mask(k: usize) -> u32 {
    if k == 16 {
        u32::MAX
    } else {
        (1u32 << (2 * k)) - 1
    }
}
