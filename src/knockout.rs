//! Recounter / Knockout (IKKE support): recompute a [`CountTable`] from
//! scratch with one or more k-mers masked out of every record (spec §4.6).
//!
//! Ground truth: `.../KmerCounter/source/recounter.c` (`katss_recount_kmer`,
//! `katss_recount_kmer_shuffle`, `katss_recount_kmer_mt`). The C original
//! zeroes the table's cells with `memset` before every recount and keeps a
//! linked list (`counter->removed`) of every kmer ever knocked out so a
//! later recount re-excludes all of them, not just the newest one; this
//! port uses [`CountTable::zero`] and [`CountTable::push_removed`]/
//! [`CountTable::removed`] for the same contract.

use std::path::Path;
use std::sync::Arc;

use crate::count_table::CountTable;
use crate::error::KatssError;
use crate::format_classifier::RecordFormat;
use crate::hasher::Hasher;
use crate::seq_search::cross_out;
use crate::seq_stream::{SeqStream, SeqStreamInner};
use crate::shuffle;

const BUFFER_SIZE: usize = 65536;
const FLUSH_BATCH: usize = 250_000;

/// Mask every kmer in `removed` (plus `remove` itself, freshly pushed) out
/// of `buf` in place, for the format's matcher (fasta gets header-aware
/// scanning, fastq/raw don't).
fn mask_removed(buf: &mut [u8], removed: &[String], format: RecordFormat) {
    for kmer in removed {
        cross_out(buf, kmer.as_bytes(), format);
    }
}

/// Zero `table`, record `remove` as newly knocked out, then recount every
/// k-mer in `path` with every kmer ever knocked out masked from each chunk
/// before hashing (spec §4.6, `katss_recount_kmer`). Single-threaded.
///
/// # Errors
/// Propagates I/O errors; [`KatssError::BadArgs`] if `table`'s `k` can't
/// build a hasher (should not happen for an already-valid table).
pub fn recount(table: &CountTable, path: &Path, format: RecordFormat, remove: &str) -> Result<(), KatssError> {
    table.zero();
    table.push_removed(remove);
    let removed = table.removed();

    let mut stream = SeqStreamInner::open(path, 'b')?;
    let mut hasher = Hasher::new(table.k(), format)?;
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        mask_removed(&mut buf[..n], &removed, format);
        for hash in hasher.set_seq(&buf[..n]) {
            table.increment(hash);
        }
    }
    Ok(())
}

/// Multi-threaded counterpart of [`recount`] (spec §4.6, `katss_recount_kmer_mt`).
///
/// # Errors
/// Same as [`recount`].
pub fn recount_mt(
    table: &CountTable,
    path: &Path,
    format: RecordFormat,
    remove: &str,
    threads: usize,
) -> Result<(), KatssError> {
    let threads = threads.clamp(1, 128);
    table.zero();
    table.push_removed(remove);
    let removed = Arc::new(table.removed());

    let stream = Arc::new(SeqStream::open(path, 'b')?);
    std::thread::scope(|scope| -> Result<(), KatssError> {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let stream = Arc::clone(&stream);
                let removed = Arc::clone(&removed);
                scope.spawn(move || -> Result<(), KatssError> {
                    let mut hasher = Hasher::new(table.k(), format)?;
                    let mut buf = vec![0u8; BUFFER_SIZE];
                    let mut batch = Vec::with_capacity(FLUSH_BATCH);
                    loop {
                        let n = stream.read(&mut buf)?;
                        if n == 0 {
                            break;
                        }
                        mask_removed(&mut buf[..n], &removed, format);
                        for hash in hasher.set_seq(&buf[..n]) {
                            batch.push(hash);
                            if batch.len() == FLUSH_BATCH {
                                table.increment_batch(&batch);
                                batch.clear();
                            }
                        }
                    }
                    table.increment_batch(&batch);
                    Ok(())
                })
            })
            .collect();
        let mut first_err = None;
        for handle in handles {
            if let Err(e) = handle.join().unwrap_or(Ok(())) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    })
}

/// Recount over a per-record shuffled copy (preserving `klet`-mer counts),
/// masking removed kmers after shuffling (spec §4.6,
/// `katss_recount_kmer_shuffle`). Reseeds to the fixed baseline once for
/// the whole pass, matching the original's `srand(1)` reset.
///
/// # Errors
/// Same as [`recount`], plus [`KatssError::BadArgs`] if `klet == 0`.
pub fn recount_shuffle(
    table: &CountTable,
    path: &Path,
    format: RecordFormat,
    klet: usize,
    remove: &str,
) -> Result<(), KatssError> {
    table.zero();
    table.push_removed(remove);
    let removed = table.removed();

    let mode = match format {
        RecordFormat::Fasta => 'a',
        RecordFormat::Fastq => 'q',
        RecordFormat::Raw => 's',
    };
    let mut stream = SeqStreamInner::open(path, mode)?;
    let mut hasher = Hasher::new(table.k(), format)?;
    let mut rng = shuffle::seeded_rng();
    let mut line = Vec::new();
    while stream.gets(&mut line)? {
        let mut shuffled = shuffle::shuffle(&line, klet, &mut rng)?;
        mask_removed(&mut shuffled, &removed, format);
        hasher.reset();
        for hash in hasher.set_seq(&shuffled) {
            table.increment(hash);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::count_table::NumericType;
    use std::io::Write;

    fn write_tmp(contents: &[u8]) -> tempfile::TempPath {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(contents).unwrap();
        tmp.flush().unwrap();
        tmp.into_temp_path()
    }

    #[test]
    fn recount_excludes_knocked_out_kmer_and_its_overlaps() {
        let path = write_tmp(b">r1\nAACGTT\n");
        let table = CountTable::new(3).unwrap();
        recount(&table, &path, RecordFormat::Fasta, "CGT").unwrap();
        let cgt = crate::hasher::hash_kmer(b"CGT").unwrap();
        assert_eq!(table.read(cgt, NumericType::UInt64).unwrap().as_f64(), 0.0);
        // ACG and GTT both overlap the masked CGT window and must also be excluded
        let acg = crate::hasher::hash_kmer(b"ACG").unwrap();
        let gtt = crate::hasher::hash_kmer(b"GTT").unwrap();
        assert_eq!(table.read(acg, NumericType::UInt64).unwrap().as_f64(), 0.0);
        assert_eq!(table.read(gtt, NumericType::UInt64).unwrap().as_f64(), 0.0);
        assert_eq!(table.removed(), vec!["CGT"]);
    }

    #[test]
    fn recount_accumulates_every_prior_removal() {
        let path = write_tmp(b">r1\nAACGTTGGCC\n");
        let table = CountTable::new(3).unwrap();
        recount(&table, &path, RecordFormat::Fasta, "CGT").unwrap();
        recount(&table, &path, RecordFormat::Fasta, "GGC").unwrap();
        assert_eq!(table.removed(), vec!["CGT", "GGC"]);
        let cgt = crate::hasher::hash_kmer(b"CGT").unwrap();
        assert_eq!(table.read(cgt, NumericType::UInt64).unwrap().as_f64(), 0.0);
    }

    #[test]
    fn recount_single_and_multi_threaded_agree() {
        let path = write_tmp(b">r1\nACGTACGTACGTACGTACGT\n>r2\nTTTTGGGGCCCCAAAA\n");
        let single = CountTable::new(3).unwrap();
        recount(&single, &path, RecordFormat::Fasta, "ACG").unwrap();
        let multi = CountTable::new(3).unwrap();
        recount_mt(&multi, &path, RecordFormat::Fasta, "ACG", 4).unwrap();
        assert_eq!(single.total(), multi.total());
    }

    #[test]
    fn recount_shuffle_preserves_dinucleotide_class_while_masking() {
        let path = write_tmp(b"ACGTACGTACGTAAAACCCCGGGGTTTT\n");
        let table = CountTable::new(3).unwrap();
        recount_shuffle(&table, &path, RecordFormat::Raw, 2, "AAA").unwrap();
        let aaa = crate::hasher::hash_kmer(b"AAA").unwrap();
        assert_eq!(table.read(aaa, NumericType::UInt64).unwrap().as_f64(), 0.0);
    }
}
