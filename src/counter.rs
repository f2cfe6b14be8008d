//! Counter pipeline (spec §4.5): drives a format-detected stream through the
//! rolling hasher into a [`CountTable`], single- or multi-threaded, on the
//! full file or a randomly sub-sampled subset.
//!
//! Ground truth: `.../KmerCounter/source/counter.c` (`katss_count_kmers`,
//! `katss_count_kmers_mt`, `katss_count_kmers_bootstrap(_mt)`,
//! `katss_count_kmers_ushuffle(_bootstrap)`) and `determine_filetype`'s
//! first-ten-lines sniff (already ported as [`crate::format_classifier::classify`]).
//! The C original's worker threads each open their own `SeqFile` handle onto
//! the same underlying fd and race reads against each other implicitly
//! synchronized by the OS file position; this port instead shares one
//! [`SeqStream`] (a `Mutex<SeqStreamInner>`) so every worker's read is
//! explicitly serialized, which is the same effective contract without
//! relying on OS-level read-position atomicity.

use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand::rngs::SmallRng;

use crate::count_table::CountTable;
use crate::error::KatssError;
use crate::format_classifier::{classify, RecordFormat};
use crate::hasher::Hasher;
use crate::seq_stream::{SeqStream, SeqStreamInner};
use crate::shuffle;

/// Bytes read to sniff a file's record format before the real counting pass.
const SNIFF_SIZE: usize = 8192;
/// Read chunk size for the counting loop (spec §4.5).
const BUFFER_SIZE: usize = 65536;
/// Hashes buffered per batch before a single `increment_batch` call in the
/// multi-threaded paths (spec §4.5, matching `counter.c`'s `num_counts`).
const FLUSH_BATCH: usize = 250_000;
/// Sample parameter range, in units of 0.001% (spec §4.5, `counter.c`).
const SAMPLE_MIN: i32 = 1;
const SAMPLE_MAX: i32 = 100_000;

/// Detect a file's record format by sniffing its first ~8KiB (after
/// transparent decompression). Every caller opens its own fresh stream for
/// the real read pass, so this instance is throwaway.
///
/// # Errors
/// [`KatssError::UnknownFormat`] if the classifier can't decide,
/// propagates I/O errors otherwise.
/// Public entry point for callers (enrichment, knockout, the CLI) that need
/// a file's format ahead of an operation that doesn't sniff it itself.
///
/// # Errors
/// Same as [`count_kmers`].
pub fn sniff_format(path: &Path) -> Result<RecordFormat, KatssError> {
    detect_format(path)
}

fn detect_format(path: &Path) -> Result<RecordFormat, KatssError> {
    let mut stream = SeqStreamInner::open(path, 'b')?;
    let mut peek = vec![0u8; SNIFF_SIZE];
    let n = stream.read(&mut peek)?;
    let mut reader = BufReader::new(Cursor::new(&peek[..n]));
    classify(&mut reader).ok_or_else(|| KatssError::UnknownFormat {
        path: path.to_path_buf(),
    })
}

fn clamp_sample(sample: i32) -> i32 {
    sample.clamp(SAMPLE_MIN, SAMPLE_MAX)
}

fn clamp_threads(threads: usize) -> usize {
    threads.clamp(1, 128)
}

/// Mode character `SeqStream`/`SeqStreamInner` expect for a detected format,
/// for the line-based (`gets`) paths that need header/quality stripping
/// rather than the raw binary pass-through `count_kmers` uses.
const fn format_mode(format: RecordFormat) -> char {
    match format {
        RecordFormat::Fasta => 'a',
        RecordFormat::Fastq => 'q',
        RecordFormat::Raw => 's',
    }
}

/// Count every k-mer in `path`, single-threaded (spec §4.5, `katss_count_kmers`).
///
/// # Errors
/// I/O errors, [`KatssError::UnknownFormat`] if sniffing fails,
/// [`KatssError::BadArgs`] if `k` is out of range.
pub fn count_kmers(path: &Path, k: usize) -> Result<CountTable, KatssError> {
    let format = detect_format(path)?;
    let table = CountTable::new(k)?;
    let mut stream = SeqStreamInner::open(path, 'b')?;
    let mut hasher = Hasher::new(k, format)?;
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for hash in hasher.set_seq(&buf[..n]) {
            table.increment(hash);
        }
        if n < buf.len() && stream.eof() {
            break;
        }
    }
    Ok(table)
}

/// One worker's share of a multi-threaded counting pass: reads `BUFFER_SIZE`
/// chunks from the shared `stream` until exhausted, batching hashes into
/// `FLUSH_BATCH`-sized groups before each `increment_batch` (matching
/// `counter.c`'s `count_file_mt` flushing pattern).
fn count_worker(
    stream: &SeqStream,
    table: &CountTable,
    k: usize,
    format: RecordFormat,
) -> Result<(), KatssError> {
    let mut hasher = Hasher::new(k, format)?;
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut batch = Vec::with_capacity(FLUSH_BATCH);
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
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
}

/// Count every k-mer in `path` using `threads` workers sharing one locked
/// stream (spec §4.5, `katss_count_kmers_mt`). `threads <= 1` falls back to
/// [`count_kmers`].
///
/// # Errors
/// Same as [`count_kmers`]; returns the first error any worker encountered.
pub fn count_kmers_mt(path: &Path, k: usize, threads: usize) -> Result<CountTable, KatssError> {
    let threads = clamp_threads(threads);
    if threads == 1 {
        return count_kmers(path, k);
    }
    let format = detect_format(path)?;
    let table = CountTable::new(k)?;
    let stream = Arc::new(SeqStream::open(path, 'b')?);

    std::thread::scope(|scope| -> Result<(), KatssError> {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let stream = Arc::clone(&stream);
                let table = &table;
                scope.spawn(move || count_worker(&stream, table, k, format))
            })
            .collect();
        let mut first_err = None;
        for handle in handles {
            if let Err(e) = handle.join().unwrap_or(Ok(())) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    })?;

    Ok(table)
}

/// Count k-mers from a random sub-sample of `path`'s lines, single-threaded
/// (spec §4.5, `katss_count_kmers_bootstrap`). `sample` is in units of
/// 0.001% (1..=100_000); `seed` defaults to a time-derived seed when `None`.
///
/// # Errors
/// Same as [`count_kmers`].
pub fn count_kmers_bootstrap(
    path: &Path,
    k: usize,
    sample: i32,
    seed: u64,
) -> Result<CountTable, KatssError> {
    let sample = clamp_sample(sample);
    let format = detect_format(path)?;
    let table = CountTable::new(k)?;
    let mut stream = SeqStreamInner::open(path, format_mode(format))?;
    let mut hasher = Hasher::new(k, format)?;
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut line = Vec::new();
    while stream.gets(&mut line)? {
        if rng.gen_range(0..SAMPLE_MAX) >= sample {
            continue;
        }
        hasher.reset();
        for hash in hasher.set_seq(&line) {
            table.increment(hash);
        }
    }
    Ok(table)
}

/// Multi-threaded counterpart of [`count_kmers_bootstrap`] (spec §4.5,
/// `katss_count_kmers_bootstrap_mt`); each worker draws from its own
/// `seed`-derived stream so sampling decisions don't contend on one RNG.
///
/// # Errors
/// Same as [`count_kmers_mt`].
pub fn count_kmers_bootstrap_mt(
    path: &Path,
    k: usize,
    sample: i32,
    seed: u64,
    threads: usize,
) -> Result<CountTable, KatssError> {
    let threads = clamp_threads(threads);
    if threads == 1 {
        return count_kmers_bootstrap(path, k, sample, seed);
    }
    let sample = clamp_sample(sample);
    let format = detect_format(path)?;
    let table = CountTable::new(k)?;
    let stream = Arc::new(SeqStream::open(path, format_mode(format))?);

    std::thread::scope(|scope| -> Result<(), KatssError> {
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let stream = Arc::clone(&stream);
                let table = &table;
                let worker_seed = seed.wrapping_add(i as u64);
                scope.spawn(move || -> Result<(), KatssError> {
                    let mut hasher = Hasher::new(k, format)?;
                    let mut rng = SmallRng::seed_from_u64(worker_seed);
                    let mut batch = Vec::with_capacity(FLUSH_BATCH);
                    let mut line = Vec::new();
                    while stream.gets(&mut line)? {
                        if rng.gen_range(0..SAMPLE_MAX) >= sample {
                            continue;
                        }
                        hasher.reset();
                        for hash in hasher.set_seq(&line) {
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
    })?;

    Ok(table)
}

/// Count k-mers over a shuffled copy of every record, preserving `klet`-mer
/// frequencies (spec §4.5, `katss_count_kmers_ushuffle`). Uses the fixed
/// baseline seed (spec §4.5's `srand(1)` contract), reseeded once for the
/// whole file pass.
///
/// # Errors
/// Same as [`count_kmers`], plus [`KatssError::BadArgs`] if `klet == 0`.
pub fn count_kmers_ushuffle(path: &Path, k: usize, klet: usize) -> Result<CountTable, KatssError> {
    let format = detect_format(path)?;
    let table = CountTable::new(k)?;
    let mut stream = SeqStreamInner::open(path, format_mode(format))?;
    let mut hasher = Hasher::new(k, format)?;
    let mut rng = shuffle::seeded_rng();
    let mut line = Vec::new();
    while stream.gets(&mut line)? {
        let shuffled = shuffle::shuffle(&line, klet, &mut rng)?;
        hasher.reset();
        for hash in hasher.set_seq(&shuffled) {
            table.increment(hash);
        }
    }
    Ok(table)
}

/// Combination of [`count_kmers_ushuffle`] and [`count_kmers_bootstrap`]:
/// shuffle each sampled record before counting (spec §4.5,
/// `katss_count_kmers_ushuffle_bootstrap`).
///
/// # Errors
/// Same as [`count_kmers_ushuffle`].
pub fn count_kmers_ushuffle_bootstrap(
    path: &Path,
    k: usize,
    klet: usize,
    sample: i32,
    seed: u64,
) -> Result<CountTable, KatssError> {
    let sample = clamp_sample(sample);
    let format = detect_format(path)?;
    let table = CountTable::new(k)?;
    let mut stream = SeqStreamInner::open(path, format_mode(format))?;
    let mut hasher = Hasher::new(k, format)?;
    let mut sample_rng = SmallRng::seed_from_u64(seed);
    let mut shuffle_rng = shuffle::seeded_rng();
    let mut line = Vec::new();
    while stream.gets(&mut line)? {
        if sample_rng.gen_range(0..SAMPLE_MAX) >= sample {
            continue;
        }
        let shuffled = shuffle::shuffle(&line, klet, &mut shuffle_rng)?;
        hasher.reset();
        for hash in hasher.set_seq(&shuffled) {
            table.increment(hash);
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(contents: &[u8]) -> tempfile::TempPath {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(contents).unwrap();
        tmp.flush().unwrap();
        tmp.into_temp_path()
    }

    #[test]
    fn counts_raw_file_single_threaded() {
        // classification needs 10 lines that score >=90% nucleotide content
        let mut body = b"AACGGTT\n".to_vec();
        for _ in 0..9 {
            body.extend_from_slice(b"ACGTACGT\n");
        }
        let path = write_tmp(&body);
        let table = count_kmers(&path, 2).unwrap();
        let aa = crate::hasher::hash_kmer(b"AA").unwrap();
        assert_eq!(table.read(aa, crate::count_table::NumericType::UInt64).unwrap().as_f64(), 1.0);
    }

    #[test]
    fn counts_fasta_file_matching_single_and_multi_threaded() {
        let path = write_tmp(b">r1\nAAAAAAAC\n>r2\nGGGG\n");
        let single = count_kmers(&path, 3).unwrap();
        let multi = count_kmers_mt(&path, 3, 4).unwrap();
        assert_eq!(single.total(), multi.total());
        let aaa = crate::hasher::hash_kmer(b"AAA").unwrap();
        assert_eq!(
            single.read(aaa, crate::count_table::NumericType::UInt64).unwrap().as_f64(),
            multi.read(aaa, crate::count_table::NumericType::UInt64).unwrap().as_f64()
        );
    }

    #[test]
    fn bootstrap_sample_never_exceeds_full_count() {
        let mut body = Vec::new();
        for _ in 0..200 {
            body.extend_from_slice(b"ACGTACGTACGT\n");
        }
        let path = write_tmp(&body);
        let full = count_kmers(&path, 2).unwrap();
        let sampled = count_kmers_bootstrap(&path, 2, 50_000, 1).unwrap();
        assert!(sampled.total() <= full.total());
        assert!(sampled.total() > 0);
    }

    #[test]
    fn ushuffle_preserves_total_count() {
        let mut body = Vec::new();
        for _ in 0..10 {
            body.extend_from_slice(b"ACGTACGTACGTAAAACCCCGGGGTTTT\n");
        }
        let path = write_tmp(&body);
        let full = count_kmers(&path, 3).unwrap();
        let shuffled = count_kmers_ushuffle(&path, 3, 2).unwrap();
        assert_eq!(full.total(), shuffled.total());
    }
}
