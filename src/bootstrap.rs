//! Bootstrap significance testing: repeatedly resample a file's k-mer
//! counts (or enrichment ratio) and report each k-mer's mean and standard
//! deviation across resamples (spec §4.9).
//!
//! Ground truth: `.../KmerCounter/source/bootstrap.c`
//! (`katss_init_bootstrap`, `process_count`, `process_enrichments`,
//! `process_enrichments_prob`, `process_bootstrap_iteration`,
//! `katss_bootstrap`, `bootstrap_compare`). Each iteration draws a fresh
//! sample via [`crate::counter::count_kmers_bootstrap_mt`] (one resample
//! per iteration, not one resample shared across iterations), folds every
//! cell's value into a per-cell [`crate::stats::RunningStats`], and after
//! `bs_iters` rounds reports `{kmer, mean, stdev}` sorted descending by
//! mean, matching `bootstrap_compare`'s qsort comparator. `process_ikke`/
//! `process_ikke_prob` are unimplemented stubs in the original (`return
//! 1;`) with no corresponding behavior to port, so no IKKE bootstrap mode
//! is offered here.

use std::path::Path;

use crate::counter;
use crate::count_table::NumericType;
use crate::enrichment::compute_enrichments;
use crate::error::KatssError;
use crate::stats::RunningStats;

/// Which quantity is resampled each bootstrap iteration (ground truth:
/// `bootstrap.c`'s `opts->algo` dispatch in `process_bootstrap_iteration`,
/// minus the unimplemented IKKE arm).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapAlgo {
    /// Resample `test_path` alone and track each k-mer's frequency.
    Counting,
    /// Resample both `test_path` and `control_path` and track the ratio of
    /// their frequencies, as in [`crate::enrichment::compute_enrichments`].
    Enrichments,
}

/// Parameters for one bootstrap run (ground truth:
/// `katss_init_default_opts`'s field defaults: `kmer=5`, `bs_iters=10`,
/// `sample=10`, `threads=8`).
#[derive(Debug, Clone, Copy)]
pub struct BootstrapOptions {
    pub k: usize,
    pub bs_iters: usize,
    /// Sample size, in units of 0.001% (spec §4.9, §4.4's sampling
    /// convention); clamped to `1..=100_000` by [`crate::counter`].
    pub sample: i32,
    pub threads: usize,
    pub seed: u64,
    pub algo: BootstrapAlgo,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            k: 5,
            bs_iters: 10,
            sample: 10_000,
            threads: 8,
            seed: 1,
            algo: BootstrapAlgo::Counting,
        }
    }
}

/// One k-mer's bootstrap result: mean and standard deviation of its
/// resampled value across every iteration (ground truth:
/// `bootstrap_result` cells after `katss_bootstrap`'s finalize pass).
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapResult {
    pub kmer: String,
    pub mean: f64,
    pub stdev: f64,
}

/// Descending by `mean` (ground truth: `bootstrap_compare`).
fn sort_by_mean_descending(results: &mut [BootstrapResult]) {
    results.sort_by(|a, b| b.mean.partial_cmp(&a.mean).unwrap_or(std::cmp::Ordering::Equal));
}

/// Run `opts.bs_iters` resampling iterations over `test_path` (and
/// `control_path`, for [`BootstrapAlgo::Enrichments`]), returning every
/// k-mer's resampled mean/stdev sorted descending by mean (ground truth:
/// `katss_bootstrap`).
///
/// `control_path` is ignored for [`BootstrapAlgo::Counting`] and required
/// for [`BootstrapAlgo::Enrichments`].
///
/// # Errors
/// Propagates counting I/O errors. [`KatssError::BadArgs`] if
/// `opts.bs_iters < 2` (a standard deviation needs at least 2 samples) or
/// if `control_path` is `None` under [`BootstrapAlgo::Enrichments`].
pub fn bootstrap(
    test_path: &Path,
    control_path: Option<&Path>,
    opts: &BootstrapOptions,
) -> Result<Vec<BootstrapResult>, KatssError> {
    if opts.bs_iters < 2 {
        return Err(KatssError::bad_args("bs_iters must be at least 2"));
    }
    let baseline = counter::count_kmers(test_path, opts.k)?;
    let capacity = baseline.capacity();
    #[allow(clippy::cast_possible_truncation)]
    let mut cells: Vec<RunningStats> = vec![RunningStats::new(); (capacity + 1) as usize];

    match opts.algo {
        BootstrapAlgo::Counting => {
            for i in 0..opts.bs_iters {
                #[allow(clippy::cast_possible_truncation)]
                let seed = opts.seed.wrapping_add(i as u64);
                let sample = counter::count_kmers_bootstrap_mt(
                    test_path, opts.k, opts.sample, seed, opts.threads,
                )?;
                let total = sample.total() as f64;
                for (hash, stats) in cells.iter_mut().enumerate() {
                    #[allow(clippy::cast_possible_truncation)]
                    let count = sample
                        .read(hash as u32, NumericType::Double)
                        .map(|v| v.as_f64())
                        .unwrap_or(0.0);
                    stats.update(count / total);
                }
            }
        }
        BootstrapAlgo::Enrichments => {
            let control_path = control_path
                .ok_or_else(|| KatssError::bad_args("enrichments bootstrap requires a control file"))?;
            for i in 0..opts.bs_iters {
                #[allow(clippy::cast_possible_truncation)]
                let seed = opts.seed.wrapping_add(i as u64);
                let test_sample = counter::count_kmers_bootstrap_mt(
                    test_path, opts.k, opts.sample, seed, opts.threads,
                )?;
                let control_sample = counter::count_kmers_bootstrap_mt(
                    control_path, opts.k, opts.sample, seed, opts.threads,
                )?;
                let ranked = compute_enrichments(&test_sample, &control_sample, false);
                for entry in ranked {
                    cells[entry.hash as usize].update(entry.enrichment);
                }
            }
        }
    }

    let mut results: Vec<BootstrapResult> = cells
        .into_iter()
        .enumerate()
        .map(|(hash, stats)| BootstrapResult {
            kmer: baseline.unhash(hash as u32, true),
            mean: stats.mean(),
            stdev: stats.stdev(),
        })
        .collect();
    sort_by_mean_descending(&mut results);
    Ok(results)
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
    fn rejects_too_few_iterations() {
        let path = write_tmp(b">r1\nACGTACGTACGT\n");
        let opts = BootstrapOptions {
            k: 2,
            bs_iters: 1,
            ..BootstrapOptions::default()
        };
        assert!(bootstrap(&path, None, &opts).is_err());
    }

    #[test]
    fn enrichments_mode_requires_control_path() {
        let path = write_tmp(b">r1\nACGTACGTACGT\n");
        let opts = BootstrapOptions {
            k: 2,
            algo: BootstrapAlgo::Enrichments,
            ..BootstrapOptions::default()
        };
        assert!(bootstrap(&path, None, &opts).is_err());
    }

    #[test]
    fn counting_mode_returns_one_result_per_capacity_cell() {
        let path = write_tmp(b">r1\nACGTACGTACGTACGTACGTACGT\n");
        let opts = BootstrapOptions {
            k: 2,
            bs_iters: 3,
            sample: 100_000,
            threads: 1,
            ..BootstrapOptions::default()
        };
        let results = bootstrap(&path, None, &opts).unwrap();
        assert_eq!(results.len() as u64, (1u64 << (2 * opts.k)));
        for window in results.windows(2) {
            assert!(window[0].mean >= window[1].mean);
        }
    }
}
