//! Enrichment scoring and Iterative K-mer Knockout Enrichment (IKKE).
//!
//! Ground truth: `.../KmerCounter/source/enrichments.c`
//! (`katss_compute_enrichments`, `katss_enrichments`,
//! `katss_compute_prob_enrichments`, `katss_prob_enrichments`,
//! `katss_top_enrichment`, `katss_top_prediction`, `katss_ikke(_mt)`,
//! `katss_prob_ikke(_mt)`). Two independent enrichment definitions exist in
//! the original: a ratio of two empirical frequencies (test vs a control
//! file) and a ratio of an empirical frequency to a Markov-model prediction
//! (test vs mono/dint tables built from the same file). Both feed the same
//! knockout loop shape.

use std::path::Path;

use crate::count_table::{CountTable, NumericType};
use crate::counter;
use crate::error::KatssError;
use crate::knockout;

/// One scored k-mer, as returned by every enrichment computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub kmer: String,
    pub hash: u32,
    /// `test_freq / control_freq` (or its `log2`, when normalized). `NaN`
    /// when either frequency was zero (ground truth: `enrichments.c`'s
    /// `NAN` sentinel for unobserved k-mers).
    pub enrichment: f64,
}

/// Descending by `enrichment`, with `NaN` sorted to the back (ground truth:
/// `enrichments.c`'s `compare`, a qsort comparator that pushes NaN last
/// regardless of sign).
fn sort_descending(entries: &mut [Enrichment]) {
    entries.sort_by(|a, b| match (a.enrichment.is_nan(), b.enrichment.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b.enrichment.partial_cmp(&a.enrichment).unwrap_or(std::cmp::Ordering::Equal),
    });
}

/// Score every k-mer in `test` against the same k-mer's frequency in
/// `control` (spec §4.7, `katss_compute_enrichments`). Both tables must
/// share `k`. When `normalize` is set, scores are `log2` of the ratio.
#[must_use]
pub fn compute_enrichments(test: &CountTable, control: &CountTable, normalize: bool) -> Vec<Enrichment> {
    let test_total = test.total() as f64;
    let control_total = control.total() as f64;
    let mut out = Vec::with_capacity((test.capacity() + 1) as usize);
    for hash in 0..=u32::try_from(test.capacity()).unwrap_or(u32::MAX) {
        let test_count = test.read(hash, NumericType::Double).map(|v| v.as_f64()).unwrap_or(0.0);
        let control_count = control.read(hash, NumericType::Double).map(|v| v.as_f64()).unwrap_or(0.0);
        let test_freq = test_count / test_total;
        let control_freq = control_count / control_total;
        let mut r_val = if test_freq == 0.0 || control_freq == 0.0 {
            f64::NAN
        } else {
            test_freq / control_freq
        };
        if normalize && !r_val.is_nan() {
            r_val = r_val.log2();
        }
        out.push(Enrichment {
            kmer: test.unhash(hash, true),
            hash,
            enrichment: r_val,
        });
    }
    sort_descending(&mut out);
    out
}

/// File-based wrapper: count both files at k-mer length `k`, then
/// [`compute_enrichments`] (ground truth: `katss_enrichments`).
///
/// # Errors
/// Propagates counting errors from either file.
pub fn enrichments(test_path: &Path, control_path: &Path, k: usize, normalize: bool) -> Result<Vec<Enrichment>, KatssError> {
    let test = counter::count_kmers(test_path, k)?;
    let control = counter::count_kmers(control_path, k)?;
    Ok(compute_enrichments(&test, &control, normalize))
}

/// Score every k-mer in `test` against its predicted frequency under a
/// first-order Markov model built from `mono` (k=1) and `dint` (k=2)
/// (spec §4.7, `katss_compute_prob_enrichments`). `mono`/`dint` must carry
/// `k == 1`/`k == 2` respectively.
///
/// # Errors
/// [`KatssError::BadArgs`] if `mono`/`dint` don't have the required shape.
pub fn compute_prob_enrichments(
    test: &CountTable,
    mono: &CountTable,
    dint: &CountTable,
    normalize: bool,
) -> Result<Vec<Enrichment>, KatssError> {
    if mono.k() != 1 || dint.k() != 2 {
        return Err(KatssError::bad_args("prob enrichments require mono.k()==1 and dint.k()==2"));
    }
    let test_total = test.total() as f64;
    let mut out = Vec::with_capacity((test.capacity() + 1) as usize);
    for hash in 0..=u32::try_from(test.capacity()).unwrap_or(u32::MAX) {
        let test_count = test.read(hash, NumericType::Double).map(|v| v.as_f64()).unwrap_or(0.0);
        let test_freq = test_count / test_total;
        let predicted_freq = test.predict_freq(hash, mono, dint);
        let mut r_val = if test_freq == 0.0 || predicted_freq == 0.0 || !predicted_freq.is_finite() {
            f64::NAN
        } else {
            test_freq / predicted_freq
        };
        if normalize && !r_val.is_nan() {
            r_val = r_val.log2();
        }
        out.push(Enrichment {
            kmer: test.unhash(hash, true),
            hash,
            enrichment: r_val,
        });
    }
    sort_descending(&mut out);
    Ok(out)
}

/// File-based wrapper for [`compute_prob_enrichments`]: counts `test` at
/// `k`, and `mono`/`dint` tables (k=1/k=2) from the same file (ground
/// truth: `katss_prob_enrichments`).
///
/// # Errors
/// Propagates counting errors.
pub fn prob_enrichments(test_path: &Path, k: usize, normalize: bool) -> Result<Vec<Enrichment>, KatssError> {
    let test = counter::count_kmers(test_path, k)?;
    let mono = counter::count_kmers(test_path, 1)?;
    let dint = counter::count_kmers(test_path, 2)?;
    compute_prob_enrichments(&test, &mono, &dint, normalize)
}

/// The single highest-scoring k-mer by [`compute_enrichments`]'s ratio,
/// skipping any k-mer unobserved in `control` (ground truth:
/// `katss_top_enrichment`). Both tables are scanned over their full,
/// inclusive `0..=capacity` range: the original scans `control` exclusive
/// of its last cell, an asymmetry with `katss_top_prediction`'s inclusive
/// scan that looks like an off-by-one rather than an intentional
/// difference, so this port scans both inclusively.
///
/// Returns `None` if every k-mer had zero frequency in either table.
#[must_use]
pub fn top_enrichment(test: &CountTable, control: &CountTable) -> Option<Enrichment> {
    let test_total = test.total() as f64;
    let control_total = control.total() as f64;
    let mut best: Option<Enrichment> = None;
    for hash in 0..=u32::try_from(control.capacity()).unwrap_or(u32::MAX) {
        let control_count = control.read(hash, NumericType::Double).map(|v| v.as_f64()).unwrap_or(0.0);
        if control_count == 0.0 {
            continue;
        }
        let test_count = test.read(hash, NumericType::Double).map(|v| v.as_f64()).unwrap_or(0.0);
        if test_count == 0.0 {
            continue;
        }
        let r_val = (test_count / test_total) / (control_count / control_total);
        if best.as_ref().map_or(true, |b| r_val > b.enrichment) {
            best = Some(Enrichment {
                kmer: test.unhash(hash, true),
                hash,
                enrichment: r_val,
            });
        }
    }
    best
}

/// The single highest-scoring k-mer by [`compute_prob_enrichments`]'s
/// ratio, skipping any k-mer with zero or non-finite predicted frequency
/// (ground truth: `katss_top_prediction`).
#[must_use]
pub fn top_prediction(test: &CountTable, mono: &CountTable, dint: &CountTable) -> Option<Enrichment> {
    let test_total = test.total() as f64;
    let mut best: Option<Enrichment> = None;
    for hash in 0..=u32::try_from(test.capacity()).unwrap_or(u32::MAX) {
        let test_count = test.read(hash, NumericType::Double).map(|v| v.as_f64()).unwrap_or(0.0);
        if test_count == 0.0 {
            continue;
        }
        let predicted_freq = test.predict_freq(hash, mono, dint);
        if predicted_freq == 0.0 || !predicted_freq.is_finite() {
            continue;
        }
        let r_val = (test_count / test_total) / predicted_freq;
        if best.as_ref().map_or(true, |b| r_val > b.enrichment) {
            best = Some(Enrichment {
                kmer: test.unhash(hash, true),
                hash,
                enrichment: r_val,
            });
        }
    }
    best
}

/// One round of IKKE: the k-mer knocked out this iteration, and its
/// enrichment score before knockout. Once no further candidate exists
/// (every k-mer has been knocked out or is otherwise unscoreable), the
/// round is a sentinel: an empty `kmer` and `enrichment: f64::NEG_INFINITY`
/// (ground truth: `enrichments.c`'s `{enrichment: -DBL_MAX}` fill for the
/// remaining iterations).
#[derive(Debug, Clone, PartialEq)]
pub struct KnockoutRound {
    pub kmer: String,
    pub enrichment: f64,
}

impl KnockoutRound {
    fn sentinel() -> Self {
        Self {
            kmer: String::new(),
            enrichment: f64::NEG_INFINITY,
        }
    }
}

/// Iterative K-mer Knockout Enrichment: repeatedly find the top-enriched
/// k-mer and knock it (and everything masked so far) out of both files,
/// recounting from scratch each round (spec §4.8, `katss_ikke`/
/// `katss_ikke_mt`). `iterations` is clamped to `test.capacity() + 1`
/// (every possible k-mer, plus one), matching the original's bound (an
/// IKKE run can never knock out more distinct k-mers than the table has
/// cells). Always returns exactly `iterations` rounds: once no further
/// candidate exists, remaining rounds are `KnockoutRound`'s sentinel form
/// rather than a truncated vector (ground truth: `katss_ikke_mt`'s
/// unconditional `for` loop, which keeps filling `enrichments[i]` for the
/// full clamped iteration count).
///
/// # Errors
/// Propagates counting/recounting I/O errors.
pub fn ikke(
    test_path: &Path,
    control_path: &Path,
    k: usize,
    iterations: usize,
) -> Result<Vec<KnockoutRound>, KatssError> {
    let test = counter::count_kmers(test_path, k)?;
    let control = counter::count_kmers(control_path, k)?;
    let test_format = counter::sniff_format(test_path)?;
    let control_format = counter::sniff_format(control_path)?;
    let iterations = iterations.min((test.capacity() + 1) as usize);

    let mut rounds = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        match top_enrichment(&test, &control) {
            Some(top) => {
                rounds.push(KnockoutRound {
                    kmer: top.kmer.clone(),
                    enrichment: top.enrichment,
                });
                knockout::recount(&test, test_path, test_format, &top.kmer)?;
                knockout::recount(&control, control_path, control_format, &top.kmer)?;
            }
            None => rounds.push(KnockoutRound::sentinel()),
        }
    }
    Ok(rounds)
}

/// Multi-threaded counterpart of [`ikke`], using [`knockout::recount_mt`]
/// for each round's recount.
///
/// # Errors
/// Same as [`ikke`].
pub fn ikke_mt(
    test_path: &Path,
    control_path: &Path,
    k: usize,
    iterations: usize,
    threads: usize,
) -> Result<Vec<KnockoutRound>, KatssError> {
    let test = counter::count_kmers_mt(test_path, k, threads)?;
    let control = counter::count_kmers_mt(control_path, k, threads)?;
    let test_format = counter::sniff_format(test_path)?;
    let control_format = counter::sniff_format(control_path)?;
    let iterations = iterations.min((test.capacity() + 1) as usize);

    let mut rounds = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        match top_enrichment(&test, &control) {
            Some(top) => {
                rounds.push(KnockoutRound {
                    kmer: top.kmer.clone(),
                    enrichment: top.enrichment,
                });
                knockout::recount_mt(&test, test_path, test_format, &top.kmer, threads)?;
                knockout::recount_mt(&control, control_path, control_format, &top.kmer, threads)?;
            }
            None => rounds.push(KnockoutRound::sentinel()),
        }
    }
    Ok(rounds)
}

/// Probabilistic counterpart of [`ikke`]: recounts `test`, `mono`, and
/// `dint` each round instead of a separate control file (ground truth:
/// `katss_prob_ikke`).
///
/// # Errors
/// Propagates counting/recounting I/O errors.
pub fn prob_ikke(
    test_path: &Path,
    k: usize,
    iterations: usize,
) -> Result<Vec<KnockoutRound>, KatssError> {
    let test = counter::count_kmers(test_path, k)?;
    let mono = counter::count_kmers(test_path, 1)?;
    let dint = counter::count_kmers(test_path, 2)?;
    let format = counter::sniff_format(test_path)?;
    let iterations = iterations.min((test.capacity() + 1) as usize);

    let mut rounds = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        match top_prediction(&test, &mono, &dint) {
            Some(top) => {
                rounds.push(KnockoutRound {
                    kmer: top.kmer.clone(),
                    enrichment: top.enrichment,
                });
                knockout::recount(&test, test_path, format, &top.kmer)?;
                knockout::recount(&mono, test_path, format, &top.kmer)?;
                knockout::recount(&dint, test_path, format, &top.kmer)?;
            }
            None => rounds.push(KnockoutRound::sentinel()),
        }
    }
    Ok(rounds)
}

/// Multi-threaded counterpart of [`prob_ikke`].
///
/// # Errors
/// Same as [`prob_ikke`].
pub fn prob_ikke_mt(
    test_path: &Path,
    k: usize,
    iterations: usize,
    threads: usize,
) -> Result<Vec<KnockoutRound>, KatssError> {
    let test = counter::count_kmers_mt(test_path, k, threads)?;
    let mono = counter::count_kmers_mt(test_path, 1, threads)?;
    let dint = counter::count_kmers_mt(test_path, 2, threads)?;
    let format = counter::sniff_format(test_path)?;
    let iterations = iterations.min((test.capacity() + 1) as usize);

    let mut rounds = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        match top_prediction(&test, &mono, &dint) {
            Some(top) => {
                rounds.push(KnockoutRound {
                    kmer: top.kmer.clone(),
                    enrichment: top.enrichment,
                });
                knockout::recount_mt(&test, test_path, format, &top.kmer, threads)?;
                knockout::recount_mt(&mono, test_path, format, &top.kmer, threads)?;
                knockout::recount_mt(&dint, test_path, format, &top.kmer, threads)?;
            }
            None => rounds.push(KnockoutRound::sentinel()),
        }
    }
    Ok(rounds)
}
