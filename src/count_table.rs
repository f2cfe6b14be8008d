//! Dense k-mer count table (spec §3, §4.4).
//!
//! Ground truth:
//! `examples/original_source/.../KmerCounter/source/tables.c`
//! (`katss_init_counter`, `katss_increment(s)`, `katss_decrement`,
//! `katss_get(_from_hash)`) and `enrichments.c`'s `predict_kmer` for the
//! Markov-model correction. Cells are atomic so `increment` is a plain
//! `fetch_add`, which also makes it safe to call from multiple threads
//! without the C original's counter-wide mutex (spec §9 explicitly allows
//! this).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::KatssError;
use crate::hasher::{base_code, unhash};

/// The ten numeric read types spec §4.4 lists, with saturating casts applied
/// on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
}

/// A saturating-cast count value, tagged by the type it was read as.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
}

impl NumericValue {
    /// Widen to `f64`, for callers (enrichment, bootstrap) that just want a
    /// number regardless of the requested storage width.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int8(v) => f64::from(v),
            Self::UInt8(v) => f64::from(v),
            Self::Int16(v) => f64::from(v),
            Self::UInt16(v) => f64::from(v),
            Self::Int32(v) => f64::from(v),
            Self::UInt32(v) => f64::from(v),
            #[allow(clippy::cast_precision_loss)]
            Self::Int64(v) => v as f64,
            #[allow(clippy::cast_precision_loss)]
            Self::UInt64(v) => v as f64,
            Self::Float(v) => f64::from(v),
            Self::Double(v) => v,
        }
    }
}

fn cast_saturating(count: u64, numeric_type: NumericType) -> NumericValue {
    match numeric_type {
        NumericType::Int8 => NumericValue::Int8(count.min(u64::from(i8::MAX as u8)) as i8),
        NumericType::UInt8 => NumericValue::UInt8(count.min(u64::from(u8::MAX)) as u8),
        NumericType::Int16 => NumericValue::Int16(count.min(i16::MAX as u64) as i16),
        NumericType::UInt16 => NumericValue::UInt16(count.min(u64::from(u16::MAX)) as u16),
        NumericType::Int32 => NumericValue::Int32(count.min(i32::MAX as u64) as i32),
        NumericType::UInt32 => NumericValue::UInt32(count.min(u64::from(u32::MAX)) as u32),
        NumericType::Int64 => NumericValue::Int64(count.min(i64::MAX as u64) as i64),
        NumericType::UInt64 => NumericValue::UInt64(count),
        #[allow(clippy::cast_precision_loss)]
        NumericType::Float => NumericValue::Float(count as f32),
        #[allow(clippy::cast_precision_loss)]
        NumericType::Double => NumericValue::Double(count as f64),
    }
}

/// Backing storage: 64-bit cells for k ≤ 12, 32-bit cells for k ∈ [13,16]
/// (spec §3's table-shape invariant, matching `tables.c`'s
/// `init_small_table`/`init_medium_table` split).
#[derive(Debug)]
enum Cells {
    Small(Vec<AtomicU64>),
    Medium(Vec<AtomicU32>),
}

impl Cells {
    fn get(&self, hash: u32) -> u64 {
        match self {
            Self::Small(v) => v[hash as usize].load(Ordering::Relaxed),
            Self::Medium(v) => u64::from(v[hash as usize].load(Ordering::Relaxed)),
        }
    }

    fn fetch_add(&self, hash: u32, delta: u64) {
        match self {
            Self::Small(v) => {
                v[hash as usize].fetch_add(delta, Ordering::Relaxed);
            }
            #[allow(clippy::cast_possible_truncation)]
            Self::Medium(v) => {
                v[hash as usize].fetch_add(delta as u32, Ordering::Relaxed);
            }
        }
    }

    fn fetch_sub(&self, hash: u32, delta: u64) {
        match self {
            Self::Small(v) => {
                v[hash as usize].fetch_sub(delta, Ordering::Relaxed);
            }
            #[allow(clippy::cast_possible_truncation)]
            Self::Medium(v) => {
                v[hash as usize].fetch_sub(delta as u32, Ordering::Relaxed);
            }
        }
    }

    fn zero(&self) {
        match self {
            Self::Small(v) => v.iter().for_each(|c| c.store(0, Ordering::Relaxed)),
            Self::Medium(v) => v.iter().for_each(|c| c.store(0, Ordering::Relaxed)),
        }
    }
}

/// Dense count table sized `4^k`, indexed directly by canonical hash.
#[derive(Debug)]
pub struct CountTable {
    k: usize,
    capacity: u64,
    cells: Cells,
    total: AtomicU64,
    removed: Mutex<Vec<String>>,
}

impl CountTable {
    /// # Errors
    /// Returns [`KatssError::BadArgs`] if `k` is not in `1..=16`.
    pub fn new(k: usize) -> Result<Self, KatssError> {
        if k == 0 || k > 16 {
            return Err(KatssError::bad_args(format!(
                "k-mer length must be in 1..=16, got {k}"
            )));
        }
        let capacity = (1u64 << (2 * k)) - 1;
        let cells = if k <= 12 {
            Cells::Small((0..=capacity).map(|_| AtomicU64::new(0)).collect())
        } else {
            Cells::Medium((0..=capacity).map(|_| AtomicU32::new(0)).collect())
        };
        Ok(Self {
            k,
            capacity,
            cells,
            total: AtomicU64::new(0),
            removed: Mutex::new(Vec::new()),
        })
    }

    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Unsynchronized single-value increment (spec §4.4, §5: intentionally
    /// unsynchronized, safe here because the cell is atomic).
    pub fn increment(&self, hash: u32) {
        self.cells.fetch_add(hash, 1);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Bulk increment for the multi-threaded pipeline; advances `total` by
    /// the batch length (spec §4.4).
    pub fn increment_batch(&self, hashes: &[u32]) {
        for &hash in hashes {
            self.cells.fetch_add(hash, 1);
        }
        #[allow(clippy::cast_possible_truncation)]
        self.total.fetch_add(hashes.len() as u64, Ordering::Relaxed);
    }

    pub fn decrement(&self, hash: u32) {
        self.cells.fetch_sub(hash, 1);
        self.total.fetch_sub(1, Ordering::Relaxed);
    }

    /// Zero every cell and `total`, without touching `removed` (used by
    /// [`crate::knockout::recount`], which manages `removed` itself).
    pub fn zero(&self) {
        self.cells.zero();
        self.total.store(0, Ordering::Relaxed);
    }

    /// # Errors
    /// Returns [`KatssError::OutOfRange`] if `hash > capacity`.
    pub fn read(&self, hash: u32, numeric_type: NumericType) -> Result<NumericValue, KatssError> {
        if u64::from(hash) > self.capacity {
            return Err(KatssError::OutOfRange {
                hash: u64::from(hash),
                capacity: self.capacity,
            });
        }
        Ok(cast_saturating(self.cells.get(hash), numeric_type))
    }

    /// Re-hash `kmer` from text (A/C/G/T/U, case-sensitive uppercase) and
    /// read its cell.
    ///
    /// # Errors
    /// [`KatssError::BadChar`] on an unrecognized letter, [`KatssError::WrongLength`]
    /// if `kmer.len() != k`.
    pub fn read_by_key(
        &self,
        kmer: &str,
        numeric_type: NumericType,
    ) -> Result<NumericValue, KatssError> {
        if kmer.len() != self.k {
            return Err(KatssError::WrongLength {
                expected: self.k,
                actual: kmer.len(),
            });
        }
        let mut hash: u32 = 0;
        for b in kmer.bytes() {
            let code = base_code(b).ok_or(KatssError::BadChar(b as char))?;
            hash = hash * 4 + u32::from(code);
        }
        self.read(hash, numeric_type)
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Append-only; duplicates allowed (spec §4.4).
    pub fn push_removed(&self, kmer: impl Into<String>) {
        self.removed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(kmer.into());
    }

    /// Ordered snapshot of every kmer knocked out so far.
    #[must_use]
    pub fn removed(&self) -> Vec<String> {
        self.removed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Unhash `hash` back into its uppercase kmer string.
    #[must_use]
    pub fn unhash(&self, hash: u32, use_t: bool) -> String {
        unhash(hash, self.k, use_t)
    }

    /// Expected per-position probability of the kmer `hash` under a
    /// first-order Markov model built from a monomer table (`k=1`) and a
    /// dimer table (`k=2`): `∏ dint / ∏ mono` over the overlapping internal
    /// positions (ground truth: `enrichments.c`'s `predict_kmer`).
    #[must_use]
    pub fn predict_freq(&self, hash: u32, mono: &Self, dint: &Self) -> f64 {
        let kmer = self.unhash(hash, true);
        let bytes = kmer.as_bytes();
        let k = bytes.len();

        let mono_total = mono.total() as f64;
        let dint_total = dint.total() as f64;

        let mut monoprob = 1.0;
        for i in 1..k.saturating_sub(1) {
            let key = std::str::from_utf8(&bytes[i..=i]).unwrap_or_default();
            if let Ok(value) = mono.read_by_key(key, NumericType::Double) {
                monoprob *= value.as_f64() / mono_total;
            }
        }

        let mut diprob = 1.0;
        for i in 0..k.saturating_sub(1) {
            let key = std::str::from_utf8(&bytes[i..=i + 1]).unwrap_or_default();
            if let Ok(value) = dint.read_by_key(key, NumericType::Double) {
                diprob *= value.as_f64() / dint_total;
            }
        }

        diprob / monoprob
    }

    /// `predict_freq · total`, rounded to the nearest count (spec §4.4).
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn predict_count(&self, hash: u32, mono: &Self, dint: &Self) -> u64 {
        (self.predict_freq(hash, mono, dint) * self.total() as f64).round() as u64
    }
}
