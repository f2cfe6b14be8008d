//! Canonical k-mer hashing and the per-format rolling hasher.
//!
//! Ground truth: spec §3 (hash model) and §4.3 (`RollingHasher`), ported
//! from `examples/original_source/.../hash_functions.c` (`fbh_r`, `fbh_a`,
//! `fbh_q`, `frh`, and the 256-entry character class table).

use crate::error::KatssError;
use crate::format_classifier::RecordFormat;

/// Character classes used by the base-hash state machines:
/// nucleotide → 0..=3, NUL → 4, `>` → 5, `@` → 6, `+` → 7, `\n` → 8, other → 9.
const CLASS_NUCLEOTIDE_MAX: u8 = 3;
const CLASS_NUL: u8 = 4;
const CLASS_HEADER_FASTA: u8 = 5;
const CLASS_HEADER_FASTQ: u8 = 6;
const CLASS_PLUS: u8 = 7;
const CLASS_NEWLINE: u8 = 8;
const CLASS_OTHER: u8 = 9;

const fn build_char_class() -> [u8; 256] {
    let mut table = [CLASS_OTHER; 256];
    table[b'A' as usize] = 0;
    table[b'a' as usize] = 0;
    table[b'C' as usize] = 1;
    table[b'c' as usize] = 1;
    table[b'G' as usize] = 2;
    table[b'g' as usize] = 2;
    table[b'T' as usize] = 3;
    table[b't' as usize] = 3;
    table[b'U' as usize] = 3;
    table[b'u' as usize] = 3;
    table[0] = CLASS_NUL;
    table[b'>' as usize] = CLASS_HEADER_FASTA;
    table[b'@' as usize] = CLASS_HEADER_FASTQ;
    table[b'+' as usize] = CLASS_PLUS;
    table[b'\n' as usize] = CLASS_NEWLINE;
    table
}

const CHAR_CLASS: [u8; 256] = build_char_class();

/// `A=0, C=1, G=2, T=U=3`; any other byte is not a nucleotide.
#[must_use]
pub const fn base_code(b: u8) -> Option<u8> {
    let class = CHAR_CLASS[b as usize];
    if class <= CLASS_NUCLEOTIDE_MAX {
        Some(class)
    } else {
        None
    }
}

/// Canonical hash of a well-formed kmer string (uppercase/lowercase A/C/G/T/U).
///
/// Returns `None` on any non-nucleotide byte.
#[must_use]
pub fn hash_kmer(kmer: &[u8]) -> Option<u32> {
    let mut hash: u32 = 0;
    for &b in kmer {
        hash = hash * 4 + u32::from(base_code(b)?);
    }
    Some(hash)
}

/// Invert a canonical hash back into an uppercase kmer string.
///
/// `use_t` selects `T` (true) or `U` (false) for base value 3.
#[must_use]
pub fn unhash(hash: u32, k: usize, use_t: bool) -> String {
    let mut bytes = vec![0u8; k];
    let mut h = hash;
    for i in (0..k).rev() {
        bytes[i] = match h % 4 {
            0 => b'A',
            1 => b'C',
            2 => b'G',
            _ => {
                if use_t {
                    b'T'
                } else {
                    b'U'
                }
            }
        };
        h /= 4;
    }
    // SAFETY-free: bytes are always drawn from the ASCII set above.
    String::from_utf8(bytes).unwrap_or_default()
}

/// What the hasher was doing when its previous buffer ran out, so the next
/// `set_seq` call resumes correctly instead of re-scanning (spec §3/§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    /// Nothing to resume; either fresh or mid-sequence (buffer boundaries
    /// inside a record never require a skip, since `SeqStream` always trims
    /// to record boundaries).
    None,
    /// We'd seen a header sigil (`>`/`@`) but the buffer ended before its
    /// terminating newline. Skip to (and past) the next newline.
    MidHeader,
    /// We'd seen a fastq `+` but the buffer ended before the quality line's
    /// terminating newline. Skip past the remainder of the `+` line, then
    /// past the whole quality line.
    MidQuality,
}

/// Incremental, per-format rolling hasher (spec §4.3).
#[derive(Debug, Clone)]
pub struct Hasher {
    k: usize,
    mask: u32,
    format: RecordFormat,
    has_previous: bool,
    previous_hash: u32,
    end_of_seq: bool,
    pending: Pending,
    /// Accumulated hash of an as-yet-incomplete window, and how many bases
    /// have been folded into it so far (`0..k`). Persists across `set_seq`
    /// calls so a window spanning a chunk boundary resumes instead of
    /// restarting, mirroring `pos`/`previous_hash` in the C original's
    /// `fbh_*` state machines.
    partial_hash: u32,
    partial_filled: usize,
}

impl Hasher {
    /// # Errors
    /// Returns [`KatssError::BadArgs`] if `k` is not in `1..=16`.
    pub fn new(k: usize, format: RecordFormat) -> Result<Self, KatssError> {
        if k == 0 || k > 16 {
            return Err(KatssError::bad_args(format!(
                "k-mer length must be in 1..=16, got {k}"
            )));
        }
        let mask = if k == 16 {
            u32::MAX
        } else {
            (1u32 << (2 * k)) - 1
        };
        Ok(Self {
            k,
            mask,
            format,
            has_previous: false,
            previous_hash: 0,
            end_of_seq: false,
            pending: Pending::None,
            partial_hash: 0,
            partial_filled: 0,
        })
    }

    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub const fn eos(&self) -> bool {
        self.end_of_seq
    }

    /// Clear all rolling-window state, so the next `set_seq` call starts a
    /// fresh window instead of resuming across what the caller knows is a
    /// record boundary. Used by callers that feed one whole record per
    /// `set_seq` call (e.g. [`crate::counter`]'s sampled/shuffled paths)
    /// rather than arbitrary stream chunks.
    pub fn reset(&mut self) {
        self.has_previous = false;
        self.previous_hash = 0;
        self.end_of_seq = false;
        self.pending = Pending::None;
        self.partial_hash = 0;
        self.partial_filled = 0;
    }

    /// Attach a new buffer chunk, consuming any deferred skip from the
    /// previous chunk's resume point (spec's `endno` handling).
    pub fn set_seq<'h, 'b>(&'h mut self, buf: &'b [u8]) -> HashCursor<'h, 'b> {
        let start = match self.pending {
            Pending::None => 0,
            Pending::MidHeader => skip_past_newline(buf, 0),
            Pending::MidQuality => {
                let after_plus_line = skip_past_newline(buf, 0);
                skip_past_newline(buf, after_plus_line)
            }
        };
        self.pending = Pending::None;
        self.end_of_seq = false;
        HashCursor {
            hasher: self,
            buf,
            pos: start,
        }
    }
}

/// Advance past the next `\n` starting at `pos`; if none remains, return
/// `buf.len()` (fully consumed).
fn skip_past_newline(buf: &[u8], pos: usize) -> usize {
    match buf[pos..].iter().position(|&b| b == b'\n') {
        Some(offset) => pos + offset + 1,
        None => buf.len(),
    }
}

/// Iterator over the hashes obtainable from one buffer chunk, borrowing both
/// the hasher's rolling state and the buffer.
pub struct HashCursor<'h, 'b> {
    hasher: &'h mut Hasher,
    buf: &'b [u8],
    pos: usize,
}

impl HashCursor<'_, '_> {
    /// Scan forward accumulating a fresh k-length window, skipping headers
    /// and fastq quality blocks per the hasher's format. Returns the new
    /// hash and advances `self.pos`, or `None` if the buffer ran out first
    /// (recording the resume state on the hasher).
    fn base_hash(&mut self) -> Option<u32> {
        let k = self.hasher.k;
        let mut hash: u32 = self.hasher.partial_hash;
        let mut filled = self.hasher.partial_filled;

        loop {
            if self.pos >= self.buf.len() {
                self.hasher.end_of_seq = true;
                self.hasher.has_previous = false;
                self.hasher.partial_hash = hash;
                self.hasher.partial_filled = filled;
                return None;
            }
            let b = self.buf[self.pos];
            let class = CHAR_CLASS[b as usize];
            match class {
                0..=CLASS_NUCLEOTIDE_MAX => {
                    hash = hash * 4 + u32::from(class);
                    filled += 1;
                    self.pos += 1;
                    if filled == k {
                        self.hasher.has_previous = true;
                        self.hasher.previous_hash = hash;
                        self.hasher.partial_hash = 0;
                        self.hasher.partial_filled = 0;
                        return Some(hash);
                    }
                }
                CLASS_NEWLINE if self.hasher.format != RecordFormat::Raw => {
                    self.pos += 1; // embedded newline in multi-line fasta/fastq: skip, don't reset
                }
                CLASS_HEADER_FASTA if self.hasher.format == RecordFormat::Fasta => {
                    hash = 0;
                    filled = 0;
                    match self.buf[self.pos..].iter().position(|&c| c == b'\n') {
                        Some(offset) => self.pos += offset + 1,
                        None => {
                            self.hasher.pending = Pending::MidHeader;
                            self.hasher.end_of_seq = true;
                            self.hasher.has_previous = false;
                            self.hasher.partial_hash = 0;
                            self.hasher.partial_filled = 0;
                            return None;
                        }
                    }
                }
                CLASS_HEADER_FASTQ if self.hasher.format == RecordFormat::Fastq => {
                    hash = 0;
                    filled = 0;
                    match self.buf[self.pos..].iter().position(|&c| c == b'\n') {
                        Some(offset) => self.pos += offset + 1,
                        None => {
                            self.hasher.pending = Pending::MidHeader;
                            self.hasher.end_of_seq = true;
                            self.hasher.has_previous = false;
                            self.hasher.partial_hash = 0;
                            self.hasher.partial_filled = 0;
                            return None;
                        }
                    }
                }
                CLASS_PLUS if self.hasher.format == RecordFormat::Fastq => {
                    hash = 0;
                    filled = 0;
                    let after_plus = self.buf[self.pos..]
                        .iter()
                        .position(|&c| c == b'\n')
                        .map(|o| self.pos + o + 1);
                    let Some(after_plus) = after_plus else {
                        self.hasher.pending = Pending::MidQuality;
                        self.hasher.end_of_seq = true;
                        self.hasher.has_previous = false;
                        self.hasher.partial_hash = 0;
                        self.hasher.partial_filled = 0;
                        return None;
                    };
                    match self.buf[after_plus..].iter().position(|&c| c == b'\n') {
                        Some(offset) => self.pos = after_plus + offset + 1,
                        None => {
                            self.hasher.pending = Pending::MidHeader; // quality line itself got cut
                            self.hasher.end_of_seq = true;
                            self.hasher.has_previous = false;
                            self.hasher.partial_hash = 0;
                            self.hasher.partial_filled = 0;
                            return None;
                        }
                    }
                }
                _ => {
                    // unknown/non-nucleotide byte (e.g. 'X' knockout sentinel, 'N'): restart window
                    hash = 0;
                    filled = 0;
                    self.pos += 1;
                }
            }
        }
    }
}

impl Iterator for HashCursor<'_, '_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if !self.hasher.has_previous {
            return self.base_hash();
        }

        loop {
            if self.pos >= self.buf.len() {
                self.hasher.end_of_seq = true;
                self.hasher.has_previous = false;
                return None;
            }
            let b = self.buf[self.pos];
            if self.hasher.format != RecordFormat::Raw && b == b'\n' {
                self.pos += 1;
                continue;
            }
            let class = CHAR_CLASS[b as usize];
            return if class <= CLASS_NUCLEOTIDE_MAX {
                let hash = ((self.hasher.previous_hash << 2) | u32::from(class)) & self.hasher.mask;
                self.pos += 1;
                self.hasher.previous_hash = hash;
                Some(hash)
            } else if class == CLASS_NUL {
                self.hasher.end_of_seq = true;
                self.hasher.has_previous = false;
                None
            } else {
                self.hasher.has_previous = false;
                self.base_hash()
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_unhash_roundtrip() {
        assert_eq!(hash_kmer(b"ACGT"), Some(0 * 64 + 1 * 16 + 2 * 4 + 3));
        assert_eq!(unhash(27, 4, true), "ACGT");
        assert_eq!(hash_kmer(b"ACGT").map(|h| unhash(h, 4, true)), Some("ACGT".to_string()));
    }

    #[test]
    fn unhash_use_u() {
        assert_eq!(unhash(3, 1, false), "U");
        assert_eq!(unhash(3, 1, true), "T");
    }

    #[test]
    fn raw_k2_counts_windows() {
        let mut hasher = Hasher::new(2, RecordFormat::Raw).unwrap();
        let hashes: Vec<u32> = hasher.set_seq(b"AACGGTT").collect();
        let kmers: Vec<String> = hashes.iter().map(|&h| unhash(h, 2, true)).collect();
        assert_eq!(kmers, vec!["AA", "AC", "CG", "GG", "GT", "TT"]);
    }

    #[test]
    fn raw_newline_resets_window_between_lines() {
        // two independent raw records; a window must not bridge the line break
        let mut hasher = Hasher::new(2, RecordFormat::Raw).unwrap();
        let hashes: Vec<u32> = hasher.set_seq(b"AACG\nGGTT\n").collect();
        let kmers: Vec<String> = hashes.iter().map(|&h| unhash(h, 2, true)).collect();
        assert_eq!(kmers, vec!["AA", "AC", "CG", "GG", "GT", "TT"]);
    }

    #[test]
    fn fasta_multiline_ignores_embedded_newlines() {
        let mut hasher = Hasher::new(3, RecordFormat::Fasta).unwrap();
        let hashes: Vec<u32> = hasher.set_seq(b">r1\nAAAA\nAAAC\n>r2\nGGGG\n").collect();
        let kmers: Vec<String> = hashes.iter().map(|&h| unhash(h, 3, true)).collect();
        // sequence r1 = AAAAAAAC (newline ignored) -> 5x AAA, 1x AAC; r2 = GGGG -> 2x GGG
        assert_eq!(kmers.iter().filter(|k| *k == "AAA").count(), 5);
        assert_eq!(kmers.iter().filter(|k| *k == "AAC").count(), 1);
        assert_eq!(kmers.iter().filter(|k| *k == "GGG").count(), 2);
        assert_eq!(kmers.len(), 8);
    }

    #[test]
    fn window_resumes_across_a_chunk_boundary() {
        // "AACGGTT" split so the "GGT" window straddles two set_seq calls
        let mut hasher = Hasher::new(3, RecordFormat::Raw).unwrap();
        let mut hashes: Vec<u32> = hasher.set_seq(b"AACG").collect();
        hashes.extend(hasher.set_seq(b"GTT"));
        let kmers: Vec<String> = hashes.iter().map(|&h| unhash(h, 3, true)).collect();
        assert_eq!(kmers, vec!["AAC", "ACG", "CGG", "GGT", "GTT"]);
    }

    #[test]
    fn window_resumes_even_when_the_split_lands_mid_window_with_nothing_complete_yet() {
        // chunk boundary falls after only 1 of 4 bases of the first window
        let mut hasher = Hasher::new(4, RecordFormat::Raw).unwrap();
        let mut hashes: Vec<u32> = hasher.set_seq(b"A").collect();
        assert!(hashes.is_empty());
        hashes.extend(hasher.set_seq(b"CGTACGT"));
        let kmers: Vec<String> = hashes.iter().map(|&h| unhash(h, 4, true)).collect();
        assert_eq!(kmers, vec!["ACGT", "CGTA", "GTAC", "TACG", "ACGT"]);
    }

    #[test]
    fn fastq_sigils_in_quality_do_not_break_hashing() {
        let mut hasher = Hasher::new(2, RecordFormat::Fastq).unwrap();
        let data = b"@r1\nACGT\n+\n@+II\n@r2\nGGTT\n+\nII@+\n";
        let hashes: Vec<u32> = hasher.set_seq(data).collect();
        let kmers: Vec<String> = hashes.iter().map(|&h| unhash(h, 2, true)).collect();
        assert_eq!(kmers, vec!["AC", "CG", "GT", "GG", "GT", "TT"]);
    }
}
