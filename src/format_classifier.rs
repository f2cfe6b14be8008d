//! Format sniffing: classify a freshly opened stream as fasta/fastq/raw.
//!
//! Ground truth: spec §4.2. The original C (`rKATS`) does this by opening
//! the file a second time in binary mode and scanning a handful of lines;
//! here we take an already-buffered prefix (the first ~10 lines) so the
//! caller doesn't need to reopen anything.

use std::io::BufRead;

/// The three record layouts this crate understands, plus an explicit
/// "couldn't tell" outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordFormat {
    Fasta,
    Fastq,
    Raw,
}

const NUCLEOTIDE_CHARS: &[u8] = b"ACGTUacgtu";

/// Classify a byte stream by inspecting up to the first 10 lines.
///
/// Mirrors spec §4.2's rule exactly:
/// - count lines at position `i % 4 == 0` starting with `@` where some
///   line at `i % 4 == 2` starts with `+` → fastq score;
/// - count lines starting with `>` or `;` → fasta score;
/// - count lines with ≥90% nucleotide characters → raw score.
///
/// Decision: `fastq >= 2` wins; else `fasta > 0` wins; else `raw == 10`
/// wins; else `None` (unsupported).
pub fn classify<R: BufRead>(reader: &mut R) -> Option<RecordFormat> {
    let mut lines = Vec::with_capacity(10);
    for _ in 0..10 {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                lines.push(line);
            }
            Err(_) => break,
        }
    }

    if lines.is_empty() {
        return None;
    }

    let mut fastq_score = 0usize;
    let mut fasta_score = 0usize;
    let mut raw_score = 0usize;

    for (i, line) in lines.iter().enumerate() {
        if i % 4 == 0 && line.starts_with('@') {
            if let Some(plus_line) = lines.get(i + 2) {
                if plus_line.starts_with('+') {
                    fastq_score += 1;
                }
            }
        }
        if line.starts_with('>') || line.starts_with(';') {
            fasta_score += 1;
        }
        if !line.is_empty() {
            let nt_count = line
                .bytes()
                .filter(|b| NUCLEOTIDE_CHARS.contains(b))
                .count();
            #[allow(clippy::cast_precision_loss)]
            let frac = nt_count as f64 / line.len() as f64;
            if frac >= 0.9 {
                raw_score += 1;
            }
        }
    }

    if fastq_score >= 2 {
        Some(RecordFormat::Fastq)
    } else if fasta_score > 0 {
        Some(RecordFormat::Fasta)
    } else if raw_score == 10 {
        Some(RecordFormat::Raw)
    } else {
        None
    }
}
