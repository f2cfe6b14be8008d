//! Fuzz target for format classification.
//!
//! Tests that `classify` never panics on arbitrary bytes, and that its
//! verdict (if any) is one of the three known record formats.

#![no_main]

use std::io::BufReader;

use katss::format_classifier::{classify, RecordFormat};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = BufReader::new(data);
    match classify(&mut reader) {
        Some(RecordFormat::Fasta | RecordFormat::Fastq | RecordFormat::Raw) | None => {}
    }
});
