//! Gzip helpers for transparent body rewriting.

use std::io::{Read, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Fully decode a gzip-framed body, concatenating every member.
pub fn decode(input: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = MultiGzDecoder::new(input);
    let mut out = Vec::with_capacity(input.len() * 2);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Gzip-compress `input` with the default compression level.
pub fn encode(input: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(input.len()), Compression::default());
    encoder.write_all(input)?;
    encoder.finish()
}
