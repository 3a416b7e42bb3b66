//! Pluggable payload compression.
//!
//! Compression is a pure, reversible transform applied transparently by the
//! record store. A failing compressor is never fatal: the store falls back
//! to the uncompressed bytes and keeps going.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

/// A reversible byte-level compression strategy.
pub trait Compressor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Compresses the input.
    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Reverses `compress`.
    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>>;
}

/// Zlib/deflate compression, the default strategy.
pub struct DeflateCompressor {
    level: Compression,
}

impl DeflateCompressor {
    /// Creates a compressor at the default level.
    #[must_use]
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }

    /// Creates a compressor at an explicit level (0-9).
    #[must_use]
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl Default for DeflateCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for DeflateCompressor {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        ZlibDecoder::new(data).read_to_end(&mut out)?;
        Ok(out)
    }
}

/// Identity transform, for kinds whose payloads are already compressed
/// (photos, PDFs) or for tests.
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}
