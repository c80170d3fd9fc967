//! Compression methods, levels and the raw deflate codec
//!
//! Entries use raw DEFLATE streams (no zlib wrapper), provided by `flate2`.

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

/// Compression method of a ZIP entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression (stored)
    Stored,
    /// Raw DEFLATE
    Deflated,
    /// Any other method id found in an existing archive; entries using it can
    /// be listed but not read or rewritten
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_zip_method(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflated,
            other => CompressionMethod::Unknown(other),
        }
    }

    pub fn to_zip_method(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
            CompressionMethod::Unknown(other) => other,
        }
    }
}

/// Compression level used for entries written by an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionLevel {
    /// Entries are STORED
    NoCompression,
    BestSpeed,
    BetterSpeed,
    GoodSpeed,
    MediumBetterSpeed,
    Medium,
    MediumBetterCompression,
    GoodCompression,
    BetterCompression,
    BestCompression,
}

impl CompressionLevel {
    /// Level 6, the zlib default
    pub const DEFAULT: CompressionLevel = CompressionLevel::MediumBetterCompression;

    /// zlib-style numeric level (0-9)
    pub fn level(self) -> u32 {
        match self {
            CompressionLevel::NoCompression => 0,
            CompressionLevel::BestSpeed => 1,
            CompressionLevel::BetterSpeed => 2,
            CompressionLevel::GoodSpeed => 3,
            CompressionLevel::MediumBetterSpeed => 4,
            CompressionLevel::Medium => 5,
            CompressionLevel::MediumBetterCompression => 6,
            CompressionLevel::GoodCompression => 7,
            CompressionLevel::BetterCompression => 8,
            CompressionLevel::BestCompression => 9,
        }
    }

    /// Level for a numeric value, `None` above 9
    pub fn from_level(level: u32) -> Option<Self> {
        Some(match level {
            0 => CompressionLevel::NoCompression,
            1 => CompressionLevel::BestSpeed,
            2 => CompressionLevel::BetterSpeed,
            3 => CompressionLevel::GoodSpeed,
            4 => CompressionLevel::MediumBetterSpeed,
            5 => CompressionLevel::Medium,
            6 => CompressionLevel::MediumBetterCompression,
            7 => CompressionLevel::GoodCompression,
            8 => CompressionLevel::BetterCompression,
            9 => CompressionLevel::BestCompression,
            _ => return None,
        })
    }

    fn compression(self) -> Compression {
        Compression::new(self.level())
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Compress a whole buffer into a raw deflate stream
pub fn deflate(data: &[u8], level: CompressionLevel) -> io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), level.compression());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Streaming compressor writing a raw deflate stream into `writer`.
/// Call `finish()` on the result to flush the final block.
pub fn deflate_stream<W: Write>(writer: W, level: CompressionLevel) -> DeflateEncoder<W> {
    DeflateEncoder::new(writer, level.compression())
}

/// Streaming decompressor over a raw deflate stream
pub fn inflate_stream<R: Read>(reader: R) -> DeflateDecoder<R> {
    DeflateDecoder::new(reader)
}
