//! A single file or directory record of an archive

use crate::codec::CompressionMethod;
use crate::crc::CrcReader;
use crate::error::{Result, ZipError};
use crate::path;
use crate::source::DataSource;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Entry in a ZIP archive
///
/// Entries parsed from an archive hold only metadata plus the location of
/// their payload; bytes are read on demand. For entries added in memory the
/// CRC-32 is known immediately, for entries added from a file it reads as `0`
/// until the archive is written.
#[derive(Debug, Clone)]
pub struct Entry {
    pub(crate) name: String,
    pub(crate) method: CompressionMethod,
    pub(crate) compressed_size: u64,
    pub(crate) uncompressed_size: u64,
    pub(crate) crc32: u32,
    pub(crate) local_header_offset: u64,
    pub(crate) source: DataSource,
    pub(crate) is_directory: bool,
}

impl Entry {
    /// Name as stored in the archive; directories end with `/`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Relative path of the entry, without trailing separator
    pub fn path(&self) -> PathBuf {
        path::from_entry_name(&self.name).0
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn method(&self) -> CompressionMethod {
        self.method
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Offset of the local file header in the archive the entry was read from
    pub fn local_header_offset(&self) -> u64 {
        self.local_header_offset
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// Streaming reader over the uncompressed content.
    ///
    /// The stream is not checksummed; use [`read_to_bytes`](Self::read_to_bytes)
    /// or [`read_to_path`](Self::read_to_path) for verified reads.
    pub fn reader(&self) -> Result<Box<dyn Read + '_>> {
        self.source.open()
    }

    /// Read the whole uncompressed content into memory
    pub fn read_to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.uncompressed_size.min(1 << 20) as usize);
        self.copy_verified(&mut out)?;
        Ok(out)
    }

    /// Read the content as UTF-8 text
    pub fn read_to_string(&self) -> Result<String> {
        String::from_utf8(self.read_to_bytes()?)
            .map_err(|e| ZipError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Stream the content into a file at `path`, creating or truncating it
    pub fn read_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.copy_verified(&mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Copy the content into `out`, checking the CRC-32 recorded in the
    /// central directory for archive-backed entries.
    fn copy_verified<W: Write>(&self, out: &mut W) -> Result<u64> {
        let mut reader = CrcReader::new(self.source.open()?);
        let copied = io::copy(&mut reader, out)?;

        if self.source.is_archive_backed() && reader.crc() != self.crc32 {
            return Err(ZipError::ChecksumMismatch {
                name: self.name.clone(),
                expected: self.crc32,
                actual: reader.crc(),
            });
        }
        Ok(copied)
    }
}
