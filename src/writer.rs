//! Two-pass ZIP writer
//!
//! Each entry is measured (CRC-32 and uncompressed size) before its local
//! header is emitted, so every header carries final values and no data
//! descriptors are needed:
//!
//! - in-memory content is checksummed and, if deflated, compressed in one go
//! - streamed content (external files, entries of an existing archive) is read
//!   once for the checksum and again for the payload; deflated payloads are
//!   spooled to an anonymous scratch file first to learn their compressed size
//!
//! [`commit`] drives the writer against a temporary sibling of the target and
//! renames it into place only once everything has been written.

use crate::codec::{self, CompressionLevel, CompressionMethod};
use crate::crc::{Crc32, CrcReader};
use crate::entry::Entry;
use crate::error::{Result, ZipError};
use crate::reader::{
    CENTRAL_DIRECTORY_SIGNATURE, END_OF_CENTRAL_DIRECTORY_SIGNATURE, LOCAL_FILE_HEADER_SIGNATURE,
};
use crate::source::DataSource;
use std::fs;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Version needed to extract (2.0: deflate, directories)
const VERSION: u16 = 20;

/// Entry info kept for the central directory
struct CentralRecord {
    name: String,
    method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    local_header_offset: u32,
}

/// Serializes entries into `W`, then the central directory and end record
pub struct ArchiveWriter<W: Write + Seek> {
    output: W,
    records: Vec<CentralRecord>,
    level: CompressionLevel,
    scratch_dir: PathBuf,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Create a writer; scratch files go to the system temp directory
    pub fn new(output: W, level: CompressionLevel) -> Self {
        Self {
            output,
            records: Vec::new(),
            level,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Directory for the scratch files used to spool deflated streams
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Write one entry: local header followed by its payload.
    ///
    /// The entry's method decides the encoding. For entries backed by an
    /// archive the recomputed CRC-32 must match the recorded one.
    pub fn write_entry(&mut self, entry: &Entry) -> Result<()> {
        let local_header_offset = self.output.stream_position()?;
        if entry.is_directory() {
            return self.write_directory(entry, local_header_offset);
        }
        let source = entry.source();

        // Pass 1: checksum and size
        let (crc32, uncompressed_size) = match source {
            DataSource::InMemory(bytes) => (Crc32::checksum(bytes), bytes.len() as u64),
            _ => measure(source)?,
        };

        if source.is_archive_backed() && crc32 != entry.crc32() {
            return Err(ZipError::ChecksumMismatch {
                name: entry.name().to_string(),
                expected: entry.crc32(),
                actual: crc32,
            });
        }

        // Pass 2: header and payload
        let method = entry.method();
        let compressed_size = match (method, source) {
            (CompressionMethod::Stored, _) => {
                self.write_local_header(
                    entry.name(),
                    method,
                    crc32,
                    uncompressed_size,
                    uncompressed_size,
                )?;
                let copied = io::copy(&mut source.open()?, &mut self.output)?;
                if copied != uncompressed_size {
                    return Err(source_changed(entry.name()));
                }
                uncompressed_size
            }
            (CompressionMethod::Deflated, DataSource::InMemory(bytes)) => {
                let compressed = codec::deflate(bytes, self.level)?;
                self.write_local_header(
                    entry.name(),
                    method,
                    crc32,
                    compressed.len() as u64,
                    uncompressed_size,
                )?;
                self.output.write_all(&compressed)?;
                compressed.len() as u64
            }
            (CompressionMethod::Deflated, _) => {
                self.write_spooled(entry, crc32, uncompressed_size)?
            }
            (CompressionMethod::Unknown(id), _) => return Err(ZipError::UnsupportedMethod(id)),
        };

        log::trace!(
            "wrote {} at {}: {} -> {} bytes, method {}",
            entry.name(),
            local_header_offset,
            uncompressed_size,
            compressed_size,
            method.to_zip_method()
        );

        self.records.push(CentralRecord {
            name: entry.name().to_string(),
            method: method.to_zip_method(),
            crc32,
            compressed_size: fits_u32(compressed_size, "compressed size")?,
            uncompressed_size: fits_u32(uncompressed_size, "uncompressed size")?,
            local_header_offset: fits_u32(local_header_offset, "local header offset")?,
        });

        Ok(())
    }

    /// Directories are always STORED and empty, whatever the source archive
    /// recorded for them.
    fn write_directory(&mut self, entry: &Entry, local_header_offset: u64) -> Result<()> {
        self.write_local_header(entry.name(), CompressionMethod::Stored, 0, 0, 0)?;
        log::trace!("wrote directory {} at {}", entry.name(), local_header_offset);

        self.records.push(CentralRecord {
            name: entry.name().to_string(),
            method: CompressionMethod::Stored.to_zip_method(),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            local_header_offset: fits_u32(local_header_offset, "local header offset")?,
        });
        Ok(())
    }

    /// Deflate a streamed source into a scratch file, then copy it after the
    /// header. The scratch file is anonymous and vanishes when dropped.
    fn write_spooled(&mut self, entry: &Entry, crc32: u32, uncompressed_size: u64) -> Result<u64> {
        let mut scratch = tempfile::tempfile_in(&self.scratch_dir)?;

        {
            let mut encoder = codec::deflate_stream(BufWriter::new(&mut scratch), self.level);
            let consumed = io::copy(&mut entry.source().open()?, &mut encoder)?;
            if consumed != uncompressed_size {
                return Err(source_changed(entry.name()));
            }
            encoder.finish()?.flush()?;
        }

        let compressed_size = scratch.metadata()?.len();
        scratch.seek(SeekFrom::Start(0))?;

        self.write_local_header(
            entry.name(),
            CompressionMethod::Deflated,
            crc32,
            compressed_size,
            uncompressed_size,
        )?;
        let copied = io::copy(&mut (&mut scratch).take(compressed_size), &mut self.output)?;
        if copied != compressed_size {
            return Err(ZipError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "scratch file shrank while copying",
            )));
        }

        Ok(compressed_size)
    }

    fn write_local_header(
        &mut self,
        name: &str,
        method: CompressionMethod,
        crc32: u32,
        compressed_size: u64,
        uncompressed_size: u64,
    ) -> Result<()> {
        let name_len = name_length(name)?;
        let compressed_size = fits_u32(compressed_size, "compressed size")?;
        let uncompressed_size = fits_u32(uncompressed_size, "uncompressed size")?;

        self.output
            .write_all(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes())?;
        self.output.write_all(&VERSION.to_le_bytes())?; // version needed
        self.output.write_all(&0u16.to_le_bytes())?; // general purpose bit flag
        self.output
            .write_all(&method.to_zip_method().to_le_bytes())?;
        self.output.write_all(&[0, 0, 0, 0])?; // mod time/date
        self.output.write_all(&crc32.to_le_bytes())?;
        self.output.write_all(&compressed_size.to_le_bytes())?;
        self.output.write_all(&uncompressed_size.to_le_bytes())?;
        self.output.write_all(&name_len.to_le_bytes())?;
        self.output.write_all(&0u16.to_le_bytes())?; // extra len
        self.output.write_all(name.as_bytes())?;
        Ok(())
    }

    /// Write the central directory and end record, returning the output
    pub fn finish(mut self) -> Result<W> {
        let central_dir_offset = self.output.stream_position()?;

        for record in &self.records {
            write_central_record(&mut self.output, record)?;
        }

        let central_dir_size = self.output.stream_position()? - central_dir_offset;
        let entry_count = fits_u16(self.records.len() as u64, "entry count")?;

        self.output
            .write_all(&END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes())?;
        self.output.write_all(&0u16.to_le_bytes())?; // disk number
        self.output.write_all(&0u16.to_le_bytes())?; // disk with central dir
        self.output.write_all(&entry_count.to_le_bytes())?; // entries on this disk
        self.output.write_all(&entry_count.to_le_bytes())?; // total entries
        self.output
            .write_all(&fits_u32(central_dir_size, "central directory size")?.to_le_bytes())?;
        self.output
            .write_all(&fits_u32(central_dir_offset, "central directory offset")?.to_le_bytes())?;
        self.output.write_all(&0u16.to_le_bytes())?; // comment len

        self.output.flush()?;
        Ok(self.output)
    }
}

fn write_central_record<W: Write>(output: &mut W, record: &CentralRecord) -> Result<()> {
    let name_len = name_length(&record.name)?;

    output.write_all(&CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes())?;
    output.write_all(&VERSION.to_le_bytes())?; // version made by
    output.write_all(&VERSION.to_le_bytes())?; // version needed
    output.write_all(&0u16.to_le_bytes())?; // general purpose bit flag
    output.write_all(&record.method.to_le_bytes())?;
    output.write_all(&[0, 0, 0, 0])?; // mod time/date
    output.write_all(&record.crc32.to_le_bytes())?;
    output.write_all(&record.compressed_size.to_le_bytes())?;
    output.write_all(&record.uncompressed_size.to_le_bytes())?;
    output.write_all(&name_len.to_le_bytes())?;
    output.write_all(&0u16.to_le_bytes())?; // extra len
    output.write_all(&0u16.to_le_bytes())?; // file comment len
    output.write_all(&0u16.to_le_bytes())?; // disk number start
    output.write_all(&0u16.to_le_bytes())?; // internal attrs
    output.write_all(&0u32.to_le_bytes())?; // external attrs
    output.write_all(&record.local_header_offset.to_le_bytes())?;
    output.write_all(record.name.as_bytes())?;
    Ok(())
}

/// Stream a source once, returning its CRC-32 and length
fn measure(source: &DataSource) -> Result<(u32, u64)> {
    let mut reader = CrcReader::new(source.open()?);
    io::copy(&mut reader, &mut io::sink())?;
    Ok((reader.crc(), reader.count()))
}

fn source_changed(name: &str) -> ZipError {
    ZipError::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("content of {} changed while it was being written", name),
    ))
}

// All-ones values are reserved as ZIP64 markers, so they are rejected too.
fn fits_u32(value: u64, what: &str) -> Result<u32> {
    if value < u32::MAX as u64 {
        Ok(value as u32)
    } else {
        Err(ZipError::TooLarge(format!("{} {} needs ZIP64", what, value)))
    }
}

fn name_length(name: &str) -> Result<u16> {
    u16::try_from(name.len())
        .map_err(|_| ZipError::TooLarge(format!("entry name of {} bytes", name.len())))
}

fn fits_u16(value: u64, what: &str) -> Result<u16> {
    if value < u16::MAX as u64 {
        Ok(value as u16)
    } else {
        Err(ZipError::TooLarge(format!("{} {} needs ZIP64", what, value)))
    }
}

/// Write `entries` as a complete archive at `path`.
///
/// Output goes to a temporary file next to `path`, which replaces `path` by
/// rename only after it was fully written and synced. On failure the
/// temporary file is removed and `path` is left untouched, so entries may
/// safely be read from the very archive being replaced.
pub(crate) fn commit<'a, I>(path: &Path, level: CompressionLevel, entries: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = match path.file_name() {
        Some(name) => format!(".{}.", name.to_string_lossy()),
        None => ".rezip.".to_string(),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(".tmp");
    // Same mode a plain create would give (0o666 minus the umask)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let temp = builder.tempfile_in(&dir)?;

    let mut written = 0usize;
    {
        let mut writer =
            ArchiveWriter::new(BufWriter::new(temp.as_file()), level).with_scratch_dir(&dir);
        for entry in entries {
            writer.write_entry(entry)?;
            written += 1;
        }
        writer
            .finish()?
            .into_inner()
            .map_err(|e| ZipError::Io(e.into_error()))?;
    }
    if let Ok(existing) = fs::metadata(path) {
        temp.as_file().set_permissions(existing.permissions())?;
    }
    temp.as_file().sync_all()?;

    temp.persist(path).map_err(|e| ZipError::Io(e.error))?;
    log::debug!("{}: committed {} entries", path.display(), written);
    Ok(())
}
