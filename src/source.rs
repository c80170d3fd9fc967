//! Where an entry's bytes come from
//!
//! Entries parsed from an archive only carry the location of their payload;
//! bytes are read (and inflated) when a reader is opened.

use crate::codec::{self, CompressionMethod};
use crate::error::{Result, ZipError};
use crate::reader::{le_u16, le_u32, LOCAL_FILE_HEADER_SIGNATURE, LOCAL_FILE_HEADER_SIZE};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Reader that reports end-of-stream after a fixed byte budget, whatever the
/// underlying stream still holds. Keeps entry readers from running into the
/// next local header or the central directory.
pub type BoundedReader<R> = io::Take<R>;

/// Origin of an entry's uncompressed content
#[derive(Debug, Clone)]
pub enum DataSource {
    /// Content fully held in memory
    InMemory(Vec<u8>),
    /// Content read fresh from a file on every access
    ExternalFile(PathBuf),
    /// Payload stored in an archive file on disk
    ArchiveOffset {
        archive: PathBuf,
        local_header_offset: u64,
        compressed_size: u64,
        method: CompressionMethod,
    },
}

impl DataSource {
    /// Open a reader yielding the uncompressed content.
    pub fn open(&self) -> Result<Box<dyn Read + '_>> {
        match self {
            DataSource::InMemory(bytes) => Ok(Box::new(Cursor::new(bytes.as_slice()))),
            DataSource::ExternalFile(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
            DataSource::ArchiveOffset {
                archive,
                local_header_offset,
                compressed_size,
                method,
            } => open_archived(archive, *local_header_offset, *compressed_size, *method),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self, DataSource::InMemory(_))
    }

    pub fn is_archive_backed(&self) -> bool {
        matches!(self, DataSource::ArchiveOffset { .. })
    }
}

fn open_archived(
    archive: &Path,
    local_header_offset: u64,
    compressed_size: u64,
    method: CompressionMethod,
) -> Result<Box<dyn Read + 'static>> {
    let file = BufReader::new(File::open(archive)?);
    let payload = seek_payload(file, local_header_offset)?;
    let bounded: BoundedReader<_> = payload.take(compressed_size);

    match method {
        CompressionMethod::Stored => Ok(Box::new(bounded)),
        CompressionMethod::Deflated => Ok(Box::new(codec::inflate_stream(bounded))),
        CompressionMethod::Unknown(id) => Err(ZipError::UnsupportedMethod(id)),
    }
}

/// Validate the local file header at `offset` and position `reader` on the
/// first payload byte.
pub(crate) fn seek_payload<R: Read + Seek>(mut reader: R, offset: u64) -> Result<R> {
    let truncated = ZipError::truncated_at(offset);

    reader.seek(SeekFrom::Start(offset))?;
    let mut header = [0u8; LOCAL_FILE_HEADER_SIZE as usize];
    reader.read_exact(&mut header).map_err(&truncated)?;

    let signature = le_u32(&header, 0);
    if signature != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(ZipError::malformed_at(
            format!("invalid local file header signature 0x{:08x}", signature),
            offset,
        ));
    }

    // Sizes and CRC here are ignored; the central directory is authoritative.
    // Skip name and extra field without seeking, keeping any read buffer.
    let skip = le_u16(&header, 26) as u64 + le_u16(&header, 28) as u64;
    if io::copy(&mut reader.by_ref().take(skip), &mut io::sink())? != skip {
        return Err(truncated(io::ErrorKind::UnexpectedEof.into()));
    }

    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn local_header(name: &str, method: u16, size: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&3u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b"xyz");
        out
    }

    #[test]
    fn bounded_reader_stops_at_budget() {
        let data = b"0123456789";
        let mut bounded: BoundedReader<_> = (&data[..]).take(4);
        let mut out = Vec::new();
        bounded.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"0123");

        let mut buf = [0u8; 8];
        assert_eq!(bounded.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn archived_stored_payload_is_bounded() {
        let mut bytes = vec![0xAA; 7];
        bytes.extend(local_header("a.txt", 0, 5));
        bytes.extend_from_slice(b"helloTRAILING-DATA");

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();

        let source = DataSource::ArchiveOffset {
            archive: file.path().to_path_buf(),
            local_header_offset: 7,
            compressed_size: 5,
            method: CompressionMethod::Stored,
        };
        let mut out = Vec::new();
        source.open().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn archived_deflated_payload_is_inflated() {
        let content = b"inflate me, inflate me, inflate me".to_vec();
        let compressed = codec::deflate(&content, Default::default()).unwrap();

        let mut bytes = local_header("d.txt", 8, compressed.len() as u32);
        bytes.extend_from_slice(&compressed);
        bytes.extend_from_slice(&[0x50, 0x4b, 0x01, 0x02]);

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();

        let source = DataSource::ArchiveOffset {
            archive: file.path().to_path_buf(),
            local_header_offset: 0,
            compressed_size: compressed.len() as u64,
            method: CompressionMethod::Deflated,
        };
        let mut out = Vec::new();
        source.open().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, content);
    }

    #[test]
    fn bad_local_signature_reports_offset() {
        let mut bytes = vec![0u8; 12];
        bytes.extend(local_header("a.txt", 0, 1));

        let err = seek_payload(Cursor::new(bytes), 3).err().unwrap();
        assert!(matches!(
            err,
            ZipError::MalformedArchive {
                offset: Some(3),
                ..
            }
        ));
    }

    #[test]
    fn header_cut_inside_name_is_malformed() {
        let mut bytes = local_header("long-name.txt", 0, 0);
        bytes.truncate(LOCAL_FILE_HEADER_SIZE as usize + 4);

        let err = seek_payload(Cursor::new(bytes), 0).err().unwrap();
        assert!(matches!(
            err,
            ZipError::MalformedArchive {
                offset: Some(0),
                ..
            }
        ));
    }

    #[test]
    fn buffered_reader_lands_on_payload() {
        let mut bytes = local_header("a.txt", 0, 5);
        bytes.extend_from_slice(b"hello");

        let mut reader = seek_payload(BufReader::new(Cursor::new(bytes)), 0).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn unknown_method_is_unsupported() {
        let mut file = NamedTempFile::new().unwrap();
        let mut bytes = local_header("z.bin", 93, 1);
        bytes.push(0);
        file.write_all(&bytes).unwrap();

        let source = DataSource::ArchiveOffset {
            archive: file.path().to_path_buf(),
            local_header_offset: 0,
            compressed_size: 1,
            method: CompressionMethod::Unknown(93),
        };
        assert!(matches!(
            source.open().err().unwrap(),
            ZipError::UnsupportedMethod(93)
        ));
    }

    #[test]
    fn external_file_is_read_fresh() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"first").unwrap();
        let source = DataSource::ExternalFile(file.path().to_path_buf());

        let mut out = String::new();
        source.open().unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "first");

        file.write_all(b" second").unwrap();
        out.clear();
        source.open().unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "first second");
    }
}
