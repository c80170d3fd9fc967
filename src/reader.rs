//! Central directory reader - locates the end record and parses the entry table
//!
//! Only metadata is read here. Every parsed entry points back into the archive
//! through [`DataSource::ArchiveOffset`], so payloads are never loaded while
//! opening an archive, however large it is.

use crate::codec::CompressionMethod;
use crate::entry::Entry;
use crate::error::{Result, ZipError};
use crate::source::DataSource;
use indexmap::IndexMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// ZIP local file header signature
pub(crate) const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;

/// ZIP central directory signature
pub(crate) const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;

/// ZIP end of central directory signature
pub(crate) const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;

pub(crate) const LOCAL_FILE_HEADER_SIZE: u64 = 30;
pub(crate) const CENTRAL_DIRECTORY_RECORD_SIZE: u64 = 46;
pub(crate) const END_OF_CENTRAL_DIRECTORY_SIZE: u64 = 22;

/// Largest archive comment the format allows
const MAX_COMMENT_SIZE: u64 = 65535;

/// Fields of the end of central directory record this crate uses.
/// Disk numbers are ignored: only single-disk archives are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    /// Where the record starts in the file
    pub offset: u64,
    pub entry_count: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
}

/// Read the whole entry table of the archive at `path`.
///
/// Entries keep central directory order. Should an archive list the same
/// name twice, the later record replaces the earlier one in place.
pub fn read_entries(path: &Path) -> Result<IndexMap<String, Entry>> {
    let mut file = BufReader::new(File::open(path)?);

    let eocd_offset = locate_eocd(&mut file)?;
    let eocd = read_eocd(&mut file, eocd_offset)?;
    log::debug!(
        "{}: end of central directory at {}, {} entries, directory at {}",
        path.display(),
        eocd.offset,
        eocd.entry_count,
        eocd.central_directory_offset
    );

    let entries = read_central_directory(&mut file, &eocd, path)?;
    let mut table = IndexMap::with_capacity(entries.len());
    for entry in entries {
        if let Some(previous) = table.insert(entry.name.clone(), entry) {
            log::debug!("{}: duplicate entry {}", path.display(), previous.name);
        }
    }
    Ok(table)
}

/// Find the end of central directory record by scanning backward through
/// the last `65535 + 22` bytes of the file.
///
/// The first signature found from the tail wins. An archive comment that
/// itself contains the signature bytes can therefore be mistaken for the
/// record; no attempt is made to disambiguate.
pub fn locate_eocd<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    if file_size < END_OF_CENTRAL_DIRECTORY_SIZE {
        return Err(ZipError::malformed(format!(
            "file is too small to be a ZIP archive ({} bytes)",
            file_size
        )));
    }

    let window = file_size.min(MAX_COMMENT_SIZE + END_OF_CENTRAL_DIRECTORY_SIZE);
    let search_start = file_size - window;
    reader.seek(SeekFrom::Start(search_start))?;

    let mut buffer = vec![0u8; window as usize];
    reader.read_exact(&mut buffer)?;

    // A match must leave room for the fixed part of the record
    let signature = END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes();
    let last = buffer.len() - END_OF_CENTRAL_DIRECTORY_SIZE as usize;
    (0..=last)
        .rev()
        .find(|&i| buffer[i..i + 4] == signature)
        .map(|i| search_start + i as u64)
        .ok_or_else(|| ZipError::malformed("end of central directory record not found"))
}

/// Parse the end of central directory record at `offset`
pub fn read_eocd<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<EndOfCentralDirectory> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut record = [0u8; END_OF_CENTRAL_DIRECTORY_SIZE as usize];
    reader
        .read_exact(&mut record)
        .map_err(ZipError::truncated_at(offset))?;

    let signature = le_u32(&record, 0);
    if signature != END_OF_CENTRAL_DIRECTORY_SIGNATURE {
        return Err(ZipError::malformed_at(
            format!("invalid end of central directory signature 0x{:08x}", signature),
            offset,
        ));
    }

    let eocd = EndOfCentralDirectory {
        offset,
        entry_count: le_u16(&record, 10),
        central_directory_size: le_u32(&record, 12),
        central_directory_offset: le_u32(&record, 16),
    };

    if eocd.entry_count == u16::MAX
        || eocd.central_directory_size == u32::MAX
        || eocd.central_directory_offset == u32::MAX
    {
        return Err(ZipError::TooLarge(
            "end record carries ZIP64 placeholders".to_string(),
        ));
    }

    if eocd.central_directory_offset as u64 > offset {
        return Err(ZipError::malformed_at(
            format!(
                "central directory offset {} lies past the end record",
                eocd.central_directory_offset
            ),
            offset,
        ));
    }

    Ok(eocd)
}

/// Parse the `entry_count` central directory records the end record points
/// at. `archive` is recorded in each entry's data source.
pub fn read_central_directory<R: Read + Seek>(
    reader: &mut R,
    eocd: &EndOfCentralDirectory,
    archive: &Path,
) -> Result<Vec<Entry>> {
    let mut offset = eocd.central_directory_offset as u64;
    reader.seek(SeekFrom::Start(offset))?;

    let mut entries = Vec::with_capacity(eocd.entry_count as usize);
    for _ in 0..eocd.entry_count {
        let truncated = ZipError::truncated_at(offset);

        let mut record = [0u8; CENTRAL_DIRECTORY_RECORD_SIZE as usize];
        reader.read_exact(&mut record).map_err(&truncated)?;

        let signature = le_u32(&record, 0);
        if signature != CENTRAL_DIRECTORY_SIGNATURE {
            return Err(ZipError::malformed_at(
                format!("invalid central directory header signature 0x{:08x}", signature),
                offset,
            ));
        }

        let method = CompressionMethod::from_zip_method(le_u16(&record, 10));
        let crc32 = le_u32(&record, 16);
        let compressed_size = le_u32(&record, 20) as u64;
        let uncompressed_size = le_u32(&record, 24) as u64;
        let name_len = le_u16(&record, 28) as u64;
        let extra_len = le_u16(&record, 30) as u64;
        let comment_len = le_u16(&record, 32) as u64;
        let local_header_offset = le_u32(&record, 42) as u64;

        let mut name_buf = vec![0u8; name_len as usize];
        reader.read_exact(&mut name_buf).map_err(&truncated)?;
        let name = String::from_utf8_lossy(&name_buf).into_owned();

        if [compressed_size, uncompressed_size, local_header_offset].contains(&(u32::MAX as u64)) {
            return Err(ZipError::TooLarge(format!("{} needs ZIP64 fields", name)));
        }

        // Skip extra field and comment by reading, so buffered readers keep their buffer
        let skip = extra_len + comment_len;
        if io::copy(&mut reader.by_ref().take(skip), &mut io::sink())? != skip {
            return Err(truncated(io::ErrorKind::UnexpectedEof.into()));
        }

        entries.push(Entry {
            is_directory: name.ends_with('/'),
            source: DataSource::ArchiveOffset {
                archive: archive.to_path_buf(),
                local_header_offset,
                compressed_size,
                method,
            },
            name,
            method,
            compressed_size,
            uncompressed_size,
            crc32,
            local_header_offset,
        });

        offset += CENTRAL_DIRECTORY_RECORD_SIZE + name_len + skip;
    }

    Ok(entries)
}

pub(crate) fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn eocd(entry_count: u16, cd_size: u32, cd_offset: u32, comment: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // disk number
        out.extend_from_slice(&0u16.to_le_bytes()); // disk with central dir
        out.extend_from_slice(&entry_count.to_le_bytes());
        out.extend_from_slice(&entry_count.to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        out.extend_from_slice(comment);
        out
    }

    fn central_record(name: &str, method: u16, crc: u32, size: u32, offset: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&[20, 0, 20, 0, 0, 0]); // made by, needed, flags
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]); // mod time/date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes()); // extra len
        out.extend_from_slice(&1u16.to_le_bytes()); // comment len
        out.extend_from_slice(&[0; 8]); // disk start, internal and external attrs
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&[0xEE, 0xEE, b'c']);
        out
    }

    fn parse(bytes: Vec<u8>) -> Result<Vec<Entry>> {
        let mut cursor = Cursor::new(bytes);
        let offset = locate_eocd(&mut cursor)?;
        let eocd = read_eocd(&mut cursor, offset)?;
        read_central_directory(&mut cursor, &eocd, Path::new("test.zip"))
    }

    #[test]
    fn empty_archive_has_no_entries() {
        assert!(parse(eocd(0, 0, 0, b"")).unwrap().is_empty());
    }

    #[test]
    fn too_small_is_malformed() {
        let err = parse(vec![0x50, 0x4b, 0x05, 0x06, 0, 0]).err().unwrap();
        assert!(matches!(err, ZipError::MalformedArchive { .. }));
    }

    #[test]
    fn missing_signature_is_malformed() {
        let err = parse(vec![0u8; 4096]).err().unwrap();
        assert!(matches!(err, ZipError::MalformedArchive { offset: None, .. }));
    }

    #[test]
    fn finds_record_before_comment() {
        let mut bytes = vec![0u8; 100];
        bytes.extend(eocd(0, 0, 100, b"an archive comment"));
        let mut cursor = Cursor::new(bytes);
        assert_eq!(locate_eocd(&mut cursor).unwrap(), 100);
    }

    #[test]
    fn signature_inside_comment_wins_the_scan() {
        let mut comment = END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes().to_vec();
        comment.extend_from_slice(&[0u8; 18]);
        let bytes = eocd(0, 0, 0, &comment);
        let mut cursor = Cursor::new(bytes);
        assert_eq!(locate_eocd(&mut cursor).unwrap(), 22);
    }

    #[test]
    fn ignores_signature_without_room_for_record() {
        // trailing signature with fewer than 22 bytes after it
        let mut bytes = eocd(0, 0, 0, b"");
        bytes.extend_from_slice(&END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 4]);
        let mut cursor = Cursor::new(bytes);
        assert_eq!(locate_eocd(&mut cursor).unwrap(), 0);
    }

    #[test]
    fn parses_records_and_skips_extra_and_comment() {
        let mut bytes = central_record("a.txt", 0, 0x1234_5678, 5, 0);
        bytes.extend(central_record("dir/", 8, 0, 0, 40));
        let cd_size = bytes.len() as u32;
        bytes.extend(eocd(2, cd_size, 0, b""));

        let entries = parse(bytes).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name(), "a.txt");
        assert_eq!(entries[0].crc32(), 0x1234_5678);
        assert_eq!(entries[0].uncompressed_size(), 5);
        assert_eq!(entries[0].method(), CompressionMethod::Stored);
        assert!(!entries[0].is_directory());
        assert_eq!(entries[1].name(), "dir/");
        assert_eq!(entries[1].method(), CompressionMethod::Deflated);
        assert_eq!(entries[1].local_header_offset(), 40);
        assert!(entries[1].is_directory());
        assert!(entries[1].source().is_archive_backed());
    }

    #[test]
    fn bad_record_signature_names_offset() {
        let mut bytes = central_record("a.txt", 0, 0, 0, 0);
        let second = bytes.len();
        bytes.extend(vec![0xAB; 46]);
        let cd_size = bytes.len() as u32;
        bytes.extend(eocd(2, cd_size, 0, b""));

        let err = parse(bytes).err().unwrap();
        match err {
            ZipError::MalformedArchive { offset, .. } => assert_eq!(offset, Some(second as u64)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn truncated_directory_is_malformed() {
        let mut bytes = central_record("a.txt", 0, 0, 0, 0);
        let cd_size = bytes.len() as u32;
        // claims three records but only one is present before the end record
        bytes.extend(eocd(3, cd_size, 0, b""));

        let err = parse(bytes).err().unwrap();
        assert!(matches!(err, ZipError::MalformedArchive { .. }));
    }

    #[test]
    fn directory_offset_past_end_record_is_malformed() {
        let bytes = eocd(1, 46, 1000, b"");
        let err = parse(bytes).err().unwrap();
        assert!(matches!(
            err,
            ZipError::MalformedArchive {
                offset: Some(0),
                ..
            }
        ));
    }

    #[test]
    fn zip64_placeholders_are_too_large() {
        let err = parse(eocd(u16::MAX, u32::MAX, u32::MAX, b"")).err().unwrap();
        assert!(matches!(err, ZipError::TooLarge(_)));

        let mut bytes = central_record("big.bin", 0, 0, u32::MAX, 0);
        let cd_size = bytes.len() as u32;
        bytes.extend(eocd(1, cd_size, 0, b""));
        let err = parse(bytes).err().unwrap();
        assert!(matches!(err, ZipError::TooLarge(_)));
    }
}
