//! ZIP archive handle: entry table, open modes and the commit on close
//!
//! All mutation happens in memory. Nothing touches the file on disk until
//! [`ZipArchive::close`], which serializes the complete table to a new file
//! and swaps it in. `Append` therefore means "start from the existing
//! entries and rewrite everything on close", not an in-place append.

use crate::codec::{CompressionLevel, CompressionMethod};
use crate::crc::Crc32;
use crate::entry::Entry;
use crate::error::{Result, ZipError};
use crate::path::{to_entry_name, to_folder_entry_name};
use crate::reader;
use crate::source::DataSource;
use crate::writer;
use indexmap::IndexMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Mode an archive is opened in, fixed for its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Existing archive, entries can only be looked up and read
    Read,
    /// New archive; an existing file is replaced on close
    Write,
    /// Existing archive whose entries can be added, replaced and removed
    Append,
}

impl Mode {
    fn is_writable(self) -> bool {
        matches!(self, Mode::Write | Mode::Append)
    }
}

/// A ZIP archive opened in one of the three [`Mode`]s
///
/// ```no_run
/// use rezip::{Mode, ZipArchive};
///
/// let mut zip = ZipArchive::open("archive.zip", Mode::Append)?;
/// zip.entry_from_bytes("notes/todo.txt", b"write more tests".to_vec())?;
/// zip.delete_entries(["old.txt"])?;
/// zip.close()?;
/// # Ok::<(), rezip::ZipError>(())
/// ```
#[derive(Debug)]
pub struct ZipArchive {
    path: PathBuf,
    mode: Mode,
    level: CompressionLevel,
    entries: IndexMap<String, Entry>,
    closed: bool,
}

impl ZipArchive {
    /// Open an archive with the default compression level
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode) -> Result<Self> {
        Self::open_with_level(path, mode, CompressionLevel::default())
    }

    /// Open an archive, compressing new entries at `level`.
    ///
    /// `Read` and `Append` parse the central directory before returning;
    /// any failure there is returned and no archive is created.
    pub fn open_with_level<P: AsRef<Path>>(
        path: P,
        mode: Mode,
        level: CompressionLevel,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match mode {
            Mode::Read | Mode::Append => reader::read_entries(&path)?,
            Mode::Write => IndexMap::new(),
        };

        log::debug!(
            "opened {} in {:?} mode with {} entries",
            path.display(),
            mode,
            entries.len()
        );

        Ok(Self {
            path,
            mode,
            level,
            entries,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Entries in archive order
    pub fn entries(&self) -> Result<impl Iterator<Item = &Entry>> {
        self.require_open()?;
        Ok(self.entries.values())
    }

    /// Look up an entry by path; a directory matches with or without its
    /// trailing separator.
    pub fn entry<P: AsRef<Path>>(&self, path: P) -> Result<&Entry> {
        self.require_open()?;
        let name = to_entry_name(path.as_ref())?;
        if let Some(entry) = self.entries.get(&name) {
            return Ok(entry);
        }
        let folder = format!("{}/", name);
        self.entries
            .get(&folder)
            .ok_or(ZipError::EntryNotFound(name))
    }

    /// Look up an entry by its position in the table
    pub fn entry_at(&self, index: usize) -> Result<&Entry> {
        self.require_open()?;
        self.entries
            .get_index(index)
            .map(|(_, entry)| entry)
            .ok_or_else(|| ZipError::EntryNotFound(format!("index {}", index)))
    }

    /// Add (or replace) a file entry with the given content
    pub fn entry_from_bytes<P: AsRef<Path>>(&mut self, path: P, data: Vec<u8>) -> Result<()> {
        self.require_writable()?;
        let name = to_entry_name(path.as_ref())?;
        let crc32 = Crc32::checksum(&data);
        let size = data.len() as u64;
        self.add_entry(name, DataSource::InMemory(data), size, crc32, false);
        Ok(())
    }

    /// Add (or replace) a file entry by draining `reader` into memory
    pub fn entry_from_reader<P: AsRef<Path>, R: Read>(
        &mut self,
        path: P,
        mut reader: R,
    ) -> Result<()> {
        self.require_writable()?;
        let name = to_entry_name(path.as_ref())?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let crc32 = Crc32::checksum(&data);
        let size = data.len() as u64;
        self.add_entry(name, DataSource::InMemory(data), size, crc32, false);
        Ok(())
    }

    /// Add (or replace) a file entry whose content is read from `file` when
    /// the archive is written. The file must be a regular file.
    pub fn entry_from_path<P: AsRef<Path>, F: AsRef<Path>>(
        &mut self,
        path: P,
        file: F,
    ) -> Result<()> {
        self.require_writable()?;
        let name = to_entry_name(path.as_ref())?;
        let file = file.as_ref();
        let metadata = fs::metadata(file)?;
        if !metadata.is_file() {
            return Err(ZipError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", file.display()),
            )));
        }
        self.add_entry(
            name,
            DataSource::ExternalFile(file.to_path_buf()),
            metadata.len(),
            0,
            false,
        );
        Ok(())
    }

    /// Add a directory entry
    pub fn folder_entry<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.require_writable()?;
        let name = to_folder_entry_name(path.as_ref())?;
        self.add_entry(name, DataSource::InMemory(Vec::new()), 0, 0, true);
        Ok(())
    }

    /// Remove the entries at the given paths, returning how many were removed.
    /// Paths without a matching entry are ignored.
    pub fn delete_entries<I, P>(&mut self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.require_writable()?;
        let mut names = Vec::new();
        for path in paths {
            let name = to_entry_name(path.as_ref())?;
            names.push(format!("{}/", name));
            names.push(name);
        }

        let before = self.entries.len();
        self.entries.retain(|name, _| !names.contains(name));
        Ok(before - self.entries.len())
    }

    /// Remove the entries at the given positions, returning how many were
    /// removed. Out-of-range indices are ignored.
    pub fn delete_entries_by_index<I>(&mut self, indices: I) -> Result<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        self.require_writable()?;
        let mut indices: Vec<usize> = indices.into_iter().collect();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();

        let mut removed = 0;
        for index in indices {
            if self.entries.shift_remove_index(index).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn add_entry(
        &mut self,
        name: String,
        source: DataSource,
        size: u64,
        crc32: u32,
        is_directory: bool,
    ) {
        let method = if is_directory || self.level == CompressionLevel::NoCompression {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        let compressed_size = match method {
            CompressionMethod::Stored => size,
            _ => 0,
        };

        let entry = Entry {
            name: name.clone(),
            method,
            compressed_size,
            uncompressed_size: size,
            crc32,
            local_header_offset: 0,
            source,
            is_directory,
        };

        // An existing name keeps its position
        if self.entries.insert(name, entry).is_some() {
            log::trace!("replaced existing entry in {}", self.path.display());
        }
    }

    /// Finish with the archive.
    ///
    /// For `Write` and `Append` this writes the whole entry table to a
    /// temporary file and atomically replaces the archive with it; on error
    /// the previous file is untouched and the archive stays open. Once
    /// closed, further calls do nothing. Dropping an archive without
    /// closing it discards pending changes.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.mode.is_writable() {
            if let Err(e) = writer::commit(&self.path, self.level, self.entries.values()) {
                log::warn!("{}: commit failed, archive left unchanged: {}", self.path.display(), e);
                return Err(e);
            }
        }
        self.closed = true;
        Ok(())
    }

    fn require_writable(&self) -> Result<()> {
        if self.mode.is_writable() && !self.closed {
            Ok(())
        } else {
            Err(ZipError::NotWritable)
        }
    }

    // Offsets of a committed archive's entries point into the replaced file.
    fn require_open(&self) -> Result<()> {
        if self.closed {
            Err(ZipError::NotReadable)
        } else {
            Ok(())
        }
    }
}
