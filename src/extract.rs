//! Whole-tree helpers: extracting an archive into a directory and adding a
//! directory tree to an archive

use crate::archive::ZipArchive;
use crate::error::{Result, ZipError};
use crate::path::is_contained;
use std::fs;
use std::io;
use std::path::Path;

impl ZipArchive {
    /// Extract every entry below `directory`, creating it if needed.
    ///
    /// Entry names that would land outside `directory` (`..` components)
    /// fail with [`ZipError::InvalidPath`]; entries before the offending one
    /// are already extracted at that point.
    pub fn extract_to<P: AsRef<Path>>(&self, directory: P) -> Result<()> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)?;

        for entry in self.entries()? {
            let relative = entry.path();
            if !is_contained(&relative) {
                return Err(ZipError::InvalidPath(format!(
                    "entry {} escapes the extraction directory",
                    entry.name()
                )));
            }

            let target = directory.join(&relative);
            if entry.is_directory() {
                fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                entry.read_to_path(&target)?;
            }
        }

        log::info!(
            "extracted {} entries from {} to {}",
            self.len(),
            self.path().display(),
            directory.display()
        );
        Ok(())
    }

    /// Add `path` to the archive under `path_in_zip`.
    ///
    /// A file becomes a file entry, read when the archive is written. A
    /// directory becomes a folder entry plus, recursively, entries for its
    /// children in name order. Without `path_in_zip` a file is added under
    /// its own name, while a directory's children are added at the archive
    /// root and no folder entry is created for the directory itself.
    pub fn compress_from<P: AsRef<Path>>(
        &mut self,
        path: P,
        path_in_zip: Option<&Path>,
    ) -> Result<()> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)?;

        if metadata.is_dir() {
            if let Some(folder) = path_in_zip {
                log::info!("compressing directory {}", folder.display());
                self.folder_entry(folder)?;
            }

            let mut children = fs::read_dir(path)?.collect::<io::Result<Vec<_>>>()?;
            children.sort_by_key(|child| child.file_name());
            for child in children {
                let name = child.file_name();
                let child_in_zip = match path_in_zip {
                    Some(folder) => folder.join(&name),
                    None => Path::new(&name).to_path_buf(),
                };
                self.compress_from(child.path(), Some(&child_in_zip))?;
            }
            Ok(())
        } else if metadata.is_file() {
            let entry_path = match path_in_zip {
                Some(entry_path) => entry_path.to_path_buf(),
                None => path
                    .file_name()
                    .map(|name| Path::new(name).to_path_buf())
                    .ok_or_else(|| {
                        ZipError::InvalidPath(format!("no file name in {}", path.display()))
                    })?,
            };
            log::info!("compressing file {}", entry_path.display());
            self.entry_from_path(entry_path, path)
        } else {
            Err(ZipError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported file type at {}", path.display()),
            )))
        }
    }
}
