//! Mapping between filesystem-style relative paths and ZIP entry names
//!
//! Entry names always use `/` as separator regardless of the host platform,
//! and directory entries carry a trailing `/`.

use crate::error::{Result, ZipError};
use std::path::{Component, Path, PathBuf};

/// Separator used inside entry names
pub const SEPARATOR: char = '/';

/// Convert a relative path into an entry name.
///
/// Fails with [`ZipError::InvalidPath`] for absolute or rooted paths, paths
/// with no usable component and components that are not valid UTF-8.
/// `.` components are dropped.
///
/// ```
/// use rezip::path::to_entry_name;
/// use std::path::Path;
///
/// assert_eq!(to_entry_name(Path::new("docs/readme.txt"))?, "docs/readme.txt");
/// assert!(to_entry_name(Path::new("/etc/passwd")).is_err());
/// # Ok::<(), rezip::ZipError>(())
/// ```
pub fn to_entry_name(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    ZipError::InvalidPath(format!("not valid UTF-8: {}", path.display()))
                })?;
                parts.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir => parts.push(".."),
            Component::RootDir | Component::Prefix(_) => {
                return Err(ZipError::InvalidPath(format!(
                    "entry path must be relative: {}",
                    path.display()
                )));
            }
        }
    }

    if parts.is_empty() {
        return Err(ZipError::InvalidPath(format!(
            "entry path is empty: {:?}",
            path
        )));
    }

    Ok(parts.join("/"))
}

/// Convert a relative path into a directory entry name (trailing `/`)
pub fn to_folder_entry_name(path: &Path) -> Result<String> {
    let mut name = to_entry_name(path)?;
    name.push(SEPARATOR);
    Ok(name)
}

/// Convert an entry name back into a relative path.
///
/// Returns the path and whether the name denotes a directory. Empty
/// components, including the one after a trailing `/`, are dropped.
pub fn from_entry_name(name: &str) -> (PathBuf, bool) {
    let is_directory = name.ends_with(SEPARATOR);
    let path = name
        .split(SEPARATOR)
        .filter(|part| !part.is_empty())
        .collect::<PathBuf>();
    (path, is_directory)
}

/// True if joining `path` onto a directory stays inside that directory
pub(crate) fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        && path.components().next().is_some()
}
