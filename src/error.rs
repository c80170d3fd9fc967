//! Error types for rezip

use std::io;

/// Result type for rezip operations
pub type Result<T> = std::result::Result<T, ZipError>;

/// Error types that can occur during ZIP operations
#[derive(Debug)]
pub enum ZipError {
    /// I/O error from the filesystem or the deflate codec
    Io(io::Error),
    /// Missing or invalid EOCD, central directory record or local header.
    /// `offset` is the byte position in the archive where parsing failed, if known.
    MalformedArchive {
        message: String,
        offset: Option<u64>,
    },
    /// No entry with the given name or index
    EntryNotFound(String),
    /// Entry path that cannot be mapped to an entry name (absolute, empty, not UTF-8)
    InvalidPath(String),
    /// Mutation attempted on an archive opened for reading, or already closed
    NotWritable,
    /// Entry access attempted on a closed archive
    NotReadable,
    /// Compression method other than STORED (0) or DEFLATED (8)
    UnsupportedMethod(u16),
    /// Decompressed bytes do not match the CRC-32 recorded in the central directory
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },
    /// Value does not fit the 16/32-bit fields of a non-ZIP64 archive
    TooLarge(String),
}

impl ZipError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ZipError::MalformedArchive {
            message: message.into(),
            offset: None,
        }
    }

    pub(crate) fn malformed_at(message: impl Into<String>, offset: u64) -> Self {
        ZipError::MalformedArchive {
            message: message.into(),
            offset: Some(offset),
        }
    }

    /// Turns an unexpected EOF into a [`ZipError::MalformedArchive`] at `offset`,
    /// keeping every other I/O error as is.
    pub(crate) fn truncated_at(offset: u64) -> impl Fn(io::Error) -> ZipError {
        move |err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                ZipError::malformed_at("unexpected end of archive", offset)
            } else {
                ZipError::Io(err)
            }
        }
    }
}

impl std::fmt::Display for ZipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZipError::Io(e) => write!(f, "I/O error: {}", e),
            ZipError::MalformedArchive {
                message,
                offset: Some(offset),
            } => write!(f, "Malformed ZIP archive: {} (at offset {})", message, offset),
            ZipError::MalformedArchive {
                message,
                offset: None,
            } => write!(f, "Malformed ZIP archive: {}", message),
            ZipError::EntryNotFound(name) => write!(f, "Entry not found: {}", name),
            ZipError::InvalidPath(msg) => write!(f, "Invalid entry path: {}", msg),
            ZipError::NotWritable => write!(f, "ZIP archive is not opened writable"),
            ZipError::NotReadable => write!(f, "ZIP archive is closed"),
            ZipError::UnsupportedMethod(method) => {
                write!(f, "Unsupported compression method: {}", method)
            }
            ZipError::ChecksumMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "CRC-32 mismatch in {}: expected 0x{:08x}, got 0x{:08x}",
                name, expected, actual
            ),
            ZipError::TooLarge(msg) => write!(f, "Too large for a ZIP archive: {}", msg),
        }
    }
}

impl std::error::Error for ZipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ZipError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ZipError {
    fn from(err: io::Error) -> Self {
        ZipError::Io(err)
    }
}
