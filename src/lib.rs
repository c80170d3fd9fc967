//! # rezip: Self-Contained ZIP Archive Engine
//!
//! `rezip` reads existing ZIP files and writes new ones straight from raw bytes.
//! Archives are edited in memory and rewritten as a whole, atomically, when
//! closed. Payloads are streamed, so even large archives are never fully
//! loaded.
//!
//! ## Features
//!
//! - **Lazy Reading**: Opening parses only the central directory; entry data is
//!   read and inflated on demand
//! - **Safe Rewrites**: Output goes to a temporary file that replaces the
//!   archive only after it was written completely
//! - **Bounded Streams**: Entry readers never run past their compressed size
//! - **Verified Data**: CRC-32 of archived entries is checked on read and rewrite
//! - **Simple API**: Three modes, one archive type
//!
//! ## Quick Start
//!
//! ### Writing a ZIP file
//!
//! ```no_run
//! use rezip::{Mode, ZipArchive};
//!
//! let mut zip = ZipArchive::open("archive.zip", Mode::Write)?;
//! zip.entry_from_bytes("hello.txt", b"Hello, World!".to_vec())?;
//! zip.entry_from_path("data/report.csv", "/tmp/report.csv")?;
//! zip.folder_entry("empty")?;
//! zip.close()?;
//! # Ok::<(), rezip::ZipError>(())
//! ```
//!
//! ### Reading a ZIP file
//!
//! ```no_run
//! use rezip::{Mode, ZipArchive};
//!
//! let zip = ZipArchive::open("archive.zip", Mode::Read)?;
//!
//! for entry in zip.entries()? {
//!     println!("{}: {} bytes", entry.name(), entry.uncompressed_size());
//! }
//!
//! let text = zip.entry("hello.txt")?.read_to_string()?;
//! # Ok::<(), rezip::ZipError>(())
//! ```
//!
//! ### Editing an existing ZIP file
//!
//! ```no_run
//! use rezip::{Mode, ZipArchive};
//!
//! let mut zip = ZipArchive::open("archive.zip", Mode::Append)?;
//! zip.delete_entries(["hello.txt"])?;
//! zip.entry_from_bytes("goodbye.txt", b"Bye!".to_vec())?;
//! // Nothing is written until here
//! zip.close()?;
//! # Ok::<(), rezip::ZipError>(())
//! ```
//!
//! ## Limitations
//!
//! Single-disk archives only; no ZIP64 and no encryption. Archives written by
//! other tools may use data descriptors, but rezip itself never does. Only
//! STORED and DEFLATED entries can be read.

pub mod archive;
pub mod codec;
pub mod crc;
pub mod entry;
pub mod error;
mod extract;
pub mod path;
pub mod reader;
pub mod source;
pub mod writer;

pub use archive::{Mode, ZipArchive};
pub use codec::{CompressionLevel, CompressionMethod};
pub use crc::Crc32;
pub use entry::Entry;
pub use error::{Result, ZipError};
pub use source::{BoundedReader, DataSource};
pub use writer::ArchiveWriter;
