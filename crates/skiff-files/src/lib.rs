//! # Skiff Files
//!
//! The file engine: transfer metadata, chunked file I/O, content hashing,
//! and the stateless resume scan.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunker;
pub mod hasher;
pub mod resume;

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Fixed chunk size: 4096 * 10 bytes
pub const CHUNK_SIZE: usize = 4096 * 10;

/// Metadata for one file offered in a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Base name of the file
    pub name: String,
    /// Destination folder, relative to the receiver's output root
    pub folder_remote: String,
    /// Source folder on the sending machine
    pub folder_source: String,
    /// BLAKE3 digest of the file contents
    pub hash: [u8; 32],
    /// File size in bytes
    pub size: u64,
    /// Modification time, seconds since the Unix epoch
    pub mtime: i64,
    /// Whether chunk payloads are deflate-compressed
    pub is_compressed: bool,
    /// Whether chunk payloads are sealed in the session envelope
    pub is_encrypted: bool,
}

impl FileInfo {
    /// Build metadata for a file on disk, hashing its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a regular file or cannot be read.
    pub fn scan(path: &Path) -> io::Result<Self> {
        let canonical = path.canonicalize()?;
        let meta = canonical.metadata()?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", canonical.display()),
            ));
        }

        let name = canonical
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "file name is not valid UTF-8")
            })?
            .to_string();
        let folder_source = canonical
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mtime = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Ok(Self {
            name,
            folder_remote: ".".to_string(),
            folder_source,
            hash: hasher::hash_file(&canonical)?,
            size: meta.len(),
            mtime,
            is_compressed: true,
            is_encrypted: true,
        })
    }

    /// Number of chunks this file occupies
    #[must_use]
    pub fn chunk_count(&self) -> u64 {
        self.size.div_ceil(CHUNK_SIZE as u64)
    }
}

/// The ordered set of files one session transfers, plus the sender's
/// machine identifier for the receiver's confirmation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSet {
    /// Files in transfer order
    pub files: Vec<FileInfo>,
    /// First 6 characters of the sender's machine identifier
    pub machine_id: String,
}

impl TransferSet {
    /// Total payload size across all files
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}
