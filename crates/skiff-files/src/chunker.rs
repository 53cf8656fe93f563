//! Offset-addressed chunk I/O.
//!
//! The sending side reads chunks at absolute byte offsets; the receiving
//! side pre-sizes the destination file and writes chunks wherever they
//! land. Unwritten regions stay zero, which is what the resume scan keys
//! off.

use crate::CHUNK_SIZE;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// All chunk start offsets for a file of `total_size` bytes
pub fn chunk_offsets(total_size: u64) -> impl Iterator<Item = u64> {
    (0..total_size.div_ceil(CHUNK_SIZE as u64)).map(|i| i * CHUNK_SIZE as u64)
}

/// Chunk-at-offset reader over one source file
pub struct ChunkReader {
    file: File,
    total_size: u64,
}

impl ChunkReader {
    /// Open a source file for chunk reads
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its metadata read.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let total_size = file.metadata()?.len();
        Ok(Self { file, total_size })
    }

    /// Total file size in bytes
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Read the chunk starting at `offset`. The final chunk may be short.
    ///
    /// # Errors
    ///
    /// Returns an error for offsets at or past the end of the file, or if
    /// seeking or reading fails.
    pub fn read_at(&mut self, offset: u64) -> io::Result<Vec<u8>> {
        if offset >= self.total_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk offset past end of file",
            ));
        }
        let len = (self.total_size - offset).min(CHUNK_SIZE as u64) as usize;
        let mut buf = vec![0u8; len];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Chunk-at-offset writer over one destination file.
///
/// The file is created at its final path and sized to the expected length
/// up front; an aborted transfer leaves it in place for the next run's
/// resume scan.
pub struct ChunkWriter {
    file: File,
    total_size: u64,
    bytes_written: u64,
}

impl ChunkWriter {
    /// Open or create the destination, sizing it to `total_size`.
    ///
    /// Existing contents are kept: on resume the already-written chunks
    /// must survive.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or sized.
    pub fn open(path: &Path, total_size: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(total_size)?;
        Ok(Self {
            file,
            total_size,
            bytes_written: 0,
        })
    }

    /// Write one chunk at its absolute offset
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk would extend past the expected size,
    /// or if seeking or writing fails.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        if offset + data.len() as u64 > self.total_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk extends past expected file size",
            ));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Bytes written through this writer (not counting pre-existing data)
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush file contents to disk
    ///
    /// # Errors
    ///
    /// Returns an error if syncing fails.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_chunk_offsets() {
        assert_eq!(chunk_offsets(0).count(), 0);
        assert_eq!(chunk_offsets(1).collect::<Vec<_>>(), vec![0]);
        assert_eq!(
            chunk_offsets(CHUNK_SIZE as u64 * 2 + 5).collect::<Vec<_>>(),
            vec![0, CHUNK_SIZE as u64, CHUNK_SIZE as u64 * 2]
        );
    }

    #[test]
    fn test_read_write_roundtrip() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");

        let data: Vec<u8> = (0..CHUNK_SIZE * 2 + 100).map(|i| (i % 251) as u8).collect();
        std::fs::write(&src, &data).unwrap();

        let mut reader = ChunkReader::open(&src).unwrap();
        let mut writer = ChunkWriter::open(&dst, data.len() as u64).unwrap();
        for offset in chunk_offsets(data.len() as u64) {
            let chunk = reader.read_at(offset).unwrap();
            writer.write_at(offset, &chunk).unwrap();
        }
        writer.sync().unwrap();

        assert_eq!(std::fs::read(&dst).unwrap(), data);
        assert_eq!(writer.bytes_written(), data.len() as u64);
    }

    #[test]
    fn test_out_of_order_writes() {
        let dir = tempdir().unwrap();
        let dst = dir.path().join("dst.bin");

        let chunk_a = vec![0xAAu8; CHUNK_SIZE];
        let chunk_b = vec![0xBBu8; 10];
        let total = (CHUNK_SIZE + 10) as u64;

        let mut writer = ChunkWriter::open(&dst, total).unwrap();
        writer.write_at(CHUNK_SIZE as u64, &chunk_b).unwrap();
        writer.write_at(0, &chunk_a).unwrap();
        writer.sync().unwrap();

        let out = std::fs::read(&dst).unwrap();
        assert_eq!(&out[..CHUNK_SIZE], &chunk_a[..]);
        assert_eq!(&out[CHUNK_SIZE..], &chunk_b[..]);
    }

    #[test]
    fn test_writer_preserves_existing_data() {
        let dir = tempdir().unwrap();
        let dst = dir.path().join("dst.bin");
        std::fs::write(&dst, vec![0xCCu8; 100]).unwrap();

        let mut writer = ChunkWriter::open(&dst, 100).unwrap();
        writer.write_at(50, &[0xDDu8; 10]).unwrap();
        writer.sync().unwrap();

        let out = std::fs::read(&dst).unwrap();
        assert_eq!(&out[..50], &[0xCCu8; 50][..]);
        assert_eq!(&out[50..60], &[0xDDu8; 10][..]);
        assert_eq!(&out[60..], &[0xCCu8; 40][..]);
    }

    #[test]
    fn test_unwritten_regions_are_zero() {
        let dir = tempdir().unwrap();
        let dst = dir.path().join("dst.bin");

        let mut writer = ChunkWriter::open(&dst, 64).unwrap();
        writer.write_at(0, &[0xEEu8; 16]).unwrap();
        writer.sync().unwrap();

        let out = std::fs::read(&dst).unwrap();
        assert_eq!(out.len(), 64);
        assert_eq!(&out[16..], &[0u8; 48][..]);
    }

    #[test]
    fn test_read_past_end_rejected() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        std::fs::write(&src, b"tiny").unwrap();

        let mut reader = ChunkReader::open(&src).unwrap();
        assert!(reader.read_at(4).is_err());
    }

    #[test]
    fn test_write_past_expected_size_rejected() {
        let dir = tempdir().unwrap();
        let dst = dir.path().join("dst.bin");
        let mut writer = ChunkWriter::open(&dst, 8).unwrap();
        assert!(writer.write_at(4, &[0u8; 8]).is_err());
    }
}
