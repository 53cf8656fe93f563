//! Stateless resume scanning.
//!
//! The receiver pre-sizes its destination file, so any chunk that never
//! arrived is still all zeros. Scanning for zero chunks reconstructs the
//! resume plan from nothing but the file itself.
//!
//! Trade-off: a chunk that legitimately contains only zero bytes is
//! indistinguishable from an unwritten one and gets re-fetched. Harmless,
//! since re-writing zeros over zeros changes nothing.

use crate::CHUNK_SIZE;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Compute the offsets of chunks still missing from a partial file.
///
/// An empty result means "send everything": either the file is absent, or
/// its size does not match the expected size, or (rarely) every chunk is
/// present but the content still needs replacing.
///
/// # Errors
///
/// Returns an error if an existing file cannot be read.
pub fn missing_chunks(path: &Path, expected_size: u64) -> io::Result<Vec<u64>> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    if file.metadata()?.len() != expected_size {
        return Ok(Vec::new());
    }

    let zero = [0u8; CHUNK_SIZE];
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut missing = Vec::new();
    let mut offset = 0u64;

    while offset < expected_size {
        let len = (expected_size - offset).min(CHUNK_SIZE as u64) as usize;
        file.read_exact(&mut buf[..len])?;
        if buf[..len] == zero[..len] {
            missing.push(offset);
        }
        offset += len as u64;
    }

    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_absent_file_means_send_all() {
        let dir = tempdir().unwrap();
        let missing = missing_chunks(&dir.path().join("nope"), 1234).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_size_mismatch_means_send_all() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, vec![1u8; 100]).unwrap();
        assert!(missing_chunks(&path, 200).unwrap().is_empty());
    }

    #[test]
    fn test_zero_chunks_reported_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.bin");

        // Chunks 0 and 2 written, chunks 1 and 3 still zero.
        let mut data = vec![0u8; CHUNK_SIZE * 4];
        data[..CHUNK_SIZE].fill(0x11);
        data[CHUNK_SIZE * 2..CHUNK_SIZE * 3].fill(0x33);
        std::fs::write(&path, &data).unwrap();

        let missing = missing_chunks(&path, data.len() as u64).unwrap();
        assert_eq!(missing, vec![CHUNK_SIZE as u64, CHUNK_SIZE as u64 * 3]);
    }

    #[test]
    fn test_complete_file_has_no_missing_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("full.bin");
        std::fs::write(&path, vec![0x42u8; CHUNK_SIZE + 77]).unwrap();

        let missing = missing_chunks(&path, (CHUNK_SIZE + 77) as u64).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_short_final_zero_chunk_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tail.bin");

        let mut data = vec![0x55u8; CHUNK_SIZE + 10];
        data[CHUNK_SIZE..].fill(0);
        std::fs::write(&path, &data).unwrap();

        let missing = missing_chunks(&path, data.len() as u64).unwrap();
        assert_eq!(missing, vec![CHUNK_SIZE as u64]);
    }

    #[test]
    fn test_single_zero_byte_mid_chunk_is_not_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dot.bin");

        let mut data = vec![0x66u8; CHUNK_SIZE];
        data[17] = 0;
        std::fs::write(&path, &data).unwrap();

        assert!(missing_chunks(&path, data.len() as u64).unwrap().is_empty());
    }
}
