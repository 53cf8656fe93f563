//! BLAKE3 content digests.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Streaming buffer size for file hashing
const HASH_BUF_SIZE: usize = 64 * 1024;

/// Hash a file's contents
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> io::Result<[u8; 32]> {
    hash_reader(File::open(path)?)
}

/// Hash everything a reader yields
///
/// # Errors
///
/// Returns an error if reading fails.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<[u8; 32]> {
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(*hasher.finalize().as_bytes())
}

/// Hash a file if it exists; `None` when it does not
///
/// # Errors
///
/// Returns an error only for failures other than the file being absent.
pub fn hash_file_if_present(path: &Path) -> io::Result<Option<[u8; 32]>> {
    match File::open(path) {
        Ok(file) => hash_reader(file).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_hash_matches_blake3() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"hello, world\n").unwrap();
        tmp.flush().unwrap();

        let expected = *blake3::hash(b"hello, world\n").as_bytes();
        assert_eq!(hash_file(tmp.path()).unwrap(), expected);
    }

    #[test]
    fn test_hash_large_input_streams() {
        let data = vec![0x5Au8; HASH_BUF_SIZE * 3 + 17];
        let expected = *blake3::hash(&data).as_bytes();
        assert_eq!(hash_reader(&data[..]).unwrap(), expected);
    }

    #[test]
    fn test_absent_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(hash_file_if_present(&missing).unwrap(), None);
    }
}
