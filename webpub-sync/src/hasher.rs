//! Streaming SHA-256 content hashing.
//!
//! Files are read in fixed-size buffers so arbitrarily large outputs are
//! hashed without being loaded into memory. Digests are lowercase hex; index
//! entries written by other tools may be uppercase, so compare with
//! [`hashes_match`].

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

/// Read buffer size used while hashing.
pub const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// SHA-256 of everything `reader` yields, as lowercase hex.
pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of a file's contents, as lowercase hex.
pub fn hash_file(path: &Path) -> Result<String, SyncError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    hash_reader(file).map_err(|e| io_err(path, e))
}

/// SHA-256 of an in-memory buffer, as lowercase hex.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex digests compare ASCII-case-insensitively.
pub fn hashes_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn known_digest_of_empty_input() {
        assert_eq!(
            hash_reader(Cursor::new(Vec::new())).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn streaming_matches_one_shot_across_buffer_boundaries() {
        let data: Vec<u8> = (0..(HASH_BUFFER_SIZE * 3 + 17))
            .map(|i| (i % 251) as u8)
            .collect();
        let streamed = hash_reader(Trickle {
            data: &data,
            step: 1000,
        })
        .unwrap();
        assert_eq!(streamed, hash_bytes(&data));
    }

    #[test]
    fn hash_file_is_deterministic_and_content_sensitive() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.html");

        fs::write(&path, b"version 1").unwrap();
        let h1 = hash_file(&path).unwrap();
        assert_eq!(h1, hash_file(&path).unwrap());
        assert_eq!(h1.len(), 64);

        fs::write(&path, b"version 2").unwrap();
        assert_ne!(h1, hash_file(&path).unwrap());
    }

    #[test]
    fn missing_file_reports_path() {
        let tmp = TempDir::new().unwrap();
        let err = hash_file(&tmp.path().join("gone.css")).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }), "got: {err}");
        assert!(err.to_string().contains("gone.css"));
    }

    #[test]
    fn digests_compare_case_insensitively() {
        assert!(hashes_match("DEADBEEF", "deadbeef"));
        assert!(!hashes_match("deadbeef", "deadbeee"));
    }
}
