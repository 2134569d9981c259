//! Streaming content digests for round-trip verification.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use blake3::Hasher;
use serde::{Serialize, Serializer};

use crate::error::{HarnessError, HarnessResult};

/// Read size used when streaming a file through the hasher.
pub const CHUNK_SIZE: usize = 4096;

/// Content digest of a file (blake3, 32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the lowercase hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Digests an in-memory buffer.
#[must_use]
pub fn digest_bytes(bytes: &[u8]) -> Digest {
    Digest(*blake3::hash(bytes).as_bytes())
}

/// Digests everything `reader` yields, [`CHUNK_SIZE`] bytes at a time.
pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<Digest> {
    let mut hasher = Hasher::new();
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&chunk[..read]);
    }
    Ok(Digest(*hasher.finalize().as_bytes()))
}

/// Digests the file at `path` without loading it whole.
pub fn digest_file(path: &Path) -> HarnessResult<Digest> {
    let file = File::open(path).map_err(|err| HarnessError::io(path, err))?;
    digest_reader(file).map_err(|err| HarnessError::io(path, err))
}

/// Round-trip integrity of one decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Integrity {
    /// Restored file is bit-perfect.
    Match,
    /// Restored file differs from the original.
    Fail,
    /// Lossy mode; no byte comparison is attempted.
    Semantic,
}

impl Integrity {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::Fail => "FAIL",
            Self::Semantic => "SEMANTIC",
        }
    }
}

/// Compares an original digest with a restored file.
///
/// Digest equality is the only oracle. A restored file that cannot be read
/// counts as a mismatch.
pub fn verify_round_trip(original: &Digest, restored: &Path) -> Integrity {
    match digest_file(restored) {
        Ok(digest) if digest == *original => Integrity::Match,
        Ok(_) => Integrity::Fail,
        Err(err) => {
            tracing::warn!(error = %err, "restored file unreadable");
            Integrity::Fail
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn streamed_digest_matches_one_shot() {
        // Spans several chunks with a partial last chunk.
        let data: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 253) as u8).collect();
        let streamed = digest_reader(data.as_slice()).unwrap();
        assert_eq!(streamed, digest_bytes(&data));
    }

    #[test]
    fn empty_input_digest_is_stable() {
        assert_eq!(digest_reader(&[0u8; 0][..]).unwrap(), digest_bytes(&[]));
        assert_eq!(digest_bytes(&[]).to_hex().len(), 64);
    }

    #[test]
    fn identical_files_match() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();
        let original = digest_file(&a).unwrap();
        assert_eq!(verify_round_trip(&original, &b), Integrity::Match);
    }

    #[test]
    fn single_bit_difference_fails() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        fs::write(&a, [0u8, 1, 2, 3]).unwrap();
        fs::write(&b, [0u8, 1, 2, 2]).unwrap();
        let original = digest_file(&a).unwrap();
        assert_eq!(verify_round_trip(&original, &b), Integrity::Fail);
    }

    #[test]
    fn missing_restored_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let original = digest_bytes(b"x");
        let missing = dir.path().join("never-written");
        assert_eq!(verify_round_trip(&original, &missing), Integrity::Fail);
        assert!(matches!(
            digest_file(&missing).unwrap_err(),
            HarnessError::Io { .. }
        ));
    }

    #[test]
    fn digest_serializes_as_hex() {
        let json = serde_json::to_string(&digest_bytes(b"abc")).unwrap();
        assert_eq!(json, format!("\"{}\"", digest_bytes(b"abc").to_hex()));
    }

    #[test]
    fn hex_matches_blake3_rendering() {
        let digest = digest_bytes(b"abc");
        assert_eq!(digest.to_hex(), blake3::hash(b"abc").to_hex().as_str());
        assert_eq!(format!("{digest:?}"), format!("Digest({})", &digest.to_hex()[..16]));
    }
}
