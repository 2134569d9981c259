//! Test assets, compression artifacts and the ratio metric.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checksum::{digest_file, Digest};
use crate::error::{HarnessError, HarnessResult};
use crate::invoker::EncodeParams;

/// Input file under test. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestAsset {
    /// File name, used as the asset identifier in reports.
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub digest: Digest,
}

impl TestAsset {
    /// Reads size and digest of `path`, returning `None` when the file does not exist.
    ///
    /// A missing asset is a skip, not an error.
    pub fn load(path: &Path) -> HarnessResult<Option<Self>> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(HarnessError::io(path, err)),
        };
        if !metadata.is_file() {
            return Err(HarnessError::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        let digest = digest_file(path)?;
        Ok(Some(Self {
            name: asset_name(path),
            path: path.to_path_buf(),
            size: metadata.len(),
            digest,
        }))
    }
}

/// Identifier of the asset at `path`: its file name, or the full path when
/// it has none.
#[must_use]
pub fn asset_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Output of one successful encode invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionArtifact {
    /// Name of the asset this artifact was produced from.
    pub asset: String,
    pub path: PathBuf,
    pub params: EncodeParams,
    pub size: u64,
    pub encode_latency: Duration,
}

impl CompressionArtifact {
    /// Ratio of `original_size` to this artifact's size.
    #[must_use]
    pub fn ratio(&self, original_size: u64) -> Option<f64> {
        compression_ratio(original_size, self.size)
    }
}

/// `original / compressed`, undefined for an empty artifact.
#[must_use]
pub fn compression_ratio(original: u64, compressed: u64) -> Option<f64> {
    if compressed == 0 {
        return None;
    }
    Some(original as f64 / compressed as f64)
}

/// `path` with `suffix` appended to its file name (`a.bin` -> `a.bin.corrupt`).
#[must_use]
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Removes an output left behind by an earlier run; an absent file is fine.
pub fn remove_stale(path: &Path) -> HarnessResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(HarnessError::io(path, err)),
    }
}

/// Duration in fractional milliseconds.
#[must_use]
pub fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::digest_bytes;

    #[test]
    fn ratio_is_original_over_compressed() {
        let ratio = compression_ratio(10_000, 2_500).unwrap();
        assert!((ratio - 4.0).abs() < 1e-6);
        let ratio = compression_ratio(1_000, 3).unwrap();
        assert!((ratio - 1_000.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn ratio_undefined_for_empty_artifact() {
        assert_eq!(compression_ratio(10_000, 0), None);
    }

    #[test]
    fn load_missing_asset_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let asset = TestAsset::load(&dir.path().join("absent.wav")).unwrap();
        assert!(asset.is_none());
    }

    #[test]
    fn load_records_size_and_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        fs::write(&path, [1u8, 2, 3, 4, 5]).unwrap();
        let asset = TestAsset::load(&path).unwrap().unwrap();
        assert_eq!(asset.name, "tone.wav");
        assert_eq!(asset.size, 5);
        assert_eq!(asset.digest, digest_bytes(&[1, 2, 3, 4, 5]));
    }

    #[test]
    fn load_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TestAsset::load(dir.path()).is_err());
    }

    #[test]
    fn suffix_extends_file_name() {
        let path = with_suffix(Path::new("out/base.events"), ".f2.t0.corrupt");
        assert_eq!(path, PathBuf::from("out/base.events.f2.t0.corrupt"));
    }

    #[test]
    fn millis_keeps_fraction() {
        assert!((millis(Duration::from_micros(1500)) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn remove_stale_clears_files_and_ignores_absent_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav.restored");
        fs::write(&path, b"old").unwrap();
        remove_stale(&path).unwrap();
        assert!(!path.exists());
        remove_stale(&path).unwrap();

        fs::create_dir(&path).unwrap();
        assert!(matches!(remove_stale(&path), Err(HarnessError::Io { .. })));
    }
}
