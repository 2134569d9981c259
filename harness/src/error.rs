//! Error types for harness operations.
//!
//! Codec process failures are not errors at this level: they are captured
//! and classified into [`Verdict`](crate::Verdict)s. `HarnessError` covers
//! the harness's own I/O, configuration and artifact-layout failures.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use artifact::ArtifactError;

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors raised by the harness itself.
#[derive(Debug)]
#[non_exhaustive]
pub enum HarnessError {
    /// Filesystem operation failed.
    Io { path: PathBuf, source: io::Error },

    /// Artifact cannot be targeted (e.g. too small for header-safe mutation).
    Artifact(ArtifactError),

    /// Configuration is inconsistent.
    Config(String),

    /// JSON document could not be read or written.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl HarnessError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Artifact(err) => write!(f, "{err}"),
            Self::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Json { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Artifact(err) => Some(err),
            Self::Config(_) => None,
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<ArtifactError> for HarnessError {
    fn from(err: ArtifactError) -> Self {
        Self::Artifact(err)
    }
}
