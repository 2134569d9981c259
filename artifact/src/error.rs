//! Error types for artifact header operations.

use std::fmt;

/// Result type for artifact header operations.
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Errors raised while reading or targeting an artifact container.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ArtifactError {
    /// Artifact has no payload byte beyond the fixed header.
    InvalidArtifact { size: usize, required: usize },

    /// Artifact is too short to hold a header.
    Truncated { needed: usize, available: usize },

    /// Magic bytes do not identify a codec artifact.
    InvalidMagic { found: [u8; 4] },

    /// Version field names no known codec mode.
    UnsupportedVersion { found: u32 },

    /// Mode name is not one of the recognized codec modes.
    UnknownMode { name: String },
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArtifact { size, required } => {
                write!(
                    f,
                    "invalid artifact: {size} bytes leaves no payload to mutate, need at least {required}"
                )
            }
            Self::Truncated { needed, available } => {
                write!(
                    f,
                    "truncated artifact: need {needed} header bytes, have {available}"
                )
            }
            Self::InvalidMagic { found } => {
                write!(
                    f,
                    "invalid magic: {:02X}{:02X}{:02X}{:02X}",
                    found[0], found[1], found[2], found[3]
                )
            }
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported artifact version: {found}")
            }
            Self::UnknownMode { name } => write!(f, "unknown codec mode: {name}"),
        }
    }
}

impl std::error::Error for ArtifactError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_artifact_display_names_sizes() {
        let err = ArtifactError::InvalidArtifact {
            size: 8,
            required: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains("invalid artifact"));
        assert!(msg.contains('8'));
        assert!(msg.contains('9'));
    }

    #[test]
    fn invalid_magic_display_is_hex() {
        let err = ArtifactError::InvalidMagic {
            found: [0xDE, 0xAD, 0xBE, 0xEF],
        };
        assert!(err.to_string().contains("DEADBEEF"));
    }

    #[test]
    fn unknown_mode_display() {
        let err = ArtifactError::UnknownMode {
            name: "elite".to_string(),
        };
        assert!(err.to_string().contains("elite"));
    }
}
