//! Artifact header types and constants.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::{ArtifactError, ArtifactResult};

/// Magic bytes opening every codec artifact.
///
/// This value is fixed and must never change across versions.
pub const MAGIC: [u8; 4] = *b"NEUR";

/// Header size in bytes (8 total): magic plus a big-endian version.
pub const HEADER_SIZE: usize = 4 + 4;

/// Smallest artifact that still has a payload byte to target.
pub const MIN_MUTABLE_SIZE: usize = HEADER_SIZE + 1;

/// Operating mode of the codec, carried in the header version field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CodecMode {
    /// Bit-perfect compression; round trips are verified by digest.
    Lossless,
    /// Event-based lossy compression; round trips are semantic only.
    Events,
}

impl CodecMode {
    /// Header version written for artifacts in this mode.
    #[must_use]
    pub const fn version(self) -> u32 {
        match self {
            Self::Lossless => 1,
            Self::Events => 4,
        }
    }

    /// Maps a header version back to its mode.
    pub fn from_version(version: u32) -> ArtifactResult<Self> {
        match version {
            1 => Ok(Self::Lossless),
            4 => Ok(Self::Events),
            found => Err(ArtifactError::UnsupportedVersion { found }),
        }
    }

    /// Name used on the codec command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lossless => "lossless",
            Self::Events => "events",
        }
    }

    /// Returns `true` if round trips must be bit-perfect.
    #[must_use]
    pub const fn is_lossless(self) -> bool {
        matches!(self, Self::Lossless)
    }
}

impl fmt::Display for CodecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodecMode {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lossless" => Ok(Self::Lossless),
            "events" => Ok(Self::Events),
            _ => Err(ArtifactError::UnknownMode {
                name: s.to_string(),
            }),
        }
    }
}

/// Fixed 8-byte artifact header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactHeader {
    /// Format magic.
    pub magic: [u8; 4],
    /// Format version.
    pub version: u32,
}

impl ArtifactHeader {
    /// Creates the header for an artifact written in `mode`.
    #[must_use]
    pub const fn for_mode(mode: CodecMode) -> Self {
        Self {
            magic: MAGIC,
            version: mode.version(),
        }
    }

    /// Returns the mode named by the version field.
    pub fn mode(&self) -> ArtifactResult<CodecMode> {
        CodecMode::from_version(self.version)
    }

    /// Serializes the header to its wire bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..4].copy_from_slice(&self.magic);
        out[4..].copy_from_slice(&self.version.to_be_bytes());
        out
    }
}

/// Decodes and validates the header at the start of `bytes`.
///
/// Only the magic is validated here; the version is returned as found so
/// callers can report unknown versions with their own context.
pub fn decode_header(bytes: &[u8]) -> ArtifactResult<ArtifactHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(ArtifactError::Truncated {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[..4]);
    if magic != MAGIC {
        return Err(ArtifactError::InvalidMagic { found: magic });
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..HEADER_SIZE]);
    Ok(ArtifactHeader {
        magic,
        version: u32::from_be_bytes(version),
    })
}

/// Byte range an artifact of `len` bytes exposes to mutation.
///
/// The header is never part of the range. Artifacts without a single payload
/// byte are rejected instead of yielding an empty range.
pub fn payload_range(len: usize) -> ArtifactResult<Range<usize>> {
    if len < MIN_MUTABLE_SIZE {
        return Err(ArtifactError::InvalidArtifact {
            size: len,
            required: MIN_MUTABLE_SIZE,
        });
    }
    Ok(HEADER_SIZE..len)
}
