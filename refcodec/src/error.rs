//! Error types for the reference codec.

use std::fmt;

use artifact::ArtifactError;

/// Result type for reference codec operations.
pub type RefcodecResult<T> = Result<T, RefcodecError>;

/// Errors raised while encoding or decoding an artifact.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RefcodecError {
    /// Header error.
    Artifact(ArtifactError),

    /// Payload ended before a field could be read.
    Truncated { needed: usize, available: usize },

    /// A length field exceeds the configured decode limits.
    LimitsExceeded {
        kind: LimitKind,
        limit: u64,
        actual: u64,
    },

    /// Encoder parameter out of range.
    InvalidParameter { name: &'static str, reason: String },

    /// Block length does not fit the declared block size or remaining data.
    InvalidBlockLength {
        block: usize,
        raw_len: u32,
        max_len: u64,
    },

    /// Block method byte names no known method.
    UnknownMethod { block: usize, method: u8 },

    /// Run-length data does not expand to the declared block length.
    InvalidRuns { block: usize },

    /// Block content does not match its stored check value.
    BlockCheckMismatch {
        block: usize,
        expected: u32,
        found: u32,
    },

    /// Event lands outside the declared sample range.
    EventOutOfRange {
        event: usize,
        position: u64,
        sample_count: u64,
    },

    /// Trailing-byte flag holds a value other than 0 or 1.
    InvalidTailFlag { flag: u8 },

    /// Bytes remain after the payload was fully decoded.
    TrailingData { remaining: usize },
}

/// Decode limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    OriginalBytes,
    BlockSize,
    SampleCount,
    EventCount,
}

impl fmt::Display for RefcodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artifact(err) => write!(f, "artifact error: {err}"),
            Self::Truncated { needed, available } => {
                write!(f, "truncated payload: need {needed} bytes, have {available}")
            }
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid {name}: {reason}")
            }
            Self::InvalidBlockLength {
                block,
                raw_len,
                max_len,
            } => {
                write!(
                    f,
                    "block {block} declares {raw_len} bytes, at most {max_len} allowed"
                )
            }
            Self::UnknownMethod { block, method } => {
                write!(f, "block {block} uses unknown method {method}")
            }
            Self::InvalidRuns { block } => {
                write!(f, "block {block} run-length data does not match its length")
            }
            Self::BlockCheckMismatch {
                block,
                expected,
                found,
            } => {
                write!(
                    f,
                    "block {block} check mismatch: stored 0x{expected:08X}, computed 0x{found:08X}"
                )
            }
            Self::EventOutOfRange {
                event,
                position,
                sample_count,
            } => {
                write!(
                    f,
                    "event {event} at sample {position} outside {sample_count} samples"
                )
            }
            Self::InvalidTailFlag { flag } => write!(f, "invalid tail flag: {flag}"),
            Self::TrailingData { remaining } => {
                write!(f, "{remaining} trailing bytes after payload")
            }
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OriginalBytes => "original bytes",
            Self::BlockSize => "block size",
            Self::SampleCount => "sample count",
            Self::EventCount => "event count",
        };
        write!(f, "{name}")
    }
}

impl std::error::Error for RefcodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Artifact(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ArtifactError> for RefcodecError {
    fn from(err: ArtifactError) -> Self {
        Self::Artifact(err)
    }
}
