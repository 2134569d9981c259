//! Reference codec for the chaosbench harness.
//!
//! `chaosbench` treats the codec under test as an opaque executable. This
//! crate is a small codec that honors the same command-line contract, so the
//! harness can be exercised end to end without the production binary:
//!
//! - `encode <input> <output> [--mode lossless|events] [--block-size N] [--threshold F]`
//! - `decode <input> <output>`
//!
//! Artifacts use the 8-byte container header from the `artifact` crate. The
//! lossless payload carries per-block checks so corruption is rejected; the
//! events payload is lossy and tolerates corrupted values.
//!
//! # Design Principles
//!
//! - **Bounded decoding** - Every length field is validated against [`DecodeLimits`] before allocation.
//! - **Fail loudly, never crash** - Corrupt input yields an error, not a panic.

mod cursor;
mod error;
mod events;
mod limits;
mod lossless;

use artifact::{decode_header, ArtifactHeader, CodecMode, HEADER_SIZE};

pub use error::{LimitKind, RefcodecError, RefcodecResult};
pub use events::{decode_events, encode_events};
pub use limits::DecodeLimits;
pub use lossless::{decode_lossless, encode_lossless};

/// Default block size of the `encode` command.
pub const DEFAULT_BLOCK_SIZE: u32 = 32;

/// Default event threshold of the `encode` command.
pub const DEFAULT_THRESHOLD: f32 = 6.0;

/// Parameters of one encode call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeOptions {
    pub mode: CodecMode,
    pub block_size: u32,
    pub threshold: f32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            mode: CodecMode::Events,
            block_size: DEFAULT_BLOCK_SIZE,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Encodes `input` into a complete artifact, header included.
pub fn encode_artifact(input: &[u8], options: &EncodeOptions) -> RefcodecResult<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_SIZE + input.len() / 2);
    out.extend_from_slice(&ArtifactHeader::for_mode(options.mode).encode());
    match options.mode {
        CodecMode::Lossless => encode_lossless(input, options.block_size, &mut out)?,
        CodecMode::Events => encode_events(input, options.threshold, &mut out)?,
    }
    Ok(out)
}

/// Decodes a complete artifact back into the restored file contents.
pub fn decode_artifact(bytes: &[u8], limits: &DecodeLimits) -> RefcodecResult<Vec<u8>> {
    let header = decode_header(bytes)?;
    let payload = &bytes[HEADER_SIZE..];
    match header.mode()? {
        CodecMode::Lossless => decode_lossless(payload, limits),
        CodecMode::Events => decode_events(payload, limits),
    }
}
