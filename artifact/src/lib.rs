//! Container header layout for codec artifacts.
//!
//! Every artifact produced by the codec starts with a fixed 8-byte header:
//! a 4-byte format magic followed by a 4-byte big-endian version. This crate
//! owns that layout and nothing else. It never looks past the header.
//!
//! # Design Principles
//!
//! - **Header is sacred** - Mutation targets come from [`payload_range`], which never includes the header.
//! - **No payload knowledge** - Payload bytes are opaque at this layer.

mod error;
mod header;

pub use error::{ArtifactError, ArtifactResult};
pub use header::{
    decode_header, payload_range, ArtifactHeader, CodecMode, HEADER_SIZE, MAGIC, MIN_MUTABLE_SIZE,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let _ = MAGIC;
        let _ = HEADER_SIZE;
        let _ = ArtifactHeader::for_mode(CodecMode::Lossless);
        let _: ArtifactResult<()> = Ok(());
    }

    #[test]
    fn min_mutable_size_leaves_one_payload_byte() {
        assert_eq!(MIN_MUTABLE_SIZE, 9);
        assert_eq!(payload_range(MIN_MUTABLE_SIZE).unwrap().len(), 1);
    }
}
