//! Configurable limits for bounded decoding.

/// Limits enforced while decoding an artifact.
///
/// Every length field is checked against these values before any buffer is
/// allocated, so a corrupted length cannot exhaust memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum size of the restored file in bytes (lossless).
    pub max_original_bytes: u64,

    /// Maximum declared block size in bytes (lossless).
    pub max_block_size: u32,

    /// Maximum number of 16-bit samples (events).
    pub max_samples: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            // 1 GiB of restored audio
            max_original_bytes: 1 << 30,
            max_block_size: 1 << 20,
            max_samples: 1 << 29,
        }
    }
}

impl DecodeLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_original_bytes: 1 << 20,
            max_block_size: 4096,
            max_samples: 1 << 19,
        }
    }
}
