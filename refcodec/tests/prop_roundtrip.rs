use artifact::{CodecMode, HEADER_SIZE};
use proptest::prelude::*;
use refcodec::{decode_artifact, encode_artifact, DecodeLimits, EncodeOptions};

fn lossless(block_size: u32) -> EncodeOptions {
    EncodeOptions {
        mode: CodecMode::Lossless,
        block_size,
        ..EncodeOptions::default()
    }
}

fn events(threshold: f32) -> EncodeOptions {
    EncodeOptions {
        mode: CodecMode::Events,
        threshold,
        ..EncodeOptions::default()
    }
}

fn runs_strategy() -> impl Strategy<Value = Vec<u8>> {
    // Mixes literal noise with long runs so both block methods are exercised.
    prop::collection::vec((any::<u8>(), 1usize..64), 0..64).prop_map(|runs| {
        runs.into_iter()
            .flat_map(|(byte, len)| std::iter::repeat(byte).take(len))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_lossless_roundtrip(
        input in prop_oneof![prop::collection::vec(any::<u8>(), 0..4096), runs_strategy()],
        block_size in 1u32..2048,
    ) {
        let bytes = encode_artifact(&input, &lossless(block_size)).unwrap();
        let restored = decode_artifact(&bytes, &DecodeLimits::for_testing()).unwrap();
        prop_assert_eq!(restored, input);
    }

    #[test]
    fn prop_events_zero_threshold_is_exact(input in prop::collection::vec(any::<u8>(), 0..2048)) {
        let bytes = encode_artifact(&input, &events(0.0)).unwrap();
        let restored = decode_artifact(&bytes, &DecodeLimits::for_testing()).unwrap();
        prop_assert_eq!(restored, input);
    }

    #[test]
    fn prop_events_preserve_length(
        input in prop::collection::vec(any::<u8>(), 0..2048),
        threshold in 0.0f32..2000.0,
    ) {
        let bytes = encode_artifact(&input, &events(threshold)).unwrap();
        let restored = decode_artifact(&bytes, &DecodeLimits::for_testing()).unwrap();
        prop_assert_eq!(restored.len(), input.len());
    }

    #[test]
    fn prop_decode_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode_artifact(&bytes, &DecodeLimits::for_testing());
    }

    #[test]
    fn prop_decode_corrupted_payload_never_panics(
        input in prop::collection::vec(any::<u8>(), 1..1024),
        lossless_mode in any::<bool>(),
        flips in prop::collection::vec((any::<prop::sample::Index>(), 0u8..8), 1..16),
    ) {
        let options = if lossless_mode { lossless(64) } else { events(6.0) };
        let mut bytes = encode_artifact(&input, &options).unwrap();
        let payload_len = bytes.len() - HEADER_SIZE;
        for (index, bit) in flips {
            bytes[HEADER_SIZE + index.index(payload_len)] ^= 1u8 << bit;
        }
        let _ = decode_artifact(&bytes, &DecodeLimits::for_testing());
    }
}
