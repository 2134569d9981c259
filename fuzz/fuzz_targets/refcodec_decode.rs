#![no_main]

use artifact::{ArtifactHeader, CodecMode};
use libfuzzer_sys::fuzz_target;
use refcodec::{decode_artifact, DecodeLimits};

fuzz_target!(|data: &[u8]| {
    let limits = DecodeLimits::for_testing();
    let _ = decode_artifact(data, &limits);

    // Reach the payload decoders past the magic check as well.
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let mode = if selector & 1 == 0 {
        CodecMode::Lossless
    } else {
        CodecMode::Events
    };
    let mut bytes = ArtifactHeader::for_mode(mode).encode().to_vec();
    bytes.extend_from_slice(payload);
    let _ = decode_artifact(&bytes, &limits);
});
