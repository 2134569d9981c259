#![no_main]

use artifact::{decode_header, payload_range};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = decode_header(data) {
        let _ = header.mode();
        assert_eq!(&header.encode()[..], &data[..8]);
    }
    if let Ok(range) = payload_range(data.len()) {
        assert!(range.start == 8 && range.end == data.len());
    }
});
