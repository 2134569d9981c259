//! Block-based lossless payload (container version 1).
//!
//! Layout after the 8-byte header, all integers big-endian:
//!
//! ```text
//! original_len u64 | block_size u32 | block*
//! block = raw_len u32 | method u8 | check u32 | enc_len u32 | enc_len bytes
//! ```
//!
//! Method 0 stores the block verbatim. Method 1 stores `(run, value)` pairs
//! over the byte-wise delta of the block. The check is the first four bytes
//! of the block's blake3 hash, so payload corruption is detected on decode.

use crate::cursor::ByteReader;
use crate::error::{LimitKind, RefcodecError, RefcodecResult};
use crate::limits::DecodeLimits;

const METHOD_STORED: u8 = 0;
const METHOD_DELTA_RLE: u8 = 1;

/// Appends the lossless payload for `input` to `out`.
pub fn encode_lossless(input: &[u8], block_size: u32, out: &mut Vec<u8>) -> RefcodecResult<()> {
    if block_size == 0 {
        return Err(RefcodecError::InvalidParameter {
            name: "block size",
            reason: "must be at least 1".to_string(),
        });
    }
    out.extend_from_slice(&(input.len() as u64).to_be_bytes());
    out.extend_from_slice(&block_size.to_be_bytes());

    for block in input.chunks(block_size as usize) {
        let runs = delta_rle(block);
        let (method, body) = if runs.len() < block.len() {
            (METHOD_DELTA_RLE, runs.as_slice())
        } else {
            (METHOD_STORED, block)
        };
        out.extend_from_slice(&(block.len() as u32).to_be_bytes());
        out.push(method);
        out.extend_from_slice(&block_check(block).to_be_bytes());
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
    }
    Ok(())
}

/// Decodes a lossless payload, verifying every block check.
pub fn decode_lossless(payload: &[u8], limits: &DecodeLimits) -> RefcodecResult<Vec<u8>> {
    let mut reader = ByteReader::new(payload);
    let original_len = reader.read_u64()?;
    if original_len > limits.max_original_bytes {
        return Err(RefcodecError::LimitsExceeded {
            kind: LimitKind::OriginalBytes,
            limit: limits.max_original_bytes,
            actual: original_len,
        });
    }
    let block_size = reader.read_u32()?;
    if block_size == 0 || block_size > limits.max_block_size {
        return Err(RefcodecError::LimitsExceeded {
            kind: LimitKind::BlockSize,
            limit: u64::from(limits.max_block_size),
            actual: u64::from(block_size),
        });
    }

    // A delta+RLE pair expands to at most 255 bytes.
    let capacity = original_len.min(payload.len() as u64 * 128);
    let mut restored = Vec::with_capacity(capacity as usize);
    let mut block = 0usize;
    while (restored.len() as u64) < original_len {
        let remaining = original_len - restored.len() as u64;
        let max_len = remaining.min(u64::from(block_size));
        let raw_len = reader.read_u32()?;
        if raw_len == 0 || u64::from(raw_len) > max_len {
            return Err(RefcodecError::InvalidBlockLength {
                block,
                raw_len,
                max_len,
            });
        }
        let method = reader.read_u8()?;
        let expected = reader.read_u32()?;
        let enc_len = reader.read_u32()? as usize;
        let body = reader.take(enc_len)?;

        let start = restored.len();
        match method {
            METHOD_STORED => {
                if body.len() != raw_len as usize {
                    return Err(RefcodecError::InvalidRuns { block });
                }
                restored.extend_from_slice(body);
            }
            METHOD_DELTA_RLE => expand_delta_rle(body, raw_len as usize, block, &mut restored)?,
            method => return Err(RefcodecError::UnknownMethod { block, method }),
        }

        let found = block_check(&restored[start..]);
        if found != expected {
            return Err(RefcodecError::BlockCheckMismatch {
                block,
                expected,
                found,
            });
        }
        block += 1;
    }
    reader.finish()?;
    Ok(restored)
}

fn block_check(block: &[u8]) -> u32 {
    let hash = blake3::hash(block);
    let bytes = hash.as_bytes();
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn delta_rle(block: &[u8]) -> Vec<u8> {
    let mut runs = Vec::new();
    let mut prev = 0u8;
    let mut current: Option<(u8, u8)> = None;
    for &byte in block {
        let delta = byte.wrapping_sub(prev);
        prev = byte;
        current = match current {
            Some((run, value)) if value == delta && run < u8::MAX => Some((run + 1, value)),
            Some((run, value)) => {
                runs.push(run);
                runs.push(value);
                Some((1, delta))
            }
            None => Some((1, delta)),
        };
    }
    if let Some((run, value)) = current {
        runs.push(run);
        runs.push(value);
    }
    runs
}

fn expand_delta_rle(
    body: &[u8],
    raw_len: usize,
    block: usize,
    out: &mut Vec<u8>,
) -> RefcodecResult<()> {
    if body.len() % 2 != 0 {
        return Err(RefcodecError::InvalidRuns { block });
    }
    let start = out.len();
    let mut prev = 0u8;
    for pair in body.chunks_exact(2) {
        let (run, delta) = (pair[0] as usize, pair[1]);
        if run == 0 || out.len() - start + run > raw_len {
            return Err(RefcodecError::InvalidRuns { block });
        }
        for _ in 0..run {
            prev = prev.wrapping_add(delta);
            out.push(prev);
        }
    }
    if out.len() - start != raw_len {
        return Err(RefcodecError::InvalidRuns { block });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(input: &[u8], block_size: u32) -> Vec<u8> {
        let mut out = Vec::new();
        encode_lossless(input, block_size, &mut out).unwrap();
        out
    }

    #[test]
    fn ramp_compresses_and_restores() {
        let input: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let payload = encode(&input, 1024);
        assert!(payload.len() < input.len() / 4);
        let restored = decode_lossless(&payload, &DecodeLimits::for_testing()).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn noisy_blocks_fall_back_to_stored() {
        let input: Vec<u8> = (0..300u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
        let payload = encode(&input, 128);
        // 12 bytes of stream header plus 13 bytes of framing per block.
        assert!(payload.len() <= input.len() + 12 + 3 * 13);
        let restored = decode_lossless(&payload, &DecodeLimits::for_testing()).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn empty_input_has_no_blocks() {
        let payload = encode(&[], 32);
        assert_eq!(payload.len(), 12);
        assert!(decode_lossless(&payload, &DecodeLimits::for_testing())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let mut out = Vec::new();
        let err = encode_lossless(b"abc", 0, &mut out).unwrap_err();
        assert!(matches!(err, RefcodecError::InvalidParameter { .. }));
    }

    #[test]
    fn flipped_body_byte_fails_block_check() {
        let input = vec![7u8; 64];
        let mut payload = encode(&input, 64);
        let last = payload.len() - 1;
        payload[last] ^= 0x01;
        let err = decode_lossless(&payload, &DecodeLimits::for_testing()).unwrap_err();
        assert!(matches!(
            err,
            RefcodecError::BlockCheckMismatch { block: 0, .. } | RefcodecError::InvalidRuns { .. }
        ));
    }

    #[test]
    fn oversized_original_len_is_rejected_before_allocation() {
        let mut payload = encode(b"abcd", 4);
        payload[..8].copy_from_slice(&u64::MAX.to_be_bytes());
        let err = decode_lossless(&payload, &DecodeLimits::for_testing()).unwrap_err();
        assert!(matches!(
            err,
            RefcodecError::LimitsExceeded {
                kind: LimitKind::OriginalBytes,
                ..
            }
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut payload = encode(b"abcd", 4);
        payload.push(0);
        let err = decode_lossless(&payload, &DecodeLimits::for_testing()).unwrap_err();
        assert_eq!(err, RefcodecError::TrailingData { remaining: 1 });
    }

    #[test]
    fn long_runs_split_at_255() {
        let runs = delta_rle(&[0u8; 600]);
        assert_eq!(runs, vec![255, 0, 255, 0, 90, 0]);
    }
}
