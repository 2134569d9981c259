//! Event-based lossy payload (container version 4).
//!
//! The input is read as 16-bit little-endian samples. A sample becomes an
//! event when it moves more than `threshold` away from the last emitted
//! value; decoding holds each event value until the next one.
//!
//! ```text
//! threshold f32 | sample_count u64 | tail_flag u8 | tail u8 | event_count u32 | event*
//! event = gap u32 | value i16
//! ```
//!
//! `gap` is the distance in samples from the previous event (from sample 0
//! for the first). The threshold is informational on decode, so a corrupted
//! threshold or event value still decodes.

use crate::cursor::ByteReader;
use crate::error::{LimitKind, RefcodecError, RefcodecResult};
use crate::limits::DecodeLimits;

/// Appends the events payload for `input` to `out`.
pub fn encode_events(input: &[u8], threshold: f32, out: &mut Vec<u8>) -> RefcodecResult<()> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(RefcodecError::InvalidParameter {
            name: "threshold",
            reason: format!("{threshold} is not a finite non-negative value"),
        });
    }
    let samples = input.chunks_exact(2);
    let tail = samples.remainder().first().copied();
    let sample_count = input.len() / 2;

    let mut events: Vec<(u32, i16)> = Vec::new();
    let mut last: Option<(usize, i16)> = None;
    for (idx, pair) in samples.enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        let emit = last.map_or(true, |(_, value)| {
            (f32::from(sample) - f32::from(value)).abs() > threshold
        });
        if emit {
            let gap = last.map_or(idx, |(at, _)| idx - at);
            events.push((gap as u32, sample));
            last = Some((idx, sample));
        }
    }

    out.extend_from_slice(&threshold.to_be_bytes());
    out.extend_from_slice(&(sample_count as u64).to_be_bytes());
    out.push(u8::from(tail.is_some()));
    out.push(tail.unwrap_or(0));
    out.extend_from_slice(&(events.len() as u32).to_be_bytes());
    for (gap, value) in events {
        out.extend_from_slice(&gap.to_be_bytes());
        out.extend_from_slice(&value.to_be_bytes());
    }
    Ok(())
}

/// Decodes an events payload into little-endian samples.
pub fn decode_events(payload: &[u8], limits: &DecodeLimits) -> RefcodecResult<Vec<u8>> {
    let mut reader = ByteReader::new(payload);
    let _threshold = reader.read_f32()?;
    let sample_count = reader.read_u64()?;
    if sample_count > limits.max_samples {
        return Err(RefcodecError::LimitsExceeded {
            kind: LimitKind::SampleCount,
            limit: limits.max_samples,
            actual: sample_count,
        });
    }
    let tail_flag = reader.read_u8()?;
    let tail = reader.read_u8()?;
    let tail = match tail_flag {
        0 => None,
        1 => Some(tail),
        flag => return Err(RefcodecError::InvalidTailFlag { flag }),
    };
    let event_count = u64::from(reader.read_u32()?);
    if event_count > sample_count {
        return Err(RefcodecError::LimitsExceeded {
            kind: LimitKind::EventCount,
            limit: sample_count,
            actual: event_count,
        });
    }
    // Each event occupies six bytes; check before reconstructing.
    let needed = event_count as usize * 6;
    if needed > reader.remaining() {
        return Err(RefcodecError::Truncated {
            needed,
            available: reader.remaining(),
        });
    }

    let mut events: Vec<(usize, i16)> = Vec::with_capacity(event_count as usize);
    let mut previous: Option<u64> = None;
    for event in 0..event_count as usize {
        let gap = u64::from(reader.read_u32()?);
        let value = reader.read_i16()?;
        let position = previous.map_or(gap, |at| at + gap);
        let ordered = previous.map_or(true, |at| position > at);
        if !ordered || position >= sample_count {
            return Err(RefcodecError::EventOutOfRange {
                event,
                position,
                sample_count,
            });
        }
        events.push((position as usize, value));
        previous = Some(position);
    }
    reader.finish()?;

    let sample_count = sample_count as usize;
    let mut out = Vec::with_capacity(sample_count * 2 + 1);
    let mut held = 0i16;
    let mut next = events.iter().peekable();
    for idx in 0..sample_count {
        if let Some((_, value)) = next.next_if(|(at, _)| *at == idx) {
            held = *value;
        }
        out.extend_from_slice(&held.to_le_bytes());
    }
    out.extend(tail);
    Ok(out)
}
