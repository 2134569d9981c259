//! Bit-flip fault injection and chaos trials.
//!
//! A trial moves through four states:
//!
//! ```text
//! ENCODED --mutate--> MUTATED --attempt_decode--> DECODE_ATTEMPTED --> verdict
//! ```
//!
//! [`EncodedTrial`] and [`MutatedTrial`] are the first two states; the decode
//! attempt consumes the mutated trial and yields a [`ChaosOutcome`] carrying
//! the terminal [`Verdict`].
//!
//! Offsets are drawn uniformly from the payload (`[8, size)`); the 8-byte
//! header is never touched, so a rejection can be attributed to payload
//! corruption rather than a broken magic. Offsets may repeat.

use std::fs;
use std::path::{Path, PathBuf};

use artifact::payload_range;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::asset::{millis, remove_stale, with_suffix, CompressionArtifact};
use crate::checksum::{digest_file, Digest};
use crate::error::{HarnessError, HarnessResult};
use crate::invoker::{CodecInvoker, ProcessError};
use crate::outcome::{classify, Verdict};

/// One single-bit toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitFlip {
    pub offset: usize,
    /// Bit position within the byte (0-7).
    pub bit: u8,
}

/// Corrupted copy of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChaosMutation {
    /// Artifact the corruption was derived from.
    pub source: PathBuf,
    /// Corrupted sibling file.
    pub path: PathBuf,
    /// Flips in the order they were applied.
    pub flips: Vec<BitFlip>,
}

impl ChaosMutation {
    #[must_use]
    pub fn flip_count(&self) -> usize {
        self.flips.len()
    }

    /// Mutated byte offsets, in application order, repeats included.
    #[must_use]
    pub fn offsets(&self) -> Vec<usize> {
        self.flips.iter().map(|flip| flip.offset).collect()
    }
}

/// Applies `flips` random bit toggles to the payload of `bytes`.
///
/// Fails with [`artifact::ArtifactError::InvalidArtifact`] when `bytes` has
/// no payload byte, and with a configuration error when `flips` is zero.
pub fn corrupt_bytes<R: Rng + ?Sized>(
    bytes: &mut [u8],
    flips: u32,
    rng: &mut R,
) -> HarnessResult<Vec<BitFlip>> {
    if flips == 0 {
        return Err(HarnessError::Config(
            "flip count must be at least 1".to_string(),
        ));
    }
    let range = payload_range(bytes.len())?;
    let mut applied = Vec::with_capacity(flips as usize);
    for _ in 0..flips {
        let offset = rng.gen_range(range.clone());
        let bit = rng.gen_range(0..8u8);
        bytes[offset] ^= 1u8 << bit;
        applied.push(BitFlip { offset, bit });
    }
    Ok(applied)
}

/// Writes a corrupted copy of `source` to `dest`.
///
/// `source` is only read, so it can seed any number of trials.
pub fn inject<R: Rng + ?Sized>(
    source: &Path,
    flips: u32,
    dest: &Path,
    rng: &mut R,
) -> HarnessResult<ChaosMutation> {
    let mut bytes = fs::read(source).map_err(|err| HarnessError::io(source, err))?;
    let applied = corrupt_bytes(&mut bytes, flips, rng)?;
    fs::write(dest, &bytes).map_err(|err| HarnessError::io(dest, err))?;
    Ok(ChaosMutation {
        source: source.to_path_buf(),
        path: dest.to_path_buf(),
        flips: applied,
    })
}

/// Unique sibling path for one trial of `source`.
#[must_use]
pub fn corrupt_path(source: &Path, flips: u32, trial: u32) -> PathBuf {
    with_suffix(source, &format!(".f{flips}.t{trial}.corrupt"))
}

/// Generator for one trial: reproducible when `seed` is set.
#[must_use]
pub fn chaos_rng(seed: Option<u64>, trial: u32) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(trial))),
        None => StdRng::from_entropy(),
    }
}

/// Table name of a trial.
#[must_use]
pub fn case_name(flips: u32) -> String {
    format!("Bit-Flip Attack ({flips} bits)")
}

/// ENCODED: a clean artifact awaiting mutation.
#[derive(Debug, Clone, Copy)]
pub struct EncodedTrial<'a> {
    artifact: &'a CompressionArtifact,
    trial: u32,
}

/// MUTATED: a corrupted sibling exists on disk.
#[derive(Debug, Clone)]
pub struct MutatedTrial<'a> {
    artifact: &'a CompressionArtifact,
    mutation: ChaosMutation,
}

/// Terminal record of one chaos trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChaosOutcome {
    pub case: String,
    pub asset: String,
    pub flips: u32,
    pub mutation: ChaosMutation,
    #[serde(flatten)]
    pub verdict: Verdict,
    pub decode_latency_ms: Option<f64>,
    pub restored_digest: Option<Digest>,
}

impl<'a> EncodedTrial<'a> {
    #[must_use]
    pub const fn new(artifact: &'a CompressionArtifact, trial: u32) -> Self {
        Self { artifact, trial }
    }

    /// Writes the corrupted sibling for this trial.
    pub fn mutate<R: Rng + ?Sized>(self, flips: u32, rng: &mut R) -> HarnessResult<MutatedTrial<'a>> {
        let dest = corrupt_path(&self.artifact.path, flips, self.trial);
        let mutation = inject(&self.artifact.path, flips, &dest, rng)?;
        tracing::debug!(
            artifact = %self.artifact.path.display(),
            flips,
            offsets = ?mutation.offsets(),
            "artifact mutated"
        );
        Ok(MutatedTrial {
            artifact: self.artifact,
            mutation,
        })
    }
}

impl MutatedTrial<'_> {
    #[must_use]
    pub const fn mutation(&self) -> &ChaosMutation {
        &self.mutation
    }

    /// Submits the corrupted artifact for decode and classifies the result.
    pub fn attempt_decode<C: CodecInvoker + ?Sized>(self, codec: &C) -> ChaosOutcome {
        let restored = with_suffix(&self.mutation.path, ".restored");
        if let Err(err) = remove_stale(&restored) {
            tracing::warn!(error = %err, "stale restored file could not be removed");
            let verdict = Verdict::LaunchFailed {
                detail: err.to_string(),
            };
            return self.into_outcome(verdict, None, None);
        }
        let result = codec.decode(&self.mutation.path, &restored);
        let verdict = classify(&result);

        let (decode_latency_ms, restored_digest) = match &result {
            Ok(file) => (Some(millis(file.elapsed)), digest_file(&file.path).ok()),
            Err(ProcessError::Exited { elapsed, .. }) => (Some(millis(*elapsed)), None),
            Err(_) => (None, None),
        };
        if verdict.is_defect() {
            tracing::warn!(
                artifact = %self.mutation.path.display(),
                verdict = verdict.label(),
                detail = %verdict.detail(),
                "decode of corrupted artifact failed unsafely"
            );
        } else {
            tracing::info!(
                artifact = %self.mutation.path.display(),
                verdict = verdict.label(),
                "decode of corrupted artifact classified"
            );
        }
        self.into_outcome(verdict, decode_latency_ms, restored_digest)
    }

    fn into_outcome(
        self,
        verdict: Verdict,
        decode_latency_ms: Option<f64>,
        restored_digest: Option<Digest>,
    ) -> ChaosOutcome {
        let flips = u32::try_from(self.mutation.flip_count()).unwrap_or(u32::MAX);
        ChaosOutcome {
            case: case_name(flips),
            asset: self.artifact.asset.clone(),
            flips,
            mutation: self.mutation,
            verdict,
            decode_latency_ms,
            restored_digest,
        }
    }
}
