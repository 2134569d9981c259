//! Benchmark Runner: encode/decode cycles, sweeps and chaos runs.
//!
//! Every codec call goes through a [`CodecInvoker`], one at a time. Latency
//! is the elapsed time the invoker measured around the call itself; size
//! lookups and digesting happen outside it.
//!
//! Output paths are deterministic per asset and parameter set, so files left
//! by an earlier run are removed before the codec is invoked.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::asset::{millis, remove_stale, with_suffix, CompressionArtifact, TestAsset};
use crate::chaos::{case_name, chaos_rng, ChaosOutcome, EncodedTrial};
use crate::checksum::{verify_round_trip, Integrity};
use crate::error::{HarnessError, HarnessResult};
use crate::invoker::{CodecInvoker, EncodeParams};
use crate::outcome::{classify_error, Verdict};

/// Encode configurations of one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    /// Block size of the lossless baseline.
    pub block_size: u32,
    /// Events-mode thresholds.
    pub thresholds: Vec<f64>,
}

impl SweepPlan {
    /// Lossless baseline first, then one events configuration per threshold
    /// in ascending order.
    #[must_use]
    pub fn configurations(&self) -> Vec<EncodeParams> {
        let mut thresholds = self.thresholds.clone();
        thresholds.sort_by(f64::total_cmp);
        std::iter::once(EncodeParams::Lossless {
            block_size: self.block_size,
        })
        .chain(
            thresholds
                .into_iter()
                .map(|threshold| EncodeParams::Events { threshold }),
        )
        .collect()
    }
}

/// How one (asset, configuration) cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordResult {
    /// Both calls succeeded; integrity is the round-trip verdict.
    Verified { integrity: Integrity },
    /// Encode did not produce an artifact.
    EncodeFailed { failure: Verdict },
    /// Decode of the clean artifact failed.
    DecodeFailed { failure: Verdict },
}

impl RecordResult {
    /// Table label.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Verified { integrity } => integrity.label().to_string(),
            Self::EncodeFailed { failure } => format!("ENCODE {}", failure.label()),
            Self::DecodeFailed { failure } => format!("DECODE {}", failure.label()),
        }
    }

    /// Returns `true` when the cycle did not verify cleanly.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !matches!(
            self,
            Self::Verified {
                integrity: Integrity::Match | Integrity::Semantic
            }
        )
    }
}

/// One row of a benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkRecord {
    pub asset: String,
    pub original_bytes: u64,
    pub params: EncodeParams,
    pub artifact: Option<PathBuf>,
    pub artifact_bytes: Option<u64>,
    /// `original_bytes / artifact_bytes`; absent when nothing was produced.
    pub ratio: Option<f64>,
    pub encode_latency_ms: Option<f64>,
    pub decode_latency_ms: Option<f64>,
    pub result: RecordResult,
}

impl BenchmarkRecord {
    fn encode_failed(asset: &TestAsset, params: EncodeParams, failure: Verdict) -> Self {
        Self {
            asset: asset.name.clone(),
            original_bytes: asset.size,
            params,
            artifact: None,
            artifact_bytes: None,
            ratio: None,
            encode_latency_ms: None,
            decode_latency_ms: None,
            result: RecordResult::EncodeFailed { failure },
        }
    }
}

/// Records of a sweep plus the assets that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepResults {
    pub records: Vec<BenchmarkRecord>,
    pub skipped: Vec<PathBuf>,
}

/// Assets that could be loaded, in declared order.
#[derive(Debug, Clone, Default)]
pub struct LoadedAssets {
    pub assets: Vec<TestAsset>,
    pub skipped: Vec<PathBuf>,
}

/// Loads every path; missing or unreadable assets are skipped.
pub fn load_assets(paths: &[PathBuf]) -> LoadedAssets {
    let mut loaded = LoadedAssets::default();
    for path in paths {
        match TestAsset::load(path) {
            Ok(Some(asset)) => loaded.assets.push(asset),
            Ok(None) => {
                tracing::info!(asset = %path.display(), "asset not found, skipping");
                loaded.skipped.push(path.clone());
            }
            Err(err) => {
                tracing::warn!(asset = %path.display(), error = %err, "asset unreadable, skipping");
                loaded.skipped.push(path.clone());
            }
        }
    }
    loaded
}

/// Chaos trials against one clean artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChaosRun {
    pub asset: String,
    pub params: EncodeParams,
    /// Clean artifact the trials were derived from.
    pub base_artifact: Option<PathBuf>,
    /// Outcome of the clean encode; trials run only when it is stable.
    pub base_verdict: Verdict,
    pub outcomes: Vec<ChaosOutcome>,
    /// Trials whose corrupted copy could not be written.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_trials: Vec<TrialFailure>,
}

/// Trial that never reached the codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialFailure {
    pub case: String,
    pub flips: u32,
    pub error: String,
}

impl ChaosRun {
    /// Trials whose decode failed unsafely.
    pub fn defects(&self) -> impl Iterator<Item = &ChaosOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.verdict.is_defect())
    }
}

/// Drives the codec for benchmark, sweep and chaos runs.
#[derive(Debug)]
pub struct BenchmarkRunner<C> {
    codec: C,
    out_dir: PathBuf,
}

impl<C: CodecInvoker> BenchmarkRunner<C> {
    /// Creates a runner writing artifacts under `out_dir`, creating it if needed.
    pub fn new(codec: C, out_dir: impl Into<PathBuf>) -> HarnessResult<Self> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir).map_err(|err| HarnessError::io(&out_dir, err))?;
        Ok(Self { codec, out_dir })
    }

    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    #[must_use]
    pub const fn codec(&self) -> &C {
        &self.codec
    }

    /// One encode/decode/verify cycle.
    pub fn run(&self, asset: &TestAsset, params: &EncodeParams) -> BenchmarkRecord {
        let path = self
            .out_dir
            .join(format!("{}.{}", asset.name, params.file_tag()));
        let artifact = match self.encode(asset, params, &path) {
            Ok(artifact) => artifact,
            Err(failure) => {
                tracing::warn!(
                    asset = %asset.name,
                    params = %params.label(),
                    verdict = failure.label(),
                    "encode failed"
                );
                return BenchmarkRecord::encode_failed(asset, *params, failure);
            }
        };

        let restored = with_suffix(&artifact.path, ".restored");
        let (decode_latency_ms, result) = match self.codec.decode(&artifact.path, &restored) {
            Ok(file) => {
                let integrity = if params.mode().is_lossless() {
                    verify_round_trip(&asset.digest, &file.path)
                } else {
                    Integrity::Semantic
                };
                (Some(millis(file.elapsed)), RecordResult::Verified { integrity })
            }
            Err(err) => (
                None,
                RecordResult::DecodeFailed {
                    failure: classify_error(&err),
                },
            ),
        };

        let record = BenchmarkRecord {
            asset: asset.name.clone(),
            original_bytes: asset.size,
            params: *params,
            ratio: artifact.ratio(asset.size),
            artifact_bytes: Some(artifact.size),
            artifact: Some(artifact.path),
            encode_latency_ms: Some(millis(artifact.encode_latency)),
            decode_latency_ms,
            result,
        };
        tracing::info!(
            asset = %record.asset,
            params = %params.label(),
            ratio = ?record.ratio,
            result = %record.result.label(),
            "benchmark record"
        );
        record
    }

    /// Lossless cycle with `block_size`.
    pub fn run_lossless(&self, asset: &TestAsset, block_size: u32) -> BenchmarkRecord {
        self.run(asset, &EncodeParams::Lossless { block_size })
    }

    /// Events cycle with `threshold`.
    pub fn run_events(&self, asset: &TestAsset, threshold: f64) -> BenchmarkRecord {
        self.run(asset, &EncodeParams::Events { threshold })
    }

    /// Runs every configuration of `plan` against every asset in declared
    /// order. Missing assets are skipped, never fatal.
    pub fn sweep(&self, assets: &[PathBuf], plan: &SweepPlan) -> SweepResults {
        let loaded = load_assets(assets);
        let configurations = plan.configurations();
        let records = loaded
            .assets
            .iter()
            .flat_map(|asset| configurations.iter().map(move |params| (asset, params)))
            .map(|(asset, params)| self.run(asset, params))
            .collect();
        SweepResults {
            records,
            skipped: loaded.skipped,
        }
    }

    /// Encodes a clean base artifact and runs one bit-flip trial per entry
    /// of `flips`.
    ///
    /// Fails only when the artifact cannot be targeted without touching its
    /// header or a flip count is invalid. A trial whose corrupted copy cannot
    /// be written is recorded in [`ChaosRun::failed_trials`] and the
    /// remaining trials still run.
    pub fn chaos(
        &self,
        asset: &TestAsset,
        params: &EncodeParams,
        flips: &[u32],
        seed: Option<u64>,
    ) -> HarnessResult<ChaosRun> {
        let path = self
            .out_dir
            .join(format!("{}.chaos.{}", asset.name, params.mode()));
        let artifact = match self.encode(asset, params, &path) {
            Ok(artifact) => artifact,
            Err(failure) => {
                tracing::warn!(asset = %asset.name, verdict = failure.label(), "chaos base encode failed");
                return Ok(ChaosRun {
                    asset: asset.name.clone(),
                    params: *params,
                    base_artifact: None,
                    base_verdict: failure,
                    outcomes: Vec::new(),
                    failed_trials: Vec::new(),
                });
            }
        };

        let mut outcomes = Vec::with_capacity(flips.len());
        let mut failed_trials = Vec::new();
        for (trial, &count) in (0u32..).zip(flips) {
            let mut rng = chaos_rng(seed, trial);
            match EncodedTrial::new(&artifact, trial).mutate(count, &mut rng) {
                Ok(mutated) => outcomes.push(mutated.attempt_decode(&self.codec)),
                Err(err @ (HarnessError::Artifact(_) | HarnessError::Config(_))) => {
                    return Err(err)
                }
                Err(err) => {
                    tracing::error!(
                        asset = %asset.name,
                        flips = count,
                        error = %err,
                        "chaos trial could not be prepared"
                    );
                    failed_trials.push(TrialFailure {
                        case: case_name(count),
                        flips: count,
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(ChaosRun {
            asset: asset.name.clone(),
            params: *params,
            base_artifact: Some(artifact.path),
            base_verdict: Verdict::Stable,
            outcomes,
            failed_trials,
        })
    }

    fn encode(
        &self,
        asset: &TestAsset,
        params: &EncodeParams,
        path: &Path,
    ) -> Result<CompressionArtifact, Verdict> {
        clear_outputs(&[path, with_suffix(path, ".restored").as_path()])?;
        let encoded = self
            .codec
            .encode(&asset.path, path, params)
            .map_err(|err| classify_error(&err))?;
        let size = fs::metadata(&encoded.path)
            .map_err(|err| Verdict::Abnormal {
                detail: format!("encode succeeded without an artifact ({err})"),
            })?
            .len();
        Ok(CompressionArtifact {
            asset: asset.name.clone(),
            path: encoded.path,
            params: *params,
            size,
            encode_latency: encoded.elapsed,
        })
    }
}

/// Removes leftovers so a codec that writes nothing cannot pass with an
/// earlier run's output.
fn clear_outputs(paths: &[&Path]) -> Result<(), Verdict> {
    for path in paths {
        remove_stale(path).map_err(|err| Verdict::LaunchFailed {
            detail: err.to_string(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::{EncodedArtifact, ProcessError, RestoredFile};
    use std::cell::RefCell;
    use std::time::Duration;

    /// Prefixes a container header on encode and strips it on decode.
    #[derive(Default)]
    struct FakeCodec {
        calls: RefCell<Vec<String>>,
        fail_encode: bool,
        tamper_decode: bool,
        skip_output: bool,
        skip_restore: bool,
    }

    impl CodecInvoker for FakeCodec {
        fn encode(
            &self,
            input: &Path,
            output: &Path,
            params: &EncodeParams,
        ) -> Result<EncodedArtifact, ProcessError> {
            self.calls.borrow_mut().push(format!("encode {}", params.label()));
            if self.fail_encode {
                return Err(ProcessError::TimedOut {
                    timeout: Duration::from_millis(5),
                });
            }
            if !self.skip_output {
                let mut bytes = artifact::ArtifactHeader::for_mode(params.mode())
                    .encode()
                    .to_vec();
                bytes.extend(fs::read(input).unwrap());
                fs::write(output, bytes).unwrap();
            }
            Ok(EncodedArtifact {
                path: output.to_path_buf(),
                elapsed: Duration::from_millis(3),
            })
        }

        fn decode(&self, input: &Path, output: &Path) -> Result<RestoredFile, ProcessError> {
            self.calls.borrow_mut().push("decode".to_string());
            let mut payload = fs::read(input).unwrap().split_off(8);
            if self.tamper_decode {
                payload[0] ^= 0xFF;
            }
            if !self.skip_restore {
                fs::write(output, payload).unwrap();
            }
            Ok(RestoredFile {
                path: output.to_path_buf(),
                elapsed: Duration::from_millis(1),
            })
        }
    }

    fn write_asset(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>()).unwrap();
        path
    }

    fn asset_at(path: &Path) -> TestAsset {
        TestAsset::load(path).unwrap().unwrap()
    }

    #[test]
    fn lossless_round_trip_matches() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_at(&write_asset(dir.path(), "tone.wav", 10_000));
        let runner = BenchmarkRunner::new(FakeCodec::default(), dir.path().join("out")).unwrap();

        let record = runner.run_lossless(&asset, 1024);
        assert_eq!(
            record.result,
            RecordResult::Verified {
                integrity: Integrity::Match
            }
        );
        assert_eq!(record.artifact_bytes, Some(10_008));
        let expected = 10_000.0 / 10_008.0;
        assert!((record.ratio.unwrap() - expected).abs() < 1e-6);
        assert!((record.encode_latency_ms.unwrap() - 3.0).abs() < 1e-9);
        assert_eq!(
            record.artifact.unwrap(),
            dir.path().join("out").join("tone.wav.b1024.lossless")
        );
    }

    #[test]
    fn corrupted_restore_fails_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_at(&write_asset(dir.path(), "tone.wav", 64));
        let codec = FakeCodec {
            tamper_decode: true,
            ..FakeCodec::default()
        };
        let runner = BenchmarkRunner::new(codec, dir.path()).unwrap();
        let record = runner.run_lossless(&asset, 32);
        assert_eq!(record.result.label(), "FAIL");
        assert!(record.result.is_failure());
    }

    #[test]
    fn events_mode_is_semantic() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_at(&write_asset(dir.path(), "tone.wav", 64));
        let codec = FakeCodec {
            tamper_decode: true,
            ..FakeCodec::default()
        };
        let runner = BenchmarkRunner::new(codec, dir.path()).unwrap();
        let record = runner.run_events(&asset, 8.0);
        assert_eq!(
            record.result,
            RecordResult::Verified {
                integrity: Integrity::Semantic
            }
        );
        assert!(!record.result.is_failure());
    }

    #[test]
    fn encode_failure_has_no_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_at(&write_asset(dir.path(), "tone.wav", 64));
        let codec = FakeCodec {
            fail_encode: true,
            ..FakeCodec::default()
        };
        let runner = BenchmarkRunner::new(codec, dir.path()).unwrap();
        let record = runner.run_events(&asset, 8.0);
        assert_eq!(record.ratio, None);
        assert_eq!(record.encode_latency_ms, None);
        assert_eq!(record.result.label(), "ENCODE TIMEOUT");
        assert_eq!(runner.codec().calls.borrow().len(), 1);
    }

    #[test]
    fn missing_artifact_after_encode_is_abnormal() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_at(&write_asset(dir.path(), "tone.wav", 64));
        let codec = FakeCodec {
            skip_output: true,
            ..FakeCodec::default()
        };
        let runner = BenchmarkRunner::new(codec, dir.path()).unwrap();
        let record = runner.run_lossless(&asset, 32);
        assert!(matches!(
            record.result,
            RecordResult::EncodeFailed {
                failure: Verdict::Abnormal { .. }
            }
        ));
    }

    #[test]
    fn leftover_artifact_does_not_count_as_encode_output() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_at(&write_asset(dir.path(), "tone.wav", 64));
        let out = dir.path().join("out");
        let codec = FakeCodec {
            skip_output: true,
            ..FakeCodec::default()
        };
        let runner = BenchmarkRunner::new(codec, &out).unwrap();
        let artifact = out.join("tone.wav.b32.lossless");
        let restored = out.join("tone.wav.b32.lossless.restored");
        fs::write(&artifact, b"NEUR\0\0\0\x01earlier run").unwrap();
        fs::write(&restored, fs::read(&asset.path).unwrap()).unwrap();

        let record = runner.run_lossless(&asset, 32);
        assert!(matches!(
            record.result,
            RecordResult::EncodeFailed {
                failure: Verdict::Abnormal { .. }
            }
        ));
        assert!(!artifact.exists());
        assert!(!restored.exists());
    }

    #[test]
    fn leftover_restored_file_cannot_pass_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_at(&write_asset(dir.path(), "tone.wav", 64));
        let codec = FakeCodec {
            skip_restore: true,
            ..FakeCodec::default()
        };
        let runner = BenchmarkRunner::new(codec, dir.path()).unwrap();
        let restored = dir.path().join("tone.wav.b32.lossless.restored");
        fs::write(&restored, fs::read(&asset.path).unwrap()).unwrap();

        let record = runner.run_lossless(&asset, 32);
        assert_eq!(
            record.result,
            RecordResult::Verified {
                integrity: Integrity::Fail
            }
        );
    }

    #[test]
    fn unremovable_output_path_is_a_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_at(&write_asset(dir.path(), "tone.wav", 64));
        fs::create_dir(dir.path().join("tone.wav.b32.lossless")).unwrap();
        let runner = BenchmarkRunner::new(FakeCodec::default(), dir.path()).unwrap();

        let record = runner.run_lossless(&asset, 32);
        assert!(matches!(
            record.result,
            RecordResult::EncodeFailed {
                failure: Verdict::LaunchFailed { .. }
            }
        ));
        assert!(runner.codec().calls.borrow().is_empty());
    }

    #[test]
    fn sweep_orders_configurations_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = write_asset(dir.path(), "a.wav", 128);
        let missing = dir.path().join("missing.wav");
        let other = write_asset(dir.path(), "b.wav", 64);
        let runner = BenchmarkRunner::new(FakeCodec::default(), dir.path().join("out")).unwrap();
        let plan = SweepPlan {
            block_size: 1024,
            thresholds: vec![10.0, 4.0, 8.0, 6.0],
        };

        let results = runner.sweep(&[present, missing.clone(), other], &plan);
        assert_eq!(results.skipped, vec![missing]);
        assert_eq!(results.records.len(), 10);

        let a: Vec<_> = results
            .records
            .iter()
            .filter(|record| record.asset == "a.wav")
            .collect();
        assert_eq!(a[0].params, EncodeParams::Lossless { block_size: 1024 });
        let thresholds: Vec<f64> = a.iter().filter_map(|record| record.params.threshold()).collect();
        assert_eq!(thresholds, vec![4.0, 6.0, 8.0, 10.0]);
        assert_eq!(results.records[5].asset, "b.wav");
    }

    #[test]
    fn chaos_runs_one_trial_per_flip_count() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_at(&write_asset(dir.path(), "tone.wav", 256));
        let runner = BenchmarkRunner::new(FakeCodec::default(), dir.path()).unwrap();
        let run = runner
            .chaos(&asset, &EncodeParams::Events { threshold: 8.0 }, &[2, 4, 6, 8, 10], Some(1))
            .unwrap();

        assert_eq!(run.base_verdict, Verdict::Stable);
        assert_eq!(
            run.base_artifact.as_deref(),
            Some(dir.path().join("tone.wav.chaos.events").as_path())
        );
        let flips: Vec<u32> = run.outcomes.iter().map(|outcome| outcome.flips).collect();
        assert_eq!(flips, vec![2, 4, 6, 8, 10]);
        assert_eq!(run.defects().count(), 0);
        for outcome in &run.outcomes {
            assert!(outcome.mutation.flips.iter().all(|flip| flip.offset >= 8));
        }
    }

    #[test]
    fn chaos_on_empty_asset_rejects_header_only_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_at(&write_asset(dir.path(), "empty.wav", 0));
        let runner = BenchmarkRunner::new(FakeCodec::default(), dir.path()).unwrap();
        let err = runner
            .chaos(&asset, &EncodeParams::Events { threshold: 8.0 }, &[2], None)
            .unwrap_err();
        assert!(matches!(err, HarnessError::Artifact(_)));
    }

    #[test]
    fn chaos_without_base_artifact_runs_no_trials() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_at(&write_asset(dir.path(), "tone.wav", 64));
        let codec = FakeCodec {
            fail_encode: true,
            ..FakeCodec::default()
        };
        let runner = BenchmarkRunner::new(codec, dir.path()).unwrap();
        let run = runner
            .chaos(&asset, &EncodeParams::Events { threshold: 8.0 }, &[2, 4], None)
            .unwrap();
        assert!(run.outcomes.is_empty());
        assert!(run.base_verdict.is_defect());
    }

    #[test]
    fn chaos_keeps_finished_trials_when_one_copy_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        let asset = asset_at(&write_asset(dir.path(), "tone.wav", 256));
        let base = dir.path().join("tone.wav.chaos.events");
        fs::create_dir(crate::chaos::corrupt_path(&base, 4, 1)).unwrap();
        let runner = BenchmarkRunner::new(FakeCodec::default(), dir.path()).unwrap();

        let run = runner
            .chaos(&asset, &EncodeParams::Events { threshold: 8.0 }, &[2, 4, 6], Some(3))
            .unwrap();
        let flips: Vec<u32> = run.outcomes.iter().map(|outcome| outcome.flips).collect();
        assert_eq!(flips, vec![2, 6]);
        assert_eq!(run.failed_trials.len(), 1);
        assert_eq!(run.failed_trials[0].flips, 4);
        assert_eq!(run.failed_trials[0].case, "Bit-Flip Attack (4 bits)");

        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["failed_trials"][0]["flips"], 4);
    }
}
