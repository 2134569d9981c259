//! Run configuration.
//!
//! Loaded from a JSON file (every field optional) and then overridden by
//! command-line flags. [`HarnessConfig::validate`] runs after overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use artifact::CodecMode;
use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};
use crate::invoker::{EncodeParams, ProcessInvoker};
use crate::runner::SweepPlan;

/// Threshold sweep of the multi-asset benchmark.
pub const DEFAULT_THRESHOLDS: [f64; 4] = [4.0, 6.0, 8.0, 10.0];

/// Flip counts of the chaos trials.
pub const DEFAULT_CHAOS_FLIPS: [u32; 5] = [2, 4, 6, 8, 10];

/// Explicit configuration of one harness run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Codec executable.
    pub codec: PathBuf,
    /// Arguments placed before `encode`/`decode`.
    pub codec_args: Vec<String>,
    /// Assets in declared order.
    pub assets: Vec<PathBuf>,
    /// Directory scanned for further assets.
    pub asset_dir: Option<PathBuf>,
    /// File-name filter for `asset_dir`.
    pub asset_glob: Option<String>,
    pub out_dir: PathBuf,
    /// Lossless block size.
    pub block_size: u32,
    /// Events-mode sweep, strictly ascending.
    pub thresholds: Vec<f64>,
    /// Events threshold of the single-point benchmark.
    pub benchmark_threshold: f64,
    pub chaos_flips: Vec<u32>,
    pub chaos_mode: CodecMode,
    pub chaos_threshold: f64,
    /// Per-invocation bound on the codec process.
    pub timeout_ms: u64,
    /// Seeds chaos trials for reproducible corruption.
    pub seed: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            codec: PathBuf::from("refcodec"),
            codec_args: Vec::new(),
            assets: Vec::new(),
            asset_dir: None,
            asset_glob: None,
            out_dir: PathBuf::from("target/chaosbench"),
            block_size: 1024,
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
            benchmark_threshold: 8.0,
            chaos_flips: DEFAULT_CHAOS_FLIPS.to_vec(),
            chaos_mode: CodecMode::Events,
            chaos_threshold: 8.0,
            timeout_ms: 30_000,
            seed: None,
        }
    }
}

impl HarnessConfig {
    /// Reads a JSON configuration file.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let contents = fs::read_to_string(path).map_err(|err| HarnessError::io(path, err))?;
        serde_json::from_str(&contents).map_err(|err| HarnessError::json(path, err))
    }

    /// Rejects configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.thresholds.is_empty() {
            return Err(config_error("threshold sweep is empty"));
        }
        if let Some(bad) = self.thresholds.iter().find(|value| !value.is_finite()) {
            return Err(config_error(format!("threshold {bad} is not finite")));
        }
        if let Some(pair) = self.thresholds.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(config_error(format!(
                "thresholds must be strictly ascending ({} then {})",
                pair[0], pair[1]
            )));
        }
        if !self.benchmark_threshold.is_finite() || !self.chaos_threshold.is_finite() {
            return Err(config_error("benchmark and chaos thresholds must be finite"));
        }
        if self.chaos_flips.is_empty() {
            return Err(config_error("chaos flip counts are empty"));
        }
        if self.chaos_flips.contains(&0) {
            return Err(config_error("chaos flip counts must be at least 1"));
        }
        if self.block_size == 0 {
            return Err(config_error("block size must be positive"));
        }
        if self.timeout_ms == 0 {
            return Err(config_error("timeout must be positive"));
        }
        if let Some(glob) = &self.asset_glob {
            Pattern::new(glob)
                .map_err(|err| config_error(format!("invalid asset glob {glob:?}: {err}")))?;
        }
        Ok(())
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn sweep_plan(&self) -> SweepPlan {
        SweepPlan {
            block_size: self.block_size,
            thresholds: self.thresholds.clone(),
        }
    }

    /// Encode parameters of the chaos base artifact.
    #[must_use]
    pub const fn chaos_params(&self) -> EncodeParams {
        match self.chaos_mode {
            CodecMode::Lossless => EncodeParams::Lossless {
                block_size: self.block_size,
            },
            CodecMode::Events => EncodeParams::Events {
                threshold: self.chaos_threshold,
            },
        }
    }

    /// Codec invoker bounded by the configured timeout.
    #[must_use]
    pub fn invoker(&self) -> ProcessInvoker {
        ProcessInvoker::new(&self.codec, self.timeout()).with_leading_args(&self.codec_args)
    }

    /// Explicit assets followed by `asset_dir` entries matching `asset_glob`,
    /// sorted by name.
    pub fn resolve_assets(&self) -> HarnessResult<Vec<PathBuf>> {
        let mut assets = self.assets.clone();
        let Some(dir) = &self.asset_dir else {
            return Ok(assets);
        };
        let pattern = self
            .asset_glob
            .as_deref()
            .map(Pattern::new)
            .transpose()
            .map_err(|err| config_error(format!("invalid asset glob: {err}")))?;

        let mut found = Vec::new();
        for entry in fs::read_dir(dir).map_err(|err| HarnessError::io(dir, err))? {
            let path = entry.map_err(|err| HarnessError::io(dir, err))?.path();
            if !path.is_file() {
                continue;
            }
            let matches = pattern.as_ref().map_or(true, |pattern| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| pattern.matches(name))
            });
            if matches && !assets.contains(&path) {
                found.push(path);
            }
        }
        found.sort();
        assets.extend(found);
        Ok(assets)
    }
}

fn config_error(msg: impl Into<String>) -> HarnessError {
    HarnessError::Config(msg.into())
}
