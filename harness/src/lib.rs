//! Benchmark, round-trip and chaos harness for command-line audio codecs.
//!
//! The codec under test is a black box reached only through its
//! `encode <in> <out> [..]` / `decode <in> <out>` command line. This crate
//! provides:
//!
//! - A bounded process invoker behind the [`CodecInvoker`] capability
//! - Streaming digests as the round-trip oracle ([`checksum`])
//! - Header-safe bit-flip injection and chaos trials ([`chaos`])
//! - Benchmark cycles and threshold sweeps ([`BenchmarkRunner`])
//! - Fixed-width tables and JSON reports ([`report`])
//!
//! # Design Principles
//!
//! - **Failures are data** - Codec failures become [`Verdict`]s in the report, never aborts.
//! - **Nothing hangs** - Every codec call has a timeout; expiry is its own verdict.
//! - **Header is sacred** - Corruption targets only the payload, so rejections are attributable.
//! - **Measure the call** - Latency is the invocation alone, excluding size lookups and digesting.

pub mod asset;
pub mod chaos;
pub mod checksum;
pub mod config;
mod error;
pub mod invoker;
pub mod logging;
pub mod outcome;
pub mod report;
pub mod runner;

pub use asset::{compression_ratio, CompressionArtifact, TestAsset};
pub use chaos::{corrupt_bytes, inject, BitFlip, ChaosMutation, ChaosOutcome};
pub use checksum::{digest_file, verify_round_trip, Digest, Integrity};
pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use invoker::{CodecInvoker, EncodeParams, ProcessError, ProcessInvoker};
pub use outcome::{classify, Verdict};
pub use report::{RunSummary, SweepPoint};
pub use runner::{
    BenchmarkRecord, BenchmarkRunner, ChaosRun, RecordResult, SweepPlan, SweepResults,
    TrialFailure,
};
