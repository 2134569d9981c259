use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use artifact::CodecMode;
use clap::{Parser, Subcommand, ValueEnum};
use harness::report::{
    load_sweep_report, render_benchmark_table, render_chaos_table, render_sweep_points,
    sweep_points, write_chaos_report, write_sweep_report,
};
use harness::runner::load_assets;
use harness::{
    BenchmarkRecord, BenchmarkRunner, ChaosRun, HarnessConfig, ProcessInvoker, RunSummary,
};

#[derive(Parser)]
#[command(
    name = "chaosbench",
    version,
    about = "Benchmark, round-trip and chaos harness for command-line audio codecs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// JSON configuration file; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Codec executable.
    #[arg(long, global = true)]
    codec: Option<PathBuf>,
    /// Argument placed before encode/decode (repeatable).
    #[arg(long = "codec-arg", global = true, allow_hyphen_values = true)]
    codec_args: Vec<String>,
    /// Input asset (repeatable, processed in order).
    #[arg(long = "asset", global = true)]
    assets: Vec<PathBuf>,
    /// Directory scanned for further assets.
    #[arg(long, global = true)]
    asset_dir: Option<PathBuf>,
    /// File-name glob applied to --asset-dir entries.
    #[arg(long, global = true)]
    asset_glob: Option<String>,
    /// Output directory for artifacts and reports.
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,
    /// Lossless block size.
    #[arg(long, global = true)]
    block_size: Option<u32>,
    /// Per-invocation timeout of the codec process.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    /// RNG seed for reproducible chaos trials.
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Exit nonzero on integrity failures, failed invocations or chaos defects.
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Lossless baseline plus a single events threshold per asset.
    Benchmark {
        /// Events threshold.
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Lossless baseline plus the events threshold sweep, with a JSON report.
    Sweep {
        /// Comma-separated ascending thresholds.
        #[arg(long, value_delimiter = ',')]
        thresholds: Vec<f64>,
    },
    /// Bit-flip trials against a clean artifact of each asset.
    Chaos {
        /// Comma-separated flip counts, one trial each.
        #[arg(long, value_delimiter = ',')]
        flips: Vec<u32>,
        /// Mode of the base artifact.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Threshold of an events-mode base artifact.
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Sweep followed by chaos.
    All,
    /// Render a saved sweep report.
    Report {
        /// Path to sweep_report.json.
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Lossless,
    Events,
}

impl From<ModeArg> for CodecMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Lossless => Self::Lossless,
            ModeArg::Events => Self::Events,
        }
    }
}

#[derive(Default)]
struct Results {
    records: Vec<BenchmarkRecord>,
    runs: Vec<ChaosRun>,
    aborted_chaos: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    harness::logging::init_logging(cli.verbose);

    if let Command::Report { path } = &cli.command {
        return print_saved_report(path);
    }

    let config = build_config(&cli)?;
    let assets = config.resolve_assets().context("resolve assets")?;
    if assets.is_empty() {
        bail!("no assets given; pass --asset or --asset-dir");
    }
    let runner = BenchmarkRunner::new(config.invoker(), &config.out_dir)
        .with_context(|| format!("create output dir {}", config.out_dir.display()))?;

    let mut results = Results::default();
    match &cli.command {
        Command::Benchmark { .. } => benchmark(&runner, &config, &assets, &mut results),
        Command::Sweep { .. } => sweep(&runner, &config, &assets, &mut results)?,
        Command::Chaos { .. } => chaos(&runner, &config, &assets, &mut results)?,
        Command::All => {
            sweep(&runner, &config, &assets, &mut results)?;
            chaos(&runner, &config, &assets, &mut results)?;
        }
        Command::Report { .. } => {}
    }

    let summary = RunSummary::from_results(&results.records, &results.runs);
    println!("{summary}");
    if results.aborted_chaos > 0 {
        println!("{} chaos runs aborted", results.aborted_chaos);
    }
    if cli.strict && (!summary.is_clean() || results.aborted_chaos > 0) {
        bail!("run not clean: {summary}");
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    if let Some(codec) = &cli.codec {
        config.codec.clone_from(codec);
    }
    if !cli.codec_args.is_empty() {
        config.codec_args.clone_from(&cli.codec_args);
    }
    if !cli.assets.is_empty() {
        config.assets.clone_from(&cli.assets);
    }
    if let Some(dir) = &cli.asset_dir {
        config.asset_dir = Some(dir.clone());
    }
    if let Some(glob) = &cli.asset_glob {
        config.asset_glob = Some(glob.clone());
    }
    if let Some(out_dir) = &cli.out_dir {
        config.out_dir.clone_from(out_dir);
    }
    if let Some(block_size) = cli.block_size {
        config.block_size = block_size;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    match &cli.command {
        Command::Benchmark {
            threshold: Some(threshold),
        } => config.benchmark_threshold = *threshold,
        Command::Sweep { thresholds } if !thresholds.is_empty() => {
            config.thresholds.clone_from(thresholds);
        }
        Command::Chaos {
            flips,
            mode,
            threshold,
        } => {
            if !flips.is_empty() {
                config.chaos_flips.clone_from(flips);
            }
            if let Some(mode) = mode {
                config.chaos_mode = (*mode).into();
            }
            if let Some(threshold) = threshold {
                config.chaos_threshold = *threshold;
            }
        }
        _ => {}
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn benchmark(
    runner: &BenchmarkRunner<ProcessInvoker>,
    config: &HarnessConfig,
    assets: &[PathBuf],
    results: &mut Results,
) {
    for asset in load_assets(assets).assets {
        results
            .records
            .push(runner.run_lossless(&asset, config.block_size));
        results
            .records
            .push(runner.run_events(&asset, config.benchmark_threshold));
    }
    print!("{}", render_benchmark_table(&results.records));
}

fn sweep(
    runner: &BenchmarkRunner<ProcessInvoker>,
    config: &HarnessConfig,
    assets: &[PathBuf],
    results: &mut Results,
) -> Result<()> {
    let sweep = runner.sweep(assets, &config.sweep_plan());
    print!("{}", render_benchmark_table(&sweep.records));
    let path = write_sweep_report(runner.out_dir(), &sweep_points(&sweep.records))
        .context("write sweep report")?;
    println!("sweep report: {}", path.display());
    results.records.extend(sweep.records);
    Ok(())
}

fn chaos(
    runner: &BenchmarkRunner<ProcessInvoker>,
    config: &HarnessConfig,
    assets: &[PathBuf],
    results: &mut Results,
) -> Result<()> {
    let params = config.chaos_params();
    for asset in load_assets(assets).assets {
        match runner.chaos(&asset, &params, &config.chaos_flips, config.seed) {
            Ok(run) => {
                print!("{}", render_chaos_table(&run));
                results.runs.push(run);
            }
            Err(err) => {
                tracing::error!(asset = %asset.name, error = %err, "chaos run aborted");
                results.aborted_chaos += 1;
            }
        }
    }
    let path = write_chaos_report(runner.out_dir(), &results.runs).context("write chaos report")?;
    println!("chaos report: {}", path.display());
    Ok(())
}

fn print_saved_report(path: &Path) -> Result<()> {
    let points =
        load_sweep_report(path).with_context(|| format!("read sweep report {}", path.display()))?;
    print!("{}", render_sweep_points(&points));
    Ok(())
}
