use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use artifact::CodecMode;
use clap::{Parser, Subcommand, ValueEnum};
use refcodec::{
    decode_artifact, encode_artifact, DecodeLimits, EncodeOptions, DEFAULT_BLOCK_SIZE,
    DEFAULT_THRESHOLD,
};

#[derive(Parser)]
#[command(
    name = "refcodec",
    version,
    about = "Reference codec for the chaosbench harness"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress a file into an artifact.
    Encode {
        /// File to compress.
        input: PathBuf,
        /// Artifact to write.
        output: PathBuf,
        /// Compression mode.
        #[arg(short, long, value_enum, default_value_t = ModeArg::Events)]
        mode: ModeArg,
        /// Block size in bytes (lossless mode).
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: u32,
        /// Event threshold (events mode).
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f32,
    },
    /// Restore a file from an artifact.
    Decode {
        /// Artifact to read.
        input: PathBuf,
        /// Restored file to write.
        output: PathBuf,
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

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Encode {
            input,
            output,
            mode,
            block_size,
            threshold,
        } => {
            let bytes =
                fs::read(&input).with_context(|| format!("read input {}", input.display()))?;
            let options = EncodeOptions {
                mode: mode.into(),
                block_size,
                threshold,
            };
            let encoded = encode_artifact(&bytes, &options)
                .with_context(|| format!("encode {}", input.display()))?;
            fs::write(&output, &encoded)
                .with_context(|| format!("write artifact {}", output.display()))?;
            println!(
                "{}: {} -> {} bytes ({})",
                options.mode,
                bytes.len(),
                encoded.len(),
                output.display()
            );
        }
        Command::Decode { input, output } => {
            let bytes =
                fs::read(&input).with_context(|| format!("read artifact {}", input.display()))?;
            let restored = decode_artifact(&bytes, &DecodeLimits::default())
                .with_context(|| format!("decode {}", input.display()))?;
            fs::write(&output, &restored)
                .with_context(|| format!("write restored {}", output.display()))?;
            println!("restored {} bytes ({})", restored.len(), output.display());
        }
    }
    Ok(())
}
