//! Invocation boundary for the external codec.
//!
//! The codec is never linked in-process. [`CodecInvoker`] is the capability
//! the runner depends on; [`ProcessInvoker`] backs it with a child process
//! bounded by an explicit timeout.

use std::ffi::OsString;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use artifact::CodecMode;
use serde::Serialize;

/// How long output pipes may stay open after the codec exited.
const OUTPUT_GRACE: Duration = Duration::from_millis(250);

/// How long a killed codec gets to be reaped.
#[cfg(unix)]
const REAP_GRACE: Duration = Duration::from_secs(1);

/// First sleep between exit polls.
#[cfg(not(unix))]
const POLL_MIN: Duration = Duration::from_micros(50);

/// Longest sleep between exit polls.
#[cfg(not(unix))]
const POLL_MAX: Duration = Duration::from_millis(2);

/// Exit status of the child and the instant it was reaped.
#[cfg(unix)]
type Exit = (io::Result<ExitStatus>, Instant);

/// Mode plus mode-specific parameters of one encode call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum EncodeParams {
    Lossless { block_size: u32 },
    Events { threshold: f64 },
}

impl EncodeParams {
    #[must_use]
    pub const fn mode(&self) -> CodecMode {
        match self {
            Self::Lossless { .. } => CodecMode::Lossless,
            Self::Events { .. } => CodecMode::Events,
        }
    }

    /// Threshold for events mode.
    #[must_use]
    pub const fn threshold(&self) -> Option<f64> {
        match self {
            Self::Lossless { .. } => None,
            Self::Events { threshold } => Some(*threshold),
        }
    }

    /// Trailing encode arguments of the codec command line.
    #[must_use]
    pub fn cli_args(&self) -> Vec<String> {
        let mut args = vec!["--mode".to_string(), self.mode().as_str().to_string()];
        match self {
            Self::Lossless { block_size } => {
                args.push("--block-size".to_string());
                args.push(block_size.to_string());
            }
            Self::Events { threshold } => {
                args.push("--threshold".to_string());
                args.push(format!("{threshold:?}"));
            }
        }
        args
    }

    /// Short parameter label, e.g. `B:1024` or `T:8.0`.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Lossless { block_size } => format!("B:{block_size}"),
            Self::Events { threshold } => format!("T:{threshold:?}"),
        }
    }

    /// File-name fragment identifying this parameter set.
    #[must_use]
    pub fn file_tag(&self) -> String {
        match self {
            Self::Lossless { block_size } => format!("b{block_size}.lossless"),
            Self::Events { threshold } => format!("t{threshold:?}.events"),
        }
    }
}

/// Successful encode call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    pub path: PathBuf,
    /// Wall-clock time of the invocation alone.
    pub elapsed: Duration,
}

/// Successful decode call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredFile {
    pub path: PathBuf,
    /// Wall-clock time of the invocation alone.
    pub elapsed: Duration,
}

/// Codec invocation failures.
#[derive(Debug)]
#[non_exhaustive]
pub enum ProcessError {
    /// The codec could not be started.
    Launch { program: PathBuf, source: io::Error },

    /// Waiting on the running codec failed.
    Wait { source: io::Error },

    /// The codec terminated without success.
    Exited {
        status: ExitStatus,
        stderr: String,
        elapsed: Duration,
    },

    /// The codec did not terminate in time and was killed.
    TimedOut { timeout: Duration },
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch { program, source } => {
                write!(f, "failed to launch {}: {source}", program.display())
            }
            Self::Wait { source } => write!(f, "failed to wait on codec: {source}"),
            Self::Exited { status, stderr, .. } => {
                if stderr.is_empty() {
                    write!(f, "codec exited with {status}")
                } else {
                    write!(f, "codec exited with {status}: {stderr}")
                }
            }
            Self::TimedOut { timeout } => {
                write!(f, "codec timed out after {} ms", timeout.as_millis())
            }
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Launch { source, .. } | Self::Wait { source } => Some(source),
            _ => None,
        }
    }
}

/// Capability to run the codec's encode and decode operations.
pub trait CodecInvoker {
    /// Encodes `input` into `output`.
    fn encode(
        &self,
        input: &Path,
        output: &Path,
        params: &EncodeParams,
    ) -> Result<EncodedArtifact, ProcessError>;

    /// Decodes `input` into `output`.
    fn decode(&self, input: &Path, output: &Path) -> Result<RestoredFile, ProcessError>;
}

impl<T: CodecInvoker + ?Sized> CodecInvoker for &T {
    fn encode(
        &self,
        input: &Path,
        output: &Path,
        params: &EncodeParams,
    ) -> Result<EncodedArtifact, ProcessError> {
        (**self).encode(input, output, params)
    }

    fn decode(&self, input: &Path, output: &Path) -> Result<RestoredFile, ProcessError> {
        (**self).decode(input, output)
    }
}

/// Runs the codec as a child process, one blocking call at a time.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    program: PathBuf,
    leading_args: Vec<OsString>,
    timeout: Duration,
}

struct Completed {
    status: ExitStatus,
    elapsed: Duration,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl ProcessInvoker {
    /// Creates an invoker for `program` with a per-call timeout.
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            timeout,
        }
    }

    /// Arguments placed before `encode`/`decode` on every call.
    #[must_use]
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn run(&self, args: &[OsString]) -> Result<Completed, ProcessError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| ProcessError::Launch {
            program: self.program.clone(),
            source,
        })?;
        // Pipes are drained off-thread so a chatty codec cannot block on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (status, exited_at) = self.wait_bounded(child, start + self.timeout)?;
        // A background process spawned by the codec may inherit the pipes and
        // keep them open; its output is abandoned instead of waited for.
        let settle = exited_at + OUTPUT_GRACE;
        let stdout = collect(stdout, settle);
        let stderr = collect(stderr, settle);
        if stdout.is_none() || stderr.is_none() {
            tracing::warn!(
                program = %self.program.display(),
                "codec output still open after exit, output dropped"
            );
        }

        Ok(Completed {
            status,
            elapsed: exited_at.duration_since(start),
            stdout: stdout.unwrap_or_default(),
            stderr: stderr.unwrap_or_default(),
        })
    }

    /// Waits for exit on a dedicated thread, so the exit instant is taken as
    /// soon as the child is reaped.
    #[cfg(unix)]
    fn wait_bounded(
        &self,
        child: Child,
        deadline: Instant,
    ) -> Result<(ExitStatus, Instant), ProcessError> {
        let pid = child.id();
        let exited = wait_on(child);
        match exited.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok((status, at)) => status
                .map(|status| (status, at))
                .map_err(|source| ProcessError::Wait { source }),
            Err(RecvTimeoutError::Timeout) => {
                terminate(pid);
                let _ = exited.recv_timeout(REAP_GRACE);
                self.timed_out()
            }
            Err(RecvTimeoutError::Disconnected) => Err(ProcessError::Wait {
                source: io::Error::other("exit waiter stopped without a status"),
            }),
        }
    }

    #[cfg(not(unix))]
    fn wait_bounded(
        &self,
        mut child: Child,
        deadline: Instant,
    ) -> Result<(ExitStatus, Instant), ProcessError> {
        let mut backoff = POLL_MIN;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok((status, Instant::now())),
                Ok(None) => {}
                Err(source) => {
                    reap(&mut child);
                    return Err(ProcessError::Wait { source });
                }
            }
            let now = Instant::now();
            if now >= deadline {
                reap(&mut child);
                return self.timed_out();
            }
            thread::sleep(backoff.min(deadline - now));
            backoff = (backoff * 2).min(POLL_MAX);
        }
    }

    fn timed_out<T>(&self) -> Result<T, ProcessError> {
        tracing::warn!(
            program = %self.program.display(),
            timeout_ms = self.timeout.as_millis() as u64,
            "codec killed after timeout"
        );
        Err(ProcessError::TimedOut {
            timeout: self.timeout,
        })
    }

    fn checked(&self, operation: &str, args: Vec<OsString>) -> Result<Duration, ProcessError> {
        let completed = self.run(&args)?;
        let stdout = String::from_utf8_lossy(&completed.stdout);
        tracing::debug!(
            operation,
            status = %completed.status,
            elapsed_ms = completed.elapsed.as_secs_f64() * 1000.0,
            stdout = %stdout.trim(),
            "codec call finished"
        );
        if completed.status.success() {
            Ok(completed.elapsed)
        } else {
            Err(ProcessError::Exited {
                status: completed.status,
                stderr: String::from_utf8_lossy(&completed.stderr).trim().to_string(),
                elapsed: completed.elapsed,
            })
        }
    }
}

impl CodecInvoker for ProcessInvoker {
    fn encode(
        &self,
        input: &Path,
        output: &Path,
        params: &EncodeParams,
    ) -> Result<EncodedArtifact, ProcessError> {
        let mut args: Vec<OsString> = vec![
            "encode".into(),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
        ];
        args.extend(params.cli_args().into_iter().map(OsString::from));
        let elapsed = self.checked("encode", args)?;
        Ok(EncodedArtifact {
            path: output.to_path_buf(),
            elapsed,
        })
    }

    fn decode(&self, input: &Path, output: &Path) -> Result<RestoredFile, ProcessError> {
        let args: Vec<OsString> = vec![
            "decode".into(),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
        ];
        let elapsed = self.checked("decode", args)?;
        Ok(RestoredFile {
            path: output.to_path_buf(),
            elapsed,
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
        rx
    })
}

/// Output of a drained pipe, or `None` if it is still open at `until`.
fn collect(output: Option<Receiver<Vec<u8>>>, until: Instant) -> Option<Vec<u8>> {
    let Some(output) = output else {
        return Some(Vec::new());
    };
    match output.recv_timeout(until.saturating_duration_since(Instant::now())) {
        Ok(buf) => Some(buf),
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

#[cfg(unix)]
fn wait_on(mut child: Child) -> Receiver<Exit> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let status = child.wait();
        let _ = tx.send((status, Instant::now()));
    });
    rx
}

#[cfg(unix)]
fn terminate(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Ok(pid) = i32::try_from(pid) {
        let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
