//! Classification of codec invocations.
//!
//! Exit status alone cannot separate a deliberate rejection from a crash
//! that still produced a return code, so the classification inspects how the
//! process ended:
//!
//! - exit 0 -> [`Verdict::Stable`]
//! - signal, Rust panic exit code, or Windows exception code -> [`Verdict::Abnormal`]
//! - any other nonzero exit -> [`Verdict::Caught`]
//! - timeout -> [`Verdict::TimedOut`]
//! - spawn/wait failure -> [`Verdict::LaunchFailed`]

use std::process::ExitStatus;

use serde::Serialize;

use crate::invoker::ProcessError;

/// Exit code of a Rust process that unwound out of `main` on panic.
pub const RUST_PANIC_EXIT_CODE: i32 = 101;

/// Lowest NTSTATUS error code; Windows reports crashes as these.
#[cfg(windows)]
const NTSTATUS_ERROR_BASE: u32 = 0xC000_0000;

/// Terminal classification of one codec invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Exit 0: the codec completed, degrading gracefully if input was corrupt.
    Stable,
    /// Controlled nonzero exit: the codec rejected its input safely.
    Caught { code: i32 },
    /// Crash, abort or panic.
    Abnormal { detail: String },
    /// No exit within the timeout; the process was killed.
    TimedOut { timeout_ms: u64 },
    /// The codec could not be run at all.
    LaunchFailed { detail: String },
}

impl Verdict {
    /// Table label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stable => "STABLE",
            Self::Caught { .. } => "CAUGHT",
            Self::Abnormal { .. } => "ABNORMAL",
            Self::TimedOut { .. } => "TIMEOUT",
            Self::LaunchFailed { .. } => "LAUNCH-FAILED",
        }
    }

    /// Human-readable recovery description.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Stable => "Graceful Degradation / Partial Success".to_string(),
            Self::Caught { code } => format!("Safe Error Handling / No Panic (exit {code})"),
            Self::Abnormal { detail } => format!("Abnormal Termination / {detail}"),
            Self::TimedOut { timeout_ms } => format!("Hung / killed after {timeout_ms} ms"),
            Self::LaunchFailed { detail } => format!("Codec not run / {detail}"),
        }
    }

    /// Returns `true` for classifications that indicate unsafe failure.
    #[must_use]
    pub const fn is_defect(&self) -> bool {
        matches!(
            self,
            Self::Abnormal { .. } | Self::TimedOut { .. } | Self::LaunchFailed { .. }
        )
    }
}

/// Classifies the result of one codec invocation.
pub fn classify<T>(result: &Result<T, ProcessError>) -> Verdict {
    match result {
        Ok(_) => Verdict::Stable,
        Err(err) => classify_error(err),
    }
}

/// Classifies a failed codec invocation.
pub fn classify_error(err: &ProcessError) -> Verdict {
    match err {
        ProcessError::Exited { status, .. } => classify_status(*status),
        ProcessError::TimedOut { timeout } => Verdict::TimedOut {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        },
        ProcessError::Launch { .. } | ProcessError::Wait { .. } => Verdict::LaunchFailed {
            detail: err.to_string(),
        },
    }
}

/// Classifies a process exit status.
pub fn classify_status(status: ExitStatus) -> Verdict {
    if status.success() {
        return Verdict::Stable;
    }
    if let Some(detail) = abnormal_termination(status) {
        return Verdict::Abnormal { detail };
    }
    match status.code() {
        Some(RUST_PANIC_EXIT_CODE) => Verdict::Abnormal {
            detail: format!("panicked (exit {RUST_PANIC_EXIT_CODE})"),
        },
        Some(code) => Verdict::Caught { code },
        None => Verdict::Abnormal {
            detail: format!("terminated without exit code ({status})"),
        },
    }
}

#[cfg(unix)]
fn abnormal_termination(status: ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    status.signal().map(|signal| {
        if status.core_dumped() {
            format!("signal {signal} (core dumped)")
        } else {
            format!("signal {signal}")
        }
    })
}

#[cfg(windows)]
fn abnormal_termination(status: ExitStatus) -> Option<String> {
    // Exception codes come back as negative i32 exit codes.
    let code = status.code()? as u32;
    (code >= NTSTATUS_ERROR_BASE).then(|| format!("exception 0x{code:08X}"))
}

#[cfg(not(any(unix, windows)))]
fn abnormal_termination(_status: ExitStatus) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    #[test]
    fn success_is_stable() {
        let result: Result<(), ProcessError> = Ok(());
        assert_eq!(classify(&result), Verdict::Stable);
    }

    #[test]
    fn timeout_is_a_defect() {
        let verdict = classify_error(&ProcessError::TimedOut {
            timeout: Duration::from_millis(1500),
        });
        assert_eq!(verdict, Verdict::TimedOut { timeout_ms: 1500 });
        assert!(verdict.is_defect());
        assert_eq!(verdict.label(), "TIMEOUT");
    }

    #[test]
    fn launch_failure_is_a_defect() {
        let verdict = classify_error(&ProcessError::Launch {
            program: "codec".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        });
        assert!(matches!(verdict, Verdict::LaunchFailed { .. }));
        assert!(verdict.is_defect());
    }

    #[test]
    fn labels_and_details() {
        assert_eq!(Verdict::Stable.label(), "STABLE");
        assert!(Verdict::Stable.detail().contains("Graceful Degradation"));
        let caught = Verdict::Caught { code: 1 };
        assert_eq!(caught.label(), "CAUGHT");
        assert!(caught.detail().contains("No Panic"));
        assert!(!caught.is_defect());
    }

    #[test]
    fn verdict_serializes_with_tag() {
        let json = serde_json::to_value(Verdict::Caught { code: 2 }).unwrap();
        assert_eq!(json["verdict"], "caught");
        assert_eq!(json["code"], 2);
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;
        use std::os::unix::process::ExitStatusExt;

        #[test]
        fn controlled_exit_is_caught() {
            let verdict = classify_status(ExitStatus::from_raw(1 << 8));
            assert_eq!(verdict, Verdict::Caught { code: 1 });
        }

        #[test]
        fn panic_exit_code_is_abnormal() {
            let verdict = classify_status(ExitStatus::from_raw(101 << 8));
            assert!(matches!(verdict, Verdict::Abnormal { .. }));
        }

        #[test]
        fn signal_is_abnormal() {
            // SIGSEGV
            let verdict = classify_status(ExitStatus::from_raw(11));
            match verdict {
                Verdict::Abnormal { detail } => assert!(detail.contains("signal 11")),
                other => panic!("unexpected verdict {other:?}"),
            }
        }

        #[test]
        fn zero_status_is_stable() {
            assert_eq!(classify_status(ExitStatus::from_raw(0)), Verdict::Stable);
        }
    }
}
