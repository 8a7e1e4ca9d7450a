// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running one attempt of the test binary.
//!
//! The retry engine never spawns processes itself. It hands a [`RunRequest`] to a
//! [`TestExecutor`] and gets a [`RunOutcome`] back, which keeps the engine testable without real
//! processes.

mod process;

pub use process::ProcessExecutor;

use crate::errors::ExecuteError;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use qtest_log::{ParseError, ParseErrorKind, TestCaseId, TestLog};
use std::{fmt, io, process::ExitStatus, time::Duration};

/// Everything needed to run one attempt.
#[derive(Clone, Debug)]
pub struct RunRequest {
    /// The attempt number, starting from 1.
    pub attempt: u32,

    /// What this attempt is for.
    pub kind: AttemptKind,

    /// The argument vector. The first element is the program.
    pub args: Vec<String>,

    /// Environment variables set on top of the inherited environment.
    pub env: IndexMap<String, String>,

    /// The working directory, or `None` to inherit it.
    pub cwd: Option<Utf8PathBuf>,

    /// The log file the attempt is expected to write, or `None` if no log is expected.
    pub log_path: Option<Utf8PathBuf>,

    /// The attempt is killed if it runs longer than this.
    pub timeout: Option<Duration>,
}

/// What an attempt is for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptKind {
    /// The whole test binary.
    FullRun,

    /// A single test case, to confirm whether its failure is real.
    Rerun {
        /// The test case being rerun.
        test_case: TestCaseId,

        /// Which rerun of this test case this is, starting from 1.
        rerun: u32,

        /// The rerun budget for this test case.
        budget: u32,

        /// Whether verbose arguments and environment are set.
        verbose: bool,
    },
}

/// Runs attempts.
pub trait TestExecutor {
    /// Runs one attempt to completion, or until its timeout.
    ///
    /// Errors are reserved for failures of the executor itself, such as a program that cannot
    /// be spawned. Anything the test binary does is reported through the [`RunOutcome`].
    fn execute(&mut self, request: &RunRequest) -> Result<RunOutcome, ExecuteError>;
}

impl<E: TestExecutor + ?Sized> TestExecutor for &mut E {
    fn execute(&mut self, request: &RunRequest) -> Result<RunOutcome, ExecuteError> {
        (**self).execute(request)
    }
}

/// The result of one attempt.
#[derive(Debug)]
pub struct RunOutcome {
    /// How the process ended.
    pub exit: ChildExit,

    /// The state of the attempt's log file after the process ended.
    pub log: LogState,

    /// Combined standard output and standard error.
    pub output: Vec<u8>,

    /// How long the attempt took.
    pub duration: Duration,
}

/// How a child process ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChildExit {
    /// The process exited with a code in `0..=127`.
    Exited(i32),

    /// The process was terminated by a signal, or exited with a code outside `0..=127`.
    Abnormal {
        /// The exit code, if there was one.
        code: Option<i32>,

        /// The signal that terminated the process, if any.
        signal: Option<i32>,
    },

    /// The process ran past its deadline and was killed.
    TimedOut,
}

impl ChildExit {
    /// Maps an exit status.
    ///
    /// Codes of 128 and above are what shells report for signal deaths, and negative codes are
    /// what Windows reports for unhandled exceptions. Both count as abnormal.
    pub fn from_status(status: ExitStatus) -> Self {
        let signal = signal_of(status);
        match status.code() {
            Some(code) if (0..128).contains(&code) && signal.is_none() => Self::Exited(code),
            code => Self::Abnormal { code, signal },
        }
    }

    /// Returns the exit code, if the process exited with one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Abnormal { code, .. } => *code,
            Self::TimedOut => None,
        }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "Test process exited with code {code}"),
            Self::Abnormal {
                signal: Some(signal),
                ..
            } => {
                write!(f, "Test process was killed by signal {signal}")?;
                #[cfg(unix)]
                {
                    if let Some(name) = crate::helpers::signal_str(*signal) {
                        write!(f, " (SIG{name})")?;
                    }
                }
                Ok(())
            }
            Self::Abnormal {
                code: Some(code), ..
            } => write!(f, "Test process exited with code {code}"),
            Self::Abnormal {
                code: None,
                signal: None,
            } => write!(f, "Test process exited with an unknown status"),
            Self::TimedOut => write!(f, "Test process timed out and was killed"),
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn signal_of(status: ExitStatus) -> Option<i32> {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        }
    } else {
        fn signal_of(_status: ExitStatus) -> Option<i32> {
            None
        }
    }
}

/// The state of an attempt's log file.
#[derive(Debug)]
pub enum LogState {
    /// The attempt was not asked to write a log.
    NotExpected,

    /// The log file does not exist.
    Missing,

    /// The log file exists but could not be parsed.
    Unreadable(ParseError),

    /// The log was parsed.
    Parsed(TestLog),
}

impl LogState {
    /// Loads the log at `path`.
    pub fn load(path: &Utf8Path) -> Self {
        match TestLog::parse_file(path) {
            Ok(log) => Self::Parsed(log),
            Err(err) => match err.kind() {
                ParseErrorKind::Read(io_err) if io_err.kind() == io::ErrorKind::NotFound => {
                    Self::Missing
                }
                _ => Self::Unreadable(err),
            },
        }
    }

    /// Returns the parsed log, if any.
    pub fn log(&self) -> Option<&TestLog> {
        match self {
            Self::Parsed(log) => Some(log),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;

    #[test]
    fn load_log_states() {
        let dir = Utf8TempDir::new().expect("created temp dir");

        let missing = dir.path().join("missing.xml");
        assert!(matches!(LogState::load(&missing), LogState::Missing));

        let garbage = dir.path().join("garbage.xml");
        std::fs::write(&garbage, "<TestResults/>").expect("wrote log");
        assert!(matches!(LogState::load(&garbage), LogState::Unreadable(_)));

        let good = dir.path().join("good.xml");
        std::fs::write(
            &good,
            r#"<TestCase name="tst_foo"><TestFunction name="works"><Incident type="pass"/></TestFunction></TestCase>"#,
        )
        .expect("wrote log");
        let state = LogState::load(&good);
        let log = state.log().expect("parsed");
        assert_eq!(log.functions.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_mapping() {
        use std::os::unix::process::ExitStatusExt;

        // Raw wait statuses: the exit code lives in the second byte, the signal in the first.
        assert_eq!(
            ChildExit::from_status(ExitStatus::from_raw(0)),
            ChildExit::Exited(0)
        );
        assert_eq!(
            ChildExit::from_status(ExitStatus::from_raw(2 << 8)),
            ChildExit::Exited(2)
        );
        assert_eq!(
            ChildExit::from_status(ExitStatus::from_raw(134 << 8)),
            ChildExit::Abnormal {
                code: Some(134),
                signal: None
            }
        );
        assert_eq!(
            ChildExit::from_status(ExitStatus::from_raw(6)),
            ChildExit::Abnormal {
                code: None,
                signal: Some(6)
            }
        );
    }

    #[test]
    fn exit_display() {
        assert_eq!(
            ChildExit::Exited(1).to_string(),
            "Test process exited with code 1"
        );
        assert_eq!(
            ChildExit::TimedOut.to_string(),
            "Test process timed out and was killed"
        );
        #[cfg(unix)]
        assert_eq!(
            ChildExit::Abnormal {
                code: None,
                signal: Some(11)
            }
            .to_string(),
            "Test process was killed by signal 11 (SIGSEGV)"
        );
    }
}
