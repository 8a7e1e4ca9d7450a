// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::runner::{ChildExit, LogState};
use qtest_log::{TestCaseId, TestLog};
use std::{collections::BTreeSet, error::Error, fmt};

/// What one attempt showed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Everything that ran passed.
    Passed,

    /// These test cases failed, and the log can be trusted.
    FunctionsFailed(Vec<TestCaseId>),

    /// No log was expected and the process exited with a non-zero code.
    ExecutableFailed {
        /// The exit code.
        code: i32,
    },

    /// The attempt crashed, or its results cannot be trusted.
    Crashed(CrashReason),
}

/// Why an attempt was classified as a crash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CrashReason {
    /// The attempt ran past its timeout.
    TimedOut,

    /// The process died from a signal, or exited with an out-of-range code.
    AbnormalExit {
        /// The exit code, if any.
        code: Option<i32>,

        /// The terminating signal, if any.
        signal: Option<i32>,
    },

    /// No log was written.
    MissingLog,

    /// The log could not be parsed.
    UnreadableLog {
        /// The parse error, with its causes.
        message: String,
    },

    /// The log contains no test functions.
    EmptyLog,

    /// A test function logged a fatal message.
    FatalMessage {
        /// The function that logged the message.
        function: String,

        /// The message.
        message: String,
    },

    /// The exit code and the log disagree.
    ExitCodeMismatch {
        /// The exit code.
        code: i32,

        /// The number of failures in the log.
        failures: usize,
    },

    /// A function that must not be rerun on its own failed.
    NoRerunFailure {
        /// The function.
        function: String,
    },
}

impl CrashReason {
    /// Returns true if a whole-executable rerun may recover from this crash.
    pub fn allows_rerun(&self) -> bool {
        !matches!(self, Self::NoRerunFailure { .. })
    }
}

impl fmt::Display for CrashReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => write!(f, "the test process timed out"),
            Self::AbnormalExit {
                signal: Some(signal),
                ..
            } => write!(f, "the test process was killed by signal {signal}"),
            Self::AbnormalExit {
                code: Some(code), ..
            } => write!(f, "the test process exited abnormally with code {code}"),
            Self::AbnormalExit { .. } => write!(f, "the test process exited abnormally"),
            Self::MissingLog => write!(f, "no XML log was written"),
            Self::UnreadableLog { message } => write!(f, "the XML log is unreadable: {message}"),
            Self::EmptyLog => write!(f, "the XML log contains no test functions"),
            Self::FatalMessage { function, message } => {
                write!(f, "{function} logged a fatal message: {message}")
            }
            Self::ExitCodeMismatch { code, failures } => write!(
                f,
                "exit code {code} does not match the {failures} failures in the XML log"
            ),
            Self::NoRerunFailure { function } => {
                write!(f, "{function} failed and cannot be rerun on its own")
            }
        }
    }
}

/// Settings that affect classification.
#[derive(Clone, Copy, Debug)]
pub struct ClassifyContext<'a> {
    /// Functions whose failure is a crash.
    pub no_rerun_functions: &'a BTreeSet<String>,
}

/// Classifies an attempt from how its process exited and the state of its log.
///
/// Rows are evaluated in order and the first match wins:
///
/// | exit      | log          | content                          | result              |
/// |-----------|--------------|----------------------------------|---------------------|
/// | timed out | any          |                                  | crash               |
/// | abnormal  | any          |                                  | crash               |
/// | 0         | not expected |                                  | passed              |
/// | non-zero  | not expected |                                  | executable failed   |
/// | any       | missing      |                                  | crash               |
/// | any       | unreadable   |                                  | crash               |
/// | any       | parsed       | no functions                     | crash               |
/// | any       | parsed       | fatal message                    | crash               |
/// | 0         | parsed       | failures                         | crash               |
/// | non-zero  | parsed       | no failures                      | crash               |
/// | any       | parsed       | failing no-rerun function        | crash (terminal)    |
/// | non-zero  | parsed       | failures                         | functions failed    |
/// | 0         | parsed       | no failures                      | passed              |
pub fn classify(exit: &ChildExit, log: &LogState, cx: &ClassifyContext<'_>) -> Classification {
    match (exit, log) {
        (ChildExit::TimedOut, _) => Classification::Crashed(CrashReason::TimedOut),
        (ChildExit::Abnormal { code, signal }, _) => {
            Classification::Crashed(CrashReason::AbnormalExit {
                code: *code,
                signal: *signal,
            })
        }
        (ChildExit::Exited(0), LogState::NotExpected) => Classification::Passed,
        (ChildExit::Exited(code), LogState::NotExpected) => {
            Classification::ExecutableFailed { code: *code }
        }
        (ChildExit::Exited(_), LogState::Missing) => {
            Classification::Crashed(CrashReason::MissingLog)
        }
        (ChildExit::Exited(_), LogState::Unreadable(err)) => {
            Classification::Crashed(CrashReason::UnreadableLog {
                message: error_chain(err),
            })
        }
        (ChildExit::Exited(code), LogState::Parsed(log)) => classify_log(*code, log, cx),
    }
}

fn classify_log(code: i32, log: &TestLog, cx: &ClassifyContext<'_>) -> Classification {
    if log.is_empty() {
        return Classification::Crashed(CrashReason::EmptyLog);
    }

    if let Some((function, message)) = log.fatal_messages().next() {
        return Classification::Crashed(CrashReason::FatalMessage {
            function: function.name.clone(),
            message: message.description.clone(),
        });
    }

    let failures = log.failures();
    if (code == 0) != failures.is_empty() {
        return Classification::Crashed(CrashReason::ExitCodeMismatch {
            code,
            failures: failures.len(),
        });
    }

    if let Some(failure) = failures
        .iter()
        .find(|failure| cx.no_rerun_functions.contains(&failure.function))
    {
        return Classification::Crashed(CrashReason::NoRerunFailure {
            function: failure.function.clone(),
        });
    }

    if failures.is_empty() {
        Classification::Passed
    } else {
        Classification::FunctionsFailed(failures)
    }
}

fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
