// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running the qt-testrunner binary from tests.

use camino::Utf8Path;
use std::{
    borrow::Cow,
    ffi::OsStr,
    fmt,
    process::{Command, Output},
};

/// Environment variables read by qt-testrunner that must not leak in from the outer environment.
const SCRUBBED_ENV: [&str; 6] = [
    "QT_TESTRUNNER_CONFIG",
    "QT_TESTRUNNER_PROFILE",
    "QT_TESTRUNNER_VERBOSE",
    "QT_TESTRUNNER_LOG",
    "QT_TESTRUNNER_DEBUG_NO_UNIQUE_OUTPUT_FILENAME",
    "QT_LOGGING_RULES",
];

/// A qt-testrunner command line, with the outer environment scrubbed and color turned off.
#[derive(Debug)]
pub struct QtTestRunnerCli {
    command: Command,
}

impl QtTestRunnerCli {
    /// Creates a new invocation of the qt-testrunner binary at `bin`.
    pub fn new(bin: impl AsRef<OsStr>) -> Self {
        let mut command = Command::new(bin);
        for key in SCRUBBED_ENV {
            command.env_remove(key);
        }
        command.env("QT_TESTRUNNER_COLOR", "never");
        Self { command }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.command.arg(arg);
        self
    }

    pub fn args(&mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> &mut Self {
        self.command.args(args);
        self
    }

    pub fn env(&mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> &mut Self {
        self.command.env(key, value);
        self
    }

    pub fn current_dir(&mut self, dir: impl AsRef<Utf8Path>) -> &mut Self {
        self.command.current_dir(dir.as_ref());
        self
    }

    /// Runs qt-testrunner to completion. The exit status is not checked: tests assert on it.
    pub fn output(&mut self) -> QtTestRunnerOutput {
        let output = self
            .command
            .output()
            .unwrap_or_else(|err| panic!("failed to execute {:?}: {err}", self.command));
        QtTestRunnerOutput {
            command: format!("{:?}", self.command),
            output,
        }
    }
}

/// The result of running qt-testrunner.
pub struct QtTestRunnerOutput {
    command: String,
    output: Output,
}

impl QtTestRunnerOutput {
    /// Returns the exit code, or `None` if qt-testrunner was killed by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.output.status.code()
    }

    pub fn stdout_as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output.stdout)
    }

    pub fn stderr_as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output.stderr)
    }
}

impl fmt::Display for QtTestRunnerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "command: {}", self.command)?;
        writeln!(f, "status: {}", self.output.status)?;
        writeln!(f, "--- stdout ---\n{}", self.stdout_as_str())?;
        writeln!(f, "--- stderr ---\n{}", self.stderr_as_str())
    }
}

impl fmt::Debug for QtTestRunnerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
