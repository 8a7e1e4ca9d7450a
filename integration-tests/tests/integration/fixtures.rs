// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use integration_tests::{
    mock::{FUNCTIONS_ENV, MockInvocation, MockState, STATE_FILE_ENV},
    testrunner_cli::{QtTestRunnerCli, QtTestRunnerOutput},
};

pub const MOCK_BIN: &str = env!("CARGO_BIN_EXE_qt-mock-test");
pub const TESTRUNNER_BIN: &str = env!("CARGO_BIN_EXE_qt-testrunner-dup");

/// A temporary directory holding the mock's state file and the XML logs of one test.
pub struct TestEnv {
    dir: Utf8TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = camino_tempfile::Builder::new()
            .prefix("qt-testrunner-test-")
            .tempdir()
            .expect("created temp dir");
        Self { dir }
    }

    pub fn path(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub fn log_dir(&self) -> Utf8PathBuf {
        self.dir.path().join("logs")
    }

    pub fn state_file(&self) -> Utf8PathBuf {
        self.dir.path().join("mock-state.json")
    }

    /// Returns a qt-testrunner command line set up to write logs into this environment, with
    /// `functions` as the mock's test functions. Test binary arguments come last.
    pub fn cli(&self, functions: &str) -> QtTestRunnerCli {
        let mut cli = QtTestRunnerCli::new(TESTRUNNER_BIN);
        cli.env(STATE_FILE_ENV, self.state_file().as_str())
            .env(FUNCTIONS_ENV, functions)
            .current_dir(self.path())
            .args(["--log-dir", self.log_dir().as_str()]);
        cli
    }

    /// Returns the invocations the mock recorded.
    pub fn invocations(&self) -> Vec<MockInvocation> {
        MockState::load(&self.state_file())
            .expect("mock state loaded")
            .invocations
    }

    /// Returns the XML logs written, sorted by name.
    pub fn log_files(&self) -> Vec<String> {
        let mut files: Vec<_> = self
            .log_dir()
            .read_dir_utf8()
            .expect("log dir exists")
            .map(|entry| entry.expect("read dir entry").file_name().to_owned())
            .collect();
        files.sort();
        files
    }
}

/// Asserts that qt-testrunner exited with `expected`.
#[track_caller]
pub fn assert_exit_code(output: &QtTestRunnerOutput, expected: i32) {
    assert_eq!(
        output.exit_code(),
        Some(expected),
        "unexpected exit code:\n\n{output}"
    );
}

/// Returns a short description of each invocation: `full`, or the selected functions, with a
/// `(verbose)` suffix for verbose runs.
pub fn describe(invocations: &[MockInvocation]) -> Vec<String> {
    invocations
        .iter()
        .map(|invocation| {
            let mut description = if invocation.selected.is_empty() {
                "full".to_owned()
            } else {
                invocation.selected.join(" ")
            };
            if invocation.is_verbose() {
                description.push_str(" (verbose)");
            }
            description
        })
        .collect()
}
