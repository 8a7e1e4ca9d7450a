// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared definitions for `qt-mock-test`, a stand-in for a QtTest binary.
//!
//! The mock runs `initTestCase`, the functions listed in [`FUNCTIONS_ENV`] (or the ones named on
//! the command line), and `cleanupTestCase`. What each function does is determined by its name:
//!
//! * `always_fail` fails every time.
//! * `flaky_<N>` fails its first N runs and passes afterwards.
//! * `crash_once` aborts the process on its first run and passes afterwards.
//! * `always_crash` aborts the process every time.
//! * `hang` sleeps for a long time.
//! * anything else passes.
//!
//! Runs are counted across processes in the state file named by [`STATE_FILE_ENV`], which also
//! records every invocation.

use camino::Utf8Path;
use color_eyre::{Result, eyre::Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The test case name the mock reports.
pub const TEST_CASE_NAME: &str = "tst_mock";

/// Comma-separated list of test functions to run, in order.
pub const FUNCTIONS_ENV: &str = "QT_MOCK_TEST_FUNCTIONS";

/// Path to the JSON state file.
pub const STATE_FILE_ENV: &str = "QT_MOCK_TEST_STATE_FILE";

/// If set to `1`, no XML log is written even if one was requested.
pub const NO_XML_ENV: &str = "QT_MOCK_TEST_NO_XML";

/// If set to `1`, `initTestCase` fails and the remaining functions are skipped.
pub const FAIL_INIT_ENV: &str = "QT_MOCK_TEST_FAIL_INIT";

/// Path to the mock binary, for wrapper scripts that need to find it.
pub const MOCK_BIN_ENV: &str = "QT_MOCK_TEST_BIN";

/// State persisted across invocations of the mock.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MockState {
    /// How many times each test function has started running.
    pub runs: BTreeMap<String, u32>,

    /// Every invocation, in order.
    pub invocations: Vec<MockInvocation>,
}

impl MockState {
    /// Loads the state file, or returns an empty state if it doesn't exist yet.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).wrap_err_with(|| format!("reading {path}"))?;
        serde_json::from_str(&data).wrap_err_with(|| format!("parsing {path}"))
    }

    /// Writes the state file.
    pub fn store(&self, path: &Utf8Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data).wrap_err_with(|| format!("writing {path}"))
    }

    /// Increments and returns the run count of `function`.
    pub fn start_run(&mut self, function: &str) -> u32 {
        let runs = self.runs.entry(function.to_owned()).or_default();
        *runs += 1;
        *runs
    }
}

/// A single invocation of the mock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MockInvocation {
    /// The arguments, without the program name.
    pub args: Vec<String>,

    /// Test functions selected on the command line. Empty for a full run.
    pub selected: Vec<String>,

    /// The XML log requested with `-o <file>,xml`, if any.
    pub xml_log: Option<String>,

    /// Whether the verbose logging environment was set.
    pub verbose_env: bool,
}

impl MockInvocation {
    /// Returns true if this was a verbose run.
    pub fn is_verbose(&self) -> bool {
        self.args.iter().any(|arg| arg == "-v2") && self.verbose_env
    }
}
