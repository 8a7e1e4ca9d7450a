// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The retry and crash state machine.
//!
//! Every attempt is classified by [`classify`], from the way the process exited and the state of
//! its log. The [`Supervisor`] then decides what to run next: individual failing test cases to
//! confirm their failures, the whole executable after a crash, or nothing.

mod classify;
mod engine;
mod state;
#[cfg(test)]
pub(crate) mod test_helpers;

pub use classify::*;
pub use engine::*;
pub use state::*;

use crate::{errors::RetryPolicyError, exit_codes::SupervisorExitCode};
use std::{collections::BTreeSet, fmt};

/// Budgets and rules for reruns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// How many times each failing test case is rerun before its failure is confirmed.
    pub max_repeats: u32,

    /// How many passing reruns a failing test case needs to count as passing.
    pub passes_needed: u32,

    /// How many times the whole executable is rerun after a crash.
    pub crash_reruns: u32,

    /// Test functions whose failure is treated as a crash and which are never rerun on their own.
    pub no_rerun_functions: BTreeSet<String>,
}

impl RetryPolicy {
    /// The default per-test-case rerun budget.
    pub const DEFAULT_MAX_REPEATS: u32 = 5;

    /// The default whole-executable rerun budget after crashes.
    pub const DEFAULT_CRASH_RERUNS: u32 = 1;

    /// The default set of functions that are never rerun on their own.
    pub const DEFAULT_NO_RERUN_FUNCTIONS: [&'static str; 4] =
        ["initTestCase", "init", "cleanup", "cleanupTestCase"];

    /// Checks that the policy is consistent.
    pub fn validate(&self) -> Result<(), RetryPolicyError> {
        if self.passes_needed == 0 {
            return Err(RetryPolicyError::PassesNeededZero);
        }
        if self.max_repeats > 0 && self.passes_needed > self.max_repeats {
            return Err(RetryPolicyError::PassesNeededExceedsRepeats {
                passes_needed: self.passes_needed,
                max_repeats: self.max_repeats,
            });
        }
        Ok(())
    }

    /// Returns the whole-executable rerun budget used when no log is available to target
    /// individual test cases.
    pub fn executable_reruns(&self) -> u32 {
        if self.max_repeats > 0 { 1 } else { 0 }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_repeats: Self::DEFAULT_MAX_REPEATS,
            passes_needed: 1,
            crash_reruns: Self::DEFAULT_CRASH_RERUNS,
            no_rerun_functions: Self::DEFAULT_NO_RERUN_FUNCTIONS
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
        }
    }
}

/// The final result of a supervised run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Every test case passed, possibly after reruns.
    Pass,

    /// At least one test case failed through its whole rerun budget.
    Fail,

    /// The test binary crashed and whole-executable reruns did not help.
    Crash,

    /// Supervision could not start, or could not continue, because of a usage error.
    UsageError,
}

impl Verdict {
    /// Returns the process exit code for this verdict.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Pass => SupervisorExitCode::OK,
            Self::Fail => SupervisorExitCode::TEST_FAILED,
            Self::Crash => SupervisorExitCode::CRASHED,
            Self::UsageError => SupervisorExitCode::USAGE_ERROR,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Crash => write!(f, "CRASH"),
            Self::UsageError => write!(f, "USAGE ERROR"),
        }
    }
}
