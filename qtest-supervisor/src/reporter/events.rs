// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events emitted while a test binary is supervised.
//!
//! The [`Supervisor`](crate::retry::Supervisor) reports every step it takes through a
//! [`SupervisorEvent`], in order. Events borrow from the supervisor and are only valid for the
//! duration of the callback.

use crate::{
    invocation::Invocation,
    retry::{Classification, CrashReason, RetryPolicy, Verdict},
    runner::{RunOutcome, RunRequest},
};
use camino::Utf8Path;
use qtest_log::{TestCaseId, TestLog};
use std::time::Duration;

/// A step taken by the supervisor.
#[derive(Clone, Debug)]
pub enum SupervisorEvent<'a> {
    /// Supervision started.
    Started {
        /// The resolved command line.
        invocation: &'a Invocation,

        /// The retry policy in effect.
        policy: &'a RetryPolicy,
    },

    /// A pre-supplied log was parsed in place of a first attempt.
    ExistingLogParsed {
        /// The path to the log.
        path: &'a Utf8Path,

        /// The parsed log.
        log: &'a TestLog,

        /// How the log was classified.
        classification: &'a Classification,
    },

    /// An attempt is about to start.
    AttemptStarted {
        /// The attempt.
        request: &'a RunRequest,
    },

    /// An attempt finished and was classified.
    AttemptFinished {
        /// The attempt.
        request: &'a RunRequest,

        /// What the attempt produced, including its captured output.
        outcome: &'a RunOutcome,

        /// How the attempt was classified.
        classification: &'a Classification,
    },

    /// The whole test binary is going to be run again.
    WholeRerunScheduled {
        /// Why.
        reason: WholeRerunReason<'a>,

        /// Crash reruns left after this one.
        reruns_left: u32,
    },

    /// A failing test case passed often enough on reruns.
    TestCaseRecovered {
        /// The test case.
        test_case: &'a TestCaseId,

        /// The number of reruns it took.
        reruns: u32,
    },

    /// A test case failed through its whole rerun budget.
    TestCaseConfirmed {
        /// The test case.
        test_case: &'a TestCaseId,

        /// The number of reruns performed.
        reruns: u32,
    },

    /// Supervision finished with a verdict.
    Finished {
        /// The verdict.
        verdict: Verdict,

        /// Failures confirmed on the last full run.
        confirmed_failures: &'a [TestCaseId],

        /// Test cases that recovered on reruns.
        recovered: &'a [TestCaseId],

        /// The number of attempts made.
        attempts: u32,

        /// How long supervision took.
        elapsed: Duration,
    },
}

/// Why the whole test binary is rerun.
#[derive(Clone, Copy, Debug)]
pub enum WholeRerunReason<'a> {
    /// The previous attempt crashed.
    Crashed(&'a CrashReason),

    /// No log was available and the test binary exited with a non-zero code.
    ExecutableFailed {
        /// The exit code.
        code: i32,
    },
}
