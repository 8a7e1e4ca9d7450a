// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `qt-testrunner`.
///
/// A supervised run ends in exactly one verdict, and each verdict has its own exit code. Errors
/// that stop supervision before a verdict is reached (bad arguments, unreadable config, a test
/// binary that cannot be spawned) always result in exit code 1.
pub enum SupervisorExitCode {}

impl SupervisorExitCode {
    /// Every test case passed, possibly after reruns.
    pub const OK: i32 = 0;

    /// The command line or configuration was invalid, or the artifact under test could not be
    /// determined.
    pub const USAGE_ERROR: i32 = 1;

    /// One or more test cases kept failing after their rerun budget was exhausted.
    pub const TEST_FAILED: i32 = 2;

    /// The test binary crashed, timed out, or produced a log that cannot be trusted, and the
    /// whole-executable rerun budget did not help.
    pub const CRASHED: i32 = 3;
}
