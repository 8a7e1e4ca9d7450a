// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for tracking how long attempts and whole supervisions take.
//!
//! The wall-clock start time names log files and the monotonic clock measures durations, so both
//! are captured together.

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

/// Starts a stopwatch.
pub(crate) fn stopwatch() -> Stopwatch {
    Stopwatch {
        started_at: Local::now(),
        instant: Instant::now(),
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Stopwatch {
    started_at: DateTime<Local>,
    instant: Instant,
}

impl Stopwatch {
    /// Returns the wall-clock time the stopwatch was started at.
    pub(crate) fn start_time(&self) -> DateTime<Local> {
        self.started_at
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }

    /// Returns true if `timeout` has passed since the stopwatch was started.
    pub(crate) fn is_past(&self, timeout: Duration) -> bool {
        self.instant.elapsed() >= timeout
    }
}
