// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attempt-scoped XML log file names.

use crate::errors::SupervisorError;
use camino::Utf8PathBuf;
use chrono::{DateTime, Local};
use tracing::debug;

/// Setting this environment variable to `1` makes every attempt write to `<dir>/<base>.xml`.
///
/// This exists for test fixtures that pre-write a log and expect the supervisor to read it back.
pub const NO_UNIQUE_OUTPUT_FILENAME_ENV: &str = "QT_TESTRUNNER_DEBUG_NO_UNIQUE_OUTPUT_FILENAME";

/// How log files are named across attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogFileNaming {
    /// `<dir>/<base>-<run stamp>-<attempt>.xml`.
    Unique {
        /// The supervision start time, formatted as `%Y%m%dT%H%M%S`.
        run_stamp: String,
    },

    /// `<dir>/<base>.xml` for every attempt.
    Fixed,
}

impl LogFileNaming {
    /// Returns unique naming stamped with `start_time`.
    pub fn unique(start_time: DateTime<Local>) -> Self {
        Self::Unique {
            run_stamp: start_time.format("%Y%m%dT%H%M%S").to_string(),
        }
    }

    /// Returns fixed naming if [`NO_UNIQUE_OUTPUT_FILENAME_ENV`] is set to `1`, unique naming
    /// otherwise.
    pub fn from_env(start_time: DateTime<Local>) -> Self {
        match std::env::var(NO_UNIQUE_OUTPUT_FILENAME_ENV).as_deref() {
            Ok("1") => Self::Fixed,
            _ => Self::unique(start_time),
        }
    }
}

/// Names the log file for each attempt.
#[derive(Clone, Debug)]
pub struct LogFileNamer {
    dir: Utf8PathBuf,
    base_name: String,
    naming: LogFileNaming,
}

impl LogFileNamer {
    /// Creates a new namer.
    pub fn new(
        dir: impl Into<Utf8PathBuf>,
        base_name: impl Into<String>,
        naming: LogFileNaming,
    ) -> Self {
        Self {
            dir: dir.into(),
            base_name: base_name.into(),
            naming,
        }
    }

    /// Returns the log path for `attempt`.
    pub fn path_for(&self, attempt: u32) -> Utf8PathBuf {
        match &self.naming {
            LogFileNaming::Unique { run_stamp } => self
                .dir
                .join(format!("{}-{run_stamp}-{attempt}.xml", self.base_name)),
            LogFileNaming::Fixed => self.dir.join(format!("{}.xml", self.base_name)),
        }
    }

    /// Returns the log path for `attempt`, removing any stale file already there.
    ///
    /// With fixed naming the file is left alone: it may have been written on purpose.
    pub fn prepare(&self, attempt: u32) -> Result<Utf8PathBuf, SupervisorError> {
        let path = self.path_for(attempt);
        if matches!(self.naming, LogFileNaming::Unique { .. }) && path.exists() {
            debug!("removing stale log file {path}");
            std::fs::remove_file(&path).map_err(|err| SupervisorError::RemoveStaleLog {
                path: path.clone(),
                err,
            })?;
        }
        Ok(path)
    }
}
