// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use owo_colors::OwoColorize;
use qtest_supervisor::{
    errors::{
        ConfigReadError, ExecuteError, InvocationError, ProfileNotFound, SupervisorError,
    },
    retry::Verdict,
};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholder messages: errors are expected to be printed out with
// display_to_stderr, which colorizes them.

/// An error that stops qt-testrunner before a verdict is reached.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config read error")]
    ConfigRead {
        #[from]
        err: ConfigReadError,
    },
    #[error("profile not found")]
    ProfileNotFound {
        #[from]
        err: ProfileNotFound,
    },
    #[error("invocation error")]
    Invocation {
        #[from]
        err: InvocationError,
    },
    #[error("supervisor error")]
    Supervisor {
        #[from]
        err: SupervisorError,
    },
}

impl ExpectedError {
    /// Returns the verdict for a run stopped by this error.
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::ConfigRead { .. }
            | Self::ProfileNotFound { .. }
            | Self::Invocation { .. }
            | Self::Supervisor { .. } => Verdict::UsageError,
        }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        self.verdict().exit_code()
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::ConfigRead { err } => {
                error!(
                    "failed to read config file at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::ProfileNotFound { err } => {
                error!(
                    "profile `{}` not found in config\n({err})",
                    err.profile().style(styles.bold)
                );
                None
            }
            Self::Invocation { err } => {
                error!("{err}");
                err.source()
            }
            Self::Supervisor { err } => match err {
                SupervisorError::Execute(ExecuteError::Spawn { command, err }) => {
                    error!("failed to spawn `{}`", command.style(styles.bold));
                    Some(err as &dyn Error)
                }
                SupervisorError::ExistingLog(err) => {
                    error!("failed to read the test log passed in with --parse-xml-testlog");
                    Some(err as &dyn Error)
                }
                other => {
                    error!("{other}");
                    other.source()
                }
            },
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
