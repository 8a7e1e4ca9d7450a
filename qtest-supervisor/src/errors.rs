// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by qtest-supervisor.

use camino::Utf8PathBuf;
use qtest_log::ParseError;
use std::io;
use thiserror::Error;

/// An error that occurred while reading a configuration file.
#[derive(Debug, Error)]
#[error("failed to read config file at `{config_file}`")]
pub struct ConfigReadError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigReadErrorKind,
}

impl ConfigReadError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigReadErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the path to the config file.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &ConfigReadErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while reading a configuration file.
///
/// Forms part of [`ConfigReadError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigReadErrorKind {
    /// The file could not be read.
    #[error("error reading file")]
    Read(#[source] io::Error),

    /// The file is not valid TOML, or does not match the expected schema.
    #[error("error deserializing TOML")]
    Deserialize(#[source] Box<toml::de::Error>),
}

/// An error which indicates that a profile was requested but not known.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }

    /// Returns the name of the profile that wasn't found.
    pub fn profile(&self) -> &str {
        &self.profile
    }
}

/// A retry policy with inconsistent settings.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RetryPolicyError {
    /// `passes-needed` was zero.
    #[error("passes-needed must be at least 1")]
    PassesNeededZero,

    /// `passes-needed` can never be reached within the rerun budget.
    #[error("passes-needed ({passes_needed}) exceeds max-repeats ({max_repeats})")]
    PassesNeededExceedsRepeats {
        /// The number of passes needed.
        passes_needed: u32,

        /// The per-test-case rerun budget.
        max_repeats: u32,
    },
}

/// An error that occurred while working out how to invoke the test binary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvocationError {
    /// No command was provided.
    #[error("no test command provided")]
    EmptyCommand,

    /// A wrapper that takes the test binary as its first argument was invoked without one.
    #[error("wrapper `{wrapper}` must be followed by the test binary")]
    MissingTestBinary {
        /// The wrapper that was invoked.
        wrapper: String,
    },

    /// The name of the artifact under test could not be determined, so no log file name can
    /// be derived.
    #[error("cannot determine the artifact under test for `{program}`: expected {expected}")]
    ArtifactNameNotFound {
        /// The program (wrapper or binary) that was invoked.
        program: String,

        /// What was expected on the command line.
        expected: &'static str,
    },
}

/// An error that occurred while running one attempt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecuteError {
    /// The request had an empty argument vector.
    #[error("attempt {attempt} has no command to run")]
    EmptyCommand {
        /// The attempt number.
        attempt: u32,
    },

    /// The process could not be started.
    #[error("failed to spawn `{command}`")]
    Spawn {
        /// The command line, shell-quoted.
        command: String,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// Waiting for the process failed.
    #[error("failed to wait for `{command}`")]
    Wait {
        /// The command line, shell-quoted.
        command: String,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The process could not be killed after its deadline.
    #[error("failed to kill `{command}` after it timed out")]
    Kill {
        /// The command line, shell-quoted.
        command: String,

        /// The underlying error.
        #[source]
        err: io::Error,
    },
}

/// An error that occurred while writing a supervisor event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing to the output.
    #[error("error writing to output")]
    Io(#[source] io::Error),
}

impl From<io::Error> for WriteEventError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// An error that stopped supervision before a verdict was reached.
///
/// Each of these maps to a usage error rather than a test verdict.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SupervisorError {
    /// The retry policy is inconsistent.
    #[error("invalid retry policy")]
    Policy(#[from] RetryPolicyError),

    /// The log directory could not be created.
    #[error("failed to create log directory `{dir}`")]
    CreateLogDir {
        /// The directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// A stale log file could not be removed before an attempt.
    #[error("failed to remove stale log file `{path}`")]
    RemoveStaleLog {
        /// The stale log file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The pre-supplied log could not be read or parsed.
    #[error("failed to read existing test log")]
    ExistingLog(#[source] ParseError),

    /// An attempt could not be run.
    #[error("error running test binary")]
    Execute(#[from] ExecuteError),

    /// An event could not be reported.
    #[error("error reporting supervisor event")]
    WriteEvent(#[from] WriteEventError),
}
