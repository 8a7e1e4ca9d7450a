// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Building the command line for each attempt.
//!
//! A supervised command is either a test binary on its own, or a test binary behind a wrapper
//! script. [`CommandLine::split`] recognizes wrappers by file name, and an [`Invocation`] turns the
//! split command line into one argument vector per attempt.

use crate::{
    errors::InvocationError,
    helpers::{artifact_stem, program_file_name},
};
use camino::Utf8Path;
use indexmap::IndexMap;
use qtest_log::TestCaseId;
use std::fmt;

/// Environment variables set on verbose reruns.
pub const VERBOSE_ENV: [(&str, &str); 2] = [
    ("QT_LOGGING_RULES", "*.debug=true"),
    (
        "QT_MESSAGE_PATTERN",
        "[%{time process} %{if-debug}D%{endif}%{if-info}I%{endif}%{if-warning}W%{endif}\
         %{if-critical}C%{endif}%{if-fatal}F%{endif}] %{category} %{file}:%{line} - %{message}",
    ),
];

/// Arguments passed to the test binary on verbose reruns.
pub const VERBOSE_ARGS: [&str; 3] = ["-v2", "-maxwarnings", "0"];

/// The separator between a separator wrapper's own arguments and the test arguments.
const SEPARATOR: &str = "--";

/// How a known wrapper passes arguments through to the test binary.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WrapperKind {
    /// `<wrapper> <test-binary> <test-args...>`.
    Passthrough,

    /// `<wrapper> <wrapper-args...> -- <test-args...>`, with the artifact under test named by the
    /// wrapper arguments.
    Separator,
}

/// The set of wrapper scripts that are recognized by file name.
#[derive(Clone, Debug, Default)]
pub struct WrapperRegistry {
    passthrough: Vec<String>,
    separator: Vec<String>,
}

impl WrapperRegistry {
    /// Creates a new registry from lists of wrapper file names.
    pub fn new(
        passthrough: impl IntoIterator<Item = impl Into<String>>,
        separator: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            passthrough: passthrough.into_iter().map(Into::into).collect(),
            separator: separator.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the kind of wrapper `program` is, if it is a known wrapper.
    pub fn kind_of(&self, program: &str) -> Option<WrapperKind> {
        let file_name = program_file_name(program);
        if self.passthrough.iter().any(|name| name == file_name) {
            Some(WrapperKind::Passthrough)
        } else if self.separator.iter().any(|name| name == file_name) {
            Some(WrapperKind::Separator)
        } else {
            None
        }
    }
}

/// A wrapper script and the arguments that belong to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wrapper {
    /// The path to the wrapper, as given on the command line.
    pub program: String,

    /// How the wrapper passes arguments on.
    pub kind: WrapperKind,

    /// Arguments for the wrapper itself. Always empty for passthrough wrappers.
    pub args: Vec<String>,
}

/// A supervised command line, split into its parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    /// The wrapper, if any.
    pub wrapper: Option<Wrapper>,

    /// The test binary, if it appears on the command line.
    ///
    /// This is `None` for separator wrappers, which locate the binary themselves.
    pub test_binary: Option<String>,

    /// Arguments for the test binary.
    pub test_args: Vec<String>,
}

impl CommandLine {
    /// Creates a command line for a test binary that is run directly.
    pub fn new(
        test_binary: impl Into<String>,
        test_args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            wrapper: None,
            test_binary: Some(test_binary.into()),
            test_args: test_args.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a flat command line into wrapper, test binary and test arguments.
    pub fn split(
        args: impl IntoIterator<Item = impl Into<String>>,
        registry: &WrapperRegistry,
    ) -> Result<Self, InvocationError> {
        let mut args = args.into_iter().map(Into::into);
        let program = args.next().ok_or(InvocationError::EmptyCommand)?;

        match registry.kind_of(&program) {
            None => Ok(Self::new(program, args)),
            Some(WrapperKind::Passthrough) => {
                let test_binary = args
                    .next()
                    .ok_or_else(|| InvocationError::MissingTestBinary {
                        wrapper: program.clone(),
                    })?;
                Ok(Self {
                    wrapper: Some(Wrapper {
                        program,
                        kind: WrapperKind::Passthrough,
                        args: Vec::new(),
                    }),
                    test_binary: Some(test_binary),
                    test_args: args.collect(),
                })
            }
            Some(WrapperKind::Separator) => {
                let mut wrapper_args = Vec::new();
                let mut test_args = Vec::new();
                let mut seen_separator = false;
                for arg in args {
                    if seen_separator {
                        test_args.push(arg);
                    } else if arg == SEPARATOR {
                        seen_separator = true;
                    } else {
                        wrapper_args.push(arg);
                    }
                }
                Ok(Self {
                    wrapper: Some(Wrapper {
                        program,
                        kind: WrapperKind::Separator,
                        args: wrapper_args,
                    }),
                    test_binary: None,
                    test_args,
                })
            }
        }
    }

    /// Returns the program that is executed: the wrapper if there is one, otherwise the test
    /// binary.
    pub fn program(&self) -> &str {
        match (&self.wrapper, &self.test_binary) {
            (Some(wrapper), _) => &wrapper.program,
            (None, Some(binary)) => binary,
            (None, None) => "",
        }
    }

    fn wrapper_kind(&self) -> Option<WrapperKind> {
        self.wrapper.as_ref().map(|wrapper| wrapper.kind)
    }
}

/// The result of looking for the artifact name with one strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactLookup {
    /// The strategy does not apply to this command line.
    NotApplicable,

    /// The strategy applies and found the artifact name.
    Found(String),

    /// The strategy applies, but the command line lacks what it needs.
    Missing {
        /// What was expected on the command line.
        expected: &'static str,
    },
}

/// A way of deriving the name of the artifact under test, which is used as the log base name.
///
/// Strategies are tried in order and the first one that applies wins.
pub trait ArtifactNameStrategy: fmt::Debug + Send + Sync {
    /// Looks for the artifact name on `command`.
    fn lookup(&self, command: &CommandLine) -> ArtifactLookup;
}

/// Derives the artifact name from an `--apk` or `--aab` argument of a separator wrapper.
#[derive(Clone, Debug, Default)]
pub struct PackageOptionStrategy;

impl PackageOptionStrategy {
    const OPTIONS: [&'static str; 2] = ["--apk", "--aab"];
}

impl ArtifactNameStrategy for PackageOptionStrategy {
    fn lookup(&self, command: &CommandLine) -> ArtifactLookup {
        let Some(wrapper) = &command.wrapper else {
            return ArtifactLookup::NotApplicable;
        };
        if wrapper.kind != WrapperKind::Separator {
            return ArtifactLookup::NotApplicable;
        }

        let mut args = wrapper.args.iter();
        while let Some(arg) = args.next() {
            for option in Self::OPTIONS {
                let value = if arg == option {
                    args.clone().next().map(String::as_str)
                } else {
                    arg.strip_prefix(option)
                        .and_then(|rest| rest.strip_prefix('='))
                };
                if let Some(stem) = value.and_then(artifact_stem) {
                    return ArtifactLookup::Found(stem.to_owned());
                }
            }
        }

        ArtifactLookup::Missing {
            expected: "an --apk or --aab wrapper argument",
        }
    }
}

/// Derives the artifact name from the test binary's file name, with its extension stripped.
#[derive(Clone, Debug, Default)]
pub struct TestBinaryStrategy;

impl ArtifactNameStrategy for TestBinaryStrategy {
    fn lookup(&self, command: &CommandLine) -> ArtifactLookup {
        match command.test_binary.as_deref().map(artifact_stem) {
            Some(Some(stem)) => ArtifactLookup::Found(stem.to_owned()),
            Some(None) => ArtifactLookup::Missing {
                expected: "a test binary file name",
            },
            None => ArtifactLookup::NotApplicable,
        }
    }
}

/// Returns the default strategies: `--apk`/`--aab` first, then the test binary name.
pub fn default_strategies() -> Vec<Box<dyn ArtifactNameStrategy>> {
    vec![Box::new(PackageOptionStrategy), Box::new(TestBinaryStrategy)]
}

/// Builds an [`Invocation`].
#[derive(Debug)]
pub struct InvocationBuilder {
    command: CommandLine,
    extra_args: bool,
    strategies: Vec<Box<dyn ArtifactNameStrategy>>,
}

impl InvocationBuilder {
    /// Creates a new builder for `command`, with extra arguments enabled and the default
    /// artifact name strategies.
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            extra_args: true,
            strategies: default_strategies(),
        }
    }

    /// Sets whether log arguments are injected into the test binary's command line.
    pub fn set_extra_args(&mut self, extra_args: bool) -> &mut Self {
        self.extra_args = extra_args;
        self
    }

    /// Replaces the artifact name strategies.
    pub fn set_strategies(&mut self, strategies: Vec<Box<dyn ArtifactNameStrategy>>) -> &mut Self {
        self.strategies = strategies;
        self
    }

    /// Builds the invocation, deriving the log base name if logs are going to be written.
    pub fn build(self) -> Result<Invocation, InvocationError> {
        let log_base_name = if self.extra_args {
            Some(resolve_artifact_name(&self.command, &self.strategies)?)
        } else {
            None
        };

        Ok(Invocation {
            command: self.command,
            log_base_name,
        })
    }
}

fn resolve_artifact_name(
    command: &CommandLine,
    strategies: &[Box<dyn ArtifactNameStrategy>],
) -> Result<String, InvocationError> {
    let mut expected = "a test binary";
    for strategy in strategies {
        match strategy.lookup(command) {
            ArtifactLookup::NotApplicable => {}
            ArtifactLookup::Found(name) => return Ok(name),
            ArtifactLookup::Missing { expected: e } => {
                expected = e;
                break;
            }
        }
    }

    Err(InvocationError::ArtifactNameNotFound {
        program: command.program().to_owned(),
        expected,
    })
}

/// Per-attempt additions to the command line.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttemptArgs<'a> {
    /// The log file the test binary should write, if logs are injected.
    pub log_file: Option<&'a Utf8Path>,

    /// Whether this is a verbose rerun.
    pub verbose: bool,

    /// The test case to run on its own, for selective reruns.
    pub selection: Option<&'a TestCaseId>,
}

/// A resolved command line, ready to produce one argument vector per attempt.
#[derive(Clone, Debug)]
pub struct Invocation {
    command: CommandLine,
    log_base_name: Option<String>,
}

impl Invocation {
    /// Returns the split command line.
    pub fn command_line(&self) -> &CommandLine {
        &self.command
    }

    /// Returns the log base name, or `None` if log arguments are not injected.
    pub fn log_base_name(&self) -> Option<&str> {
        self.log_base_name.as_deref()
    }

    /// Returns true if log arguments are injected into each attempt.
    pub fn extra_args(&self) -> bool {
        self.log_base_name.is_some()
    }

    /// Returns the argument vector for one attempt.
    ///
    /// The layout is `[wrapper wrapper-args...] [test-binary] [--] test-args... injected...`.
    pub fn command(&self, attempt: &AttemptArgs<'_>) -> Vec<String> {
        let mut tail = self.command.test_args.clone();
        if self.extra_args()
            && let Some(log_file) = attempt.log_file
        {
            tail.extend([
                "-o".to_owned(),
                format!("{log_file},xml"),
                "-o".to_owned(),
                "-,txt".to_owned(),
            ]);
        }
        if attempt.verbose {
            tail.extend(VERBOSE_ARGS.iter().map(|arg| (*arg).to_owned()));
        }
        if let Some(selection) = attempt.selection {
            tail.push(selection.to_string());
        }

        let mut argv = Vec::new();
        if let Some(wrapper) = &self.command.wrapper {
            argv.push(wrapper.program.clone());
            argv.extend(wrapper.args.iter().cloned());
        }
        if let Some(binary) = &self.command.test_binary {
            argv.push(binary.clone());
        }
        if self.command.wrapper_kind() == Some(WrapperKind::Separator) && !tail.is_empty() {
            argv.push(SEPARATOR.to_owned());
        }
        argv.extend(tail);
        argv
    }

    /// Returns the environment overlay for one attempt.
    pub fn env(&self, base: &IndexMap<String, String>, verbose: bool) -> IndexMap<String, String> {
        let mut env = base.clone();
        if verbose {
            env.extend(
                VERBOSE_ENV
                    .iter()
                    .map(|(key, value)| ((*key).to_owned(), (*value).to_owned())),
            );
        }
        env
    }
}
