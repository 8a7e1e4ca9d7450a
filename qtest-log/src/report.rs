// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ParseError, ParseErrorKind},
    parse::parse_log,
};
use camino::Utf8Path;
use std::{fmt, time::Duration};

/// The root of a QtTest XML log: everything a single test process reported.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestLog {
    /// The name of the test case, from `<TestCase name="...">`.
    ///
    /// `None` for an empty log.
    pub name: Option<String>,

    /// The test functions in the order they were executed.
    pub functions: Vec<FunctionResult>,
}

impl TestLog {
    /// Parses a log from a string.
    ///
    /// An empty (or whitespace-only) string parses to an empty log.
    pub fn parse_str(input: &str) -> Result<Self, ParseError> {
        parse_log(input)
    }

    /// Reads and parses the log at the given path.
    pub fn parse_file(path: &Utf8Path) -> Result<Self, ParseError> {
        let bytes = std::fs::read(path)
            .map_err(|err| ParseError::new(ParseErrorKind::Read(err)).with_path(path))?;
        let input = std::str::from_utf8(&bytes)
            .map_err(|err| ParseError::new(ParseErrorKind::InvalidUtf8(err)).with_path(path))?;
        parse_log(input).map_err(|err| err.with_path(path))
    }

    /// Returns true if the log contains no test functions.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Returns the function with the given name, if it was executed.
    pub fn function(&self, name: &str) -> Option<&FunctionResult> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Returns every failing test case in the log, in log order.
    ///
    /// A function with tagged failures yields one entry per distinct failing data tag.
    pub fn failures(&self) -> Vec<TestCaseId> {
        self.functions
            .iter()
            .flat_map(|function| function.failures())
            .collect()
    }

    /// Returns every fatal-severity message, paired with the function that logged it.
    pub fn fatal_messages(&self) -> impl Iterator<Item = (&FunctionResult, &Message)> + '_ {
        self.functions.iter().flat_map(|function| {
            function
                .messages
                .iter()
                .filter(|message| message.severity == Severity::Fatal)
                .map(move |message| (function, message))
        })
    }
}

/// The result of one `<TestFunction>` element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionResult {
    /// The function name.
    pub name: String,

    /// The incidents (pass/fail/skip records) reported by this function.
    pub incidents: Vec<Incident>,

    /// The diagnostic messages logged while this function ran.
    pub messages: Vec<Message>,

    /// The time the function took, if the log recorded it.
    pub duration: Option<Duration>,
}

impl FunctionResult {
    /// Creates a new function result with no incidents or messages.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            incidents: Vec::new(),
            messages: Vec::new(),
            duration: None,
        }
    }

    /// Returns the status of this function, derived from its incidents.
    pub fn status(&self) -> FunctionStatus {
        if self.incidents.iter().any(|i| i.kind.is_failure()) {
            FunctionStatus::Fail
        } else {
            FunctionStatus::Pass
        }
    }

    /// Returns true if this function logged at least one fatal message.
    pub fn has_fatal(&self) -> bool {
        self.messages.iter().any(|m| m.severity == Severity::Fatal)
    }

    /// Returns the failing test cases of this function, deduplicated, in log order.
    pub fn failures(&self) -> Vec<TestCaseId> {
        let mut out: Vec<TestCaseId> = Vec::new();
        for incident in self.incidents.iter().filter(|i| i.kind.is_failure()) {
            let id = TestCaseId {
                function: self.name.clone(),
                data_tag: incident.data_tag.clone(),
            };
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }

    /// Adds an incident to this function.
    pub fn add_incident(&mut self, incident: Incident) -> &mut Self {
        self.incidents.push(incident);
        self
    }

    /// Adds a message to this function.
    pub fn add_message(&mut self, message: Message) -> &mut Self {
        self.messages.push(message);
        self
    }
}

/// The overall status of a [`FunctionResult`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FunctionStatus {
    /// No failing incidents were recorded.
    Pass,

    /// At least one failing incident was recorded.
    Fail,
}

impl fmt::Display for FunctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// An `<Incident>` element: the outcome of a function or of one data row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Incident {
    /// The incident type.
    pub kind: IncidentKind,

    /// The data tag this incident applies to, for data-driven functions.
    pub data_tag: Option<String>,

    /// The failure description, if any.
    pub description: Option<String>,

    /// The source file reported with the incident, if non-empty.
    pub file: Option<String>,

    /// The source line reported with the incident, if non-zero.
    pub line: Option<u32>,
}

impl Incident {
    /// Creates a new incident of the given kind with no tag or location.
    pub fn new(kind: IncidentKind) -> Self {
        Self {
            kind,
            data_tag: None,
            description: None,
            file: None,
            line: None,
        }
    }

    /// Sets the data tag.
    pub fn with_data_tag(mut self, data_tag: impl Into<String>) -> Self {
        self.data_tag = Some(data_tag.into());
        self
    }
}

/// The `type` attribute of an `<Incident>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncidentKind {
    /// `pass`
    Pass,
    /// `fail`
    Fail,
    /// `xfail`: an expected failure.
    ExpectedFail,
    /// `xpass`: an unexpected pass, treated as a failure.
    UnexpectedPass,
    /// `skip`
    Skip,
    /// `bpass`: blacklisted pass.
    BlacklistedPass,
    /// `bfail`: blacklisted failure.
    BlacklistedFail,
    /// `bxpass`: blacklisted unexpected pass.
    BlacklistedUnexpectedPass,
    /// `bxfail`: blacklisted expected failure.
    BlacklistedExpectedFail,
    /// Any other value.
    Other(String),
}

impl IncidentKind {
    /// Parses the `type` attribute of an incident.
    pub fn from_type(s: &str) -> Self {
        match s {
            "pass" => Self::Pass,
            "fail" => Self::Fail,
            "xfail" => Self::ExpectedFail,
            "xpass" => Self::UnexpectedPass,
            "skip" => Self::Skip,
            "bpass" => Self::BlacklistedPass,
            "bfail" => Self::BlacklistedFail,
            "bxpass" => Self::BlacklistedUnexpectedPass,
            "bxfail" => Self::BlacklistedExpectedFail,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the `type` attribute value for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::ExpectedFail => "xfail",
            Self::UnexpectedPass => "xpass",
            Self::Skip => "skip",
            Self::BlacklistedPass => "bpass",
            Self::BlacklistedFail => "bfail",
            Self::BlacklistedUnexpectedPass => "bxpass",
            Self::BlacklistedExpectedFail => "bxfail",
            Self::Other(s) => s,
        }
    }

    /// Returns true if this incident makes its function fail.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Fail
                | Self::UnexpectedPass
                | Self::BlacklistedFail
                | Self::BlacklistedUnexpectedPass
        )
    }
}

/// A `<Message>` element: a diagnostic logged by the test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// The severity, derived from the `type` attribute.
    pub severity: Severity,

    /// The raw `type` attribute, e.g. `qwarn`.
    pub raw_type: String,

    /// The data tag that was active when the message was logged.
    pub data_tag: Option<String>,

    /// The message text.
    pub description: String,
}

impl Message {
    /// Creates a message from its raw `type` attribute and text.
    pub fn new(raw_type: impl Into<String>, description: impl Into<String>) -> Self {
        let raw_type = raw_type.into();
        Self {
            severity: Severity::from_type(&raw_type),
            raw_type,
            data_tag: None,
            description: description.into(),
        }
    }
}

/// The severity of a [`Message`].
///
/// Only [`Severity::Fatal`] affects classification.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug and informational output.
    Info,
    /// Warnings, criticals and system messages.
    Warning,
    /// `qFatal()` and friends: the process is about to abort.
    Fatal,
}

impl Severity {
    /// Maps a message `type` attribute to a severity.
    pub fn from_type(s: &str) -> Self {
        match s {
            "qfatal" | "fatal" => Self::Fatal,
            "qwarn" | "warn" | "warning" | "qcritical" | "system" => Self::Warning,
            _ => Self::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Identifies one rerunnable unit: a test function, optionally narrowed to a data tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestCaseId {
    /// The function name.
    pub function: String,

    /// The data tag, for data-driven functions.
    pub data_tag: Option<String>,
}

impl TestCaseId {
    /// Creates an identifier for a whole function.
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            data_tag: None,
        }
    }

    /// Creates an identifier for one data row of a function.
    pub fn with_tag(function: impl Into<String>, data_tag: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            data_tag: Some(data_tag.into()),
        }
    }
}

/// Formats as `function` or `function:tag`, the form QtTest accepts on its command line.
impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data_tag {
            Some(tag) => write!(f, "{}:{}", self.function, tag),
            None => write!(f, "{}", self.function),
        }
    }
}
