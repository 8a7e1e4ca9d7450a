// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use thiserror::Error;

/// An error that occurs while parsing a [`TestLog`](crate::TestLog).
///
/// Returned by [`TestLog::parse_str`](crate::TestLog::parse_str) and
/// [`TestLog::parse_file`](crate::TestLog::parse_file).
#[derive(Debug, Error)]
#[error("error parsing QtTest XML log{}", .path.as_ref().map(|p| format!(" at `{p}`")).unwrap_or_default())]
pub struct ParseError {
    path: Option<Utf8PathBuf>,
    #[source]
    kind: ParseErrorKind,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind) -> Self {
        Self { path: None, kind }
    }

    pub(crate) fn with_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Returns the path of the log file, if the log was read from disk.
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        self.path.as_ref()
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a log.
///
/// Forms part of [`ParseError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// The log could not be read from disk.
    #[error("failed to read log")]
    Read(#[source] std::io::Error),

    /// The log is not valid UTF-8.
    #[error("log is not valid UTF-8")]
    InvalidUtf8(#[source] std::str::Utf8Error),

    /// The XML itself is malformed.
    #[error("malformed XML at byte {position}")]
    Xml {
        /// The byte offset at which the error was detected.
        position: u64,

        /// The underlying error.
        #[source]
        err: quick_xml::Error,
    },

    /// The log ended while an element was still open, usually because the test process died
    /// while writing it.
    #[error("log ends inside an open `{open_element}` element")]
    Truncated {
        /// The innermost element that was still open.
        open_element: String,
    },

    /// The root element is not `<TestCase>`.
    #[error("expected root element `TestCase`, found `{found}`")]
    UnexpectedRoot {
        /// The name of the root element that was found.
        found: String,
    },

    /// A `<TestFunction>` element has no `name` attribute.
    #[error("`TestFunction` element at byte {position} has no `name` attribute")]
    MissingFunctionName {
        /// The byte offset of the element.
        position: u64,
    },
}
