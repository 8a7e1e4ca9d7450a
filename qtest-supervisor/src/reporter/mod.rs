// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out supervision progress.
//!
//! The main structure in this module is [`Reporter`], which turns [`SupervisorEvent`]s into a
//! transcript interleaving each attempt's own output with the supervisor's classification of it.

mod displayer;
pub mod events;

use crate::errors::WriteEventError;
use displayer::{DisplayReporter, Styles};
use events::SupervisorEvent;
use std::io::{self, BufWriter, Write};

/// Output destination for the reporter.
///
/// This is usually standard output, but can be an in-memory buffer for tests.
pub enum ReporterOutput<'a> {
    /// Write to standard output.
    Terminal,

    /// Write output to a buffer.
    Buffer(&'a mut Vec<u8>),
}

/// Reporter builder.
#[derive(Debug, Default)]
pub struct ReporterBuilder {
    should_colorize: bool,
    verbose: bool,
}

impl ReporterBuilder {
    /// Set to true if the reporter should colorize output.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets verbose output: full command lines and environment overlays for each attempt.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Creates a new reporter.
    pub fn build<'a>(&self, output: ReporterOutput<'a>) -> Reporter<'a> {
        let mut styles = Box::<Styles>::default();
        if self.should_colorize {
            styles.colorize();
        }

        Reporter {
            inner: DisplayReporter {
                styles,
                verbose: self.verbose,
            },
            output,
        }
    }
}

/// Writes the supervision transcript.
pub struct Reporter<'a> {
    inner: DisplayReporter,
    output: ReporterOutput<'a>,
}

impl Reporter<'_> {
    /// Reports an event.
    ///
    /// Terminal output is flushed after every event so that it interleaves correctly with
    /// anything else written to the terminal.
    pub fn report_event(&mut self, event: &SupervisorEvent<'_>) -> Result<(), WriteEventError> {
        match &mut self.output {
            ReporterOutput::Terminal => {
                let mut writer = BufWriter::new(io::stdout().lock());
                self.inner.write_event(event, &mut writer)?;
                writer.flush()?;
                Ok(())
            }
            ReporterOutput::Buffer(buf) => {
                self.inner.write_event(event, *buf)?;
                Ok(())
            }
        }
    }
}
