// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::events::{SupervisorEvent, WholeRerunReason};
use crate::{
    helpers::{display_command, plural},
    retry::{Classification, Verdict},
    runner::AttemptKind,
};
use owo_colors::{OwoColorize, Style};
use qtest_log::TestCaseId;
use std::{
    io::{self, Write},
    time::Duration,
};
use swrite::{SWrite, swrite};

#[derive(Debug, Default)]
pub(super) struct Styles {
    pub(super) count: Style,
    pub(super) pass: Style,
    pub(super) retry: Style,
    pub(super) fail: Style,
    pub(super) test_case: Style,
}

impl Styles {
    pub(super) fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.retry = Style::new().magenta().bold();
        self.fail = Style::new().red().bold();
        self.test_case = Style::new().blue().bold();
    }
}

#[derive(Debug)]
pub(super) struct DisplayReporter {
    pub(super) styles: Box<Styles>,
    pub(super) verbose: bool,
}

impl DisplayReporter {
    pub(super) fn write_event(
        &self,
        event: &SupervisorEvent<'_>,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        match event {
            SupervisorEvent::Started { invocation, policy } => {
                let name = invocation
                    .log_base_name()
                    .unwrap_or_else(|| invocation.command_line().program());
                write!(writer, "{:>12} ", "Supervising".style(self.styles.pass))?;
                writeln!(
                    writer,
                    "{} with up to {} {} per failing test case and {} crash {}",
                    name.style(self.styles.test_case),
                    policy.max_repeats.style(self.styles.count),
                    plural::reruns_str(policy.max_repeats),
                    policy.crash_reruns.style(self.styles.count),
                    plural::reruns_str(policy.crash_reruns),
                )?;
                if !invocation.extra_args() {
                    writeln!(
                        writer,
                        "{:>12} no XML log is requested, attempts are judged by exit code",
                        "Note".style(self.styles.count),
                    )?;
                }
            }
            SupervisorEvent::ExistingLogParsed {
                path,
                log,
                classification,
            } => {
                write!(writer, "{:>12} ", "PARSED".style(self.styles.pass))?;
                writeln!(
                    writer,
                    "{path} ({} test functions)",
                    log.functions.len().style(self.styles.count),
                )?;
                self.write_classification(None, classification, writer)?;
            }
            SupervisorEvent::AttemptStarted { request } => {
                let (status, style) = match &request.kind {
                    AttemptKind::FullRun => ("RUNNING", self.styles.pass),
                    AttemptKind::Rerun { verbose: true, .. } => ("VERBOSE RUN", self.styles.retry),
                    AttemptKind::Rerun { .. } => ("RERUNNING", self.styles.retry),
                };
                write!(writer, "{:>12} ", status.style(style))?;
                match &request.kind {
                    AttemptKind::FullRun => {
                        writeln!(writer, "attempt {}: whole test binary", request.attempt)?;
                    }
                    AttemptKind::Rerun {
                        test_case,
                        rerun,
                        budget,
                        ..
                    } => {
                        writeln!(
                            writer,
                            "attempt {}: {} (rerun {rerun}/{budget})",
                            request.attempt,
                            test_case.style(self.styles.test_case),
                        )?;
                    }
                }

                if self.verbose {
                    writeln!(writer, "{:>12} {}", "command", display_command(&request.args))?;
                    for (key, value) in &request.env {
                        writeln!(writer, "{:>12} {key}={value}", "env")?;
                    }
                }
            }
            SupervisorEvent::AttemptFinished {
                request,
                outcome,
                classification,
            } => {
                writer.write_all(&outcome.output)?;
                if !outcome.output.is_empty() && !outcome.output.ends_with(b"\n") {
                    writeln!(writer)?;
                }
                writeln!(writer, "{}", outcome.exit)?;
                self.write_classification(
                    Some((request.attempt, outcome.duration)),
                    classification,
                    writer,
                )?;
            }
            SupervisorEvent::WholeRerunScheduled {
                reason,
                reruns_left,
            } => {
                write!(writer, "{:>12} ", "WHOLE RERUN".style(self.styles.retry))?;
                match reason {
                    WholeRerunReason::Crashed(reason) => writeln!(
                        writer,
                        "after a crash: {reason} ({} crash {} left)",
                        reruns_left.style(self.styles.count),
                        plural::reruns_str(*reruns_left),
                    )?,
                    WholeRerunReason::ExecutableFailed { code } => writeln!(
                        writer,
                        "after exit code {code}, with no XML log to rerun single test cases from",
                    )?,
                }
            }
            SupervisorEvent::TestCaseRecovered { test_case, reruns } => {
                write!(writer, "{:>12} ", "RECOVERED".style(self.styles.pass))?;
                writeln!(
                    writer,
                    "{} after {} {}",
                    test_case.style(self.styles.test_case),
                    reruns.style(self.styles.count),
                    plural::reruns_str(*reruns),
                )?;
            }
            SupervisorEvent::TestCaseConfirmed { test_case, reruns } => {
                write!(writer, "{:>12} ", "CONFIRMED".style(self.styles.fail))?;
                if *reruns == 0 {
                    writeln!(
                        writer,
                        "{} failed with no reruns allowed",
                        test_case.style(self.styles.test_case),
                    )?;
                } else {
                    writeln!(
                        writer,
                        "{} failed on all {} {}",
                        test_case.style(self.styles.test_case),
                        reruns.style(self.styles.count),
                        plural::reruns_str(*reruns),
                    )?;
                }
            }
            SupervisorEvent::Finished {
                verdict,
                confirmed_failures,
                recovered,
                attempts,
                elapsed,
            } => {
                let style = match verdict {
                    Verdict::Pass => self.styles.pass,
                    Verdict::Fail | Verdict::Crash | Verdict::UsageError => self.styles.fail,
                };
                writeln!(writer, "{}", "-".repeat(12))?;
                write!(writer, "{:>12} ", "Summary".style(style))?;
                writeln!(
                    writer,
                    "[{:>8.3}s] {} {}, {} recovered, {} confirmed failing",
                    elapsed.as_secs_f64(),
                    attempts.style(self.styles.count),
                    plural::attempts_str(*attempts),
                    recovered.len().style(self.styles.count),
                    confirmed_failures.len().style(self.styles.count),
                )?;
                if !recovered.is_empty() {
                    writeln!(writer, "{:>12} {}", "recovered:", self.join(recovered))?;
                }
                if !confirmed_failures.is_empty() {
                    writeln!(writer, "{:>12} {}", "failing:", self.join(confirmed_failures))?;
                }
                write!(writer, "{:>12} ", "VERDICT".style(style))?;
                writeln!(
                    writer,
                    "{} (exit code {})",
                    verdict.style(style),
                    verdict.exit_code(),
                )?;
            }
        }

        Ok(())
    }

    fn write_classification(
        &self,
        timing: Option<(u32, Duration)>,
        classification: &Classification,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        let (status, style) = match classification {
            Classification::Passed => ("PASS", self.styles.pass),
            Classification::FunctionsFailed(_) | Classification::ExecutableFailed { .. } => {
                ("FAIL", self.styles.fail)
            }
            Classification::Crashed(_) => ("CRASH", self.styles.fail),
        };
        write!(writer, "{:>12} ", status.style(style))?;
        if let Some((attempt, duration)) = timing {
            write!(
                writer,
                "[{:>8.3}s] attempt {attempt}: ",
                duration.as_secs_f64()
            )?;
        }

        match classification {
            Classification::Passed => writeln!(writer, "all test functions passed"),
            Classification::FunctionsFailed(failures) => writeln!(
                writer,
                "{} {} failed: {}",
                failures.len().style(self.styles.count),
                plural::test_cases_str(failures.len()),
                self.join(failures),
            ),
            Classification::ExecutableFailed { code } => {
                writeln!(writer, "test binary exited with code {code}")
            }
            Classification::Crashed(reason) => writeln!(writer, "{reason}"),
        }
    }

    fn join(&self, test_cases: &[TestCaseId]) -> String {
        let mut out = String::new();
        for (index, test_case) in test_cases.iter().enumerate() {
            if index > 0 {
                swrite!(out, ", ");
            }
            swrite!(out, "{}", test_case.style(self.styles.test_case));
        }
        out
    }
}
