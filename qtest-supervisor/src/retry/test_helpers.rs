// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::ExecuteError,
    runner::{AttemptKind, ChildExit, LogState, RunOutcome, RunRequest, TestExecutor},
};
use qtest_log::{FunctionResult, Incident, IncidentKind, Message, TestLog};
use std::{collections::BTreeMap, fmt::Write, time::Duration};

/// What a scripted test function does when it runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Pass,
    Fail,
    /// Passes, but logs a fatal message.
    Fatal,
    /// Kills the process with SIGSEGV before the log is written.
    Crash,
}

/// An executor that simulates a QtTest binary from per-function scripts.
///
/// Each function's script is indexed by how many times the function has run so far, with the
/// last outcome repeating. Reruns only run the selected function.
#[derive(Debug, Default)]
pub(crate) struct ScriptedExecutor {
    functions: Vec<(String, Vec<Outcome>)>,
    executions: BTreeMap<String, usize>,
    no_log: bool,
    requests: Vec<RunRequest>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn function(
        mut self,
        name: impl Into<String>,
        outcomes: impl IntoIterator<Item = Outcome>,
    ) -> Self {
        let outcomes: Vec<_> = outcomes.into_iter().collect();
        assert!(!outcomes.is_empty(), "scripts need at least one outcome");
        self.functions.push((name.into(), outcomes));
        self
    }

    /// Never writes the log, even when asked to.
    pub(crate) fn without_log(mut self) -> Self {
        self.no_log = true;
        self
    }

    pub(crate) fn requests(&self) -> &[RunRequest] {
        &self.requests
    }
}

impl TestExecutor for ScriptedExecutor {
    fn execute(&mut self, request: &RunRequest) -> Result<RunOutcome, ExecuteError> {
        self.requests.push(request.clone());
        let selection = match &request.kind {
            AttemptKind::FullRun => None,
            AttemptKind::Rerun { test_case, .. } => Some(test_case.function.as_str()),
        };

        let mut log = TestLog {
            name: Some("tst_scripted".to_owned()),
            functions: Vec::new(),
        };
        let mut output = String::new();
        let mut crashed = false;

        for (name, outcomes) in &self.functions {
            if selection.is_some_and(|selected| selected != name) {
                continue;
            }
            let count = self.executions.entry(name.clone()).or_default();
            let outcome = outcomes[(*count).min(outcomes.len() - 1)];
            *count += 1;

            let mut function = FunctionResult::new(name.clone());
            match outcome {
                Outcome::Pass => {
                    function.add_incident(Incident::new(IncidentKind::Pass));
                    writeln!(output, "PASS   : tst_scripted::{name}()").expect("writing to String");
                }
                Outcome::Fail => {
                    function.add_incident(Incident::new(IncidentKind::Fail));
                    writeln!(output, "FAIL!  : tst_scripted::{name}() scripted failure")
                        .expect("writing to String");
                }
                Outcome::Fatal => {
                    function
                        .add_message(Message::new("qfatal", "scripted fatal message"))
                        .add_incident(Incident::new(IncidentKind::Pass));
                    writeln!(output, "QFATAL : tst_scripted::{name}() scripted fatal message")
                        .expect("writing to String");
                }
                Outcome::Crash => {
                    writeln!(output, "Received signal 11").expect("writing to String");
                    crashed = true;
                    break;
                }
            }
            log.functions.push(function);
        }

        let (exit, log) = if crashed {
            let log = match request.log_path {
                Some(_) => LogState::Missing,
                None => LogState::NotExpected,
            };
            (
                ChildExit::Abnormal {
                    code: None,
                    signal: Some(11),
                },
                log,
            )
        } else {
            let failures = i32::try_from(log.failures().len()).expect("few failures");
            let log = match (&request.log_path, self.no_log) {
                (None, _) => LogState::NotExpected,
                (Some(_), true) => LogState::Missing,
                (Some(_), false) => LogState::Parsed(log),
            };
            (ChildExit::Exited(failures), log)
        };

        Ok(RunOutcome {
            exit,
            log,
            output: output.into_bytes(),
            duration: Duration::from_millis(5),
        })
    }
}
