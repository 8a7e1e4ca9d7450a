// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    Classification, ClassifyContext, CrashReason, RerunProgress, RerunTicket, RetryPolicy,
    RetryState, Verdict, classify,
};
use crate::{
    errors::{SupervisorError, WriteEventError},
    invocation::{AttemptArgs, Invocation},
    log_files::{LogFileNamer, LogFileNaming},
    reporter::events::{SupervisorEvent, WholeRerunReason},
    runner::{AttemptKind, ChildExit, LogState, RunRequest, TestExecutor},
    stopwatch::stopwatch,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use qtest_log::{TestCaseId, TestLog};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Builds a [`Supervisor`].
#[derive(Debug)]
pub struct SupervisorBuilder {
    invocation: Invocation,
    policy: RetryPolicy,
    log_dir: Utf8PathBuf,
    log_naming: Option<LogFileNaming>,
    timeout: Option<Duration>,
    env: IndexMap<String, String>,
    cwd: Option<Utf8PathBuf>,
    existing_log: Option<Utf8PathBuf>,
}

impl SupervisorBuilder {
    /// Creates a new builder for `invocation` with the default retry policy, writing logs to the
    /// current directory.
    pub fn new(invocation: Invocation) -> Self {
        Self {
            invocation,
            policy: RetryPolicy::default(),
            log_dir: Utf8PathBuf::from("."),
            log_naming: None,
            timeout: None,
            env: IndexMap::new(),
            cwd: None,
            existing_log: None,
        }
    }

    /// Sets the retry policy.
    pub fn set_policy(&mut self, policy: RetryPolicy) -> &mut Self {
        self.policy = policy;
        self
    }

    /// Sets the directory XML logs are written to.
    pub fn set_log_dir(&mut self, log_dir: impl Into<Utf8PathBuf>) -> &mut Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Sets how log files are named.
    ///
    /// By default this is decided by
    /// [`NO_UNIQUE_OUTPUT_FILENAME_ENV`](crate::log_files::NO_UNIQUE_OUTPUT_FILENAME_ENV) when
    /// supervision starts.
    pub fn set_log_naming(&mut self, log_naming: LogFileNaming) -> &mut Self {
        self.log_naming = Some(log_naming);
        self
    }

    /// Sets the per-attempt timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Sets an environment variable for every attempt.
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory for every attempt.
    pub fn set_cwd(&mut self, cwd: impl Into<Utf8PathBuf>) -> &mut Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Classifies the log at `path` instead of running the test binary first.
    ///
    /// The exit code is taken to be the number of failures in the log.
    pub fn set_existing_log(&mut self, path: impl Into<Utf8PathBuf>) -> &mut Self {
        self.existing_log = Some(path.into());
        self
    }

    /// Creates a new supervisor that runs attempts through `executor`.
    pub fn build<E: TestExecutor>(self, executor: E) -> Result<Supervisor<E>, SupervisorError> {
        self.policy.validate()?;

        let log_dir = match &self.cwd {
            Some(cwd) if self.log_dir.is_relative() => cwd.join(&self.log_dir),
            _ => self.log_dir,
        };

        Ok(Supervisor {
            invocation: self.invocation,
            policy: self.policy,
            log_dir,
            log_naming: self.log_naming,
            timeout: self.timeout,
            env: self.env,
            cwd: self.cwd,
            existing_log: self.existing_log,
            executor,
        })
    }
}

/// Supervises one test binary until a verdict is reached.
#[derive(Debug)]
pub struct Supervisor<E> {
    invocation: Invocation,
    policy: RetryPolicy,
    log_dir: Utf8PathBuf,
    log_naming: Option<LogFileNaming>,
    timeout: Option<Duration>,
    env: IndexMap<String, String>,
    cwd: Option<Utf8PathBuf>,
    existing_log: Option<Utf8PathBuf>,
    executor: E,
}

impl<E: TestExecutor> Supervisor<E> {
    /// Runs supervision to a verdict, passing events to `callback`.
    pub fn execute<F>(self, mut callback: F) -> Result<RunSummary, SupervisorError>
    where
        F: FnMut(SupervisorEvent<'_>),
    {
        self.try_execute(|event| {
            callback(event);
            Ok(())
        })
    }

    /// Runs supervision to a verdict, passing events to a fallible `callback`.
    ///
    /// An error from the callback stops supervision.
    pub fn try_execute<F>(self, callback: F) -> Result<RunSummary, SupervisorError>
    where
        F: FnMut(SupervisorEvent<'_>) -> Result<(), WriteEventError>,
    {
        let stopwatch = stopwatch();
        let namer = match self.invocation.log_base_name() {
            Some(base_name) => {
                let naming = self
                    .log_naming
                    .clone()
                    .unwrap_or_else(|| LogFileNaming::from_env(stopwatch.start_time()));
                std::fs::create_dir_all(&self.log_dir).map_err(|err| {
                    SupervisorError::CreateLogDir {
                        dir: self.log_dir.clone(),
                        err,
                    }
                })?;
                Some(LogFileNamer::new(self.log_dir.clone(), base_name, naming))
            }
            None => None,
        };

        let mut cx = RunContext {
            invocation: &self.invocation,
            policy: &self.policy,
            namer,
            timeout: self.timeout,
            env: &self.env,
            cwd: self.cwd.as_deref(),
            executor: self.executor,
            callback,
            state: RetryState::new(&self.policy),
            attempts: 0,
            full_runs: 0,
        };

        (cx.callback)(SupervisorEvent::Started {
            invocation: cx.invocation,
            policy: cx.policy,
        })?;

        let verdict = cx.run(self.existing_log.as_deref())?;
        let verdict = cx.state.finish(verdict);
        let elapsed = stopwatch.elapsed();
        (cx.callback)(SupervisorEvent::Finished {
            verdict,
            confirmed_failures: cx.state.confirmed(),
            recovered: cx.state.recovered(),
            attempts: cx.attempts,
            elapsed,
        })?;

        Ok(RunSummary {
            verdict,
            attempts: cx.attempts,
            full_runs: cx.full_runs,
            confirmed_failures: cx.state.confirmed().to_vec(),
            recovered: cx.state.recovered().to_vec(),
            elapsed,
        })
    }
}

/// A summary of a supervised run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// The verdict.
    pub verdict: Verdict,

    /// The number of times the test binary was started.
    pub attempts: u32,

    /// The number of those attempts that ran the whole test binary.
    pub full_runs: u32,

    /// Test cases that failed through their whole rerun budget.
    pub confirmed_failures: Vec<TestCaseId>,

    /// Test cases that failed and then passed on a rerun.
    pub recovered: Vec<TestCaseId>,

    /// How long supervision took.
    pub elapsed: Duration,
}

/// How confirming the failures of one full run ended.
enum Confirmation {
    /// Every failure either recovered or was confirmed.
    Settled,
    Crashed(CrashReason),
}

struct RunContext<'a, E, F> {
    invocation: &'a Invocation,
    policy: &'a RetryPolicy,
    namer: Option<LogFileNamer>,
    timeout: Option<Duration>,
    env: &'a IndexMap<String, String>,
    cwd: Option<&'a Utf8Path>,
    executor: E,
    callback: F,
    state: RetryState,
    attempts: u32,
    full_runs: u32,
}

impl<E, F> RunContext<'_, E, F>
where
    E: TestExecutor,
    F: FnMut(SupervisorEvent<'_>) -> Result<(), WriteEventError>,
{
    fn run(&mut self, existing_log: Option<&Utf8Path>) -> Result<Verdict, SupervisorError> {
        let mut classification = match existing_log {
            Some(path) => self.classify_existing_log(path)?,
            None => self.full_run()?,
        };

        loop {
            classification = match classification {
                Classification::Passed => return Ok(self.passed_verdict()),
                Classification::ExecutableFailed { code } => {
                    if !self.state.take_executable_rerun() {
                        return Ok(Verdict::Fail);
                    }
                    info!("test binary exited with code {code}, rerunning it once");
                    (self.callback)(SupervisorEvent::WholeRerunScheduled {
                        reason: WholeRerunReason::ExecutableFailed { code },
                        reruns_left: 0,
                    })?;
                    self.full_run()?
                }
                Classification::FunctionsFailed(failures) => {
                    match self.confirm_failures(failures)? {
                        Confirmation::Settled => return Ok(self.passed_verdict()),
                        Confirmation::Crashed(reason) => match self.rerun_after_crash(&reason)? {
                            Some(classification) => classification,
                            None => return Ok(Verdict::Crash),
                        },
                    }
                }
                Classification::Crashed(reason) => match self.rerun_after_crash(&reason)? {
                    Some(classification) => classification,
                    None => return Ok(Verdict::Crash),
                },
            };
        }
    }

    fn classify_existing_log(&mut self, path: &Utf8Path) -> Result<Classification, SupervisorError> {
        let log = TestLog::parse_file(path).map_err(SupervisorError::ExistingLog)?;
        // QtTest exits with the number of failures, so that is the exit code assumed here.
        let failures = log.failures().len();
        let exit = ChildExit::Exited(i32::try_from(failures).map_or(127, |n| n.min(127)));
        let log = LogState::Parsed(log);
        let classification = self.classify(&exit, &log);
        debug!("existing log {path} classified as {classification:?}");

        if let Some(log) = log.log() {
            (self.callback)(SupervisorEvent::ExistingLogParsed {
                path,
                log,
                classification: &classification,
            })?;
        }
        Ok(classification)
    }

    fn confirm_failures(
        &mut self,
        failures: Vec<TestCaseId>,
    ) -> Result<Confirmation, SupervisorError> {
        let pending = self.state.begin_confirmation(failures).to_vec();
        for test_case in pending {
            loop {
                let Some(ticket) = self.state.next_rerun(&test_case) else {
                    self.state.confirm(&test_case);
                    let reruns = self
                        .state
                        .progress(&test_case)
                        .map_or(0, |progress| progress.reruns);
                    warn!("{test_case} failed {reruns} reruns, failure confirmed");
                    (self.callback)(SupervisorEvent::TestCaseConfirmed {
                        test_case: &test_case,
                        reruns,
                    })?;
                    break;
                };

                match self.rerun(&test_case, ticket)? {
                    Classification::Passed => {
                        if self.state.record_pass(&test_case) == RerunProgress::Recovered {
                            info!("{test_case} passed on rerun {}", ticket.rerun);
                            (self.callback)(SupervisorEvent::TestCaseRecovered {
                                test_case: &test_case,
                                reruns: ticket.rerun,
                            })?;
                            break;
                        }
                    }
                    Classification::FunctionsFailed(_) | Classification::ExecutableFailed { .. } => {}
                    Classification::Crashed(reason) => return Ok(Confirmation::Crashed(reason)),
                }
            }
        }

        Ok(Confirmation::Settled)
    }

    /// The verdict once nothing is left to rerun. Failures confirmed before a whole rerun still
    /// count even if that rerun passes.
    fn passed_verdict(&self) -> Verdict {
        if self.state.confirmed().is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    fn rerun_after_crash(
        &mut self,
        reason: &CrashReason,
    ) -> Result<Option<Classification>, SupervisorError> {
        if !reason.allows_rerun() {
            warn!("crash is not recoverable: {reason}");
            return Ok(None);
        }
        if !self.state.take_crash_rerun() {
            warn!("crash reruns exhausted: {reason}");
            return Ok(None);
        }

        info!("rerunning the whole test binary after a crash: {reason}");
        (self.callback)(SupervisorEvent::WholeRerunScheduled {
            reason: WholeRerunReason::Crashed(reason),
            reruns_left: self.state.crash_reruns_left(),
        })?;
        self.full_run().map(Some)
    }

    fn full_run(&mut self) -> Result<Classification, SupervisorError> {
        self.full_runs += 1;
        self.attempt(AttemptKind::FullRun, None, false)
    }

    fn rerun(
        &mut self,
        test_case: &TestCaseId,
        ticket: RerunTicket,
    ) -> Result<Classification, SupervisorError> {
        let kind = AttemptKind::Rerun {
            test_case: test_case.clone(),
            rerun: ticket.rerun,
            budget: ticket.budget,
            verbose: ticket.verbose,
        };
        self.attempt(kind, Some(test_case), ticket.verbose)
    }

    fn attempt(
        &mut self,
        kind: AttemptKind,
        selection: Option<&TestCaseId>,
        verbose: bool,
    ) -> Result<Classification, SupervisorError> {
        self.attempts += 1;
        let attempt = self.attempts;
        let log_path = match &self.namer {
            Some(namer) => Some(namer.prepare(attempt)?),
            None => None,
        };

        let args = self.invocation.command(&AttemptArgs {
            log_file: log_path.as_deref(),
            verbose,
            selection,
        });
        let request = RunRequest {
            attempt,
            kind,
            args,
            env: self.invocation.env(self.env, verbose),
            cwd: self.cwd.map(Utf8Path::to_path_buf),
            log_path,
            timeout: self.timeout,
        };

        (self.callback)(SupervisorEvent::AttemptStarted { request: &request })?;
        let outcome = self.executor.execute(&request)?;
        let classification = self.classify(&outcome.exit, &outcome.log);
        debug!(attempt, "classified as {classification:?}");
        (self.callback)(SupervisorEvent::AttemptFinished {
            request: &request,
            outcome: &outcome,
            classification: &classification,
        })?;

        Ok(classification)
    }

    fn classify(&self, exit: &ChildExit, log: &LogState) -> Classification {
        classify(
            exit,
            log,
            &ClassifyContext {
                no_rerun_functions: &self.policy.no_rerun_functions,
            },
        )
    }
}
