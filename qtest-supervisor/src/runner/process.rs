// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ChildExit, LogState, RunOutcome, RunRequest, TestExecutor};
use crate::{errors::ExecuteError, helpers::display_command, stopwatch::stopwatch};
use std::{io, time::Duration};
use tracing::{debug, warn};

/// Runs attempts as child processes.
///
/// Standard error is merged into standard output and captured, standard input is closed, and the
/// request's environment is applied on top of the inherited environment.
#[derive(Clone, Debug)]
pub struct ProcessExecutor {
    poll_interval: Duration,
}

impl ProcessExecutor {
    /// Creates a new executor.
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TestExecutor for ProcessExecutor {
    fn execute(&mut self, request: &RunRequest) -> Result<RunOutcome, ExecuteError> {
        let (program, args) = request
            .args
            .split_first()
            .ok_or(ExecuteError::EmptyCommand {
                attempt: request.attempt,
            })?;
        let command = display_command(&request.args);

        let mut expr = duct::cmd(program.as_str(), args)
            .stdin_null()
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked();
        for (key, value) in &request.env {
            expr = expr.env(key, value);
        }
        if let Some(cwd) = &request.cwd {
            expr = expr.dir(cwd.as_std_path());
        }
        if request.timeout.is_some() {
            // Wrappers may fork the test binary rather than exec it, so a timeout has to reach
            // the whole process group.
            expr = set_process_group(expr);
        }

        debug!(attempt = request.attempt, "spawning {command}");
        let stopwatch = stopwatch();
        let handle = expr.start().map_err(|err| ExecuteError::Spawn {
            command: command.clone(),
            err,
        })?;

        let timed_out = loop {
            let finished = handle
                .try_wait()
                .map_err(|err| ExecuteError::Wait {
                    command: command.clone(),
                    err,
                })?
                .is_some();
            if finished {
                break false;
            }
            if let Some(timeout) = request.timeout
                && stopwatch.is_past(timeout)
            {
                warn!(
                    attempt = request.attempt,
                    "attempt exceeded its timeout of {}, killing it",
                    humantime::format_duration(timeout),
                );
                kill_attempt(&handle).map_err(|err| ExecuteError::Kill {
                    command: command.clone(),
                    err,
                })?;
                break true;
            }
            std::thread::sleep(self.poll_interval);
        };

        let (exit, output) = match handle.into_output() {
            Ok(output) if timed_out => (ChildExit::TimedOut, output.stdout),
            Ok(output) => (ChildExit::from_status(output.status), output.stdout),
            // Killed children may not report an output; what matters is the timeout.
            Err(_) if timed_out => (ChildExit::TimedOut, Vec::new()),
            Err(err) => return Err(ExecuteError::Wait { command, err }),
        };
        let duration = stopwatch.elapsed();
        debug!(attempt = request.attempt, ?exit, ?duration, "attempt finished");

        let log = match &request.log_path {
            Some(path) => LogState::load(path),
            None => LogState::NotExpected,
        };

        Ok(RunOutcome {
            exit,
            log,
            output,
            duration,
        })
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn set_process_group(expr: duct::Expression) -> duct::Expression {
            use std::os::unix::process::CommandExt;

            expr.before_spawn(|cmd| {
                cmd.process_group(0);
                Ok(())
            })
        }

        /// Kills the process group led by the child, then the child itself.
        fn kill_attempt(handle: &duct::Handle) -> io::Result<()> {
            for pid in handle.pids() {
                let Ok(pgid) = libc::pid_t::try_from(pid) else {
                    continue;
                };
                // SAFETY: kill has no memory safety preconditions.
                if unsafe { libc::kill(-pgid, libc::SIGKILL) } == -1 {
                    let err = io::Error::last_os_error();
                    // The group is already gone.
                    if err.raw_os_error() != Some(libc::ESRCH) {
                        return Err(err);
                    }
                }
            }
            handle.kill()
        }
    } else {
        fn set_process_group(expr: duct::Expression) -> duct::Expression {
            expr
        }

        fn kill_attempt(handle: &duct::Handle) -> io::Result<()> {
            handle.kill()
        }
    }
}
