// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Retry and crash supervision for QtTest binaries.
//!
//! A QtTest binary is run under supervision: every attempt writes an XML log, individual failing
//! test cases are rerun to tell flaky failures from real ones, and the whole binary is rerun
//! after a crash. The result is a single [`Verdict`](retry::Verdict) with a fixed exit code.
//!
//! The basic flow is:
//!
//! 1. Resolve a [`CommandLine`](invocation::CommandLine) into an
//!    [`Invocation`](invocation::Invocation).
//! 2. Build a [`Supervisor`](retry::Supervisor) with a [`RetryPolicy`](retry::RetryPolicy),
//!    usually from a [`SupervisorProfile`](config::SupervisorProfile).
//! 3. Execute it with a [`ProcessExecutor`](runner::ProcessExecutor), passing events to a
//!    [`Reporter`](reporter::Reporter).

pub mod config;
pub mod errors;
pub mod exit_codes;
mod helpers;
pub mod invocation;
pub mod log_files;
pub mod reporter;
pub mod retry;
pub mod runner;
mod stopwatch;
