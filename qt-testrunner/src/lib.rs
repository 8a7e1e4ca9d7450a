// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supervises a QtTest binary: reruns failing test cases to tell flaky failures from real ones,
//! reruns the whole binary after a crash, and exits with a code describing the verdict.
//!
//! | exit code | verdict                                                   |
//! |-----------|-----------------------------------------------------------|
//! | 0         | every test case passed, possibly after reruns             |
//! | 1         | usage error: bad arguments, config, or unspawnable binary |
//! | 2         | at least one test case failed through its rerun budget    |
//! | 3         | the test binary crashed and reruns did not help           |

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputContext;
