// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read QtTest XML logs in Rust.
//!
//! QtTest binaries write a structured log when invoked with `-o <file>,xml`. This crate parses
//! that log into a [`TestLog`]: one [`FunctionResult`] per `<TestFunction>` element, each carrying
//! its incidents and diagnostic messages.

#![warn(missing_docs)]

mod errors;
mod parse;
mod report;

pub use errors::*;
pub use report::*;
