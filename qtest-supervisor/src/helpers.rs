// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for qtest-supervisor.

use camino::Utf8Path;

/// Utilities for pluralizing various words based on count.
pub mod plural {
    /// Returns "test case" if `count` is 1, otherwise "test cases".
    pub fn test_cases_str(count: usize) -> &'static str {
        if count == 1 { "test case" } else { "test cases" }
    }

    /// Returns "rerun" if `count` is 1, otherwise "reruns".
    pub fn reruns_str(count: u32) -> &'static str {
        if count == 1 { "rerun" } else { "reruns" }
    }

    /// Returns "attempt" if `count` is 1, otherwise "attempts".
    pub fn attempts_str(count: u32) -> &'static str {
        if count == 1 { "attempt" } else { "attempts" }
    }
}

/// Shell-quotes an argument vector for display.
pub(crate) fn display_command(args: &[String]) -> String {
    shell_words::join(args)
}

/// Returns the file name of `path` with its final extension removed.
///
/// Both `/` and `\` are accepted as separators so that wrapper arguments naming Windows paths are
/// handled on every host.
pub(crate) fn artifact_stem(path: &str) -> Option<&str> {
    let file_name = path.rsplit(['/', '\\']).next()?;
    Utf8Path::new(file_name)
        .file_stem()
        .filter(|stem| !stem.is_empty())
}

/// Returns the file name of a program path, for matching against known wrapper names.
pub(crate) fn program_file_name(program: &str) -> &str {
    program.rsplit(['/', '\\']).next().unwrap_or(program)
}

#[cfg(unix)]
pub(crate) fn signal_str(signal: i32) -> Option<&'static str> {
    // These signal numbers are the same on at least Linux, macOS, FreeBSD and illumos.
    match signal {
        1 => Some("HUP"),
        2 => Some("INT"),
        3 => Some("QUIT"),
        4 => Some("ILL"),
        5 => Some("TRAP"),
        6 => Some("ABRT"),
        8 => Some("FPE"),
        9 => Some("KILL"),
        11 => Some("SEGV"),
        13 => Some("PIPE"),
        14 => Some("ALRM"),
        15 => Some("TERM"),
        _ => None,
    }
}
