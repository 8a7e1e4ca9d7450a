// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tests for test binaries run behind wrapper scripts. The scripts are shell scripts, so these
//! tests only run on Unix.

#![cfg(unix)]

use crate::fixtures::*;
use camino::{Utf8Path, Utf8PathBuf};
use indoc::indoc;
use integration_tests::mock::MOCK_BIN_ENV;
use pretty_assertions::assert_eq;
use qtest_supervisor::{exit_codes::SupervisorExitCode, log_files::NO_UNIQUE_OUTPUT_FILENAME_ENV};
use std::{
    os::unix::fs::PermissionsExt,
    time::{Duration, Instant},
};

fn write_script(dir: &Utf8Path, name: &str, contents: &str) -> Utf8PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("wrote script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("made script executable");
    path
}

#[test]
fn passthrough_wrapper() {
    let env = TestEnv::new();
    let wrapper = write_script(
        env.path(),
        "coin_qnx_qemu_runner.sh",
        indoc! {r#"
            #!/bin/sh
            exec "$@"
        "#},
    );

    let output = env
        .cli("always_pass,flaky_1")
        .env(NO_UNIQUE_OUTPUT_FILENAME_ENV, "1")
        .args(["--max-repeats", "2", wrapper.as_str(), MOCK_BIN, "-silent"])
        .output();

    assert_exit_code(&output, SupervisorExitCode::OK);
    let invocations = env.invocations();
    assert_eq!(describe(&invocations), vec!["full", "flaky_1"]);
    // Test arguments come first, injected log arguments after them, and the selected test
    // function last.
    let log_arg = format!("{},xml", env.log_dir().join("qt-mock-test.xml"));
    assert_eq!(
        invocations[1].args,
        vec!["-silent", "-o", log_arg.as_str(), "-o", "-,txt", "flaky_1"]
    );
}

#[test]
fn timeout_reaches_forked_test_binary() {
    let env = TestEnv::new();
    // Runs the mock as a child of the shell rather than replacing it.
    let wrapper = write_script(
        env.path(),
        "coin_qnx_qemu_runner.sh",
        indoc! {r#"
            #!/bin/sh
            "$@"
            exit $?
        "#},
    );

    let started = Instant::now();
    let output = env
        .cli("hang")
        .args(["--crash-reruns", "0", "--timeout", "1s", wrapper.as_str(), MOCK_BIN])
        .output();
    let elapsed = started.elapsed();

    assert_exit_code(&output, SupervisorExitCode::CRASHED);
    assert!(
        elapsed < Duration::from_secs(30),
        "the hanging test binary was killed, took {elapsed:?}:\n\n{output}"
    );
}

#[test]
fn separator_wrapper() {
    let env = TestEnv::new();
    // Drops the wrapper's own arguments, then runs the mock with everything after `--`.
    let wrapper = write_script(
        env.path(),
        "androidtestrunner",
        indoc! {r#"
            #!/bin/sh
            while [ $# -gt 0 ] && [ "$1" != "--" ]; do shift; done
            [ $# -gt 0 ] && shift
            exec "$QT_MOCK_TEST_BIN" "$@"
        "#},
    );

    let output = env
        .cli("always_pass,always_fail")
        .env(MOCK_BIN_ENV, MOCK_BIN)
        .env(NO_UNIQUE_OUTPUT_FILENAME_ENV, "1")
        .args([
            "--max-repeats",
            "1",
            wrapper.as_str(),
            "--apk",
            "/build/android/tst_android.apk",
            "--",
            "-platform",
            "offscreen",
        ])
        .output();

    assert_exit_code(&output, SupervisorExitCode::TEST_FAILED);
    // The log is named after the package, not the wrapper.
    assert_eq!(env.log_files(), vec!["tst_android.xml"]);

    let invocations = env.invocations();
    assert_eq!(
        describe(&invocations),
        vec!["full", "always_fail (verbose)"]
    );
    assert_eq!(invocations[0].args[..2], ["-platform", "offscreen"]);
}

#[test]
fn separator_wrapper_without_package() {
    let env = TestEnv::new();
    let wrapper = write_script(
        env.path(),
        "androidtestrunner",
        indoc! {r#"
            #!/bin/sh
            exit 0
        "#},
    );

    let output = env
        .cli("always_pass")
        .args([wrapper.as_str(), "--", "-platform", "offscreen"])
        .output();

    assert_exit_code(&output, SupervisorExitCode::USAGE_ERROR);
    assert!(
        output.stderr_as_str().contains("--apk"),
        "error says what is missing:\n\n{output}"
    );
}
