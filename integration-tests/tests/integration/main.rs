// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests
//!
//! These tests run qt-testrunner against `qt-mock-test`, a small binary that imitates a QtTest
//! binary: it honors `-o <file>,xml`, runs the test functions named on its command line, and
//! exits with the number of failures.
//!
//! Running the qt-testrunner binary that is also being built is forbidden on Windows, since cargo
//! would try to replace a running executable. As with other test runners, we work around this
//! with a "qt-testrunner-dup" binary that is exactly the same as qt-testrunner.

use indoc::indoc;
use integration_tests::{
    mock::{FAIL_INIT_ENV, NO_XML_ENV, STATE_FILE_ENV},
    testrunner_cli::QtTestRunnerCli,
};
use pretty_assertions::assert_eq;
use qtest_log::TestLog;
use qtest_supervisor::{exit_codes::SupervisorExitCode, log_files::NO_UNIQUE_OUTPUT_FILENAME_ENV};

mod fixtures;
mod wrappers;

use fixtures::*;

#[test]
fn passing_binary() {
    let env = TestEnv::new();
    let output = env
        .cli("always_pass,another_pass")
        .args(["--max-repeats", "3", MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::OK);
    assert_eq!(describe(&env.invocations()), vec!["full"]);

    let stdout = output.stdout_as_str();
    assert!(
        stdout.contains("PASS   : tst_mock::another_pass()"),
        "test binary output is echoed:\n\n{output}"
    );
    assert!(
        stdout.contains("VERDICT PASS (exit code 0)"),
        "verdict is reported:\n\n{output}"
    );
}

#[test]
fn flaky_failure_recovers() {
    let env = TestEnv::new();
    let output = env
        .cli("always_pass,flaky_1")
        .args(["--max-repeats", "3", MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::OK);
    assert_eq!(describe(&env.invocations()), vec!["full", "flaky_1"]);
    assert!(
        output.stdout_as_str().contains("RECOVERED flaky_1"),
        "recovery is reported:\n\n{output}"
    );
}

#[test]
fn passes_needed_requires_repeated_passes() {
    let env = TestEnv::new();
    let output = env
        .cli("flaky_1")
        .args(["--max-repeats", "3", "--passes-needed", "2", MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::OK);
    assert_eq!(
        describe(&env.invocations()),
        vec!["full", "flaky_1", "flaky_1"]
    );
}

#[test]
fn persistent_failure_is_confirmed() {
    let env = TestEnv::new();
    let output = env
        .cli("always_pass,always_fail")
        .args(["--max-repeats", "2", MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::TEST_FAILED);
    // The last rerun in the budget is verbose.
    assert_eq!(
        describe(&env.invocations()),
        vec!["full", "always_fail", "always_fail (verbose)"]
    );
    assert!(
        output.stdout_as_str().contains("VERDICT FAIL (exit code 2)"),
        "verdict is reported:\n\n{output}"
    );
}

#[test]
fn zero_repeats_confirms_immediately() {
    let env = TestEnv::new();
    let output = env
        .cli("flaky_1")
        .args(["--max-repeats", "0", MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::TEST_FAILED);
    assert_eq!(describe(&env.invocations()), vec!["full"]);
}

#[test]
fn only_failing_cases_are_rerun() {
    let env = TestEnv::new();
    let output = env
        .cli("flaky_1,always_pass,flaky_2")
        .args(["--max-repeats", "3", MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::OK);
    assert_eq!(
        describe(&env.invocations()),
        vec!["full", "flaky_1", "flaky_2", "flaky_2"]
    );
}

#[test]
fn crash_recovers_on_whole_rerun() {
    let env = TestEnv::new();
    let output = env
        .cli("always_pass,crash_once")
        .args(["--crash-reruns", "1", MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::OK);
    assert_eq!(describe(&env.invocations()), vec!["full", "full"]);
    assert!(
        output.stdout_as_str().contains("WHOLE RERUN after a crash"),
        "whole rerun is reported:\n\n{output}"
    );
}

#[test]
fn repeated_crash() {
    let env = TestEnv::new();
    let output = env
        .cli("always_crash")
        .args(["--crash-reruns", "1", MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::CRASHED);
    assert_eq!(describe(&env.invocations()), vec!["full", "full"]);
}

#[test]
fn no_rerun_function_failure_is_a_crash() {
    let env = TestEnv::new();
    let output = env
        .cli("always_pass")
        .env(FAIL_INIT_ENV, "1")
        .args(["--crash-reruns", "3", MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::CRASHED);
    assert_eq!(describe(&env.invocations()), vec!["full"]);
}

#[test]
fn missing_log_is_a_crash() {
    let env = TestEnv::new();
    let output = env
        .cli("always_pass")
        .env(NO_XML_ENV, "1")
        .args(["--crash-reruns", "1", MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::CRASHED);
    assert_eq!(describe(&env.invocations()), vec!["full", "full"]);
    assert!(
        output.stdout_as_str().contains("no XML log was written"),
        "crash reason is reported:\n\n{output}"
    );
}

#[test]
fn timeout_is_a_crash() {
    let env = TestEnv::new();
    let output = env
        .cli("hang")
        .args(["--crash-reruns", "0", "--timeout", "1s", MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::CRASHED);
    assert_eq!(describe(&env.invocations()), vec!["full"]);
    assert!(
        output.stdout_as_str().contains("timed out"),
        "timeout is reported:\n\n{output}"
    );
}

#[test]
fn no_extra_args() {
    let env = TestEnv::new();
    let output = env
        .cli("always_pass")
        .args(["--no-extra-args", MOCK_BIN, "-platform", "offscreen"])
        .output();

    assert_exit_code(&output, SupervisorExitCode::OK);
    let invocations = env.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].args, vec!["-platform", "offscreen"]);
    assert_eq!(invocations[0].xml_log, None);
}

#[test]
fn no_extra_args_failure_reruns_once() {
    let env = TestEnv::new();
    let output = env
        .cli("always_fail")
        .args(["--no-extra-args", "--max-repeats", "5", MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::TEST_FAILED);
    assert_eq!(describe(&env.invocations()), vec!["full", "full"]);
}

#[test]
fn unique_log_file_per_attempt() {
    let env = TestEnv::new();
    let output = env
        .cli("flaky_1")
        .args(["--max-repeats", "3", MOCK_BIN])
        .output();
    assert_exit_code(&output, SupervisorExitCode::OK);

    let files = env.log_files();
    assert_eq!(files.len(), 2, "one log per attempt: {files:?}");
    for (attempt, file) in files.iter().enumerate() {
        assert!(
            file.starts_with("qt-mock-test-") && file.ends_with(&format!("-{}.xml", attempt + 1)),
            "unexpected log file name {file}"
        );
    }

    let invocations = env.invocations();
    for (invocation, file) in invocations.iter().zip(&files) {
        assert_eq!(
            invocation.xml_log.as_deref(),
            Some(env.log_dir().join(file).as_str())
        );
    }
}

#[test]
fn fixed_log_file_name() {
    let env = TestEnv::new();
    let output = env
        .cli("always_pass,always_fail")
        .env(NO_UNIQUE_OUTPUT_FILENAME_ENV, "1")
        .args(["--max-repeats", "1", MOCK_BIN])
        .output();
    assert_exit_code(&output, SupervisorExitCode::TEST_FAILED);

    assert_eq!(env.log_files(), vec!["qt-mock-test.xml"]);
    // The file is overwritten by each attempt, so it holds the rerun.
    let log = TestLog::parse_file(&env.log_dir().join("qt-mock-test.xml")).expect("log parses");
    let names: Vec<_> = log
        .functions
        .iter()
        .map(|function| function.name.as_str())
        .collect();
    assert_eq!(names, vec!["initTestCase", "always_fail", "cleanupTestCase"]);
}

#[test]
fn relative_log_dir_is_relative_to_current_dir() {
    let env = TestEnv::new();
    let output = QtTestRunnerCli::new(TESTRUNNER_BIN)
        .env(STATE_FILE_ENV, env.state_file().as_str())
        .current_dir(env.path())
        .args(["--log-dir", "relative-logs", MOCK_BIN])
        .output();
    assert_exit_code(&output, SupervisorExitCode::OK);

    let invocations = env.invocations();
    let xml_log = invocations[0].xml_log.as_deref().expect("log requested");
    assert!(
        xml_log.starts_with("relative-logs") && env.path().join(xml_log).is_file(),
        "log {xml_log} written under the current directory"
    );
}

#[test]
fn parse_existing_log() {
    let env = TestEnv::new();
    let existing = env.path().join("existing.xml");
    std::fs::write(
        &existing,
        indoc! {r#"
            <?xml version="1.0" encoding="UTF-8"?>
            <TestCase name="tst_mock">
            <TestFunction name="initTestCase">
            <Incident type="pass" file="" line="0" />
            </TestFunction>
            <TestFunction name="always_pass">
            <Incident type="fail" file="tst_mock.cpp" line="42">
                <Description><![CDATA[failed on the machine that wrote this log]]></Description>
            </Incident>
            </TestFunction>
            <TestFunction name="also_passes">
            <Incident type="pass" file="" line="0" />
            </TestFunction>
            </TestCase>
        "#},
    )
    .expect("wrote existing log");

    let output = env
        .cli("always_pass,also_passes")
        .args(["--parse-xml-testlog", existing.as_str(), MOCK_BIN])
        .output();

    assert_exit_code(&output, SupervisorExitCode::OK);
    // The existing log stands in for the first run, so only the failing case runs.
    assert_eq!(describe(&env.invocations()), vec!["always_pass"]);
}

#[test]
fn missing_existing_log_is_a_usage_error() {
    let env = TestEnv::new();
    let output = env
        .cli("always_pass")
        .args([
            "--parse-xml-testlog",
            env.path().join("does-not-exist.xml").as_str(),
            MOCK_BIN,
        ])
        .output();

    assert_exit_code(&output, SupervisorExitCode::USAGE_ERROR);
    assert!(env.invocations().is_empty());
}

#[test]
fn invalid_arguments_are_usage_errors() {
    let env = TestEnv::new();
    let output = env
        .cli("always_pass")
        .args(["--max-repeats", "many", MOCK_BIN])
        .output();
    assert_exit_code(&output, SupervisorExitCode::USAGE_ERROR);

    // No test binary.
    let output = QtTestRunnerCli::new(TESTRUNNER_BIN).output();
    assert_exit_code(&output, SupervisorExitCode::USAGE_ERROR);

    assert!(env.invocations().is_empty());
}

#[test]
fn unspawnable_binary_is_a_usage_error() {
    let env = TestEnv::new();
    let missing = env.path().join("tst_missing");
    let output = env.cli("always_pass").arg(missing.as_str()).output();

    assert_exit_code(&output, SupervisorExitCode::USAGE_ERROR);
    assert!(
        output.stderr_as_str().contains("tst_missing"),
        "error names the binary:\n\n{output}"
    );
}

#[test]
fn config_profile() {
    let env = TestEnv::new();
    let config = env.path().join("qt-testrunner.toml");
    std::fs::write(
        &config,
        indoc! {r#"
            [profile.ci]
            max-repeats = 0
        "#},
    )
    .expect("wrote config");

    let output = env
        .cli("flaky_1")
        .args([
            "--config-file",
            config.as_str(),
            "--profile",
            "ci",
            MOCK_BIN,
        ])
        .output();
    assert_exit_code(&output, SupervisorExitCode::TEST_FAILED);
    assert_eq!(describe(&env.invocations()), vec!["full"]);

    let output = env
        .cli("always_pass")
        .args([
            "--config-file",
            config.as_str(),
            "--profile",
            "nightly",
            MOCK_BIN,
        ])
        .output();
    assert_exit_code(&output, SupervisorExitCode::USAGE_ERROR);
    assert!(
        output.stderr_as_str().contains("nightly"),
        "error names the profile:\n\n{output}"
    );
}

#[test]
fn repository_config_is_picked_up() {
    let env = TestEnv::new();
    std::fs::create_dir_all(env.path().join(".config")).expect("created .config");
    std::fs::write(
        env.path().join(".config/qt-testrunner.toml"),
        indoc! {r#"
            [profile.default]
            max-repeats = 1
        "#},
    )
    .expect("wrote config");

    let output = env.cli("always_fail").arg(MOCK_BIN).output();
    assert_exit_code(&output, SupervisorExitCode::TEST_FAILED);
    assert_eq!(
        describe(&env.invocations()),
        vec!["full", "always_fail (verbose)"]
    );
}
