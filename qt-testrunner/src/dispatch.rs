// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    Result,
    output::{OutputContext, OutputOpts, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, error::ErrorKind};
use qtest_supervisor::{
    config::{SupervisorConfig, SupervisorProfile},
    exit_codes::SupervisorExitCode,
    invocation::{CommandLine, InvocationBuilder},
    reporter::{ReporterBuilder, ReporterOutput},
    retry::{SupervisorBuilder, Verdict},
    runner::ProcessExecutor,
};
use std::time::Duration;
use tracing::debug;

/// Parses arguments, runs the app and exits the process with the verdict's exit code.
///
/// Argument errors exit with [`SupervisorExitCode::USAGE_ERROR`], so that they can't be confused
/// with a failing test binary.
pub fn main_impl() -> ! {
    let app = match QtTestRunnerApp::try_parse() {
        Ok(app) => app,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => SupervisorExitCode::OK,
                _ => Verdict::UsageError.exit_code(),
            };
            // Nothing useful can be done if stderr is gone.
            let _ = err.print();
            std::process::exit(code);
        }
    };
    let output = app.init_output();

    match app.exec(output) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}

/// Run a QtTest binary, rerun its failing test cases, and report a verdict.
///
/// Exit codes: 0 if every test case passed (possibly after reruns), 1 for usage errors, 2 if a
/// test case failed on every rerun, 3 if the test binary crashed.
#[derive(Debug, Parser)]
#[command(version, styles = clap_styles(), max_term_width = 100)]
pub struct QtTestRunnerApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(flatten)]
    config_opts: ConfigOpts,

    #[clap(flatten)]
    retry_opts: RetryOpts,

    /// Directory to write XML logs to
    #[arg(long, value_name = "DIR", default_value = ".")]
    log_dir: Utf8PathBuf,

    /// Do not inject log arguments: attempts are judged by exit code alone
    #[arg(long)]
    no_extra_args: bool,

    /// Classify an existing XML log instead of running the test binary first
    #[arg(long, value_name = "FILE", conflicts_with = "no_extra_args")]
    parse_xml_testlog: Option<Utf8PathBuf>,

    /// The test binary and its arguments, optionally behind a known wrapper script
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "TESTARGS"
    )]
    test_args: Vec<String>,
}

impl QtTestRunnerApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code for the verdict.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let config = SupervisorConfig::from_sources(
            self.config_opts.config_file.as_deref(),
            Utf8Path::new("."),
        )?;
        let mut profile = config.profile(self.config_opts.profile.as_deref())?;
        self.retry_opts.apply(&mut profile);
        debug!("using profile {}: {profile:?}", profile.name());

        let command = CommandLine::split(self.test_args, &config.wrapper_registry())?;
        let mut invocation = InvocationBuilder::new(command);
        invocation.set_extra_args(!self.no_extra_args);
        let invocation = invocation.build()?;

        let mut builder = SupervisorBuilder::new(invocation);
        builder
            .set_policy(profile.retry_policy())
            .set_log_dir(self.log_dir)
            .set_timeout(profile.timeout());
        if let Some(path) = self.parse_xml_testlog {
            builder.set_existing_log(path);
        }
        let supervisor = builder.build(ProcessExecutor::new())?;

        let mut reporter = ReporterBuilder::default();
        reporter
            .set_colorize(output.color.should_colorize(supports_color::Stream::Stdout))
            .set_verbose(output.verbose);
        let mut reporter = reporter.build(ReporterOutput::Terminal);

        let summary = supervisor.try_execute(|event| reporter.report_event(&event))?;
        Ok(summary.verdict.exit_code())
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Config file [default: .config/qt-testrunner.toml if present]
    #[arg(long, value_name = "PATH", env = "QT_TESTRUNNER_CONFIG")]
    config_file: Option<Utf8PathBuf>,

    /// Config profile to use [default: the config's default profile]
    #[arg(long, value_name = "NAME", env = "QT_TESTRUNNER_PROFILE")]
    profile: Option<String>,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Retry options")]
struct RetryOpts {
    /// Number of times each failing test case is rerun [default: 5]
    #[arg(long, value_name = "N")]
    max_repeats: Option<u32>,

    /// Number of passing reruns a failing test case needs to count as flaky [default: 1]
    #[arg(long, value_name = "N")]
    passes_needed: Option<u32>,

    /// Number of times the whole test binary is rerun after a crash [default: 1]
    #[arg(long, value_name = "N")]
    crash_reruns: Option<u32>,

    /// Kill attempts that run longer than this (seconds, or a duration like "5m")
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
    timeout: Option<Duration>,
}

impl RetryOpts {
    fn apply(&self, profile: &mut SupervisorProfile) {
        if let Some(max_repeats) = self.max_repeats {
            profile.set_max_repeats(max_repeats);
        }
        if let Some(passes_needed) = self.passes_needed {
            profile.set_passes_needed(passes_needed);
        }
        if let Some(crash_reruns) = self.crash_reruns {
            profile.set_crash_reruns(crash_reruns);
        }
        if let Some(timeout) = self.timeout {
            profile.set_timeout(timeout);
        }
    }
}

fn parse_timeout(input: &str) -> Result<Duration, String> {
    let timeout = match input.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Duration::from_secs_f64(secs),
        Ok(_) => return Err(format!("invalid timeout `{input}`")),
        Err(_) => humantime::parse_duration(input).map_err(|err| err.to_string())?,
    };
    if timeout.is_zero() {
        return Err("timeout must be greater than zero".to_owned());
    }
    Ok(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn verify_app() {
        QtTestRunnerApp::command().debug_assert();
    }

    #[test_case("30", Duration::from_secs(30); "whole seconds")]
    #[test_case("0.5", Duration::from_millis(500); "fractional seconds")]
    #[test_case("2m 30s", Duration::from_secs(150); "humantime")]
    fn timeouts(input: &str, expected: Duration) {
        assert_eq!(parse_timeout(input), Ok(expected));
    }

    #[test_case("0"; "zero")]
    #[test_case("-3"; "negative")]
    #[test_case("soon"; "not a duration")]
    fn invalid_timeouts(input: &str) {
        parse_timeout(input).expect_err("timeout is invalid");
    }

    #[test]
    fn test_args_are_passed_through() {
        let app = QtTestRunnerApp::try_parse_from([
            "qt-testrunner",
            "--max-repeats",
            "3",
            "--log-dir",
            "logs",
            "./tst_foo",
            "-platform",
            "offscreen",
            "--max-repeats",
            "7",
        ])
        .expect("arguments parse");
        assert_eq!(app.retry_opts.max_repeats, Some(3));
        assert_eq!(app.log_dir, "logs");
        assert_eq!(
            app.test_args,
            vec![
                "./tst_foo",
                "-platform",
                "offscreen",
                "--max-repeats",
                "7"
            ]
        );
    }

    #[test]
    fn separator_after_options() {
        let app = QtTestRunnerApp::try_parse_from([
            "qt-testrunner",
            "--",
            "androidtestrunner",
            "--apk",
            "/b/tst_foo.apk",
            "--",
            "-v1",
        ])
        .expect("arguments parse");
        assert_eq!(
            app.test_args,
            vec!["androidtestrunner", "--apk", "/b/tst_foo.apk", "--", "-v1"]
        );
    }

    #[test]
    fn parse_xml_testlog_conflicts_with_no_extra_args() {
        QtTestRunnerApp::try_parse_from([
            "qt-testrunner",
            "--no-extra-args",
            "--parse-xml-testlog",
            "log.xml",
            "./tst_foo",
        ])
        .expect_err("conflicting options");
    }

    #[test]
    fn overrides_apply_to_profile() {
        let config = SupervisorConfig::default();
        let mut profile = config.profile(None).expect("default profile exists");
        RetryOpts {
            max_repeats: Some(0),
            passes_needed: None,
            crash_reruns: Some(4),
            timeout: Some(Duration::from_secs(60)),
        }
        .apply(&mut profile);

        let policy = profile.retry_policy();
        assert_eq!(policy.max_repeats, 0);
        assert_eq!(policy.passes_needed, 1);
        assert_eq!(policy.crash_reruns, 4);
        assert_eq!(profile.timeout(), Some(Duration::from_secs(60)));
    }
}
