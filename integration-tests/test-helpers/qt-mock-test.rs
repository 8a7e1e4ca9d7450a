// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A stand-in for a QtTest binary. See `integration_tests::mock` for how it behaves.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::{Result, eyre::bail};
use integration_tests::mock::{
    FAIL_INIT_ENV, FUNCTIONS_ENV, MockInvocation, MockState, NO_XML_ENV, STATE_FILE_ENV,
    TEST_CASE_NAME,
};
use std::time::Duration;
use swrite::{SWrite, swriteln};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Pass,
    Fail,
}

struct FunctionRun {
    name: String,
    outcome: Outcome,
}

struct MockTest {
    state_file: Option<Utf8PathBuf>,
    state: MockState,
}

impl MockTest {
    fn new() -> Result<Self> {
        let state_file = std::env::var(STATE_FILE_ENV).ok().map(Utf8PathBuf::from);
        let state = match &state_file {
            Some(path) => MockState::load(path)?,
            None => MockState::default(),
        };
        Ok(Self { state_file, state })
    }

    fn store(&self) -> Result<()> {
        match &self.state_file {
            Some(path) => self.state.store(path),
            None => Ok(()),
        }
    }

    fn run_function(&mut self, name: &str) -> Result<Outcome> {
        let run = self.state.start_run(name);
        self.store()?;

        let outcome = if name == "initTestCase" {
            if env_flag(FAIL_INIT_ENV) {
                Outcome::Fail
            } else {
                Outcome::Pass
            }
        } else if name == "always_fail" {
            Outcome::Fail
        } else if name == "always_crash" || (name == "crash_once" && run == 1) {
            println!("QFATAL : {TEST_CASE_NAME}::{name}() Received signal 6");
            std::process::abort();
        } else if name == "hang" {
            std::thread::sleep(Duration::from_secs(60));
            Outcome::Pass
        } else if let Some(failures) = name.strip_prefix("flaky_") {
            let failures: u32 = failures.parse()?;
            if run <= failures {
                Outcome::Fail
            } else {
                Outcome::Pass
            }
        } else {
            Outcome::Pass
        };

        match outcome {
            Outcome::Pass => println!("PASS   : {TEST_CASE_NAME}::{name}()"),
            Outcome::Fail => println!(
                "FAIL!  : {TEST_CASE_NAME}::{name}() 'false' returned FALSE. ()\n   \
                 Loc: [tst_mock.cpp(42)]"
            ),
        }
        Ok(outcome)
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut xml_log = None;
    let mut selected = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-o" => {
                let Some(target) = iter.next() else {
                    bail!("-o requires an argument");
                };
                if let Some(path) = target.strip_suffix(",xml") {
                    xml_log = Some(path.to_owned());
                }
            }
            "-maxwarnings" | "-platform" => {
                iter.next();
            }
            _ if arg.starts_with('-') => {}
            _ => {
                let function = arg.split(':').next().unwrap_or(arg);
                selected.push(function.to_owned());
            }
        }
    }

    let mut mock = MockTest::new()?;
    mock.state.invocations.push(MockInvocation {
        args: args.clone(),
        selected: selected.clone(),
        xml_log: xml_log.clone(),
        verbose_env: std::env::var_os("QT_LOGGING_RULES").is_some(),
    });
    mock.store()?;

    let functions = if selected.is_empty() {
        std::env::var(FUNCTIONS_ENV)
            .unwrap_or_else(|_| "always_pass".to_owned())
            .split(',')
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect()
    } else {
        selected
    };

    println!("********* Start testing of {TEST_CASE_NAME} *********");
    let mut runs = Vec::new();
    let init = mock.run_function("initTestCase")?;
    runs.push(FunctionRun {
        name: "initTestCase".to_owned(),
        outcome: init,
    });
    if init == Outcome::Pass {
        for name in functions {
            let outcome = mock.run_function(&name)?;
            runs.push(FunctionRun { name, outcome });
        }
    }
    let cleanup = mock.run_function("cleanupTestCase")?;
    runs.push(FunctionRun {
        name: "cleanupTestCase".to_owned(),
        outcome: cleanup,
    });

    let failures = runs
        .iter()
        .filter(|run| run.outcome == Outcome::Fail)
        .count();
    println!(
        "Totals: {} passed, {failures} failed, 0 skipped, 0 blacklisted, 1ms",
        runs.len() - failures
    );
    println!("********* Finished testing of {TEST_CASE_NAME} *********");

    if let Some(path) = xml_log
        && !env_flag(NO_XML_ENV)
    {
        write_xml_log(Utf8Path::new(&path), &runs)?;
    }

    std::process::exit(i32::try_from(failures).map_or(127, |n| n.min(127)))
}

fn write_xml_log(path: &Utf8Path, runs: &[FunctionRun]) -> Result<()> {
    let mut xml = String::new();
    swriteln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    swriteln!(xml, r#"<TestCase name="{TEST_CASE_NAME}">"#);
    swriteln!(
        xml,
        "<Environment><QtVersion>6.8.0</QtVersion><QtBuild/><QTestVersion>6.8.0</QTestVersion></Environment>"
    );
    for run in runs {
        swriteln!(xml, r#"<TestFunction name="{}">"#, run.name);
        match run.outcome {
            Outcome::Pass => swriteln!(xml, r#"<Incident type="pass" file="" line="0" />"#),
            Outcome::Fail => {
                swriteln!(xml, r#"<Incident type="fail" file="tst_mock.cpp" line="42">"#);
                swriteln!(
                    xml,
                    "    <Description><![CDATA['false' returned FALSE. ()]]></Description>"
                );
                swriteln!(xml, "</Incident>");
            }
        }
        swriteln!(xml, r#"    <Duration msecs="0.1"/>"#);
        swriteln!(xml, "</TestFunction>");
    }
    swriteln!(xml, r#"<Duration msecs="1.0"/>"#);
    swriteln!(xml, "</TestCase>");

    std::fs::write(path, xml)?;
    Ok(())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).as_deref() == Ok("1")
}
