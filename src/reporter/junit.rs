//! JUnit XML report writer

use super::{escape_xml, write_report, Reporter};
use crate::error::Result;
use crate::suite::{SpecReport, SpecState, SuiteReport};
use async_trait::async_trait;
use std::fmt::Write;
use std::path::PathBuf;
use tracing::info;

/// Writes the suite outcome as a junit XML file when the suite ends
#[derive(Debug, Clone)]
pub struct JunitReporter {
    output: PathBuf,
}

impl JunitReporter {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn output(&self) -> &std::path::Path {
        &self.output
    }
}

#[async_trait]
impl Reporter for JunitReporter {
    fn name(&self) -> &str {
        "junit"
    }

    async fn suite_did_end(&mut self, suite: &SuiteReport) -> Result<()> {
        let xml = render_junit(suite);
        write_report(&self.output, &xml)?;
        info!("junit report written to {}", self.output.display());
        Ok(())
    }
}

/// Lifecycle failures reported as synthetic test cases
fn lifecycle_cases(suite: &SuiteReport) -> Vec<(&'static str, &str)> {
    let mut cases = Vec::new();
    if let Some(msg) = &suite.setup_failure {
        cases.push(("[SynchronizedBeforeSuite]", msg.as_str()));
    }
    if let Some(msg) = &suite.teardown_failure {
        cases.push(("[SynchronizedAfterSuite]", msg.as_str()));
    }
    cases
}

/// Render a suite report as junit XML
pub fn render_junit(suite: &SuiteReport) -> String {
    let counts = suite.counts();
    let lifecycle = lifecycle_cases(suite);
    let tests = counts.total + lifecycle.len();
    let failures = counts.failed + lifecycle.len();
    let name = escape_xml(&suite.name);

    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        out,
        r#"<testsuites tests="{}" disabled="{}" errors="{}" failures="{}" time="{:.3}">"#,
        tests, counts.skipped, counts.errored, failures, suite.duration_secs
    );
    let _ = writeln!(
        out,
        r#"  <testsuite name="{}" tests="{}" skipped="{}" errors="{}" failures="{}" time="{:.3}" timestamp="{}">"#,
        name,
        tests,
        counts.skipped,
        counts.errored,
        failures,
        suite.duration_secs,
        suite.started_at.format("%Y-%m-%dT%H:%M:%S")
    );

    for (case, message) in lifecycle {
        let _ = writeln!(
            out,
            r#"    <testcase name="{}" classname="{}" status="failed" time="0.000">"#,
            case, name
        );
        let _ = writeln!(
            out,
            r#"      <failure message="{}" type="failed"></failure>"#,
            escape_xml(message)
        );
        let _ = writeln!(out, "    </testcase>");
    }

    for spec in &suite.specs {
        render_case(&mut out, &name, spec);
    }

    let _ = writeln!(out, "  </testsuite>");
    let _ = writeln!(out, "</testsuites>");
    out
}

fn render_case(out: &mut String, suite_name: &str, spec: &SpecReport) {
    let status = match spec.state {
        SpecState::Passed => "passed",
        SpecState::Failed => "failed",
        SpecState::Skipped => "skipped",
        SpecState::Panicked => "panicked",
        SpecState::TimedOut => "timedout",
    };
    let _ = writeln!(
        out,
        r#"    <testcase name="{}" classname="{}" status="{}" time="{:.3}">"#,
        escape_xml(&spec.full_text),
        suite_name,
        status,
        spec.duration_secs
    );

    let message = escape_xml(spec.failure.as_deref().unwrap_or_default());
    match spec.state {
        SpecState::Passed => {}
        SpecState::Failed => {
            let _ = writeln!(
                out,
                r#"      <failure message="{}" type="failed">{}</failure>"#,
                message, message
            );
        }
        SpecState::Panicked | SpecState::TimedOut => {
            let _ = writeln!(
                out,
                r#"      <error message="{}" type="{}">{}</error>"#,
                message, status, message
            );
        }
        SpecState::Skipped => {
            let _ = writeln!(out, r#"      <skipped message="{}"></skipped>"#, message);
        }
    }

    if let Some(system_out) = &spec.system_out {
        let _ = writeln!(out, "      <system-out>{}</system-out>", escape_xml(system_out));
    }
    let _ = writeln!(out, "    </testcase>");
}
