//! Polarion-flavoured junit report
//!
//! Polarion imports junit files whose suite carries project properties and
//! whose test cases carry the Polarion work item id, built from the project
//! id and the spec's `[test_id:N]` tag.

use super::{escape_xml, write_report, Reporter};
use crate::error::Result;
use crate::suite::{SpecState, SuiteReport};
use async_trait::async_trait;
use std::fmt::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PolarionReporter {
    output: PathBuf,
    project_id: String,
}

impl PolarionReporter {
    pub fn new(output: impl Into<PathBuf>, project_id: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            project_id: project_id.into(),
        }
    }
}

#[async_trait]
impl Reporter for PolarionReporter {
    fn name(&self) -> &str {
        "polarion"
    }

    async fn suite_did_end(&mut self, suite: &SuiteReport) -> Result<()> {
        let xml = render_polarion(suite, &self.project_id);
        write_report(&self.output, &xml)?;
        info!("polarion report written to {}", self.output.display());
        Ok(())
    }
}

/// Render a polarion import file; specs without a test id are left out
pub fn render_polarion(suite: &SuiteReport, project_id: &str) -> String {
    let cases: Vec<_> = suite.specs.iter().filter(|s| s.test_id.is_some()).collect();
    let failures = cases.iter().filter(|s| s.is_failure()).count();
    let skipped = cases.iter().filter(|s| s.state == SpecState::Skipped).count();
    let project = escape_xml(project_id);

    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        out,
        r#"<testsuites tests="{}" failures="{}" skipped="{}">"#,
        cases.len(),
        failures,
        skipped
    );
    let _ = writeln!(out, "  <properties>");
    let _ = writeln!(out, r#"    <property name="polarion-project-id" value="{}"></property>"#, project);
    let _ = writeln!(out, r#"    <property name="polarion-testrun-title" value="{}"></property>"#, escape_xml(&suite.name));
    let _ = writeln!(out, r#"    <property name="polarion-lookup-method" value="id"></property>"#);
    let _ = writeln!(out, "  </properties>");
    let _ = writeln!(
        out,
        r#"  <testsuite name="{}" tests="{}" failures="{}" skipped="{}">"#,
        escape_xml(&suite.name),
        cases.len(),
        failures,
        skipped
    );

    for spec in cases {
        let test_id = spec.test_id.as_deref().unwrap_or_default();
        let _ = writeln!(
            out,
            r#"    <testcase name="{}" time="{:.3}">"#,
            escape_xml(&spec.full_text),
            spec.duration_secs
        );
        match spec.state {
            SpecState::Passed => {}
            SpecState::Skipped => {
                let _ = writeln!(out, "      <skipped></skipped>");
            }
            _ => {
                let _ = writeln!(
                    out,
                    r#"      <failure message="{}"></failure>"#,
                    escape_xml(spec.failure.as_deref().unwrap_or_default())
                );
            }
        }
        let _ = writeln!(out, "      <properties>");
        let _ = writeln!(
            out,
            r#"        <property name="polarion-testcase-id" value="{}-{}"></property>"#,
            project,
            escape_xml(test_id)
        );
        let _ = writeln!(out, "      </properties>");
        let _ = writeln!(out, "    </testcase>");
    }

    let _ = writeln!(out, "  </testsuite>");
    let _ = writeln!(out, "</testsuites>");
    out
}
