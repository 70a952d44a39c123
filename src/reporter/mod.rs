//! Suite reporters
//!
//! Reporters observe a run: they are told before each spec starts, once
//! its body returns, after it completes, and once the suite ends. The junit
//! and polarion writers only act at suite end; the Kubernetes collector
//! captures cluster state as soon as a failing body returns, while the
//! objects the spec created still exist.

pub mod diagnostics;
pub mod enricher;
pub mod junit;
pub mod kubernetes;
pub mod polarion;

pub use enricher::CapturedOutputEnricher;
pub use junit::JunitReporter;
pub use kubernetes::KubernetesReporter;
pub use polarion::PolarionReporter;

use crate::error::Result;
use crate::suite::{SpecReport, SuiteReport};
use async_trait::async_trait;

#[async_trait]
pub trait Reporter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn spec_will_run(&mut self, _spec: &SpecReport) -> Result<()> {
        Ok(())
    }

    /// Called when the body returned, before deferred cleanups run.
    ///
    /// `spec` carries the body's outcome; a spec passing here can still end
    /// as failed when one of its cleanups fails.
    async fn spec_body_did_complete(&mut self, _spec: &SpecReport) -> Result<()> {
        Ok(())
    }

    async fn spec_did_complete(&mut self, _spec: &SpecReport) -> Result<()> {
        Ok(())
    }

    async fn suite_did_end(&mut self, _suite: &SuiteReport) -> Result<()> {
        Ok(())
    }
}

/// Escape text for XML attribute and element content
pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // XML 1.0 forbids most control characters even when escaped
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

/// Write a report file, creating its parent directory
pub(crate) fn write_report(path: &std::path::Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, contents)?;
    Ok(())
}
