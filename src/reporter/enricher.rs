//! Attach captured spec output to the reports of failed specs

use super::Reporter;
use crate::error::Result;
use crate::suite::{SpecReport, SuiteReport};
use async_trait::async_trait;

/// Wraps another reporter and fills `system_out` of failed specs with
/// the steps and lines captured while they ran.
pub struct CapturedOutputEnricher<R> {
    inner: R,
    name: String,
}

impl<R: Reporter> CapturedOutputEnricher<R> {
    pub fn new(inner: R) -> Self {
        let name = format!("{}+captured-output", inner.name());
        Self { inner, name }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

/// Copy of `suite` with captured output moved into `system_out` for failures
pub fn enrich(suite: &SuiteReport) -> SuiteReport {
    let mut enriched = suite.clone();
    for spec in enriched.specs.iter_mut().filter(|s| s.is_failure()) {
        enrich_spec(spec);
    }
    enriched
}

fn enrich_spec(spec: &mut SpecReport) {
    if spec.captured_output.is_empty() {
        return;
    }
    let mut text = spec.captured_output.join("\n");
    if let Some(existing) = spec.system_out.take() {
        text = format!("{}\n{}", existing, text);
    }
    spec.system_out = Some(text);
}

#[async_trait]
impl<R: Reporter> Reporter for CapturedOutputEnricher<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn spec_will_run(&mut self, spec: &SpecReport) -> Result<()> {
        self.inner.spec_will_run(spec).await
    }

    async fn spec_body_did_complete(&mut self, spec: &SpecReport) -> Result<()> {
        self.inner.spec_body_did_complete(spec).await
    }

    async fn spec_did_complete(&mut self, spec: &SpecReport) -> Result<()> {
        self.inner.spec_did_complete(spec).await
    }

    async fn suite_did_end(&mut self, suite: &SuiteReport) -> Result<()> {
        self.inner.suite_did_end(&enrich(suite)).await
    }
}
