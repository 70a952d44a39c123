//! Sequential spec runner
//!
//! One process runs its shard of the selected specs one at a time:
//! before-suite hooks, then for every spec the reporters are notified, the
//! body runs under the per-spec timeout with panics caught, reporters see
//! the body's outcome, deferred cleanups run, and the outcome is recorded. After-suite hooks run last,
//! then every reporter sees the final suite report.

use super::context::SpecContext;
use super::hooks::SuiteHooks;
use super::report::{SpecReport, SpecState, SuiteReport};
use super::spec::{Spec, SpecFilter, Suite};
use crate::config::SuiteConfig;
use crate::reporter::Reporter;
use chrono::Utc;
use futures::FutureExt;
use kube::Client;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::time::Instant;
use tracing::{error, info, warn};

pub struct Runner {
    config: SuiteConfig,
    client: Option<Client>,
    reporters: Vec<Box<dyn Reporter>>,
    hooks: Vec<Box<dyn SuiteHooks>>,
}

impl Runner {
    pub fn new(config: SuiteConfig, client: Option<Client>) -> Self {
        Self {
            config,
            client,
            reporters: Vec::new(),
            hooks: Vec::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    pub fn with_hooks(mut self, hooks: impl SuiteHooks + 'static) -> Self {
        self.hooks.push(Box::new(hooks));
        self
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Specs this process runs, in declaration order
    pub fn scheduled<'a>(&self, suite: &'a Suite, filter: &SpecFilter) -> Vec<(usize, &'a Spec)> {
        suite
            .select(filter)
            .into_iter()
            .filter(|(index, _)| self.config.parallel.owns(*index))
            .collect()
    }

    pub async fn run(&mut self, suite: &Suite, filter: &SpecFilter) -> SuiteReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let scheduled = self.scheduled(suite, filter);
        info!(
            "running {} of {} specs in process {}/{}",
            scheduled.len(),
            suite.specs().len(),
            self.config.parallel.process,
            self.config.parallel.total
        );

        let mut setup_failure = None;
        for hooks in &self.hooks {
            if let Err(e) = hooks.before_suite().await {
                error!("before-suite hook {} failed: {}", hooks.name(), e);
                setup_failure = Some(format!("{}: {}", hooks.name(), e));
                break;
            }
        }

        let mut specs = Vec::with_capacity(scheduled.len());
        if let Some(message) = &setup_failure {
            for (index, spec) in &scheduled {
                let mut report = self.pending_report(*index, spec);
                report.state = SpecState::Failed;
                report.failure = Some(format!("suite setup failed: {}", message));
                specs.push(report);
            }
        } else {
            for (index, spec) in &scheduled {
                let report = if self.config.fail_fast && specs.iter().any(SpecReport::is_failure) {
                    let mut report = self.pending_report(*index, spec);
                    report.state = SpecState::Skipped;
                    report.failure = Some("not run after an earlier failure".to_string());
                    self.notify_complete(&report).await;
                    report
                } else {
                    self.run_spec(*index, spec).await
                };
                specs.push(report);
            }
        }

        let mut teardown_failure = None;
        for hooks in self.hooks.iter().rev() {
            if let Err(e) = hooks.after_suite().await {
                error!("after-suite hook {} failed: {}", hooks.name(), e);
                teardown_failure.get_or_insert_with(|| format!("{}: {}", hooks.name(), e));
            }
        }

        let report = SuiteReport {
            name: suite.name.clone(),
            specs,
            started_at,
            duration_secs: start.elapsed().as_secs_f64(),
            setup_failure,
            teardown_failure,
            process: self.config.parallel.process,
            parallel_total: self.config.parallel.total,
        };

        for reporter in self.reporters.iter_mut() {
            if let Err(e) = reporter.suite_did_end(&report).await {
                warn!("reporter {} failed at suite end: {}", reporter.name(), e);
            }
        }
        report
    }

    fn pending_report(&self, index: usize, spec: &Spec) -> SpecReport {
        SpecReport {
            index,
            container: spec.container.clone(),
            text: spec.text.clone(),
            full_text: spec.full_text(),
            tags: spec.tags(),
            test_id: spec.test_id(),
            state: SpecState::Passed,
            failure: None,
            captured_output: Vec::new(),
            system_out: None,
            started_at: Utc::now(),
            duration_secs: 0.0,
            process: self.config.parallel.process,
        }
    }

    async fn notify_complete(&mut self, report: &SpecReport) {
        for reporter in self.reporters.iter_mut() {
            if let Err(e) = reporter.spec_did_complete(report).await {
                warn!("reporter {} failed after spec: {}", reporter.name(), e);
            }
        }
    }

    async fn run_spec(&mut self, index: usize, spec: &Spec) -> SpecReport {
        let mut report = self.pending_report(index, spec);
        for reporter in self.reporters.iter_mut() {
            if let Err(e) = reporter.spec_will_run(&report).await {
                warn!("reporter {} failed before spec: {}", reporter.name(), e);
            }
        }

        info!("=== RUN {}", report.full_text);
        let ctx = SpecContext::new(
            self.client.clone(),
            self.config.test_namespace(),
            self.config.clone(),
        );
        let start = Instant::now();
        let timeout = self.config.spec_timeout;
        let body = AssertUnwindSafe((spec.body)(ctx.clone())).catch_unwind();

        let (mut state, mut failure) = match tokio::time::timeout(timeout, body).await {
            Err(_) => (
                SpecState::TimedOut,
                Some(format!("spec timed out after {:?}", timeout)),
            ),
            Ok(Err(panic)) => (
                SpecState::Panicked,
                Some(format!("spec panicked: {}", panic_message(panic.as_ref()))),
            ),
            Ok(Ok(Ok(()))) => (SpecState::Passed, None),
            Ok(Ok(Err(e))) if e.is_skip() => (SpecState::Skipped, Some(e.to_string())),
            Ok(Ok(Err(e))) => (SpecState::Failed, Some(e.to_string())),
        };

        report.state = state;
        report.failure = failure.clone();
        report.captured_output = ctx.captured_output();
        report.duration_secs = start.elapsed().as_secs_f64();
        for reporter in self.reporters.iter_mut() {
            if let Err(e) = reporter.spec_body_did_complete(&report).await {
                warn!("reporter {} failed after spec body: {}", reporter.name(), e);
            }
        }

        let cleanup_failures = ctx.run_cleanups().await;
        if !cleanup_failures.is_empty() {
            let message = format!("cleanup failed: {}", cleanup_failures.join("; "));
            if matches!(state, SpecState::Passed | SpecState::Skipped) {
                state = SpecState::Failed;
            }
            failure = Some(match failure {
                Some(existing) if state != SpecState::Skipped => format!("{}\n{}", existing, message),
                _ => message,
            });
        }

        report.state = state;
        report.failure = failure;
        report.captured_output = ctx.captured_output();
        report.duration_secs = start.elapsed().as_secs_f64();

        match (&report.state, &report.failure) {
            (SpecState::Passed, _) => info!("--- PASS {} ({:.2}s)", report.full_text, report.duration_secs),
            (SpecState::Skipped, reason) => info!(
                "--- SKIP {}: {}",
                report.full_text,
                reason.as_deref().unwrap_or_default()
            ),
            (state, reason) => error!(
                "--- {} {}: {}",
                state.to_string().to_uppercase(),
                report.full_text,
                reason.as_deref().unwrap_or_default()
            ),
        }

        self.notify_complete(&report).await;
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
