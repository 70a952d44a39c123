//! Per-spec execution context

use crate::config::SuiteConfig;
use crate::error::{NcError, Result};
use chrono::Utc;
use kube::Client;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

type CleanupFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

struct Cleanup {
    description: String,
    future: CleanupFuture,
}

struct ContextInner {
    client: Option<Client>,
    namespace: String,
    config: SuiteConfig,
    steps: Mutex<Vec<String>>,
    cleanups: Mutex<Vec<Cleanup>>,
}

/// Handle passed to every spec body.
///
/// Cloning is cheap; all clones share captured output and the cleanup stack.
#[derive(Clone)]
pub struct SpecContext {
    inner: Arc<ContextInner>,
}

impl SpecContext {
    pub fn new(client: Option<Client>, namespace: impl Into<String>, config: SuiteConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                client,
                namespace: namespace.into(),
                config,
                steps: Mutex::new(Vec::new()),
                cleanups: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Cluster client; specs fail when the runner has none
    pub fn client(&self) -> Result<Client> {
        self.inner
            .client
            .clone()
            .ok_or_else(|| NcError::Config("no cluster client configured".to_string()))
    }

    /// Namespace all spec resources live in
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.inner.config
    }

    /// Record and log a named step of the spec
    pub fn by(&self, step: impl Into<String>) {
        let step = step.into();
        info!("STEP: {}", step);
        self.capture(format!("STEP: {} {}", Utc::now().format("%H:%M:%S%.3f"), step));
    }

    /// Append a line to the captured output without logging it
    pub fn capture(&self, line: impl Into<String>) {
        if let Ok(mut steps) = self.inner.steps.lock() {
            steps.push(line.into());
        }
    }

    pub fn captured_output(&self) -> Vec<String> {
        self.inner
            .steps
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Register cleanup work to run after the spec body, last registered first
    pub fn defer_cleanup<Fut>(&self, description: impl Into<String>, future: Fut)
    where
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if let Ok(mut cleanups) = self.inner.cleanups.lock() {
            cleanups.push(Cleanup {
                description: description.into(),
                future: Box::pin(future),
            });
        }
    }

    pub fn pending_cleanups(&self) -> usize {
        self.inner.cleanups.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Run all deferred cleanups in LIFO order, returning the failures
    pub async fn run_cleanups(&self) -> Vec<String> {
        let mut failures = Vec::new();
        loop {
            let next = match self.inner.cleanups.lock() {
                Ok(mut cleanups) => cleanups.pop(),
                Err(_) => None,
            };
            let Some(cleanup) = next else { break };

            self.by(format!("Cleanup: {}", cleanup.description));
            if let Err(e) = cleanup.future.await {
                warn!("cleanup '{}' failed: {}", cleanup.description, e);
                failures.push(format!("{}: {}", cleanup.description, e));
            }
        }
        failures
    }
}
