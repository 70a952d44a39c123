//! Cluster state collector for failed specs
//!
//! When a spec body fails, the namespace objects it touched are dumped as
//! JSON into the artifacts directory, prefixed with the running failure
//! count. Collection happens before the spec's cleanups delete those
//! objects; a spec failing only in cleanup is collected afterwards.
//! Collection stops once `max_fails` failures have been captured.

use super::diagnostics::{analyze, format_table, DiagnosticsReport, NamespaceSnapshot};
use super::Reporter;
use crate::error::Result;
use crate::resources::job::JOB_LABEL_KEY;
use crate::resources::VirtualMachineInstance;
use crate::suite::{SpecReport, SuiteReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Endpoints, Event, Node, Pod, Service};
use kube::api::{ListParams, LogParams};
use kube::{Api, Client};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct KubernetesReporter {
    artifacts_dir: PathBuf,
    max_fails: usize,
    failure_count: usize,
    client: Option<Client>,
    namespace: String,
    spec_start: Option<DateTime<Utc>>,
    current_collected: bool,
}

impl KubernetesReporter {
    pub fn new(
        artifacts_dir: impl Into<PathBuf>,
        max_fails: usize,
        client: Option<Client>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
            max_fails,
            failure_count: 0,
            client,
            namespace: namespace.into(),
            spec_start: None,
            current_collected: false,
        }
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count
    }

    /// Remove dumps of a previous run and recreate the directory
    pub fn cleanup(&self) -> Result<()> {
        if self.artifacts_dir.exists() {
            std::fs::remove_dir_all(&self.artifacts_dir)?;
        }
        std::fs::create_dir_all(&self.artifacts_dir)?;
        Ok(())
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.artifacts_dir
            .join(format!("{}_{}", self.failure_count, name))
    }

    fn write_json<T: Serialize>(&self, kind: &str, value: &T) -> Result<()> {
        let path = self.artifact_path(&format!("{}.json", kind));
        std::fs::write(&path, serde_json::to_string_pretty(value)?)?;
        debug!("wrote {}", path.display());
        Ok(())
    }

    async fn collect(&mut self, spec: &SpecReport) -> Result<()> {
        self.failure_count += 1;
        if !should_collect(self.failure_count, self.max_fails) {
            debug!(
                "failure {} exceeds the limit of {}, not collecting",
                self.failure_count, self.max_fails
            );
            return Ok(());
        }
        let Some(client) = self.client.clone() else {
            debug!("no cluster client, skipping state collection");
            return Ok(());
        };

        std::fs::create_dir_all(&self.artifacts_dir)?;
        info!(
            "collecting cluster state for failure {} into {}",
            self.failure_count,
            self.artifacts_dir.display()
        );
        self.dump(&client, spec).await
    }

    async fn dump(&self, client: &Client, spec: &SpecReport) -> Result<()> {
        let ns = self.namespace.as_str();
        let lp = ListParams::default();

        let vmis = Api::<VirtualMachineInstance>::namespaced(client.clone(), ns)
            .list(&lp)
            .await?
            .items;
        self.write_json("vmis", &vmis)?;

        let pods = Api::<Pod>::namespaced(client.clone(), ns).list(&lp).await?.items;
        self.write_json("pods", &pods)?;

        let services = Api::<Service>::namespaced(client.clone(), ns)
            .list(&lp)
            .await?
            .items;
        self.write_json("services", &services)?;

        let endpoints = Api::<Endpoints>::namespaced(client.clone(), ns)
            .list(&lp)
            .await?
            .items;
        self.write_json("endpoints", &endpoints)?;

        let jobs = Api::<Job>::namespaced(client.clone(), ns).list(&lp).await?.items;
        self.write_json("jobs", &jobs)?;

        let events = Api::<Event>::namespaced(client.clone(), ns)
            .list(&lp)
            .await?
            .items;
        let events = events_since(events, self.spec_start);
        self.write_json("events", &events)?;

        let nodes = Api::<Node>::all(client.clone()).list(&lp).await?.items;
        self.write_json("nodes", &nodes)?;

        self.dump_job_logs(client, &pods).await;

        let snapshot = NamespaceSnapshot {
            namespace: ns.to_string(),
            vmis,
            services,
            endpoints,
            jobs,
        };
        let report = DiagnosticsReport::new(ns, &spec.full_text, analyze(&snapshot));
        if !report.findings.is_empty() {
            info!("namespace diagnostics after failure:\n{}", format_table(&report));
        }
        self.write_json("diagnostics", &report)?;
        Ok(())
    }

    async fn dump_job_logs(&self, client: &Client, pods: &[Pod]) {
        let api: Api<Pod> = Api::namespaced(client.clone(), &self.namespace);
        let job_pods = pods.iter().filter(|p| {
            p.metadata
                .labels
                .as_ref()
                .is_some_and(|l| l.contains_key(JOB_LABEL_KEY))
        });

        for pod in job_pods {
            let Some(name) = pod.metadata.name.as_deref() else {
                continue;
            };
            match api.logs(name, &LogParams::default()).await {
                Ok(logs) => {
                    let path = self.artifact_path(&format!("logs_{}.log", name));
                    if let Err(e) = std::fs::write(&path, logs) {
                        warn!("failed to write logs of pod {}: {}", name, e);
                    }
                }
                Err(e) => warn!("failed to fetch logs of pod {}: {}", name, e),
            }
        }
    }
}

/// Whether the `failure_count`-th failure is still captured
pub fn should_collect(failure_count: usize, max_fails: usize) -> bool {
    failure_count <= max_fails
}

fn event_time(event: &Event) -> Option<DateTime<Utc>> {
    event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| event.metadata.creation_timestamp.as_ref().map(|t| t.0))
}

/// Keep events observed at or after `since`; undated events are kept
pub fn events_since(events: Vec<Event>, since: Option<DateTime<Utc>>) -> Vec<Event> {
    let Some(since) = since else {
        return events;
    };
    events
        .into_iter()
        .filter(|e| event_time(e).map_or(true, |t| t >= since))
        .collect()
}

#[async_trait]
impl Reporter for KubernetesReporter {
    fn name(&self) -> &str {
        "k8s-reporter"
    }

    async fn spec_will_run(&mut self, _spec: &SpecReport) -> Result<()> {
        self.spec_start = Some(Utc::now());
        self.current_collected = false;
        Ok(())
    }

    async fn spec_body_did_complete(&mut self, spec: &SpecReport) -> Result<()> {
        if !spec.is_failure() {
            return Ok(());
        }
        self.current_collected = true;
        self.collect(spec).await
    }

    async fn spec_did_complete(&mut self, spec: &SpecReport) -> Result<()> {
        if !spec.is_failure() || self.current_collected {
            return Ok(());
        }
        self.current_collected = true;
        self.collect(spec).await
    }

    async fn suite_did_end(&mut self, _suite: &SuiteReport) -> Result<()> {
        Ok(())
    }
}
