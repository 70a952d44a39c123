//! Connectivity-check jobs
//!
//! A connectivity check is a batch Job whose single container opens a TCP
//! connection to `host:port`, reads one line and succeeds only when the
//! line is the guest server's greeting. The Job's `backoffLimit` is the
//! number of retries before the Job is marked failed.

use crate::resources::vmi::HELLO_WORLD;
use crate::resources::{KubeResource, Listable, Tabular};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Api, Client};
use std::collections::BTreeMap;

/// Name prefix for generated connectivity jobs
pub const JOB_NAME_PREFIX: &str = "netcheck-tcp-";

/// Label carried by every connectivity job and its pods
pub const JOB_LABEL_KEY: &str = "netcheck.kubevirt.io/job";

/// Utility image carrying bash and nmap-ncat
pub const PROBE_IMAGE_NAME: &str = "vm-killer";

/// Terminal state of a Job, read from its status conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed,
    Running,
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobOutcome::Succeeded => write!(f, "Succeeded"),
            JobOutcome::Failed => write!(f, "Failed"),
            JobOutcome::Running => write!(f, "Running"),
        }
    }
}

/// Determine the outcome of a job from its `Complete`/`Failed` conditions
pub fn job_outcome(job: &Job) -> JobOutcome {
    let conditions = match job.status.as_ref().and_then(|s| s.conditions.as_ref()) {
        Some(c) => c,
        None => return JobOutcome::Running,
    };

    let holds = |kind: &str| {
        conditions
            .iter()
            .any(|c| c.type_ == kind && c.status == "True")
    };

    if holds("Complete") {
        JobOutcome::Succeeded
    } else if holds("Failed") {
        JobOutcome::Failed
    } else {
        JobOutcome::Running
    }
}

/// Shell script probing `host:port` for the guest greeting
pub fn tcp_check_script(host: &str, port: &str) -> String {
    format!(
        "set -x; x=\"$(head -n 1 < <(nc {host} {port} -i 3 -w 3 --no-shutdown))\"; echo \"$x\"; \
         if [ \"$x\" = \"{HELLO_WORLD}\" ]; then echo \"succeeded\"; exit 0; else echo \"failed\"; exit 1; fi"
    )
}

/// Job running `script` once per attempt in the probe image
pub fn hello_world_job(script: String, image: &str) -> Job {
    let labels = BTreeMap::from([(JOB_LABEL_KEY.to_string(), "tcp".to_string())]);

    Job {
        metadata: ObjectMeta {
            generate_name: Some(JOB_NAME_PREFIX.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    containers: vec![Container {
                        name: "netcheck-tcp".to_string(),
                        image: Some(image.to_string()),
                        command: Some(vec![
                            "/bin/bash".to_string(),
                            "-c".to_string(),
                            script,
                        ]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// TCP connectivity job against `host:port` with `retries` as backoff limit
pub fn hello_world_job_tcp(host: &str, port: &str, image: &str, retries: i32) -> Job {
    let mut job = hello_world_job(tcp_check_script(host, port), image);
    if let Some(spec) = job.spec.as_mut() {
        spec.backoff_limit = Some(retries);
    }
    job
}

impl KubeResource for Job {
    const KIND: &'static str = "Job";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl Listable for Job {
    fn api(client: Client, namespace: &str) -> Api<Self> {
        Api::namespaced(client, namespace)
    }
}

impl Tabular for Job {
    fn headers() -> Vec<&'static str> {
        vec!["NAME", "STATUS", "BACKOFF-LIMIT", "FAILED", "AGE"]
    }

    fn row(&self) -> Vec<String> {
        let backoff = self
            .spec
            .as_ref()
            .and_then(|s| s.backoff_limit)
            .map(|b| b.to_string())
            .unwrap_or_else(|| "<default>".to_string());
        let failed = self
            .status
            .as_ref()
            .and_then(|s| s.failed)
            .unwrap_or(0)
            .to_string();

        vec![
            self.name().to_string(),
            job_outcome(self).to_string(),
            backoff,
            failed,
            self.age(),
        ]
    }
}
