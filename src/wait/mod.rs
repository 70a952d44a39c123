//! Bounded polling against the cluster API
//!
//! Every cluster-side invariant a spec relies on is eventually consistent:
//! readiness, deletion and job outcomes are all confirmed by polling with a
//! fixed interval until a deadline.

use crate::error::{NcError, Result};
use crate::resources::job::{job_outcome, JobOutcome};
use crate::resources::{KubeResource, VirtualMachineInstance};
use k8s_openapi::api::batch::v1::Job;
use kube::Api;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Guest boot plus container disk pull
pub const VMI_READY_TIMEOUT: Duration = Duration::from_secs(360);

pub const DELETION_TIMEOUT: Duration = Duration::from_secs(120);

/// A ready VMI reporting its pod network address
pub const VMI_IP_TIMEOUT: Duration = Duration::from_secs(60);

/// Direct connectivity job against a freshly booted guest, retries included
pub const GUEST_SERVER_TIMEOUT: Duration = Duration::from_secs(180);

pub const JOB_OUTCOME_TIMEOUT: Duration = Duration::from_secs(90);

/// Poll `check` until it yields a value, fails, or `timeout` elapses.
///
/// The check runs at least once even with a zero timeout.
pub async fn poll_until<T, F, Fut>(
    description: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    loop {
        if let Some(value) = check().await? {
            return Ok(value);
        }
        if start.elapsed() >= timeout {
            return Err(NcError::Timeout {
                description: description.to_string(),
                timeout,
            });
        }
        sleep(interval).await;
    }
}

/// Poll a boolean condition until it holds
pub async fn eventually<F, Fut>(
    description: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    poll_until(description, timeout, interval, || {
        let fut = check();
        async move { Ok(fut.await?.then_some(())) }
    })
    .await
}

/// Whether a kube error is an API 404
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

/// Treat a not-found error as success, for cleanup of resources that may be gone
pub fn ignore_not_found<T>(result: std::result::Result<T, kube::Error>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_not_found(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Judge one readiness poll: `Ok(true)` once running and ready, an error
/// once the VMI reached a phase it cannot become ready from
pub fn vmi_ready(vmi: &VirtualMachineInstance) -> Result<bool> {
    match vmi.phase() {
        Some(phase @ ("Failed" | "Succeeded")) => Err(NcError::VmiFailed {
            name: vmi.name().to_string(),
            phase: phase.to_string(),
        }),
        Some("Running") => Ok(vmi.is_ready()),
        _ => Ok(false),
    }
}

/// Wait until the VMI is running with its `Ready` condition set
pub async fn wait_until_vmi_ready(
    api: &Api<VirtualMachineInstance>,
    name: &str,
    timeout: Duration,
) -> Result<VirtualMachineInstance> {
    poll_until(
        &format!("VMI {} to become ready", name),
        timeout,
        POLL_INTERVAL,
        || async move {
            let vmi = api.get(name).await?;
            if vmi_ready(&vmi)? {
                return Ok(Some(vmi));
            }
            debug!("VMI {} phase {:?}, ready={}", name, vmi.phase(), vmi.is_ready());
            Ok(None)
        },
    )
    .await
}

/// Wait until `get` on the named object returns not-found
pub async fn wait_for_gone<K>(api: &Api<K>, name: &str, timeout: Duration) -> Result<()>
where
    K: Clone + DeserializeOwned + Debug,
{
    eventually(
        &format!("{} to be gone", name),
        timeout,
        POLL_INTERVAL,
        || async move {
            match api.get(name).await {
                Ok(_) => Ok(false),
                Err(e) if is_not_found(&e) => Ok(true),
                Err(e) => Err(e.into()),
            }
        },
    )
    .await
}

/// Judge one job poll: `Ok(true)` at `expected`, an error at the other terminal state
pub fn job_reached(job: &Job, expected: JobOutcome) -> Result<bool> {
    match job_outcome(job) {
        JobOutcome::Running => Ok(false),
        actual if actual == expected => Ok(true),
        actual => Err(NcError::UnexpectedJobOutcome {
            name: job.name().to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }),
    }
}

/// Wait for a job to reach `expected`; reaching the other terminal state fails immediately
pub async fn wait_for_job_outcome(
    api: &Api<Job>,
    name: &str,
    expected: JobOutcome,
    timeout: Duration,
) -> Result<()> {
    eventually(
        &format!("job {} to end as {}", name, expected),
        timeout,
        POLL_INTERVAL,
        || async move { job_reached(&api.get(name).await?, expected) },
    )
    .await
}

pub async fn wait_for_job_to_succeed(api: &Api<Job>, name: &str, timeout: Duration) -> Result<()> {
    wait_for_job_outcome(api, name, JobOutcome::Succeeded, timeout).await
}

pub async fn wait_for_job_to_fail(api: &Api<Job>, name: &str, timeout: Duration) -> Result<()> {
    wait_for_job_outcome(api, name, JobOutcome::Failed, timeout).await
}
