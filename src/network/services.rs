//! Reachability of VMIs exposed through Kubernetes Services
//!
//! Every spec boots a VMI running a TCP server that greets clients with
//! `Hello World!`, optionally puts a Service in front of it, and then runs a
//! connectivity job against `<service>.<namespace>`. The job's terminal
//! state is the verdict: success when a matching service exists, failure
//! when the name does not resolve.

use super::{sig_describe, skip_when_cluster_not_support, IpFamily};
use crate::error::{NcError, Result, ResultExt};
use crate::resources::job::{hello_world_job_tcp, JobOutcome, PROBE_IMAGE_NAME};
use crate::resources::service::{build_headless_spec, build_ipv6_spec, build_spec};
use crate::resources::vmi::{bridge_interface, masquerade_networking, Network, DEFAULT_POD_NETWORK};
use crate::resources::{KubeResource, VirtualMachineInstance, VmiBuilder};
use crate::suite::{Spec, SpecContext};
use crate::wait::{
    ignore_not_found, poll_until, wait_for_gone, wait_for_job_outcome, wait_until_vmi_ready,
    DELETION_TIMEOUT, GUEST_SERVER_TIMEOUT, JOB_OUTCOME_TIMEOUT, POLL_INTERVAL, VMI_IP_TIMEOUT,
    VMI_READY_TIMEOUT,
};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Service;
use kube::api::{DeleteParams, PostParams};
use kube::Api;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

const CLEANING_SERVICE_SHOULD_SUCCEED: &str = "cleaning up the Service entity should have succeeded";
const CLEANING_JOB_SHOULD_SUCCEED: &str = "cleaning up the Job entity should have succeeded";
const EXPECT_CONNECTIVITY_TO_EXPOSED_SERVICE: &str = "connectivity is expected to the exposed service";
const EXPECT_NO_CONNECTIVITY: &str =
    "connectivity is *not* expected, since there isn't an exposed service";

pub const SELECTOR_LABEL_KEY: &str = "expose";
pub const SELECTOR_LABEL_VALUE: &str = "me";
pub const SERVICE_PORT: u16 = 1500;
pub const SUBDOMAIN: &str = "vmi";
pub const HOSTNAME: &str = "inbound";

pub const JOB_SUCCESS_RETRY: i32 = 3;
pub const JOB_FAILURE_RETRY: i32 = 0;

/// Retries of the job confirming the guest server listens, before any service exists
const GUEST_SERVER_RETRY: i32 = 5;

const BRIDGE_BINDING: &str = "bridge interface binding";
const MASQUERADE_BINDING: &str = "Masquerade interface binding";
const WITH_MATCHING_SERVICE: &str = "with a service matching the vmi exposed";
const WITH_HEADLESS_SERVICE: &str = "with a subdomain and a headless service given";
const WITHOUT_MATCHING_SERVICE: &str = "*without* a service matching the vmi exposed";
const REACH_BY_LABELS_TABLE: &str =
    "[Conformance] should be able to reach the vmi based on labels specified on the vmi";

/// How deletion during cleanup treats an object that is already gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingObject {
    Fail,
    Tolerate,
}

/// The "Services" spec collection, in declaration order
pub fn specs() -> Vec<Spec> {
    let services = sig_describe("Services");
    let services = services.as_str();

    vec![
        Spec::new(
            &[services, BRIDGE_BINDING, WITH_MATCHING_SERVICE],
            "[test_id:1547] should be able to reach the vmi based on labels specified on the vmi",
            bridge_reach_by_labels,
        ),
        Spec::new(
            &[services, BRIDGE_BINDING, WITH_MATCHING_SERVICE],
            "[test_id:1548] should fail to reach the vmi if an invalid servicename is used",
            bridge_invalid_service_name,
        ),
        Spec::new(
            &[services, BRIDGE_BINDING, WITH_HEADLESS_SERVICE],
            "[test_id:1549]should be able to reach the vmi via its unique fully qualified domain name",
            bridge_reach_by_fqdn,
        ),
        Spec::new(
            &[services, MASQUERADE_BINDING, WITH_MATCHING_SERVICE, REACH_BY_LABELS_TABLE],
            "when the service is exposed by an IPv4 address.",
            |ctx| masquerade_reach_by_labels(ctx, IpFamily::IPv4),
        ),
        Spec::new(
            &[services, MASQUERADE_BINDING, WITH_MATCHING_SERVICE, REACH_BY_LABELS_TABLE],
            "when the service is exposed by an IPv6 address.",
            |ctx| masquerade_reach_by_labels(ctx, IpFamily::IPv6),
        ),
        Spec::new(
            &[services, MASQUERADE_BINDING, WITHOUT_MATCHING_SERVICE],
            "should fail to reach the vmi",
            masquerade_missing_service,
        ),
    ]
}

async fn bridge_reach_by_labels(ctx: SpecContext) -> Result<()> {
    bridge_inbound_vmi(&ctx).await?;
    create_service(
        &ctx,
        build_spec("myservice", SERVICE_PORT.into(), SERVICE_PORT.into(), SELECTOR_LABEL_KEY, SELECTOR_LABEL_VALUE),
        MissingObject::Tolerate,
    )
    .await?;

    let job = create_service_connectivity_job(&ctx, "myservice", SERVICE_PORT, JOB_SUCCESS_RETRY, MissingObject::Fail)
        .await?;
    expect_job_outcome(&ctx, &job, JobOutcome::Succeeded, EXPECT_CONNECTIVITY_TO_EXPOSED_SERVICE).await
}

async fn bridge_invalid_service_name(ctx: SpecContext) -> Result<()> {
    bridge_inbound_vmi(&ctx).await?;
    create_service(
        &ctx,
        build_spec("myservice", SERVICE_PORT.into(), SERVICE_PORT.into(), SELECTOR_LABEL_KEY, SELECTOR_LABEL_VALUE),
        MissingObject::Tolerate,
    )
    .await?;

    let job = create_service_connectivity_job(&ctx, "wrongservice", SERVICE_PORT, JOB_FAILURE_RETRY, MissingObject::Tolerate)
        .await?;
    expect_job_outcome(&ctx, &job, JobOutcome::Failed, EXPECT_NO_CONNECTIVITY).await
}

async fn bridge_reach_by_fqdn(ctx: SpecContext) -> Result<()> {
    let vmi = bridge_inbound_vmi(&ctx).await?;
    let (hostname, subdomain) = dns_identity(&vmi)?;

    create_service(
        &ctx,
        build_headless_spec(&subdomain, SERVICE_PORT.into(), SERVICE_PORT.into(), SELECTOR_LABEL_KEY, SELECTOR_LABEL_VALUE),
        MissingObject::Fail,
    )
    .await?;

    let host = format!("{}.{}", hostname, subdomain);
    let job = create_service_connectivity_job(&ctx, &host, SERVICE_PORT, JOB_SUCCESS_RETRY, MissingObject::Fail).await?;
    expect_job_outcome(&ctx, &job, JobOutcome::Succeeded, EXPECT_CONNECTIVITY_TO_EXPOSED_SERVICE).await
}

async fn masquerade_reach_by_labels(ctx: SpecContext, family: IpFamily) -> Result<()> {
    skip_when_cluster_not_support(&ctx.client()?, family).await?;
    masquerade_inbound_vmi(&ctx).await?;

    ctx.by("setting up resources to expose the VMI via a service");
    let (service_name, service) = match family {
        IpFamily::IPv6 => {
            let name = "myservicev6";
            (name, build_ipv6_spec(name, SERVICE_PORT.into(), SERVICE_PORT.into(), SELECTOR_LABEL_KEY, SELECTOR_LABEL_VALUE))
        }
        IpFamily::IPv4 => {
            let name = "myservice";
            (name, build_spec(name, SERVICE_PORT.into(), SERVICE_PORT.into(), SELECTOR_LABEL_KEY, SELECTOR_LABEL_VALUE))
        }
    };
    create_service(&ctx, service, MissingObject::Fail)
        .await
        .expect_that("the Service entity should have been created")?;

    ctx.by("checking connectivity the exposed service");
    let job = create_service_connectivity_job(&ctx, service_name, SERVICE_PORT, JOB_SUCCESS_RETRY, MissingObject::Tolerate)
        .await?;
    expect_job_outcome(&ctx, &job, JobOutcome::Succeeded, EXPECT_CONNECTIVITY_TO_EXPOSED_SERVICE).await
}

async fn masquerade_missing_service(ctx: SpecContext) -> Result<()> {
    masquerade_inbound_vmi(&ctx).await?;
    let job = create_service_connectivity_job(&ctx, "missingservice", SERVICE_PORT, JOB_FAILURE_RETRY, MissingObject::Tolerate)
        .await?;
    expect_job_outcome(&ctx, &job, JobOutcome::Failed, EXPECT_NO_CONNECTIVITY).await
}

/// Cirros VMI on the pod network with bridge binding, exposed and serving
async fn bridge_inbound_vmi(ctx: &SpecContext) -> Result<VirtualMachineInstance> {
    skip_when_cluster_not_support(&ctx.client()?, IpFamily::IPv4).await?;

    let mut vmi = VmiBuilder::new_cirros(ctx.config())
        .with_interface(bridge_interface(DEFAULT_POD_NETWORK))
        .with_network(Network::default_pod())
        .with_tcp_server(SERVICE_PORT)
        .build();
    vmi.expose(SUBDOMAIN, HOSTNAME, SELECTOR_LABEL_KEY, SELECTOR_LABEL_VALUE);
    ready_vmi(ctx, vmi).await
}

/// Fedora VMI with masquerade networking, exposed and serving
async fn masquerade_inbound_vmi(ctx: &SpecContext) -> Result<VirtualMachineInstance> {
    let mut vmi = VmiBuilder::new_fedora(ctx.config())
        .with_networking(masquerade_networking())
        .with_tcp_server(SERVICE_PORT)
        .build();
    vmi.expose(SUBDOMAIN, HOSTNAME, SELECTOR_LABEL_KEY, SELECTOR_LABEL_VALUE);
    ready_vmi(ctx, vmi).await
}

/// Create the VMI, register its deletion, and wait until its server answers
pub async fn ready_vmi(ctx: &SpecContext, vmi: VirtualMachineInstance) -> Result<VirtualMachineInstance> {
    let client = ctx.client()?;
    let api: Api<VirtualMachineInstance> = Api::namespaced(client.clone(), ctx.namespace());

    let created = api.create(&PostParams::default(), &vmi).await?;
    let name = created.name().to_string();
    ctx.defer_cleanup(
        format!("VMI {}", name),
        cleanup_vmi(ctx.clone(), name.clone()),
    );

    ctx.by(format!("Waiting for VMI {} to be ready", name));
    let ready = wait_until_vmi_ready(&api, &name, VMI_READY_TIMEOUT).await?;
    confirm_tcp_server(ctx, &api, &ready, SERVICE_PORT).await?;
    Ok(ready)
}

/// Delete the VMI and wait up to two minutes for it to be gone
pub async fn cleanup_vmi(ctx: SpecContext, name: String) -> Result<()> {
    let api: Api<VirtualMachineInstance> = Api::namespaced(ctx.client()?, ctx.namespace());

    ctx.by("Deleting the VMI");
    api.delete(&name, &DeleteParams::default()).await?;

    ctx.by("Waiting for the VMI to be gone");
    wait_for_gone(&api, &name, DELETION_TIMEOUT)
        .await
        .expect_that("The VMI should be gone within the given timeout")
}

/// Run a connectivity job straight at the VMI address until the guest greets it
async fn confirm_tcp_server(
    ctx: &SpecContext,
    api: &Api<VirtualMachineInstance>,
    vmi: &VirtualMachineInstance,
    port: u16,
) -> Result<()> {
    let name = vmi.name();
    let ip = poll_until(
        &format!("VMI {} to report an IP address", name),
        VMI_IP_TIMEOUT,
        POLL_INTERVAL,
        || async move {
            let current = api.get(name).await?;
            Ok(current.primary_ip().map(str::to_string))
        },
    )
    .await?;

    ctx.by(format!("Waiting for the TCP server on {}:{} to answer", ip, port));
    let client = ctx.client()?;
    let jobs: Api<Job> = Api::namespaced(client, ctx.namespace());
    let image = ctx.config().utility_image(PROBE_IMAGE_NAME);
    let job = jobs
        .create(
            &PostParams::default(),
            &hello_world_job_tcp(&ip, &port.to_string(), &image, GUEST_SERVER_RETRY),
        )
        .await?;
    let job_name = job.name().to_string();
    defer_deletion(
        ctx,
        format!("Job {}", job_name),
        jobs.clone(),
        job_name.clone(),
        DeleteParams::background(),
        MissingObject::Tolerate,
        CLEANING_JOB_SHOULD_SUCCEED,
    );

    wait_for_job_outcome(&jobs, &job_name, JobOutcome::Succeeded, GUEST_SERVER_TIMEOUT)
        .await
        .expect_that(&format!("the TCP server of VMI {} should be listening", name))
}

/// Create a service and register its deletion
pub async fn create_service(ctx: &SpecContext, service: Service, missing: MissingObject) -> Result<Service> {
    let api: Api<Service> = Api::namespaced(ctx.client()?, ctx.namespace());
    let created = api.create(&PostParams::default(), &service).await?;
    let name = created.name().to_string();
    debug!("created service {}", name);

    defer_deletion(
        ctx,
        format!("Service {}", name),
        api,
        name,
        DeleteParams::default(),
        missing,
        CLEANING_SERVICE_SHOULD_SUCCEED,
    );
    Ok(created)
}

/// Start a job reaching `<service>.<namespace>:<port>` with `retries` as its backoff limit
pub async fn create_service_connectivity_job(
    ctx: &SpecContext,
    service_name: &str,
    port: u16,
    retries: i32,
    missing: MissingObject,
) -> Result<Job> {
    let fqdn = service_fqdn(service_name, ctx.namespace());
    ctx.by(format!(
        "starting a job which tries to reach the vmi via service {}, on port {}",
        fqdn, port
    ));

    let image = ctx.config().utility_image(PROBE_IMAGE_NAME);
    let job = hello_world_job_tcp(&fqdn, &port.to_string(), &image, retries);
    let api: Api<Job> = Api::namespaced(ctx.client()?, ctx.namespace());
    let created = api.create(&PostParams::default(), &job).await?;
    let name = created.name().to_string();

    defer_deletion(
        ctx,
        format!("Job {}", name),
        api,
        name,
        DeleteParams::background(),
        missing,
        CLEANING_JOB_SHOULD_SUCCEED,
    );
    Ok(created)
}

async fn expect_job_outcome(ctx: &SpecContext, job: &Job, expected: JobOutcome, message: &str) -> Result<()> {
    let api: Api<Job> = Api::namespaced(ctx.client()?, ctx.namespace());
    wait_for_job_outcome(&api, job.name(), expected, JOB_OUTCOME_TIMEOUT)
        .await
        .expect_that(message)
}

/// Register deletion of a created object as a spec cleanup
fn defer_deletion<K>(
    ctx: &SpecContext,
    description: String,
    api: Api<K>,
    name: String,
    params: DeleteParams,
    missing: MissingObject,
    message: &'static str,
) where
    K: kube::Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    ctx.defer_cleanup(description, async move {
        settle_deletion(api.delete(&name, &params).await, missing).expect_that(message)
    });
}

/// Map a delete call's result under the given policy for already-gone objects
pub fn settle_deletion<T>(result: std::result::Result<T, kube::Error>, missing: MissingObject) -> Result<()> {
    match missing {
        MissingObject::Tolerate => ignore_not_found(result),
        MissingObject::Fail => result.map(|_| ()).map_err(Into::into),
    }
}

/// Hostname and subdomain the VMI was exposed with
pub fn dns_identity(vmi: &VirtualMachineInstance) -> Result<(String, String)> {
    match (vmi.spec.hostname.as_deref(), vmi.spec.subdomain.as_deref()) {
        (Some(hostname), Some(subdomain)) => Ok((hostname.to_string(), subdomain.to_string())),
        _ => Err(NcError::Assertion(format!(
            "VMI {} should have a hostname and a subdomain",
            vmi.name()
        ))),
    }
}

/// Host the connectivity job dials for a service in `namespace`
pub fn service_fqdn(service_name: &str, namespace: &str) -> String {
    format!("{}.{}", service_name, namespace)
}
