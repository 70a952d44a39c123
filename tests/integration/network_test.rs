//! Integration tests for the cluster objects network specs create
//!
//! These tests require a cluster with KubeVirt installed.
//! Run with: cargo test --test integration network_test -- --ignored

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client};
use netcheck::client::create_client;
use netcheck::config::SuiteConfig;
use netcheck::network::services::{service_fqdn, SERVICE_PORT};
use netcheck::network::{cluster_ip_families, IpFamily};
use netcheck::resources::job::{hello_world_job_tcp, PROBE_IMAGE_NAME};
use netcheck::resources::service::{build_headless_spec, build_spec};
use netcheck::resources::vmi::{bridge_interface, Network, DEFAULT_POD_NETWORK};
use netcheck::resources::{KubeResource, VirtualMachineInstance, VmiBuilder};
use netcheck::suite::hooks::test_namespace;
use netcheck::wait::{
    ignore_not_found, wait_for_gone, wait_for_job_to_fail, wait_until_vmi_ready, DELETION_TIMEOUT,
    JOB_OUTCOME_TIMEOUT, VMI_READY_TIMEOUT,
};

const NAMESPACE: &str = "netcheck-integration";

async fn setup() -> Client {
    let client = create_client(None).await.expect("Should create client");
    let namespaces: Api<Namespace> = Api::all(client.clone());
    if namespaces.get_opt(NAMESPACE).await.expect("Should get namespace").is_none() {
        namespaces
            .create(&PostParams::default(), &test_namespace(NAMESPACE))
            .await
            .expect("Should create namespace");
    }
    client
}

#[tokio::test]
#[ignore]
async fn test_cluster_supports_some_ip_family() {
    let client = setup().await;
    let families = cluster_ip_families(&client).await.expect("Should list nodes");
    assert!(
        families.supports(IpFamily::IPv4) || families.supports(IpFamily::IPv6),
        "Pod network should offer at least one family"
    );
}

#[tokio::test]
#[ignore]
async fn test_create_and_delete_service() {
    let client = setup().await;
    let api: Api<Service> = Api::namespaced(client, NAMESPACE);

    let created = api
        .create(&PostParams::default(), &build_spec("it-service", 1500, 1500, "expose", "me"))
        .await
        .expect("Should create service");
    assert_eq!(created.name(), "it-service");
    let spec = created.spec.as_ref().unwrap();
    assert!(spec.cluster_ip.as_deref().is_some_and(|ip| ip != "None"));

    api.delete("it-service", &DeleteParams::default())
        .await
        .expect("Should delete service");
    wait_for_gone(&api, "it-service", DELETION_TIMEOUT)
        .await
        .expect("Service should be gone");
}

#[tokio::test]
#[ignore]
async fn test_headless_service_has_no_cluster_ip() {
    let client = setup().await;
    let api: Api<Service> = Api::namespaced(client, NAMESPACE);

    let created = api
        .create(&PostParams::default(), &build_headless_spec("it-subdomain", 1500, 1500, "expose", "me"))
        .await
        .expect("Should create headless service");
    assert_eq!(created.spec.unwrap().cluster_ip.as_deref(), Some("None"));

    ignore_not_found(api.delete("it-subdomain", &DeleteParams::default()).await)
        .expect("Should delete service");
}

/// A connectivity job against a name that does not resolve fails without retries
#[tokio::test]
#[ignore]
async fn test_job_to_missing_service_fails() {
    let client = setup().await;
    let config = SuiteConfig::default();
    let api: Api<Job> = Api::namespaced(client, NAMESPACE);

    let job = hello_world_job_tcp(
        &service_fqdn("missingservice", NAMESPACE),
        &SERVICE_PORT.to_string(),
        &config.utility_image(PROBE_IMAGE_NAME),
        0,
    );
    let created = api
        .create(&PostParams::default(), &job)
        .await
        .expect("Should create job");
    let name = created.name().to_string();

    let outcome = wait_for_job_to_fail(&api, &name, JOB_OUTCOME_TIMEOUT).await;
    ignore_not_found(api.delete(&name, &DeleteParams::background()).await).expect("Should delete job");
    outcome.expect("Job should fail");
}

#[tokio::test]
#[ignore]
async fn test_vmi_lifecycle() {
    let client = setup().await;
    let api: Api<VirtualMachineInstance> = Api::namespaced(client, NAMESPACE);

    let vmi = VmiBuilder::new_cirros(&SuiteConfig::default())
        .with_interface(bridge_interface(DEFAULT_POD_NETWORK))
        .with_network(Network::default_pod())
        .with_tcp_server(SERVICE_PORT)
        .build();
    let created = api
        .create(&PostParams::default(), &vmi)
        .await
        .expect("Should create VMI");
    let name = created.name().to_string();

    let ready = wait_until_vmi_ready(&api, &name, VMI_READY_TIMEOUT).await;

    api.delete(&name, &DeleteParams::default())
        .await
        .expect("Should delete VMI");
    wait_for_gone(&api, &name, DELETION_TIMEOUT)
        .await
        .expect("VMI should be gone");

    let ready = ready.expect("VMI should become ready");
    assert!(ready.is_ready());
    assert!(ready.primary_ip().is_some());
}
