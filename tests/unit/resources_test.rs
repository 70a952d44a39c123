//! Tests for src/resources - VMI builder, service specs, connectivity jobs

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use netcheck::config::SuiteConfig;
use netcheck::resources::job::{hello_world_job_tcp, job_outcome, tcp_check_script, JobOutcome, JOB_NAME_PREFIX};
use netcheck::resources::service::{build_headless_spec, build_ipv6_spec, build_spec, is_headless};
use netcheck::resources::vmi::{
    bridge_interface, masquerade_networking, InterfaceBinding, Network, DEFAULT_POD_NETWORK,
};
use netcheck::resources::{status_category, KubeResource, StatusCategory, Tabular, VmiBuilder};
use serde_json::json;

#[allow(dead_code)]
mod common {
    include!("../common/mod.rs");
}

// ============================================================================
// VMI builder
// ============================================================================

#[test]
fn test_cirros_vmi_with_bridge_binding() {
    let vmi = VmiBuilder::new_cirros(&SuiteConfig::default())
        .with_interface(bridge_interface(DEFAULT_POD_NETWORK))
        .with_network(Network::default_pod())
        .build();

    assert!(vmi.name().starts_with("testvmi-"));
    let iface = &vmi.spec.domain.devices.interfaces[0];
    assert_eq!(iface.name, "default");
    assert_eq!(iface.binding(), Some(InterfaceBinding::Bridge));
    assert_eq!(vmi.spec.networks, vec![Network::default_pod()]);
    assert_eq!(vmi.spec.termination_grace_period_seconds, Some(0));

    let disk = vmi.spec.volumes[0].container_disk.as_ref().unwrap();
    assert_eq!(disk.image, "quay.io/kubevirt/cirros-container-disk-demo:latest");
}

#[test]
fn test_interfaces_and_networks_append() {
    let vmi = VmiBuilder::new_fedora(&SuiteConfig::default())
        .with_networking(masquerade_networking())
        .with_interface(bridge_interface("secondary"))
        .build();
    let bindings: Vec<_> = vmi
        .spec
        .domain
        .devices
        .interfaces
        .iter()
        .filter_map(|i| i.binding())
        .collect();
    assert_eq!(bindings, vec![InterfaceBinding::Masquerade, InterfaceBinding::Bridge]);
    assert_eq!(vmi.spec.networks.len(), 1);
}

#[test]
fn test_vmi_serializes_kubevirt_shape() {
    let vmi = VmiBuilder::new_fedora(&SuiteConfig::default())
        .with_name("testvmi-fixed")
        .with_networking(masquerade_networking())
        .build();
    let value = serde_json::to_value(&vmi).unwrap();

    assert_eq!(value["apiVersion"], "kubevirt.io/v1");
    assert_eq!(value["kind"], "VirtualMachineInstance");
    assert_eq!(value["metadata"]["name"], "testvmi-fixed");
    assert_eq!(
        value["spec"]["domain"]["devices"]["interfaces"][0],
        json!({"name": "default", "masquerade": {}})
    );
    assert_eq!(value["spec"]["networks"][0], json!({"name": "default", "pod": {}}));
    assert_eq!(value["spec"]["domain"]["resources"]["requests"]["memory"], "1Gi");
}

#[test]
fn test_tcp_server_user_data_per_image() {
    let cirros = VmiBuilder::new_cirros(&SuiteConfig::default())
        .with_tcp_server(1500)
        .build();
    let fedora = VmiBuilder::new_fedora(&SuiteConfig::default())
        .with_tcp_server(1500)
        .build();

    let user_data = |vmi: &netcheck::resources::VirtualMachineInstance| {
        vmi.spec
            .volumes
            .iter()
            .find_map(|v| v.cloud_init_no_cloud.as_ref())
            .and_then(|c| c.user_data.clone())
            .unwrap()
    };
    let cirros_data = user_data(&cirros);
    assert!(cirros_data.contains("nc -klp 1500"));
    assert!(cirros_data.contains("Hello World!"));
    let fedora_data = user_data(&fedora);
    assert!(fedora_data.contains("ncat -klp 1500"));
    assert!(fedora_data.contains("Hello World!"));
}

#[test]
fn test_expose_replaces_labels() {
    let mut vmi = VmiBuilder::new_cirros(&SuiteConfig::default())
        .with_label("kubevirt.io/test", "services")
        .with_label("app", "inbound")
        .build();
    vmi.expose("vmi", "inbound", "expose", "me");

    let labels = vmi.metadata.labels.as_ref().unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels.get("expose").map(String::as_str), Some("me"));
    assert_eq!(vmi.spec.subdomain.as_deref(), Some("vmi"));
    assert_eq!(vmi.spec.hostname.as_deref(), Some("inbound"));
}

#[test]
fn test_builder_dns_identity() {
    let vmi = VmiBuilder::new_fedora(&SuiteConfig::default())
        .with_hostname("inbound")
        .with_subdomain("vmi")
        .build();
    assert_eq!(vmi.spec.hostname.as_deref(), Some("inbound"));
    assert_eq!(vmi.spec.subdomain.as_deref(), Some("vmi"));
    assert!(vmi.metadata.labels.is_none());

    let mut exposed = VmiBuilder::new_cirros(&SuiteConfig::default())
        .with_hostname("outbound")
        .build();
    assert_eq!(exposed.spec.subdomain, None);
    exposed.expose("vmi", "inbound", "expose", "me");
    assert_eq!(exposed.spec.hostname.as_deref(), Some("inbound"));
}

#[test]
fn test_vmi_readiness_and_ip() {
    let ready = common::create_mock_vmi("testvmi-a", "Running", true);
    assert!(ready.is_ready());
    assert_eq!(ready.phase(), Some("Running"));
    assert_eq!(ready.primary_ip(), Some("10.244.0.12"));

    let booting = common::create_mock_vmi("testvmi-b", "Scheduled", false);
    assert!(!booting.is_ready());
}

#[test]
fn test_vmi_table_row() {
    let vmi = common::create_mock_vmi("testvmi-a", "Running", true);
    let row = vmi.row();
    assert_eq!(row.len(), netcheck::resources::VirtualMachineInstance::headers().len());
    assert_eq!(row[0], "testvmi-a");
    assert_eq!(row[1], "Running");
    assert_eq!(row[2], "True");
    assert_eq!(row[3], "10.244.0.12");
    assert_eq!(row[4], "node01");
    assert_eq!(row[6], "5m");
}

// ============================================================================
// Services
// ============================================================================

#[test]
fn test_build_spec() {
    let svc = build_spec("myservice", 1500, 1500, "expose", "me");
    let spec = svc.spec.as_ref().unwrap();
    assert_eq!(svc.metadata.name.as_deref(), Some("myservice"));
    assert_eq!(spec.selector.as_ref().unwrap().get("expose").map(String::as_str), Some("me"));
    let port = &spec.ports.as_ref().unwrap()[0];
    assert_eq!(port.port, 1500);
    assert_eq!(port.protocol.as_deref(), Some("TCP"));
    assert_eq!(port.target_port, Some(IntOrString::Int(1500)));
    assert!(spec.cluster_ip.is_none());
    assert!(!is_headless(&svc));
}

#[test]
fn test_build_headless_spec() {
    let svc = build_headless_spec("vmi", 1500, 1500, "expose", "me");
    assert_eq!(svc.spec.as_ref().unwrap().cluster_ip.as_deref(), Some("None"));
    assert!(is_headless(&svc));
}

#[test]
fn test_build_ipv6_spec() {
    let svc = build_ipv6_spec("myservicev6", 1500, 1500, "expose", "me");
    let spec = svc.spec.as_ref().unwrap();
    assert_eq!(spec.ip_families, Some(vec!["IPv6".to_string()]));
    assert_eq!(spec.ip_family_policy.as_deref(), Some("SingleStack"));
    assert_eq!(spec.ports.as_ref().unwrap()[0].port, 1500);
}

#[test]
fn test_service_table_row() {
    let svc = build_ipv6_spec("myservicev6", 1500, 1500, "expose", "me");
    let row = svc.row();
    assert_eq!(row[0], "myservicev6");
    assert_eq!(row[1], "ClusterIP");
    assert_eq!(row[3], "IPv6");
    assert_eq!(row[4], "1500/TCP");
    assert_eq!(row[5], "expose=me");
}

// ============================================================================
// Connectivity jobs
// ============================================================================

#[test]
fn test_hello_world_job_tcp() {
    let job = hello_world_job_tcp("myservice.kubevirt-test-default", "1500", "quay.io/kubevirt/vm-killer:latest", 3);
    assert_eq!(job.metadata.generate_name.as_deref(), Some(JOB_NAME_PREFIX));
    let spec = job.spec.as_ref().unwrap();
    assert_eq!(spec.backoff_limit, Some(3));

    let pod = spec.template.spec.as_ref().unwrap();
    assert_eq!(pod.restart_policy.as_deref(), Some("Never"));
    let container = &pod.containers[0];
    assert_eq!(container.image.as_deref(), Some("quay.io/kubevirt/vm-killer:latest"));
    let command = container.command.as_ref().unwrap();
    assert_eq!(&command[..2], &["/bin/bash".to_string(), "-c".to_string()]);
    assert!(command[2].contains("nc myservice.kubevirt-test-default 1500"));
}

#[test]
fn test_zero_retries_is_explicit() {
    let job = hello_world_job_tcp("wrongservice.ns", "1500", "img", 0);
    assert_eq!(job.spec.unwrap().backoff_limit, Some(0));
}

#[test]
fn test_tcp_check_script_compares_greeting() {
    let script = tcp_check_script("inbound.vmi.ns", "1500");
    assert!(script.contains("\"Hello World!\""));
    assert!(script.contains("exit 0"));
    assert!(script.contains("exit 1"));
}

#[test]
fn test_job_outcome_from_conditions() {
    assert_eq!(job_outcome(&common::create_mock_job("a", None)), JobOutcome::Running);
    assert_eq!(job_outcome(&common::create_mock_job("b", Some("Complete"))), JobOutcome::Succeeded);
    assert_eq!(job_outcome(&common::create_mock_job("c", Some("Failed"))), JobOutcome::Failed);
    assert_eq!(job_outcome(&common::create_mock_job("d", Some("Suspended"))), JobOutcome::Running);
}

#[test]
fn test_job_table_row() {
    let row = common::create_mock_job("netcheck-tcp-abcde", Some("Failed")).row();
    assert_eq!(row[0], "netcheck-tcp-abcde");
    assert_eq!(row[1], "Failed");
    assert_eq!(row[2], "<default>");
}

// ============================================================================
// Status categories
// ============================================================================

#[test]
fn test_status_categories() {
    assert_eq!(status_category("Running"), StatusCategory::Healthy);
    assert_eq!(status_category("Passed"), StatusCategory::Healthy);
    assert_eq!(status_category("Scheduled"), StatusCategory::Warning);
    assert_eq!(status_category("Skipped"), StatusCategory::Warning);
    assert_eq!(status_category("TimedOut"), StatusCategory::Error);
    assert_eq!(status_category("Whatever"), StatusCategory::Unknown);
}
