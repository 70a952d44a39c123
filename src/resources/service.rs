//! Service specs exposing VMIs, plus Service listing support

use crate::resources::{KubeResource, Listable, Tabular};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Api, Client};
use std::collections::BTreeMap;

impl KubeResource for Service {
    const KIND: &'static str = "Service";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl Listable for Service {
    fn api(client: Client, namespace: &str) -> Api<Self> {
        Api::namespaced(client, namespace)
    }
}

impl Tabular for Service {
    fn headers() -> Vec<&'static str> {
        vec!["NAME", "TYPE", "CLUSTER-IP", "FAMILIES", "PORT(S)", "SELECTOR", "AGE"]
    }

    fn row(&self) -> Vec<String> {
        let spec = self.spec.as_ref();

        let svc_type = spec
            .and_then(|s| s.type_.clone())
            .unwrap_or_else(|| "ClusterIP".to_string());

        let cluster_ip = spec
            .and_then(|s| s.cluster_ip.clone())
            .unwrap_or_else(|| "<none>".to_string());

        let families = spec
            .and_then(|s| s.ip_families.as_ref())
            .map(|f| f.join(","))
            .unwrap_or_else(|| "<none>".to_string());

        vec![
            self.name().to_string(),
            svc_type,
            cluster_ip,
            families,
            format_ports(self),
            format_selector(self),
            self.age(),
        ]
    }
}

fn format_ports(svc: &Service) -> String {
    let ports = match svc.spec.as_ref().and_then(|s| s.ports.as_ref()) {
        Some(p) if !p.is_empty() => p,
        _ => return "<none>".to_string(),
    };

    ports
        .iter()
        .map(|p| format!("{}/{}", p.port, p.protocol.as_deref().unwrap_or("TCP")))
        .collect::<Vec<_>>()
        .join(",")
}

fn format_selector(svc: &Service) -> String {
    match svc.spec.as_ref().and_then(|s| s.selector.as_ref()) {
        Some(selector) if !selector.is_empty() => selector
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(","),
        _ => "<none>".to_string(),
    }
}

/// ClusterIP service routing `port` to `target_port` on pods labelled `key=value`
pub fn build_spec(
    name: &str,
    port: i32,
    target_port: i32,
    selector_key: &str,
    selector_value: &str,
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(BTreeMap::from([(
                selector_key.to_string(),
                selector_value.to_string(),
            )])),
            ports: Some(vec![ServicePort {
                protocol: Some("TCP".to_string()),
                port,
                target_port: Some(IntOrString::Int(target_port)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Headless variant of [`build_spec`]; DNS resolves straight to the endpoints
pub fn build_headless_spec(
    name: &str,
    port: i32,
    target_port: i32,
    selector_key: &str,
    selector_value: &str,
) -> Service {
    let mut service = build_spec(name, port, target_port, selector_key, selector_value);
    if let Some(spec) = service.spec.as_mut() {
        spec.cluster_ip = Some("None".to_string());
    }
    service
}

/// Single-stack IPv6 variant of [`build_spec`]
pub fn build_ipv6_spec(
    name: &str,
    port: i32,
    target_port: i32,
    selector_key: &str,
    selector_value: &str,
) -> Service {
    let mut service = build_spec(name, port, target_port, selector_key, selector_value);
    if let Some(spec) = service.spec.as_mut() {
        spec.ip_families = Some(vec!["IPv6".to_string()]);
        spec.ip_family_policy = Some("SingleStack".to_string());
    }
    service
}

/// Whether the service is headless
pub fn is_headless(svc: &Service) -> bool {
    svc.spec.as_ref().and_then(|s| s.cluster_ip.as_deref()) == Some("None")
}
