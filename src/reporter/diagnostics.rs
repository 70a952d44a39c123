//! Namespace diagnostics captured alongside failed specs
//!
//! Checks the relationship between the VMIs, services, endpoints and
//! connectivity jobs of a test namespace:
//! - Service selectors that match no VMI
//! - Services without ready endpoints
//! - Headless services with no VMI using them as subdomain
//! - VMIs that are not ready or use an unknown interface binding
//! - Connectivity jobs that failed

use crate::resources::job::{job_outcome, JobOutcome};
use crate::resources::service::is_headless;
use crate::resources::vmi::VirtualMachineInstance;
use crate::resources::KubeResource;
use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Endpoints, Service};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Severity level for findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Connectivity cannot work as configured
    Critical,
    /// Likely cause of a connectivity failure
    Warning,
    /// Context for whoever reads the dump
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// A single diagnostic finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Kind of the affected resource (VirtualMachineInstance, Service, Job)
    pub resource_type: String,
    pub resource_name: String,
    pub namespace: Option<String>,
    pub title: String,
    pub description: String,
    pub remediation: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(
        severity: Severity,
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
            namespace: None,
            title: title.into(),
            description: description.into(),
            remediation: None,
            detected_at: Utc::now(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }
}

/// Summary of findings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsSummary {
    pub critical_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
}

impl DiagnosticsSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let count = |s: Severity| findings.iter().filter(|f| f.severity == s).count();
        Self {
            critical_count: count(Severity::Critical),
            warning_count: count(Severity::Warning),
            info_count: count(Severity::Info),
        }
    }
}

/// Diagnostics for one namespace at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub timestamp: DateTime<Utc>,
    pub namespace: String,
    /// Full text of the spec that failed
    pub spec: String,
    pub findings: Vec<Finding>,
    pub summary: DiagnosticsSummary,
}

impl DiagnosticsReport {
    pub fn new(namespace: impl Into<String>, spec: impl Into<String>, findings: Vec<Finding>) -> Self {
        let summary = DiagnosticsSummary::from_findings(&findings);
        Self {
            timestamp: Utc::now(),
            namespace: namespace.into(),
            spec: spec.into(),
            findings,
            summary,
        }
    }
}

/// Objects of a namespace relevant to connectivity
#[derive(Debug, Clone, Default)]
pub struct NamespaceSnapshot {
    pub namespace: String,
    pub vmis: Vec<VirtualMachineInstance>,
    pub services: Vec<Service>,
    pub endpoints: Vec<Endpoints>,
    pub jobs: Vec<Job>,
}

/// Run every check over a snapshot
pub fn analyze(snapshot: &NamespaceSnapshot) -> Vec<Finding> {
    let mut findings = Vec::new();
    for svc in &snapshot.services {
        findings.extend(analyze_service(snapshot, svc));
    }
    for vmi in &snapshot.vmis {
        findings.extend(analyze_vmi(snapshot, vmi));
    }
    for job in &snapshot.jobs {
        if job_outcome(job) == JobOutcome::Failed {
            findings.push(
                Finding::new(
                    Severity::Warning,
                    "Job",
                    job.name(),
                    "Connectivity job failed",
                    format!(
                        "Job {} exhausted its {} retries without reaching the target",
                        job.name(),
                        job.spec.as_ref().and_then(|s| s.backoff_limit).unwrap_or(6)
                    ),
                )
                .with_namespace(&snapshot.namespace)
                .with_remediation("Inspect the job pod logs for the nc output"),
            );
        }
    }
    findings.sort_by(|a, b| a.severity.cmp(&b.severity));
    findings
}

fn selector_matches(selector: &BTreeMap<String, String>, labels: Option<&BTreeMap<String, String>>) -> bool {
    let labels = match labels {
        Some(l) => l,
        None => return selector.is_empty(),
    };
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

fn analyze_service(snapshot: &NamespaceSnapshot, svc: &Service) -> Vec<Finding> {
    let mut findings = Vec::new();
    let name = svc.name();
    let namespace = snapshot.namespace.as_str();

    let spec = match &svc.spec {
        Some(s) => s,
        None => return findings,
    };
    let headless = is_headless(svc);

    match spec.selector.as_ref().filter(|s| !s.is_empty()) {
        Some(selector) => {
            let matching = snapshot
                .vmis
                .iter()
                .filter(|vmi| selector_matches(selector, vmi.metadata.labels.as_ref()))
                .count();
            if matching == 0 {
                let selector_text = selector
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(",");
                findings.push(
                    Finding::new(
                        Severity::Critical,
                        "Service",
                        name,
                        "No VMI matches selector",
                        format!(
                            "Service {} selector {} matches no VMI in namespace {}",
                            name, selector_text, namespace
                        ),
                    )
                    .with_namespace(namespace)
                    .with_remediation("Check the labels set on the VMI when it was exposed"),
                );
            }
        }
        None => {
            findings.push(
                Finding::new(
                    Severity::Warning,
                    "Service",
                    name,
                    "Service has no selector",
                    format!("Service {} has no selector; endpoints must be managed manually", name),
                )
                .with_namespace(namespace),
            );
        }
    }

    if spec.ports.as_ref().map_or(true, |p| p.is_empty()) {
        findings.push(
            Finding::new(
                Severity::Warning,
                "Service",
                name,
                "Service has no ports defined",
                format!("Service {} has no port mappings configured", name),
            )
            .with_namespace(namespace),
        );
    }

    let endpoints = snapshot
        .endpoints
        .iter()
        .find(|ep| ep.metadata.name.as_deref() == Some(name));
    match endpoints {
        None => {
            findings.push(
                Finding::new(
                    if headless { Severity::Info } else { Severity::Warning },
                    "Endpoints",
                    name,
                    "No endpoints object found",
                    format!("Service {} has no endpoints object", name),
                )
                .with_namespace(namespace),
            );
        }
        Some(ep) => {
            let subsets = ep.subsets.as_deref().unwrap_or_default();
            let ready: usize = subsets
                .iter()
                .filter_map(|s| s.addresses.as_ref())
                .map(|a| a.len())
                .sum();
            let not_ready: usize = subsets
                .iter()
                .filter_map(|s| s.not_ready_addresses.as_ref())
                .map(|a| a.len())
                .sum();

            if ready == 0 {
                findings.push(
                    Finding::new(
                        Severity::Critical,
                        "Service",
                        name,
                        "Service has no ready endpoints",
                        format!(
                            "Service {} has 0 ready endpoints and {} not-ready endpoints",
                            name, not_ready
                        ),
                    )
                    .with_namespace(namespace)
                    .with_remediation("Check that the VMI is running and its virt-launcher pod is ready"),
                );
            }

            for svc_port in spec.ports.as_deref().unwrap_or_default() {
                let Some(IntOrString::Int(target)) = svc_port.target_port.as_ref() else {
                    continue;
                };
                let exposed = subsets
                    .iter()
                    .filter_map(|s| s.ports.as_ref())
                    .flatten()
                    .any(|p| p.port == *target);
                if ready > 0 && !exposed {
                    findings.push(
                        Finding::new(
                            Severity::Warning,
                            "Service",
                            name,
                            format!("Target port {} not found in endpoints", target),
                            format!("Service {} targets port {} but endpoints don't expose it", name, target),
                        )
                        .with_namespace(namespace),
                    );
                }
            }
        }
    }

    if headless && !snapshot.vmis.iter().any(|v| v.spec.subdomain.as_deref() == Some(name)) {
        findings.push(
            Finding::new(
                Severity::Info,
                "Service",
                name,
                "Headless service is no VMI's subdomain",
                format!(
                    "No VMI uses subdomain {}; <hostname>.{} names will not resolve",
                    name, name
                ),
            )
            .with_namespace(namespace),
        );
    }

    findings
}

fn analyze_vmi(snapshot: &NamespaceSnapshot, vmi: &VirtualMachineInstance) -> Vec<Finding> {
    let mut findings = Vec::new();
    let name = vmi.name();
    let namespace = snapshot.namespace.as_str();

    match vmi.phase() {
        Some("Failed") => findings.push(
            Finding::new(
                Severity::Critical,
                "VirtualMachineInstance",
                name,
                "VMI failed",
                format!("VMI {} is in phase Failed", name),
            )
            .with_namespace(namespace)
            .with_remediation("Inspect the virt-launcher pod events and logs"),
        ),
        phase if !vmi.is_ready() => findings.push(
            Finding::new(
                Severity::Critical,
                "VirtualMachineInstance",
                name,
                "VMI is not ready",
                format!("VMI {} is in phase {} without a true Ready condition", name, phase.unwrap_or("<none>")),
            )
            .with_namespace(namespace),
        ),
        _ => {}
    }

    for iface in &vmi.spec.domain.devices.interfaces {
        if iface.binding().is_none() {
            findings.push(
                Finding::new(
                    Severity::Warning,
                    "VirtualMachineInstance",
                    name,
                    "Interface without bridge or masquerade binding",
                    format!("Interface {} of VMI {} uses a binding this suite does not exercise", iface.name, name),
                )
                .with_namespace(namespace),
            );
        }
    }

    findings
}

/// Format findings as a table for log output
pub fn format_table(report: &DiagnosticsReport) -> String {
    use std::fmt::Write;

    let mut output = String::new();
    let _ = writeln!(output, "{:10} {:24} {:30} {:50}", "SEVERITY", "KIND", "RESOURCE", "FINDING");
    let _ = writeln!(output, "{}", "-".repeat(114));

    for finding in &report.findings {
        let _ = writeln!(
            output,
            "{:10} {:24} {:30} {:50}",
            finding.severity.to_string(),
            truncate(&finding.resource_type, 24),
            truncate(&finding.resource_name, 30),
            truncate(&finding.title, 50)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Summary: {} critical, {} warnings, {} info",
        report.summary.critical_count, report.summary.warning_count, report.summary.info_count
    );
    output
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}
