//! Core traits for the Kubernetes resources a spec manipulates

use crate::error::Result;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::ListParams;
use kube::{Api, Client, Resource};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// Core trait that all managed resources implement
pub trait KubeResource:
    Clone + Debug + DeserializeOwned + Serialize + Send + Sync + Resource + 'static
{
    /// The Kubernetes API kind (e.g., "Service", "Job")
    const KIND: &'static str;

    /// Get object metadata
    fn metadata(&self) -> &ObjectMeta;

    /// Get the resource name
    fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or("<unknown>")
    }

    /// Get the resource namespace
    fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    /// Get the creation timestamp as a human-readable age string
    fn age(&self) -> String {
        self.metadata()
            .creation_timestamp
            .as_ref()
            .map(|ts| humanize_duration(ts.0))
            .unwrap_or_else(|| "<unknown>".to_string())
    }
}

/// Trait for namespaced resources that can be listed
pub trait Listable: KubeResource {
    /// Create a kube Api handle for this resource
    fn api(client: Client, namespace: &str) -> Api<Self>
    where
        Self: Sized;
}

/// List resources with an optional label selector
pub async fn list_resources<K: Listable>(api: &Api<K>, label_selector: Option<&str>) -> Result<Vec<K>> {
    let mut lp = ListParams::default();
    if let Some(ls) = label_selector {
        lp = lp.labels(ls);
    }
    Ok(api.list(&lp).await?.items)
}

/// Trait for resources that have a meaningful table display
pub trait Tabular: KubeResource {
    /// Column headers for table output
    fn headers() -> Vec<&'static str>;

    /// Row values for table output
    fn row(&self) -> Vec<String>;

    /// Get the status for coloring (e.g., "Running", "Failed")
    fn status_for_color(&self) -> Option<&str> {
        None
    }
}

/// Convert a chrono DateTime to a human-readable duration string
pub fn humanize_duration(time: chrono::DateTime<chrono::Utc>) -> String {
    let now = chrono::Utc::now();
    let duration = now.signed_duration_since(time);

    if duration.num_days() > 0 {
        format!("{}d", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{}h", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{}m", duration.num_minutes())
    } else {
        format!("{}s", duration.num_seconds().max(0))
    }
}

/// Status values that indicate a healthy state
pub const HEALTHY_STATUSES: &[&str] = &["Running", "Succeeded", "Complete", "Passed", "Ready"];

/// Status values that indicate a warning state
pub const WARNING_STATUSES: &[&str] = &[
    "Pending",
    "Scheduling",
    "Scheduled",
    "Active",
    "Skipped",
    "Unknown",
];

/// Status values that indicate an error state
pub const ERROR_STATUSES: &[&str] = &["Failed", "Panicked", "TimedOut"];

/// Determine status category for coloring
pub fn status_category(status: &str) -> StatusCategory {
    if HEALTHY_STATUSES.contains(&status) {
        StatusCategory::Healthy
    } else if ERROR_STATUSES.contains(&status) {
        StatusCategory::Error
    } else if WARNING_STATUSES.contains(&status) {
        StatusCategory::Warning
    } else {
        StatusCategory::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Healthy,
    Warning,
    Error,
    Unknown,
}
