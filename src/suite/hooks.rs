//! Suite-level setup and teardown

use crate::error::{NcError, Result};
use crate::wait::{eventually, is_not_found, wait_for_gone, DELETION_TIMEOUT, POLL_INTERVAL};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::info;

/// Label marking namespaces created by the suite
pub const TEST_NAMESPACE_LABEL: &str = "netcheck.kubevirt.io/test-namespace";

/// Work done once before the first spec and once after the last one
#[async_trait]
pub trait SuiteHooks: Send + Sync {
    fn name(&self) -> &str;

    async fn before_suite(&self) -> Result<()> {
        Ok(())
    }

    async fn after_suite(&self) -> Result<()> {
        Ok(())
    }
}

/// Owns the lifecycle of the per-process test namespace
pub struct NamespaceSetup {
    client: Client,
    namespace: String,
    keep: bool,
}

impl NamespaceSetup {
    pub fn new(client: Client, namespace: impl Into<String>, keep: bool) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            keep,
        }
    }

    fn api(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }
}

/// Namespace object carrying the suite label
pub fn test_namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                TEST_NAMESPACE_LABEL.to_string(),
                "true".to_string(),
            )])),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn is_terminating(ns: &Namespace) -> bool {
    ns.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Terminating")
}

#[async_trait]
impl SuiteHooks for NamespaceSetup {
    fn name(&self) -> &str {
        "namespace"
    }

    async fn before_suite(&self) -> Result<()> {
        let api = self.api();
        let name = self.namespace.as_str();

        match api.get(name).await {
            Ok(existing) if is_terminating(&existing) => {
                info!("namespace {} is terminating, waiting for it to go away", name);
                wait_for_gone(&api, name, DELETION_TIMEOUT).await?;
            }
            Ok(_) => {
                info!("reusing existing namespace {}", name);
                return Ok(());
            }
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(NcError::SuiteSetup(format!("checking namespace {}: {}", name, e))),
        }

        api.create(&PostParams::default(), &test_namespace(name))
            .await
            .map_err(|e| NcError::SuiteSetup(format!("creating namespace {}: {}", name, e)))?;
        info!("created namespace {}", name);

        // Wait for the default service account so pods can be admitted
        let accounts: Api<ServiceAccount> = Api::namespaced(self.client.clone(), name);
        let accounts = &accounts;
        eventually(
            &format!("default service account in {}", name),
            DELETION_TIMEOUT,
            POLL_INTERVAL,
            || async move {
                match accounts.get("default").await {
                    Ok(_) => Ok(true),
                    Err(e) if is_not_found(&e) => Ok(false),
                    Err(e) => Err(e.into()),
                }
            },
        )
        .await
    }

    async fn after_suite(&self) -> Result<()> {
        if self.keep {
            info!("keeping namespace {}", self.namespace);
            return Ok(());
        }
        let api = self.api();
        match api.delete(&self.namespace, &DeleteParams::background()).await {
            Ok(_) => {}
            Err(e) if is_not_found(&e) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        info!("deleting namespace {}", self.namespace);
        wait_for_gone(&api, &self.namespace, DELETION_TIMEOUT).await
    }
}
