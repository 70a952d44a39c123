//! Kubernetes client creation

use crate::error::{NcError, Result};
use kube::{config::KubeConfigOptions, Client, Config};
use std::time::Duration;

/// Create a Kubernetes client for the specified context.
///
/// Falls back to the in-cluster configuration when no kubeconfig is present,
/// so the runner also works as a pod inside the cluster under test.
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let config = load_config(context).await?;
    Client::try_from(config).map_err(NcError::from)
}

/// Load Kubernetes configuration
async fn load_config(context: Option<&str>) -> Result<Config> {
    let options = KubeConfigOptions {
        context: context.map(String::from),
        ..Default::default()
    };

    let mut config = match Config::from_kubeconfig(&options).await {
        Ok(config) => config,
        Err(kubeconfig_err) if context.is_none() => Config::incluster().map_err(|e| {
            NcError::Config(format!(
                "Failed to load kubeconfig ({kubeconfig_err}) or in-cluster config ({e})"
            ))
        })?,
        Err(e) => return Err(NcError::Config(format!("Failed to load kubeconfig: {e}"))),
    };

    config.connect_timeout = Some(Duration::from_secs(10));
    config.read_timeout = Some(Duration::from_secs(30));
    Ok(config)
}

/// Get the current context name from the kubeconfig
pub fn current_context() -> Result<String> {
    let kubeconfig = kube::config::Kubeconfig::read()
        .map_err(|e| NcError::Config(format!("Failed to read kubeconfig: {e}")))?;

    kubeconfig
        .current_context
        .ok_or_else(|| NcError::Config("No current context in kubeconfig".to_string()))
}
