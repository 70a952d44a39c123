//! Network specs and cluster network capability detection

pub mod services;

use crate::error::{NcError, Result};
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::{Api, Client};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Container prefix for every network spec
pub const SIG_NETWORK: &str = "[sig-network]";

/// Container path rooted at the network SIG
pub fn sig_describe(text: &str) -> String {
    format!("{} {}", SIG_NETWORK, text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpFamily {
    IPv4,
    IPv6,
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::IPv4 => write!(f, "IPv4"),
            IpFamily::IPv6 => write!(f, "IPv6"),
        }
    }
}

impl IpFamily {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpFamily::IPv4,
            IpAddr::V6(_) => IpFamily::IPv6,
        }
    }
}

/// IP families the pod network offers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIpFamilies {
    pub ipv4: bool,
    pub ipv6: bool,
}

impl ClusterIpFamilies {
    pub fn supports(&self, family: IpFamily) -> bool {
        match family {
            IpFamily::IPv4 => self.ipv4,
            IpFamily::IPv6 => self.ipv6,
        }
    }

    fn record(&mut self, addr: &str) {
        let host = addr.split('/').next().unwrap_or(addr);
        if let Ok(ip) = host.parse::<IpAddr>() {
            match IpFamily::of(&ip) {
                IpFamily::IPv4 => self.ipv4 = true,
                IpFamily::IPv6 => self.ipv6 = true,
            }
        }
    }
}

/// Derive the pod network families from node pod CIDRs.
///
/// Nodes without pod CIDRs (some CNIs manage IPAM themselves) fall back to
/// their InternalIP addresses.
pub fn families_from_nodes(nodes: &[Node]) -> ClusterIpFamilies {
    let mut families = ClusterIpFamilies::default();

    for node in nodes {
        let spec = node.spec.as_ref();
        let mut cidrs: Vec<&str> = spec
            .and_then(|s| s.pod_cidrs.as_ref())
            .map(|c| c.iter().map(String::as_str).collect())
            .unwrap_or_default();
        if cidrs.is_empty() {
            if let Some(cidr) = spec.and_then(|s| s.pod_cidr.as_deref()) {
                cidrs.push(cidr);
            }
        }

        if !cidrs.is_empty() {
            cidrs.iter().for_each(|c| families.record(c));
            continue;
        }

        let addresses = node
            .status
            .as_ref()
            .and_then(|s| s.addresses.as_ref())
            .map(|a| a.as_slice())
            .unwrap_or_default();
        for address in addresses.iter().filter(|a| a.type_ == "InternalIP") {
            families.record(&address.address);
        }
    }

    families
}

/// Query the cluster for the IP families its pod network supports
pub async fn cluster_ip_families(client: &Client) -> Result<ClusterIpFamilies> {
    let nodes: Api<Node> = Api::all(client.clone());
    let list = nodes.list(&ListParams::default()).await?;
    Ok(families_from_nodes(&list.items))
}

/// Skip the current spec unless the cluster supports `family`
pub async fn skip_when_cluster_not_support(client: &Client, family: IpFamily) -> Result<()> {
    let families = cluster_ip_families(client).await?;
    if families.supports(family) {
        Ok(())
    } else {
        Err(NcError::Skipped(format!("cluster does not support {}", family)))
    }
}
