//! KubeVirt VirtualMachineInstance resource and spec builders
//!
//! Only the subset of the `kubevirt.io/v1` schema that the network specs
//! touch is modelled. Unknown fields returned by the API server are ignored
//! on read, so these types stay usable against newer KubeVirt releases.

use crate::config::SuiteConfig;
use crate::resources::{KubeResource, Listable, Tabular};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Api, Client, CustomResource};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the pod network every VMI attaches to
pub const DEFAULT_POD_NETWORK: &str = "default";

/// Reply sent by the guest TCP server and expected by connectivity jobs
pub const HELLO_WORLD: &str = "Hello World!";

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachineInstance",
    plural = "virtualmachineinstances",
    shortname = "vmi",
    namespaced,
    status = "VirtualMachineInstanceStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceSpec {
    pub domain: DomainSpec,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<Network>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    /// Guest hostname, combined with `subdomain` for headless service DNS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_grace_period_seconds: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DomainSpec {
    #[serde(default)]
    pub resources: DomainResources,
    #[serde(default)]
    pub devices: Devices,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct DomainResources {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Devices {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<Disk>,
}

/// Empty marker object, serialized as `{}`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Marker {}

/// How a VMI interface is wired to the pod network
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceBinding {
    /// The pod interface is bridged into the guest; the guest owns the pod IP
    Bridge,
    /// The guest sits behind NAT on the pod interface
    Masquerade,
}

impl fmt::Display for InterfaceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceBinding::Bridge => write!(f, "bridge"),
            InterfaceBinding::Masquerade => write!(f, "masquerade"),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masquerade: Option<Marker>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<InterfacePort>,
}

impl Interface {
    /// Interface attached to `network` with the given binding
    pub fn new(network: impl Into<String>, binding: InterfaceBinding) -> Self {
        let mut iface = Self {
            name: network.into(),
            ..Default::default()
        };
        match binding {
            InterfaceBinding::Bridge => iface.bridge = Some(Marker {}),
            InterfaceBinding::Masquerade => iface.masquerade = Some(Marker {}),
        }
        iface
    }

    /// The binding configured on this interface, if any we know about
    pub fn binding(&self) -> Option<InterfaceBinding> {
        if self.bridge.is_some() {
            Some(InterfaceBinding::Bridge)
        } else if self.masquerade.is_some() {
            Some(InterfaceBinding::Masquerade)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterfacePort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub port: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Network {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<Marker>,
}

impl Network {
    /// The cluster's default pod network
    pub fn default_pod() -> Self {
        Self {
            name: DEFAULT_POD_NETWORK.to_string(),
            pod: Some(Marker {}),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Disk {
    pub name: String,
    #[serde(default)]
    pub disk: DiskTarget,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct DiskTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_disk: Option<ContainerDiskSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_init_no_cloud: Option<CloudInitNoCloudSource>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ContainerDiskSource {
    pub image: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudInitNoCloudSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<VmiCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<VmiInterfaceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VmiCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VmiInterfaceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,
}

impl VirtualMachineInstance {
    pub fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.phase.as_deref())
    }

    /// Whether the `Ready` condition is `True`
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .map(|s| {
                s.conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            })
            .unwrap_or(false)
    }

    /// Primary address reported for the default pod network interface
    pub fn primary_ip(&self) -> Option<&str> {
        let status = self.status.as_ref()?;
        let iface = status
            .interfaces
            .iter()
            .find(|i| i.name.as_deref() == Some(DEFAULT_POD_NETWORK))
            .or_else(|| status.interfaces.first())?;
        iface
            .ip_address
            .as_deref()
            .or_else(|| iface.ip_addresses.first().map(String::as_str))
    }

    /// Give the VMI a stable DNS identity and a single selector label.
    ///
    /// Existing labels are replaced so the service selector is the only label.
    pub fn expose(
        &mut self,
        subdomain: &str,
        hostname: &str,
        selector_key: &str,
        selector_value: &str,
    ) {
        self.metadata.labels = Some(BTreeMap::from([(
            selector_key.to_string(),
            selector_value.to_string(),
        )]));
        self.spec.subdomain = Some(subdomain.to_string());
        self.spec.hostname = Some(hostname.to_string());
    }
}

impl KubeResource for VirtualMachineInstance {
    const KIND: &'static str = "VirtualMachineInstance";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl Listable for VirtualMachineInstance {
    fn api(client: Client, namespace: &str) -> Api<Self> {
        Api::namespaced(client, namespace)
    }
}

impl Tabular for VirtualMachineInstance {
    fn headers() -> Vec<&'static str> {
        vec!["NAME", "PHASE", "READY", "IP", "NODE", "BINDING", "AGE"]
    }

    fn row(&self) -> Vec<String> {
        let binding = self
            .spec
            .domain
            .devices
            .interfaces
            .first()
            .and_then(Interface::binding)
            .map(|b| b.to_string())
            .unwrap_or_else(|| "<none>".to_string());

        vec![
            self.name().to_string(),
            self.phase().unwrap_or("<unknown>").to_string(),
            if self.is_ready() { "True" } else { "False" }.to_string(),
            self.primary_ip().unwrap_or("<none>").to_string(),
            self.status
                .as_ref()
                .and_then(|s| s.node_name.clone())
                .unwrap_or_else(|| "<none>".to_string()),
            binding,
            self.age(),
        ]
    }

    fn status_for_color(&self) -> Option<&str> {
        self.phase()
    }
}

/// Guest operating system images used by the network specs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuestImage {
    Cirros,
    Fedora,
}

impl GuestImage {
    /// Container disk image name in the utility registry
    pub fn container_disk(&self) -> &'static str {
        match self {
            GuestImage::Cirros => "cirros-container-disk-demo",
            GuestImage::Fedora => "fedora-with-test-tooling-container-disk",
        }
    }

    /// Guest memory request
    pub fn memory(&self) -> &'static str {
        match self {
            GuestImage::Cirros => "128Mi",
            GuestImage::Fedora => "1Gi",
        }
    }

    /// Cloud-init script starting a looping TCP server answering `Hello World!`
    pub fn tcp_server_user_data(&self, port: u16) -> String {
        match self {
            // busybox nc: -e takes the remaining arguments as the program
            GuestImage::Cirros => format!(
                "#!/bin/sh\nnohup nc -klp {port} -e echo -e '{HELLO_WORLD}' >/dev/null 2>&1 &\n"
            ),
            GuestImage::Fedora => format!(
                "#!/bin/bash\nnohup ncat -klp {port} --sh-exec \"echo '{HELLO_WORLD}'\" >/dev/null 2>&1 &\n"
            ),
        }
    }
}

/// Random VMI name with the conventional `testvmi-` prefix
pub fn random_name(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("{prefix}-{suffix}")
}

/// Builder for the VMIs the network specs provision
#[derive(Debug, Clone)]
pub struct VmiBuilder {
    name: String,
    image: GuestImage,
    disk_image: String,
    labels: BTreeMap<String, String>,
    interfaces: Vec<Interface>,
    networks: Vec<Network>,
    hostname: Option<String>,
    subdomain: Option<String>,
    user_data: Option<String>,
}

impl VmiBuilder {
    /// Start from a guest image with an explicit container disk reference
    pub fn new(image: GuestImage, disk_image: impl Into<String>) -> Self {
        Self {
            name: random_name("testvmi"),
            image,
            disk_image: disk_image.into(),
            labels: BTreeMap::new(),
            interfaces: Vec::new(),
            networks: Vec::new(),
            hostname: None,
            subdomain: None,
            user_data: None,
        }
    }

    /// Minimal Cirros guest
    pub fn new_cirros(config: &SuiteConfig) -> Self {
        let image = GuestImage::Cirros;
        Self::new(image, config.container_disk_image(image.container_disk()))
    }

    /// Fedora guest with networking test tooling
    pub fn new_fedora(config: &SuiteConfig) -> Self {
        let image = GuestImage::Fedora;
        Self::new(image, config.container_disk_image(image.container_disk()))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_interface(mut self, iface: Interface) -> Self {
        self.interfaces.push(iface);
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.networks.push(network);
        self
    }

    /// Attach an interface/network pair such as [`masquerade_networking`]
    pub fn with_networking(self, (iface, network): (Interface, Network)) -> Self {
        self.with_interface(iface).with_network(network)
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    /// Start a TCP server replying `Hello World!` on `port` at boot
    pub fn with_tcp_server(mut self, port: u16) -> Self {
        self.user_data = Some(self.image.tcp_server_user_data(port));
        self
    }

    pub fn build(self) -> VirtualMachineInstance {
        let mut disks = vec![Disk {
            name: "containerdisk".to_string(),
            disk: DiskTarget {
                bus: Some("virtio".to_string()),
            },
        }];
        let mut volumes = vec![Volume {
            name: "containerdisk".to_string(),
            container_disk: Some(ContainerDiskSource {
                image: self.disk_image,
            }),
            ..Default::default()
        }];

        // Both images read the NoCloud datasource even without user data
        disks.push(Disk {
            name: "cloudinitdisk".to_string(),
            disk: DiskTarget {
                bus: Some("virtio".to_string()),
            },
        });
        volumes.push(Volume {
            name: "cloudinitdisk".to_string(),
            cloud_init_no_cloud: Some(CloudInitNoCloudSource {
                user_data: Some(
                    self.user_data
                        .unwrap_or_else(|| "#!/bin/sh\necho 'netcheck'\n".to_string()),
                ),
            }),
            ..Default::default()
        });

        let spec = VirtualMachineInstanceSpec {
            domain: DomainSpec {
                resources: DomainResources {
                    requests: BTreeMap::from([(
                        "memory".to_string(),
                        self.image.memory().to_string(),
                    )]),
                },
                devices: Devices {
                    interfaces: self.interfaces,
                    disks,
                },
            },
            networks: self.networks,
            volumes,
            hostname: self.hostname,
            subdomain: self.subdomain,
            termination_grace_period_seconds: Some(0),
        };

        let mut vmi = VirtualMachineInstance::new(&self.name, spec);
        if !self.labels.is_empty() {
            vmi.metadata.labels = Some(self.labels);
        }
        vmi
    }
}

/// Bridge-bound interface on the named network
pub fn bridge_interface(network: &str) -> Interface {
    Interface::new(network, InterfaceBinding::Bridge)
}

/// Masquerade interface on the default pod network, with the network itself
pub fn masquerade_networking() -> (Interface, Network) {
    (
        Interface::new(DEFAULT_POD_NETWORK, InterfaceBinding::Masquerade),
        Network::default_pod(),
    )
}
