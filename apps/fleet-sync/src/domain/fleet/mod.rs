//! Fleet Inventory Types
//!
//! Records returned by the fleet manager's REST API and pushed over the
//! metrics stream. Wire field names are camelCase.
//!
//! Collections are keyed by a stable identifier:
//!
//! | Record          | Key              |
//! |-----------------|------------------|
//! | `ContainerInfo` | container id     |
//! | `StackInfo`     | stack name       |
//! | `VolumeInfo`    | volume name      |
//! | `NetworkInfo`   | network id       |
//! | `ImageInfo`     | image id         |
//!
//! No cross-collection integrity is kept here. Container-to-stack
//! membership is read from container labels at call time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnNull, serde_as};

mod stats;

pub use stats::{ContainerStats, ContainerStatsPayload, SystemStats};

/// Label the compose tooling stamps on every container of a stack.
pub const STACK_PROJECT_LABEL: &str = "com.docker.compose.project";

// =============================================================================
// Containers
// =============================================================================

/// A published container port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortBinding {
    /// Host interface address.
    pub host_ip: String,
    /// Port on the host.
    pub host_port: u16,
    /// Port inside the container.
    pub container_port: u16,
    /// `tcp` or `udp`.
    pub protocol: String,
}

/// A container as listed by the fleet manager.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerInfo {
    /// Container id.
    pub id: String,
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Human-readable status (e.g. "Up 3 hours").
    pub status: String,
    /// Machine state (e.g. "running", "exited").
    pub state: String,
    /// Creation time, unix seconds.
    pub created: i64,
    /// Published ports.
    #[serde_as(as = "DefaultOnNull")]
    pub ports: Vec<PortBinding>,
    /// Container labels.
    #[serde_as(as = "DefaultOnNull")]
    pub labels: HashMap<String, String>,
    /// Network mode.
    pub network_mode: String,
}

impl ContainerInfo {
    /// Name of the stack this container belongs to, if any.
    #[must_use]
    pub fn stack_name(&self) -> Option<&str> {
        self.labels.get(STACK_PROJECT_LABEL).map(String::as_str)
    }

    /// Whether the container is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Containers whose stack-membership label equals `stack_name`, in order.
#[must_use]
pub fn stack_containers(containers: &[ContainerInfo], stack_name: &str) -> Vec<ContainerInfo> {
    containers
        .iter()
        .filter(|c| c.stack_name() == Some(stack_name))
        .cloned()
        .collect()
}

// =============================================================================
// Stacks
// =============================================================================

/// Aggregate run status of a stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackStatus {
    /// Every service is running.
    Running,
    /// Some services are running.
    Partial,
    /// No service is running.
    #[default]
    Stopped,
}

/// A compose stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StackInfo {
    /// Stack name.
    pub name: String,
    /// Directory holding the compose definition.
    pub path: String,
    /// Aggregate status.
    pub status: StackStatus,
    /// Number of services declared.
    pub services: u32,
    /// Number of services running.
    pub running_services: u32,
}

// =============================================================================
// Volumes, networks, images
// =============================================================================

/// A named volume.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeInfo {
    /// Volume name.
    pub name: String,
    /// Volume driver.
    pub driver: String,
    /// Host mountpoint.
    pub mountpoint: String,
    /// Creation time as reported by the engine.
    pub created_at: String,
    /// Volume labels.
    #[serde_as(as = "DefaultOnNull")]
    pub labels: HashMap<String, String>,
    /// Names of containers using the volume.
    #[serde_as(as = "DefaultOnNull")]
    pub used_by: Vec<String>,
}

/// A container network.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkInfo {
    /// Network id.
    pub id: String,
    /// Network name.
    pub name: String,
    /// Network driver.
    pub driver: String,
    /// Network scope.
    pub scope: String,
    /// Whether the network is internal.
    pub internal: bool,
    /// Names of attached containers.
    #[serde_as(as = "DefaultOnNull")]
    pub containers: Vec<String>,
}

/// A local image.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageInfo {
    /// Image id.
    pub id: String,
    /// Repository tags.
    #[serde_as(as = "DefaultOnNull")]
    pub tags: Vec<String>,
    /// Size in bytes.
    pub size: u64,
    /// Creation time, unix seconds.
    pub created: i64,
}

// =============================================================================
// Request and response bodies
// =============================================================================

/// Body of `POST /volumes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    /// Volume name.
    pub name: String,
    /// Volume driver.
    pub driver: String,
    /// Volume labels.
    pub labels: HashMap<String, String>,
}

impl CreateVolumeRequest {
    /// Request a `local` volume without labels.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: "local".to_string(),
            labels: HashMap::new(),
        }
    }

    /// Use a different driver.
    #[must_use]
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    /// Attach labels.
    #[must_use]
    pub fn with_labels(mut self, labels: HashMap<String, String>) -> Self {
        self.labels = labels;
        self
    }
}

/// Body of `POST /networks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNetworkRequest {
    /// Network name.
    pub name: String,
    /// Network driver.
    pub driver: String,
}

impl CreateNetworkRequest {
    /// Request a `bridge` network.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: "bridge".to_string(),
        }
    }

    /// Use a different driver.
    #[must_use]
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }
}

/// Generic `{ "status": ... }` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusResponse {
    /// Status text.
    pub status: String,
}

/// Response of the top-level health endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthResponse {
    /// Health status text.
    pub status: String,
    /// Server version.
    pub version: String,
}

/// A stack's compose definition, in and out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeFile {
    /// Raw compose file content.
    pub content: String,
}

/// Container log tail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerLogs {
    /// Log text.
    pub logs: String,
}
