//! Resource metrics pushed over the stream (and readable over REST).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnNull, serde_as};

/// Whole-host metrics snapshot (`stats` message).
///
/// `Default` is the zero snapshot shown before the first stream message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemStats {
    /// CPU usage, percent.
    pub cpu_usage: f64,
    /// Logical CPU count.
    pub cpu_cores: u32,
    /// Memory used, bytes.
    pub memory_used: u64,
    /// Memory total, bytes.
    pub memory_total: u64,
    /// Memory used, percent.
    pub memory_percent: f64,
    /// Disk used, bytes.
    pub disk_used: u64,
    /// Disk total, bytes.
    pub disk_total: u64,
    /// Disk used, percent.
    pub disk_percent: f64,
    /// Host uptime, seconds.
    pub uptime: u64,
    /// Host name.
    pub hostname: String,
    /// Operating system.
    pub os: String,
    /// Platform / distribution.
    pub platform: String,
}

/// Resource usage of one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerStats {
    /// CPU usage, percent.
    pub cpu_percent: f64,
    /// Memory used, bytes.
    pub memory_usage: u64,
    /// Memory limit, bytes.
    pub memory_limit: u64,
    /// Memory used, percent of limit.
    pub memory_percent: f64,
    /// Bytes received.
    pub network_rx: u64,
    /// Bytes sent.
    pub network_tx: u64,
    /// Bytes read from block devices.
    pub block_read: u64,
    /// Bytes written to block devices.
    pub block_write: u64,
}

/// Per-container metrics map (`container_stats` message).
///
/// Each message is a complete snapshot: ids missing here are no longer
/// reporting.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerStatsPayload {
    /// Metrics keyed by container id.
    #[serde_as(as = "DefaultOnNull")]
    pub containers: HashMap<String, ContainerStats>,
    /// Server-side sample time, unix seconds.
    pub timestamp: i64,
}
