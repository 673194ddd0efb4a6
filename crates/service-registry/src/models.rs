use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Registering,
    Healthy,
    Degraded,
    Critical,
    Decommissioning,
    Gone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tags: HashSet<String>,
    pub supports_rotation: bool,
    pub metadata: HashMap<String, String>,
    pub health_check_url: String,
    pub registration_time: String,
    pub last_seen: String,
    pub status: InstanceStatus,
    /// Rotation policy inputs, resolved at registration time (Open Question
    /// in spec.md, decided in DESIGN.md): an instance past either threshold
    /// is eligible for policy-driven rotation.
    pub max_age_secs: Option<i64>,
    pub max_requests: Option<i64>,
    pub request_count: i64,
    /// Consecutive probe outcomes, used by the health state machine.
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// When the instance entered `critical`, for the `deregister_after` timeout.
    pub critical_since: Option<String>,
    /// When the instance entered `decommissioning`, for the `drain_seconds` timeout.
    pub decommission_since: Option<String>,
    /// Exponential moving average of probe latency, used to break discover() ties.
    pub latency_ema_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub instance_id: String,
    pub status: InstanceStatus,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub latency_ema_ms: f64,
    pub last_seen: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub name: String,
    pub address: String,
    /// Concrete port, if the caller already bound one.
    #[serde(default)]
    pub port: Option<u16>,
    /// Requested port range; the registry reserves the lowest free port in
    /// range when `port` is not given.
    #[serde(default)]
    pub port_range: Option<(u16, u16)>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub health_url: String,
    #[serde(default)]
    pub supports_rotation: bool,
    #[serde(default)]
    pub max_age_secs: Option<i64>,
    #[serde(default)]
    pub max_requests: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: String,
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct DiscoverEntry {
    pub id: String,
    pub address: String,
    pub port: u16,
    pub health: InstanceStatus,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct RotateResponse {
    pub old_instance_id: String,
    pub status: InstanceStatus,
    pub drain_seconds: u64,
}
