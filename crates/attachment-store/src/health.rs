use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::params;

use crate::db::Db;
use crate::models::HealthStatus;
use crate::replication::ReplicationManager;

/// Tracks consecutive probe outcomes per endpoint so a flaky endpoint needs
/// `recover_window` consecutive successes before it's trusted again, not
/// just one lucky ping.
#[derive(Default)]
struct EndpointState {
    consecutive_successes: u32,
    consecutive_failures: u32,
}

pub struct HealthMonitorConfig {
    pub probe_interval: Duration,
    pub recover_window: u32,
    pub degrade_after_failures: u32,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        HealthMonitorConfig {
            probe_interval: Duration::from_secs(30),
            recover_window: 3,
            degrade_after_failures: 2,
        }
    }
}

/// Spawns a background task that pings every replication endpoint on an
/// interval, records a `storage_health` row per check, and tracks
/// consecutive outcomes for the recover-window decision. The breaker
/// registry already short-circuits calls to endpoints it considers open;
/// this task is what keeps that state fresh by probing even when nothing
/// is being uploaded.
pub fn spawn_health_monitor(replication: Arc<ReplicationManager>, db: Arc<Db>, config: HealthMonitorConfig) {
    tokio::spawn(async move {
        let mut states: HashMap<String, EndpointState> = HashMap::new();

        loop {
            tokio::time::sleep(config.probe_interval).await;

            for endpoint in replication.endpoints() {
                let start = std::time::Instant::now();
                let result = endpoint.adapter.ping().await;
                let latency_ms = start.elapsed().as_millis() as i64;
                let state = states.entry(endpoint.id.clone()).or_default();

                let status = match result {
                    Ok(()) => {
                        state.consecutive_successes += 1;
                        state.consecutive_failures = 0;
                        if state.consecutive_successes >= config.recover_window {
                            HealthStatus::Healthy
                        } else {
                            HealthStatus::Degraded
                        }
                    }
                    Err(ref e) => {
                        state.consecutive_failures += 1;
                        state.consecutive_successes = 0;
                        tracing::warn!(endpoint = %endpoint.id, error = %e, "health probe failed");
                        if state.consecutive_failures >= config.degrade_after_failures {
                            HealthStatus::Unhealthy
                        } else {
                            HealthStatus::Degraded
                        }
                    }
                };

                let available_bytes = endpoint
                    .adapter
                    .capacity()
                    .await
                    .ok()
                    .map(|c| c.available.min(i64::MAX as u64) as i64);

                let conn = db.conn.lock().unwrap_or_else(|e| e.into_inner());
                let check_time = chrono::Utc::now().to_rfc3339();
                conn.execute(
                    "INSERT INTO storage_health (endpoint_id, check_time, status, latency_ms, available_bytes)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![endpoint.id, check_time, status.as_str(), latency_ms, available_bytes],
                )
                .ok();
            }
        }
    });
}
