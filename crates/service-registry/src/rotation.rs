use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::index::Registry;
use crate::models::InstanceStatus;

/// How often the rotation controller sweeps the instance table for
/// policy-driven rotation and decommission-drain expiry. Default matches
/// the registry's `rotation_check_interval` configuration key.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct RotationConfig {
    pub check_interval: Duration,
    pub drain_seconds: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        RotationConfig {
            check_interval: DEFAULT_CHECK_INTERVAL,
            drain_seconds: 30,
        }
    }
}

/// Spawns the background rotation controller: each tick, instances past
/// `max_age_secs` or `max_requests` (if `supports_rotation`) are moved into
/// `decommissioning`, and any instance that has finished draining is moved
/// to `gone` and evicted from the index.
pub fn spawn(registry: Arc<Registry>, config: RotationConfig) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(config.check_interval).await;
            run_once(&registry, &config);
        }
    });
}

fn run_once(registry: &Arc<Registry>, config: &RotationConfig) {
    let now = Utc::now();
    for instance in registry.all_non_terminal() {
        if instance.status == InstanceStatus::Decommissioning {
            let Some(since) = instance.decommission_since.as_ref() else {
                continue;
            };
            let Ok(since) = chrono::DateTime::parse_from_rfc3339(since) else {
                continue;
            };
            let elapsed = now.signed_duration_since(since.with_timezone(&Utc));
            if elapsed.num_seconds() as u64 >= config.drain_seconds {
                let id = instance.id.clone();
                let _ = registry.update(&id, |i| i.status = InstanceStatus::Gone);
                registry.remove(&id);
                tracing::info!(instance_id = %id, "rotation: drained instance marked gone");
            }
            continue;
        }

        if !instance.supports_rotation {
            continue;
        }
        if instance.status != InstanceStatus::Healthy && instance.status != InstanceStatus::Degraded {
            continue;
        }

        let age_exceeded = instance
            .max_age_secs
            .map(|max| {
                chrono::DateTime::parse_from_rfc3339(&instance.registration_time)
                    .map(|reg| now.signed_duration_since(reg.with_timezone(&Utc)).num_seconds() >= max)
                    .unwrap_or(false)
            })
            .unwrap_or(false);
        let requests_exceeded = instance
            .max_requests
            .map(|max| instance.request_count >= max)
            .unwrap_or(false);

        if age_exceeded || requests_exceeded {
            let id = instance.id.clone();
            let _ = registry.update(&id, |i| {
                i.status = InstanceStatus::Decommissioning;
                i.decommission_since = Some(Utc::now().to_rfc3339());
            });
            tracing::info!(
                instance_id = %id,
                age_exceeded,
                requests_exceeded,
                "rotation: instance eligible for policy-driven rotation, draining"
            );
        }
    }
}
