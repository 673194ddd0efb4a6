use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;

use crate::index::Registry;
use crate::models::InstanceStatus;

/// Health-check cadence and state-machine thresholds. Mirrors the table in
/// the registry's design notes: an instance needs `failures_to_degrade`
/// consecutive failed probes to drop out of `healthy`, and
/// `failures_to_critical` to drop further into `critical`; any single
/// success from `degraded` or `critical` restores `healthy` directly only
/// after `successes_to_recover` consecutive good probes.
pub struct ProberConfig {
    pub interval: Duration,
    pub probe_timeout: Duration,
    pub max_concurrent_probes: usize,
    pub failures_to_degrade: u32,
    pub failures_to_critical: u32,
    pub successes_to_recover: u32,
    /// How long an instance may stay `critical` before it is auto-decommissioned.
    pub critical_timeout: Duration,
    /// How long a `decommissioning` instance drains before it is marked `gone`.
    pub drain_seconds: u64,
}

impl Default for ProberConfig {
    fn default() -> Self {
        ProberConfig {
            interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            max_concurrent_probes: 32,
            failures_to_degrade: 1,
            failures_to_critical: 3,
            successes_to_recover: 2,
            critical_timeout: Duration::from_secs(120),
            drain_seconds: 30,
        }
    }
}

/// Spawns the background prober: every tick, probes all non-terminal
/// instances concurrently (bounded by a semaphore sized to the instance
/// count, capped at `max_concurrent_probes`), and folds each outcome
/// through the health state machine.
pub fn spawn(registry: Arc<Registry>, http: reqwest::Client, config: ProberConfig) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(config.interval).await;
            run_once(&registry, &http, &config).await;
        }
    });
}

async fn run_once(registry: &Arc<Registry>, http: &reqwest::Client, config: &ProberConfig) {
    let instances = registry.all_non_terminal();
    if instances.is_empty() {
        return;
    }
    let permits = instances.len().min(config.max_concurrent_probes).max(1);
    let semaphore = Arc::new(Semaphore::new(permits));

    let mut handles = Vec::with_capacity(instances.len());
    for instance in instances {
        let sem = semaphore.clone();
        let http = http.clone();
        let registry = registry.clone();
        let timeout = config.probe_timeout;
        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await;
            let (ok, latency_ms) = probe(&http, &instance.health_check_url, timeout).await;
            (instance.id, ok, latency_ms)
        }));
    }

    for handle in handles {
        if let Ok((id, ok, latency_ms)) = handle.await {
            apply_outcome(registry, &id, ok, latency_ms, config);
        }
    }
}

async fn probe(http: &reqwest::Client, url: &str, timeout: Duration) -> (bool, f64) {
    let started = std::time::Instant::now();
    let result = tokio::time::timeout(timeout, http.get(url).send()).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    match result {
        Ok(Ok(resp)) => (resp.status().is_success(), elapsed_ms),
        _ => (false, elapsed_ms),
    }
}

fn apply_outcome(registry: &Arc<Registry>, id: &str, ok: bool, latency_ms: f64, config: &ProberConfig) {
    let result = registry.update(id, |instance| {
        let now = Utc::now().to_rfc3339();
        instance.last_seen = now.clone();
        // EMA with alpha 0.3, matching the weighting the discover() tie-break expects.
        instance.latency_ema_ms = if instance.latency_ema_ms == 0.0 {
            latency_ms
        } else {
            0.3 * latency_ms + 0.7 * instance.latency_ema_ms
        };

        if ok {
            instance.consecutive_failures = 0;
            instance.consecutive_successes += 1;
        } else {
            instance.consecutive_successes = 0;
            instance.consecutive_failures += 1;
        }

        instance.status = next_status(
            instance.status,
            instance.consecutive_failures,
            instance.consecutive_successes,
            config,
        );

        match instance.status {
            InstanceStatus::Critical if instance.critical_since.is_none() => {
                instance.critical_since = Some(now.clone());
            }
            InstanceStatus::Decommissioning if instance.decommission_since.is_none() => {
                instance.decommission_since = Some(now.clone());
            }
            InstanceStatus::Healthy => {
                instance.critical_since = None;
            }
            _ => {}
        }

        if let Some(critical_since) = instance.critical_since.as_ref() {
            if instance.status == InstanceStatus::Critical {
                if let Ok(since) = chrono::DateTime::parse_from_rfc3339(critical_since) {
                    let elapsed = Utc::now().signed_duration_since(since.with_timezone(&Utc));
                    if elapsed.to_std().unwrap_or_default() >= config.critical_timeout {
                        instance.status = InstanceStatus::Decommissioning;
                        instance.decommission_since = Some(now);
                    }
                }
            }
        }
    });

    if result.is_err() {
        tracing::warn!(instance_id = %id, "prober: instance vanished mid-probe");
    }
}

/// Health state machine transitions driven purely by consecutive probe
/// outcomes (the registering -> healthy transition, and the age/request-based
/// rotation transitions, are handled by the rotation controller).
fn next_status(
    current: InstanceStatus,
    consecutive_failures: u32,
    consecutive_successes: u32,
    config: &ProberConfig,
) -> InstanceStatus {
    use InstanceStatus::*;
    match current {
        Registering | Healthy => {
            if consecutive_failures >= config.failures_to_critical {
                Critical
            } else if consecutive_failures >= config.failures_to_degrade {
                Degraded
            } else if consecutive_successes >= 1 {
                Healthy
            } else {
                current
            }
        }
        Degraded => {
            if consecutive_failures >= config.failures_to_critical {
                Critical
            } else if consecutive_successes >= config.successes_to_recover {
                Healthy
            } else {
                Degraded
            }
        }
        Critical => {
            if consecutive_successes >= config.successes_to_recover {
                Degraded
            } else {
                Critical
            }
        }
        Decommissioning | Gone => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_becomes_healthy_on_first_success() {
        let config = ProberConfig::default();
        assert_eq!(
            next_status(InstanceStatus::Registering, 0, 1, &config),
            InstanceStatus::Healthy
        );
    }

    #[test]
    fn healthy_degrades_then_goes_critical() {
        let config = ProberConfig::default();
        assert_eq!(
            next_status(InstanceStatus::Healthy, 1, 0, &config),
            InstanceStatus::Degraded
        );
        assert_eq!(
            next_status(InstanceStatus::Healthy, 3, 0, &config),
            InstanceStatus::Critical
        );
    }

    #[test]
    fn degraded_recovers_only_after_enough_consecutive_successes() {
        let config = ProberConfig::default();
        assert_eq!(
            next_status(InstanceStatus::Degraded, 0, 1, &config),
            InstanceStatus::Degraded
        );
        assert_eq!(
            next_status(InstanceStatus::Degraded, 0, 2, &config),
            InstanceStatus::Healthy
        );
    }

    #[test]
    fn critical_recovers_to_degraded_not_directly_healthy() {
        let config = ProberConfig::default();
        assert_eq!(
            next_status(InstanceStatus::Critical, 0, 2, &config),
            InstanceStatus::Degraded
        );
    }

    #[test]
    fn terminal_states_never_transition() {
        let config = ProberConfig::default();
        assert_eq!(
            next_status(InstanceStatus::Decommissioning, 0, 5, &config),
            InstanceStatus::Decommissioning
        );
        assert_eq!(next_status(InstanceStatus::Gone, 0, 5, &config), InstanceStatus::Gone);
    }
}
