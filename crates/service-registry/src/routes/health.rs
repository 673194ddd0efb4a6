use std::sync::Arc;

use platform_core::error::AppError;
use rocket::serde::json::Json;
use rocket::{get, post, State};

use crate::index::Registry;
use crate::models::HealthReport;

#[get("/services/<id>/health")]
pub fn instance_health(registry: &State<Arc<Registry>>, id: &str) -> Result<Json<HealthReport>, AppError> {
    let instance = registry
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("instance {id} not found")))?;
    Ok(Json(HealthReport {
        instance_id: instance.id,
        status: instance.status,
        consecutive_failures: instance.consecutive_failures,
        consecutive_successes: instance.consecutive_successes,
        latency_ema_ms: instance.latency_ema_ms,
        last_seen: instance.last_seen,
    }))
}

/// Out-of-band health push from an instance that cannot be reached by the
/// prober (e.g. behind NAT). Folds the same consecutive-success/failure
/// counters the prober uses, so the two paths converge on one state.
#[post("/services/<id>/health", data = "<ok>")]
pub fn report_health(
    registry: &State<Arc<Registry>>,
    id: &str,
    ok: Json<bool>,
) -> Result<Json<HealthReport>, AppError> {
    let ok = ok.into_inner();
    let instance = registry.update(id, |i| {
        if ok {
            i.consecutive_failures = 0;
            i.consecutive_successes += 1;
        } else {
            i.consecutive_successes = 0;
            i.consecutive_failures += 1;
        }
        i.last_seen = chrono::Utc::now().to_rfc3339();
    })?;
    Ok(Json(HealthReport {
        instance_id: instance.id,
        status: instance.status,
        consecutive_failures: instance.consecutive_failures,
        consecutive_successes: instance.consecutive_successes,
        latency_ema_ms: instance.latency_ema_ms,
        last_seen: instance.last_seen,
    }))
}
