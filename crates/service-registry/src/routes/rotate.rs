use std::sync::Arc;

use chrono::Utc;
use platform_core::error::AppError;
use rocket::serde::json::Json;
use rocket::{post, State};

use crate::index::Registry;
use crate::models::{InstanceStatus, RotateResponse};
use crate::rotation::RotationConfig;

/// Operator-triggered early rotation: moves a healthy/degraded instance
/// straight into `decommissioning` ahead of its age/request-count policy.
#[post("/services/<id>/rotate")]
pub fn rotate(
    registry: &State<Arc<Registry>>,
    config: &State<RotationConfig>,
    id: &str,
) -> Result<Json<RotateResponse>, AppError> {
    let instance = registry.update(id, |i| {
        i.status = InstanceStatus::Decommissioning;
        i.decommission_since = Some(Utc::now().to_rfc3339());
    })?;
    Ok(Json(RotateResponse {
        old_instance_id: instance.id,
        status: instance.status,
        drain_seconds: config.drain_seconds,
    }))
}

/// Immediate decommission: skips the drain window, instance is evicted now.
#[post("/services/<id>/decommission")]
pub fn decommission(registry: &State<Arc<Registry>>, id: &str) -> Result<(), AppError> {
    registry.update(id, |i| i.status = InstanceStatus::Gone)?;
    registry.remove(id);
    Ok(())
}

/// Instances report liveness and call volume here, used by the rotation
/// controller to evaluate `max_requests` and by the prober as a
/// last-resort freshness signal between probe ticks.
#[post("/services/<id>/heartbeat")]
pub fn heartbeat(registry: &State<Arc<Registry>>, id: &str) -> Result<(), AppError> {
    registry.update(id, |i| {
        i.request_count += 1;
        i.last_seen = Utc::now().to_rfc3339();
    })?;
    Ok(())
}
