use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::{get, State};

use crate::index::Registry;
use crate::models::InstanceStatus;

#[get("/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "service-registry",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[get("/stats")]
pub fn stats(registry: &State<Arc<Registry>>) -> Json<serde_json::Value> {
    let instances = registry.all_non_terminal();
    let count = |status: InstanceStatus| instances.iter().filter(|i| i.status == status).count();

    Json(serde_json::json!({
        "total": instances.len(),
        "by_status": {
            "registering": count(InstanceStatus::Registering),
            "healthy": count(InstanceStatus::Healthy),
            "degraded": count(InstanceStatus::Degraded),
            "critical": count(InstanceStatus::Critical),
            "decommissioning": count(InstanceStatus::Decommissioning),
        },
        "names": instances.iter().map(|i| i.name.clone()).collect::<std::collections::HashSet<_>>(),
    }))
}

#[rocket::catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "not found"}))
}
