use std::sync::Arc;

use platform_core::error::AppError;
use rocket::serde::json::Json;
use rocket::{post, State};

use crate::index::Registry;
use crate::models::{RegisterBody, RegisterResponse};

#[post("/services/register", data = "<body>")]
pub fn register(
    registry: &State<Arc<Registry>>,
    body: Json<RegisterBody>,
) -> Result<Json<RegisterResponse>, AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    if body.address.trim().is_empty() {
        return Err(AppError::Validation("address must not be empty".to_string()));
    }
    if body.port.is_none() && body.port_range.is_none() {
        return Err(AppError::MissingField("port or port_range".to_string()));
    }
    if body.health_url.trim().is_empty() {
        return Err(AppError::MissingField("health_url".to_string()));
    }

    let instance = registry.register(body.into_inner())?;
    Ok(Json(RegisterResponse {
        id: instance.id,
        port: instance.port,
    }))
}
