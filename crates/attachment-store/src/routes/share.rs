use std::sync::Arc;

use platform_core::auth::AuthenticatedUser;
use platform_core::error::AppError;
use rocket::serde::json::Json;
use rocket::State;

use crate::db::Db;
use crate::models::{CreateShareRequest, ShareResponse};
use crate::presigned;

use super::require_uploader;

/// Mints a presigned, token-authenticated download URL for a reference.
/// Only the uploader may mint a share link for their own reference.
#[rocket::post("/attachments/<reference_id>/share", format = "json", data = "<body>")]
pub fn create_share(
    reference_id: &str,
    body: Json<CreateShareRequest>,
    user: AuthenticatedUser,
    db: &State<Arc<Db>>,
) -> Result<Json<ShareResponse>, AppError> {
    let conn = db.conn.lock().unwrap();
    require_uploader(&conn, reference_id, &user.0.sub)?;

    let url = presigned::mint(&conn, reference_id, body.expires_in_secs, body.max_downloads)?;

    Ok(Json(ShareResponse {
        token: url.token.clone(),
        url: format!("/share/{}", url.token),
        expires_at: url.expires_at,
        max_downloads: url.max_downloads,
    }))
}
