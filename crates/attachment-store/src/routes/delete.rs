use std::sync::Arc;

use platform_core::auth::AuthenticatedUser;
use platform_core::error::AppError;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::params;

use crate::db::Db;
use crate::quota;

use super::require_uploader;

/// Soft-deletes a reference and releases the quota it was charged. The
/// backing `physical_files` row is left alone — its `ref_count` still
/// reflects every *other* live reference, and GC reclaims it once
/// `ref_count` reaches zero and the orphan retention window passes.
#[rocket::delete("/attachments/<reference_id>")]
pub fn delete_reference(
    reference_id: &str,
    user: AuthenticatedUser,
    db: &State<Arc<Db>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut conn = db.conn.lock().unwrap();
    require_uploader(&conn, reference_id, &user.0.sub)?;

    let tx = conn.transaction().map_err(|e| AppError::Database(e.to_string()))?;

    let (file_hash, size): (String, i64) = tx
        .query_row(
            "SELECT r.file_hash, f.size FROM references_ r JOIN physical_files f ON f.hash = r.file_hash
             WHERE r.id = ?1 AND r.deleted = 0",
            params![reference_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|_| AppError::NotFound(format!("reference {reference_id} not found")))?;

    let now = chrono::Utc::now().to_rfc3339();
    tx.execute(
        "UPDATE references_ SET deleted = 1, deleted_at = ?1 WHERE id = ?2",
        params![now, reference_id],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;

    tx.execute(
        "UPDATE physical_files SET ref_count = MAX(0, ref_count - 1) WHERE hash = ?1",
        params![file_hash],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;

    if !quota::has_live_reference(&tx, &user.0.sub, &file_hash)? {
        quota::release(&tx, &user.0.sub, size, 1)?;
    }

    tx.commit().map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(serde_json::json!({"deleted": true})))
}
