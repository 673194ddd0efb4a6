use std::sync::Arc;

use platform_core::auth::AuthenticatedUser;
use platform_core::error::AppError;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::params;

use crate::db::Db;
use crate::models::{ReferenceMetadata, VirusScanStatus};

fn row_to_metadata(row: &rusqlite::Row) -> rusqlite::Result<ReferenceMetadata> {
    let tags_json: String = row.get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    let scan_status: String = row.get("virus_scan_status")?;
    Ok(ReferenceMetadata {
        reference_id: row.get("id")?,
        hash: row.get("file_hash")?,
        entity_type: row.get("entity_type")?,
        entity_id: row.get("entity_id")?,
        filename: row.get("filename")?,
        description: row.get("description")?,
        uploader_id: row.get("uploader_id")?,
        version: row.get("version")?,
        tags,
        size: row.get("size")?,
        mime_type: row.get("mime_type")?,
        virus_scan_status: VirusScanStatus::parse(&scan_status),
        created_at: row.get("r_created_at")?,
    })
}

const METADATA_QUERY: &str = "SELECT r.id AS id, r.file_hash AS file_hash, r.entity_type AS entity_type,
           r.entity_id AS entity_id, r.filename AS filename, r.description AS description,
           r.uploader_id AS uploader_id, r.version AS version, r.tags AS tags,
           r.created_at AS r_created_at, f.size AS size, f.mime_type AS mime_type,
           f.virus_scan_status AS virus_scan_status
    FROM references_ r JOIN physical_files f ON f.hash = r.file_hash
    WHERE r.id = ?1 AND r.deleted = 0";

/// Metadata lookup for one reference. This is also the endpoint the
/// message hub's attachment client calls to resolve a reference before
/// attaching it to a message (its `content_type` field is the renamed
/// wire alias of `mime_type` so the two crates agree on shape without
/// sharing a DTO crate).
#[rocket::get("/attachments/<reference_id>")]
pub fn get_reference(
    reference_id: &str,
    db: &State<Arc<Db>>,
    _user: AuthenticatedUser,
) -> Result<Json<ReferenceMetadata>, AppError> {
    let conn = db.conn.lock().unwrap();
    conn.query_row(METADATA_QUERY, params![reference_id], row_to_metadata)
        .map(Json)
        .map_err(|_| AppError::NotFound(format!("reference {reference_id} not found")))
}

#[rocket::get("/entities/<entity_type>/<entity_id>/attachments")]
pub fn list_references(
    entity_type: &str,
    entity_id: &str,
    db: &State<Arc<Db>>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<ReferenceMetadata>>, AppError> {
    let conn = db.conn.lock().unwrap();
    let mut stmt = conn
        .prepare(
            "SELECT r.id AS id, r.file_hash AS file_hash, r.entity_type AS entity_type,
                    r.entity_id AS entity_id, r.filename AS filename, r.description AS description,
                    r.uploader_id AS uploader_id, r.version AS version, r.tags AS tags,
                    r.created_at AS r_created_at, f.size AS size, f.mime_type AS mime_type,
                    f.virus_scan_status AS virus_scan_status
             FROM references_ r JOIN physical_files f ON f.hash = r.file_hash
             WHERE r.entity_type = ?1 AND r.entity_id = ?2 AND r.deleted = 0
             ORDER BY r.created_at DESC",
        )
        .map_err(|e| AppError::Database(e.to_string()))?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], row_to_metadata)
        .map_err(|e| AppError::Database(e.to_string()))?
        .filter_map(|r| r.ok())
        .collect();

    Ok(Json(rows))
}
