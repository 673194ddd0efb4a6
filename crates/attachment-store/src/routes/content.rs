use std::sync::Arc;

use platform_core::auth::AuthenticatedUser;
use platform_core::error::AppError;
use rocket::http::ContentType;
use rocket::State;
use rusqlite::params;
use uuid::Uuid;

use crate::db::Db;
use crate::presigned;
use crate::replication::ReplicationManager;

fn log_access(conn: &rusqlite::Connection, reference_id: &str, accessor: &str, action: &str) {
    let id = Uuid::new_v4().to_string();
    let at = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO access_log (id, reference_id, accessor, action, at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, reference_id, accessor, action, at],
    )
    .ok();
}

fn lookup_blob(conn: &rusqlite::Connection, reference_id: &str) -> Result<(String, String), AppError> {
    conn.query_row(
        "SELECT f.primary_path, f.mime_type FROM references_ r JOIN physical_files f ON f.hash = r.file_hash
         WHERE r.id = ?1 AND r.deleted = 0 AND f.deleted = 0",
        params![reference_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .map_err(|_| AppError::NotFound(format!("reference {reference_id} not found")))
}

/// Direct authenticated content fetch, for callers (like the message hub)
/// that already hold a resolved reference id from the metadata endpoint.
#[rocket::get("/attachments/<reference_id>/content")]
pub async fn download_content(
    reference_id: &str,
    user: AuthenticatedUser,
    db: &State<Arc<Db>>,
    replication: &State<Arc<ReplicationManager>>,
) -> Result<(ContentType, Vec<u8>), AppError> {
    let (path, mime_type) = {
        let conn = db.conn.lock().unwrap();
        lookup_blob(&conn, reference_id)?
    };
    let bytes = replication.retrieve(&path).await?;
    let conn = db.conn.lock().unwrap();
    log_access(&conn, reference_id, &user.0.sub, "download");

    let content_type = ContentType::parse_flexible(&mime_type).unwrap_or(ContentType::Binary);
    Ok((content_type, bytes.to_vec()))
}

/// Public, unauthenticated download via a presigned share token. Expiry
/// and download-count enforcement happen inside `presigned::redeem`.
#[rocket::get("/share/<token>")]
pub async fn download_shared(
    token: &str,
    db: &State<Arc<Db>>,
    replication: &State<Arc<ReplicationManager>>,
) -> Result<(ContentType, Vec<u8>), AppError> {
    let (reference_id, path, mime_type) = {
        let conn = db.conn.lock().unwrap();
        let reference_id = presigned::redeem(&conn, token)?;
        let (path, mime_type) = lookup_blob(&conn, &reference_id)?;
        (reference_id, path, mime_type)
    };
    let bytes = replication.retrieve(&path).await?;
    let conn = db.conn.lock().unwrap();
    log_access(&conn, &reference_id, "presigned-share", "download");

    let content_type = ContentType::parse_flexible(&mime_type).unwrap_or(ContentType::Binary);
    Ok((content_type, bytes.to_vec()))
}
