use std::sync::Arc;

use bytes::Bytes;
use platform_core::auth::AuthenticatedUser;
use platform_core::config::SecurityConfig;
use platform_core::error::AppError;
use rocket::form::{Form, FromForm};
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::params;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::db::Db;
use crate::models::UploadResponse;
use crate::quota;
use crate::replication::ReplicationManager;
use crate::virus_scan::VirusScanner;

const HASH_CHUNK_SIZE: usize = 64 * 1024;

#[derive(FromForm)]
pub struct UploadForm<'f> {
    pub entity_type: String,
    pub entity_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub file: TempFile<'f>,
}

/// Streams `file` through SHA-256 in fixed-size chunks instead of reading it
/// into one growing buffer, so digest computation holds O(1) memory
/// regardless of upload size. `TempFile::open` works whether Rocket parked
/// the upload on disk or kept it buffered in memory, so this doesn't need to
/// know which. Bails out as soon as the running total crosses `max_size`
/// rather than finishing the read first.
async fn hash_file_incrementally(file: &TempFile<'_>, max_size: u64) -> Result<(String, i64), AppError> {
    let mut reader = file.open().await.map_err(|e| AppError::Internal(e.to_string()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    let mut total: u64 = 0;
    loop {
        let n = reader.read(&mut buf).await.map_err(|e| AppError::Internal(e.to_string()))?;
        if n == 0 {
            break;
        }
        total += n as u64;
        if total > max_size {
            return Err(AppError::AttachmentTooLarge(format!("exceeds the {max_size} byte limit")));
        }
        hasher.update(&buf[..n]);
    }
    Ok((hex::encode(hasher.finalize()), total as i64))
}

/// Reads `file` fully into memory. Only called on a dedup miss, after the
/// digest has already been computed incrementally — the storage and
/// replication layers take owned bytes, so this is where the one
/// O(file_size) buffer genuinely has to exist.
async fn read_file_fully(file: &TempFile<'_>) -> Result<Bytes, AppError> {
    let mut reader = file.open().await.map_err(|e| AppError::Internal(e.to_string()))?;
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await.map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Ingests a new attachment via multipart upload. The file is streamed to
/// disk by Rocket's `TempFile` and hashed incrementally; only on a dedup
/// miss is it read back into memory once, to hand to the storage and
/// replication layers, which take owned `Bytes`. The write to the primary
/// storage endpoint and the virus scan happen outside any database lock;
/// only the quota check and the `physical_files`/`references_` bookkeeping
/// are transactional. If the DB half fails after a successful dedup-miss
/// storage write, the orphaned bytes are reclaimed by the next GC sweep
/// rather than rolled back inline — storage backends have no transaction of
/// their own to join.
#[rocket::post("/attachments", data = "<form>")]
pub async fn upload_reference(
    user: AuthenticatedUser,
    form: Form<UploadForm<'_>>,
    db: &State<Arc<Db>>,
    replication: &State<Arc<ReplicationManager>>,
    scanner: &State<Arc<dyn VirusScanner>>,
    security: &State<SecurityConfig>,
) -> Result<Json<UploadResponse>, AppError> {
    let form = form.into_inner();
    let uploader_id = user.0.sub.clone();
    let filename = form.filename.trim().to_string();
    if filename.is_empty() || filename.len() > 255 {
        return Err(AppError::Validation("filename must be 1-255 characters".to_string()));
    }
    if form.entity_type.trim().is_empty() || form.entity_id.trim().is_empty() {
        return Err(AppError::Validation("entity_type and entity_id are required".to_string()));
    }

    let (hash, size) = hash_file_incrementally(&form.file, security.max_attachment_size).await?;
    if size == 0 {
        return Err(AppError::Validation("file data must not be empty".to_string()));
    }

    let content_type = form.content_type.clone().unwrap_or_else(|| "application/octet-stream".to_string());
    let extension = filename.rsplit_once('.').map(|(_, ext)| ext.to_string());

    let existing_path: Option<String> = {
        let conn = db.conn.lock().unwrap();
        conn.query_row(
            "SELECT primary_path FROM physical_files WHERE hash = ?1 AND deleted = 0",
            params![hash],
            |r| r.get(0),
        )
        .ok()
    };

    let deduplicated = existing_path.is_some();

    // Only materialized in memory on a dedup miss, once, after the hash has
    // already been computed incrementally above.
    let body: Option<Bytes> = if deduplicated { None } else { Some(read_file_fully(&form.file).await?) };

    let primary_path = match existing_path {
        Some(path) => path,
        None => {
            let bytes = body.clone().expect("dedup miss always materializes bytes");
            let (_endpoint_id, path) = replication.store_primary(&hash, bytes).await?;
            path
        }
    };

    let reference_id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let tags_json = serde_json::to_string(&form.tags).unwrap_or_else(|_| "[]".to_string());

    {
        let mut conn = db.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| AppError::Database(e.to_string()))?;

        if !quota::has_live_reference(&tx, &uploader_id, &hash)? {
            quota::check_and_reserve(&tx, &uploader_id, size, 1)?;
        }

        if deduplicated {
            tx.execute(
                "UPDATE physical_files SET ref_count = ref_count + 1, last_accessed = ?1 WHERE hash = ?2",
                params![now, hash],
            )
            .map_err(|e| AppError::Database(e.to_string()))?;
        } else {
            tx.execute(
                "INSERT INTO physical_files (hash, size, mime_type, extension, ref_count, primary_path, virus_scan_status, created_at, last_accessed, deleted)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5, 'pending', ?6, ?6, 0)",
                params![hash, size, content_type, extension, primary_path, now],
            )
            .map_err(|e| AppError::Database(e.to_string()))?;
        }

        tx.execute(
            "INSERT INTO references_ (id, file_hash, entity_type, entity_id, filename, description, uploader_id, version, tags, created_at, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9, 0)",
            params![reference_id, hash, form.entity_type, form.entity_id, filename, form.description, uploader_id, tags_json, now],
        )
        .map_err(|e| AppError::Database(e.to_string()))?;

        tx.commit().map_err(|e| AppError::Database(e.to_string()))?;
    }

    if !deduplicated {
        let bytes = body.expect("dedup miss always materializes bytes");
        replication.spawn_replication(hash.clone(), bytes.clone());
        spawn_virus_scan(db.inner().clone(), scanner.inner().clone(), hash.clone(), bytes.to_vec());
    }

    Ok(Json(UploadResponse { reference_id, hash, size, mime_type: content_type, deduplicated }))
}

fn spawn_virus_scan(db: Arc<Db>, scanner: Arc<dyn VirusScanner>, hash: String, bytes: Vec<u8>) {
    tokio::spawn(async move {
        let status = scanner.scan(&hash, &bytes).await;
        let conn = db.conn.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = conn.execute(
            "UPDATE physical_files SET virus_scan_status = ?1 WHERE hash = ?2",
            params![status.as_str(), hash],
        ) {
            tracing::warn!(hash = %hash, error = %e, "failed to record virus scan result");
        }
        if status == crate::models::VirusScanStatus::Infected {
            tracing::error!(hash = %hash, scanner = scanner.name(), "uploaded file flagged as infected");
        }
    });
}
