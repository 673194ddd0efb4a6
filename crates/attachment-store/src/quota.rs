use platform_core::error::AppError;
use rusqlite::{params, Connection};

use crate::db::default_quota_for;
use crate::models::Quota;

/// Default quota for a user with no row yet: 5 GiB, 10,000 files.
const DEFAULT_MAX_BYTES: i64 = 5 * 1024 * 1024 * 1024;
const DEFAULT_MAX_FILES: i64 = 10_000;

pub fn get_or_create(conn: &Connection, user_id: &str) -> rusqlite::Result<Quota> {
    default_quota_for(conn, user_id, DEFAULT_MAX_BYTES, DEFAULT_MAX_FILES)?;
    conn.query_row(
        "SELECT user_id, max_bytes, used_bytes, max_files, used_files FROM quotas WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(Quota {
                user_id: row.get(0)?,
                max_bytes: row.get(1)?,
                used_bytes: row.get(2)?,
                max_files: row.get(3)?,
                used_files: row.get(4)?,
            })
        },
    )
}

/// Whether `user_id` already holds a live (non-deleted) reference to
/// `hash`. Quota is charged per distinct (user, hash) pair, not per
/// reference — a user who re-attaches content they already uploaded
/// elsewhere shouldn't be billed for it twice.
pub fn has_live_reference(conn: &Connection, user_id: &str, hash: &str) -> Result<bool, AppError> {
    conn.query_row(
        "SELECT COUNT(*) FROM references_ WHERE file_hash = ?1 AND uploader_id = ?2 AND deleted = 0",
        params![hash, user_id],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
    .map_err(|e| AppError::Database(e.to_string()))
}

/// Checks that charging `additional_bytes`/`additional_files` to `user_id`
/// stays within quota. Must be called inside the same transaction as the
/// `Reference` insert it's guarding, so a concurrent upload can't both pass
/// the check before either commits.
pub fn check_and_reserve(
    conn: &Connection,
    user_id: &str,
    additional_bytes: i64,
    additional_files: i64,
) -> Result<(), AppError> {
    let quota = get_or_create(conn, user_id).map_err(|e| AppError::Database(e.to_string()))?;

    if quota.used_bytes + additional_bytes > quota.max_bytes {
        return Err(AppError::QuotaExceeded(format!(
            "upload would exceed byte quota ({} + {} > {})",
            quota.used_bytes, additional_bytes, quota.max_bytes
        )));
    }
    if quota.used_files + additional_files > quota.max_files {
        return Err(AppError::QuotaExceeded(format!(
            "upload would exceed file quota ({} + {} > {})",
            quota.used_files, additional_files, quota.max_files
        )));
    }

    conn.execute(
        "UPDATE quotas SET used_bytes = used_bytes + ?1, used_files = used_files + ?2 WHERE user_id = ?3",
        params![additional_bytes, additional_files, user_id],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

/// Releases quota reserved for a (user, hash) pair. Callers must first
/// confirm the user holds no other live reference to that hash — quota is
/// billed once per distinct pair, so releasing on every reference delete
/// would double-free when the same user holds more than one reference to
/// identical content.
pub fn release(conn: &Connection, user_id: &str, bytes: i64, files: i64) -> Result<(), AppError> {
    conn.execute(
        "UPDATE quotas SET used_bytes = MAX(0, used_bytes - ?1), used_files = MAX(0, used_files - ?2) WHERE user_id = ?3",
        params![bytes, files, user_id],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}
