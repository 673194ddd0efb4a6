use chrono::{Duration as ChronoDuration, Utc};
use platform_core::error::AppError;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::models::PresignedUrl;

/// Mints a presigned download token for `reference_id`, valid for
/// `expires_in_secs` and usable up to `max_downloads` times.
pub fn mint(
    conn: &Connection,
    reference_id: &str,
    expires_in_secs: i64,
    max_downloads: i64,
) -> Result<PresignedUrl, AppError> {
    let token = Uuid::new_v4().to_string();
    let expires_at = (Utc::now() + ChronoDuration::seconds(expires_in_secs.max(1))).to_rfc3339();

    conn.execute(
        "INSERT INTO presigned_urls (token, reference_id, expires_at, max_downloads, download_count)
         VALUES (?1, ?2, ?3, ?4, 0)",
        params![token, reference_id, expires_at, max_downloads],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(PresignedUrl {
        token,
        reference_id: reference_id.to_string(),
        expires_at,
        max_downloads,
        download_count: 0,
    })
}

/// Validates and consumes one download against `token`, returning the
/// reference id it points at. Enforces expiry and the download-count cap
/// in the same statement that increments the counter, so two concurrent
/// downloads against the last remaining slot can't both succeed.
pub fn redeem(conn: &Connection, token: &str) -> Result<String, AppError> {
    let row = conn
        .query_row(
            "SELECT reference_id, expires_at, max_downloads, download_count FROM presigned_urls WHERE token = ?1",
            params![token],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, i64>(3)?,
                ))
            },
        )
        .map_err(|_| AppError::NotFound("presigned url not found".to_string()))?;

    let (reference_id, expires_at, max_downloads, download_count) = row;

    let expires_at = chrono::DateTime::parse_from_rfc3339(&expires_at)
        .map_err(|e| AppError::Internal(format!("corrupt presigned url expiry: {e}")))?;
    if Utc::now() > expires_at {
        return Err(AppError::Forbidden("presigned url has expired".to_string()));
    }
    if download_count >= max_downloads {
        return Err(AppError::Forbidden("presigned url download limit reached".to_string()));
    }

    let updated = conn
        .execute(
            "UPDATE presigned_urls SET download_count = download_count + 1
             WHERE token = ?1 AND download_count < max_downloads",
            params![token],
        )
        .map_err(|e| AppError::Database(e.to_string()))?;

    if updated == 0 {
        return Err(AppError::Forbidden("presigned url download limit reached".to_string()));
    }

    Ok(reference_id)
}
