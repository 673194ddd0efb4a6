use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::Db;
use crate::replication::ReplicationManager;

/// How often the GC sweep runs.
const GC_INTERVAL_SECS: u64 = 300;
/// Health rows older than this are pruned regardless of endpoint.
const HEALTH_RETENTION_DAYS: i64 = 7;

pub struct GcResult {
    pub orphans_deleted: i64,
    pub presigned_urls_expired: i64,
    pub health_rows_pruned: i64,
}

#[derive(Clone, Copy)]
pub struct GcConfig {
    pub orphan_retention_days: i64,
}

impl GcConfig {
    pub fn from_env(prefix: &str) -> Self {
        let days = std::env::var(format!("{prefix}_ORPHAN_RETENTION_DAYS"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7);
        GcConfig { orphan_retention_days: days }
    }
}

/// Spawns a background task that periodically reclaims storage for
/// physical files with no live references, once they've sat orphaned for
/// `orphan_retention_days` (a grace window so an in-flight reference
/// delete/create race doesn't free bytes a new reference is about to
/// point at again). Mirrors the message hub's retention sweeper: managed
/// connection, initial delay, then a fixed interval loop.
pub fn spawn_gc_task(db: Arc<Db>, replication: Arc<ReplicationManager>, orphan_retention_days: i64) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;

        loop {
            let result = run_gc(&db.conn, &replication, orphan_retention_days).await;
            if result.orphans_deleted > 0 || result.presigned_urls_expired > 0 {
                tracing::info!(
                    orphans_deleted = result.orphans_deleted,
                    presigned_urls_expired = result.presigned_urls_expired,
                    health_rows_pruned = result.health_rows_pruned,
                    "attachment gc sweep complete"
                );
            }
            tokio::time::sleep(Duration::from_secs(GC_INTERVAL_SECS)).await;
        }
    });
}

pub async fn run_gc(conn: &Mutex<Connection>, replication: &ReplicationManager, orphan_retention_days: i64) -> GcResult {
    let job_id = Uuid::new_v4().to_string();
    let started_at = Utc::now().to_rfc3339();

    let orphans: Vec<(String, String, Option<String>, Option<String>)> = {
        let db = conn.lock().unwrap_or_else(|e| e.into_inner());
        let cutoff = (Utc::now() - chrono::Duration::days(orphan_retention_days)).to_rfc3339();
        let mut stmt = match db.prepare(
            "SELECT hash, primary_path, backup_path, mirror_path FROM physical_files
             WHERE ref_count <= 0 AND deleted = 0 AND last_accessed < ?1",
        ) {
            Ok(s) => s,
            Err(_) => return GcResult { orphans_deleted: 0, presigned_urls_expired: 0, health_rows_pruned: 0 },
        };
        match stmt.query_map(params![cutoff], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        }) {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        }
    };

    let mut orphans_deleted = 0i64;
    for (hash, primary_path, _backup_path, _mirror_path) in &orphans {
        if let Err(e) = replication.delete_everywhere(primary_path).await {
            tracing::warn!(hash = %hash, error = %e, "gc: failed to delete orphan bytes, will retry next sweep");
            continue;
        }
        let db = conn.lock().unwrap_or_else(|e| e.into_inner());
        if db
            .execute("UPDATE physical_files SET deleted = 1 WHERE hash = ?1", params![hash])
            .is_ok()
        {
            orphans_deleted += 1;
        }
    }

    let (presigned_urls_expired, health_rows_pruned) = {
        let db = conn.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now().to_rfc3339();
        let expired = db
            .execute("DELETE FROM presigned_urls WHERE expires_at < ?1", params![now])
            .unwrap_or(0) as i64;

        let health_cutoff = (Utc::now() - chrono::Duration::days(HEALTH_RETENTION_DAYS)).to_rfc3339();
        let pruned = db
            .execute("DELETE FROM storage_health WHERE check_time < ?1", params![health_cutoff])
            .unwrap_or(0) as i64;

        (expired, pruned)
    };

    let finished_at = Utc::now().to_rfc3339();
    {
        let db = conn.lock().unwrap_or_else(|e| e.into_inner());
        db.execute(
            "INSERT INTO cleanup_jobs (id, started_at, finished_at, orphans_deleted, presigned_urls_expired, health_rows_pruned, items_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![job_id, started_at, finished_at, orphans_deleted, presigned_urls_expired, health_rows_pruned, orphans_deleted],
        )
        .ok();
    }

    GcResult { orphans_deleted, presigned_urls_expired, health_rows_pruned }
}
