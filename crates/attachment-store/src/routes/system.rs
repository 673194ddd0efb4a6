use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;

use crate::db::Db;
use crate::gc::{self, GcConfig, GcResult};
use crate::replication::ReplicationManager;

#[rocket::get("/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "attachment-store",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[rocket::get("/stats")]
pub fn stats(db: &State<Arc<Db>>) -> Json<serde_json::Value> {
    let conn = db.conn.lock().unwrap();

    let physical_files: i64 = conn
        .query_row("SELECT COUNT(*) FROM physical_files WHERE deleted = 0", [], |r| r.get(0))
        .unwrap_or(0);
    let total_bytes: i64 = conn
        .query_row("SELECT COALESCE(SUM(size), 0) FROM physical_files WHERE deleted = 0", [], |r| r.get(0))
        .unwrap_or(0);
    let references: i64 = conn
        .query_row("SELECT COUNT(*) FROM references_ WHERE deleted = 0", [], |r| r.get(0))
        .unwrap_or(0);
    let orphans: i64 = conn
        .query_row("SELECT COUNT(*) FROM physical_files WHERE ref_count <= 0 AND deleted = 0", [], |r| r.get(0))
        .unwrap_or(0);
    let pending_scans: i64 = conn
        .query_row("SELECT COUNT(*) FROM physical_files WHERE virus_scan_status = 'pending'", [], |r| r.get(0))
        .unwrap_or(0);
    let infected: i64 = conn
        .query_row("SELECT COUNT(*) FROM physical_files WHERE virus_scan_status = 'infected'", [], |r| r.get(0))
        .unwrap_or(0);

    Json(serde_json::json!({
        "physical_files": physical_files,
        "total_bytes": total_bytes,
        "references": references,
        "orphaned_physical_files": orphans,
        "virus_scan": {
            "pending": pending_scans,
            "infected": infected
        },
        "deduplication_ratio": if physical_files > 0 {
            references as f64 / physical_files as f64
        } else {
            0.0
        }
    }))
}

/// Manually trigger a GC sweep outside its interval. Mirrors the message
/// hub's manual retention trigger.
#[rocket::post("/admin/gc/run")]
pub async fn run_gc_now(
    db: &State<Arc<Db>>,
    replication: &State<Arc<ReplicationManager>>,
    gc_config: &State<GcConfig>,
) -> Json<serde_json::Value> {
    let GcResult { orphans_deleted, presigned_urls_expired, health_rows_pruned } =
        gc::run_gc(&db.conn, replication, gc_config.orphan_retention_days).await;

    Json(serde_json::json!({
        "orphans_deleted": orphans_deleted,
        "presigned_urls_expired": presigned_urls_expired,
        "health_rows_pruned": health_rows_pruned
    }))
}

#[rocket::catch(429)]
pub fn too_many_requests() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "too many requests"}))
}

#[rocket::catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "not found"}))
}
