use rocket::serde::json::Json;
use rocket::State;

use crate::db::Db;
use crate::retention;

#[rocket::get("/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "message-hub",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[rocket::get("/stats")]
pub fn stats(db: &State<Db>) -> Json<serde_json::Value> {
    let conn = db.conn.lock().unwrap();

    let room_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM rooms WHERE deleted_at IS NULL", [], |r| r.get(0))
        .unwrap_or(0);
    let archived_rooms: i64 = conn
        .query_row("SELECT COUNT(*) FROM rooms WHERE is_archived = 1 AND deleted_at IS NULL", [], |r| r.get(0))
        .unwrap_or(0);
    let message_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM messages WHERE deleted_at IS NULL", [], |r| r.get(0))
        .unwrap_or(0);
    let active_senders: i64 = conn
        .query_row(
            "SELECT COUNT(DISTINCT sender) FROM messages WHERE created_at > datetime('now', '-1 hour')",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);
    let agent_messages: i64 = conn
        .query_row("SELECT COUNT(*) FROM messages WHERE sender_type = 'agent'", [], |r| r.get(0))
        .unwrap_or(0);
    let human_messages: i64 = conn
        .query_row("SELECT COUNT(*) FROM messages WHERE sender_type = 'human'", [], |r| r.get(0))
        .unwrap_or(0);
    let unspecified_messages = message_count - agent_messages - human_messages;
    let reaction_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM message_reactions", [], |r| r.get(0))
        .unwrap_or(0);
    let pin_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM messages WHERE is_pinned = 1", [], |r| r.get(0))
        .unwrap_or(0);
    let thread_replies: i64 = conn
        .query_row("SELECT COUNT(*) FROM messages WHERE parent_id IS NOT NULL", [], |r| r.get(0))
        .unwrap_or(0);
    let attachment_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM attachments", [], |r| r.get(0))
        .unwrap_or(0);
    let webhook_count: i64 = conn.query_row("SELECT COUNT(*) FROM webhooks", [], |r| r.get(0)).unwrap_or(0);
    let active_webhooks: i64 = conn
        .query_row("SELECT COUNT(*) FROM webhooks WHERE active = 1", [], |r| r.get(0))
        .unwrap_or(0);
    let incoming_webhook_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM incoming_webhooks", [], |r| r.get(0))
        .unwrap_or(0);

    Json(serde_json::json!({
        "rooms": room_count,
        "rooms_archived": archived_rooms,
        "messages": message_count,
        "active_senders_1h": active_senders,
        "by_sender_type": {
            "agent": agent_messages,
            "human": human_messages,
            "unspecified": unspecified_messages
        },
        "reactions": reaction_count,
        "pins": pin_count,
        "threads": thread_replies,
        "attachments": attachment_count,
        "webhooks": {
            "outgoing": webhook_count,
            "outgoing_active": active_webhooks,
            "incoming": incoming_webhook_count
        }
    }))
}

/// Manually trigger a retention sweep. Returns details of what was pruned.
#[rocket::post("/admin/retention/run")]
pub fn run_retention_now(db: &State<Db>) -> Json<serde_json::Value> {
    let conn = db.conn.lock().unwrap();
    let result = retention::run_retention(&conn);

    let details: Vec<serde_json::Value> = result
        .details
        .iter()
        .map(|d| {
            serde_json::json!({
                "room_id": d.room_id,
                "pruned_by_count": d.pruned_by_count,
                "pruned_by_age": d.pruned_by_age,
                "total": d.pruned_by_count + d.pruned_by_age
            })
        })
        .collect();

    Json(serde_json::json!({
        "rooms_checked": result.rooms_checked,
        "total_pruned": result.total_pruned,
        "details": details
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
