use std::sync::Arc;

use platform_core::auth::AuthenticatedUser;
use platform_core::error::AppError;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::{params, types::ToSql, OptionalExtension};

use crate::db::{self, upsert_fts, Db};
use crate::events::ChatEvent;
use crate::hub::Hub;
use crate::models::{CreateIncomingWebhook, IncomingWebhook, IncomingWebhookMessage, Message, UpdateIncomingWebhook};
use crate::rate_limit::RateLimiter;

use super::messages::row_to_message;
use super::{require_owner, room_exists, ClientIp};

/// Create an incoming webhook: an unguessable token URL that lets an
/// external system post messages into a room without holding a user's
/// bearer token. Creation itself still requires room ownership.
#[rocket::post("/rooms/<room_id>/incoming-webhooks", data = "<body>")]
pub async fn create_incoming_webhook(
    room_id: &str,
    user: AuthenticatedUser,
    body: Json<CreateIncomingWebhook>,
    db: &State<Db>,
) -> Result<Json<IncomingWebhook>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;
    require_owner(&conn, room_id, &user.0.username)?;

    let name = body.name.trim().to_string();
    if name.is_empty() || name.len() > 100 {
        return Err(AppError::Validation("name must be 1-100 characters".to_string()));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let token = db::generate_webhook_token();
    let now = chrono::Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO incoming_webhooks (id, room_id, name, token, created_by, created_at, active) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
        params![&id, room_id, &name, &token, &body.created_by, &now],
    )?;

    Ok(Json(IncomingWebhook {
        id,
        room_id: room_id.to_string(),
        name,
        token: token.clone(),
        created_by: body.created_by.clone(),
        created_at: now,
        active: true,
        url: Some(format!("/hook/{token}")),
    }))
}

#[rocket::get("/rooms/<room_id>/incoming-webhooks")]
pub async fn list_incoming_webhooks(
    room_id: &str,
    user: AuthenticatedUser,
    db: &State<Db>,
) -> Result<Json<Vec<IncomingWebhook>>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;
    require_owner(&conn, room_id, &user.0.username)?;

    let mut stmt = conn.prepare(
        "SELECT id, room_id, name, token, created_by, created_at, active FROM incoming_webhooks WHERE room_id = ?1 ORDER BY created_at DESC",
    )?;
    let hooks: Vec<IncomingWebhook> = stmt
        .query_map(params![room_id], |row| {
            let token: String = row.get(3)?;
            Ok(IncomingWebhook {
                id: row.get(0)?,
                room_id: row.get(1)?,
                name: row.get(2)?,
                token: token.clone(),
                created_by: row.get(4)?,
                created_at: row.get(5)?,
                active: row.get::<_, i64>(6)? != 0,
                url: Some(format!("/hook/{token}")),
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(Json(hooks))
}

#[rocket::put("/rooms/<room_id>/incoming-webhooks/<webhook_id>", data = "<body>")]
pub async fn update_incoming_webhook(
    room_id: &str,
    webhook_id: &str,
    user: AuthenticatedUser,
    body: Json<UpdateIncomingWebhook>,
    db: &State<Db>,
) -> Result<Json<serde_json::Value>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;
    require_owner(&conn, room_id, &user.0.username)?;

    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM incoming_webhooks WHERE id = ?1 AND room_id = ?2",
            params![webhook_id, room_id],
            |r| r.get::<_, i64>(0),
        )
        .unwrap_or(0)
        > 0;
    if !exists {
        return Err(AppError::NotFound(format!("incoming webhook {webhook_id} not found")));
    }

    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(name) = &body.name {
        let name = name.trim();
        if name.is_empty() || name.len() > 100 {
            return Err(AppError::Validation("name must be 1-100 characters".to_string()));
        }
        clauses.push("name = ?".to_string());
        values.push(Box::new(name.to_string()));
    }
    if let Some(active) = body.active {
        clauses.push("active = ?".to_string());
        values.push(Box::new(active as i64));
    }

    if clauses.is_empty() {
        return Err(AppError::Validation("no fields to update".to_string()));
    }

    let sql = format!("UPDATE incoming_webhooks SET {} WHERE id = ? AND room_id = ?", clauses.join(", "));
    values.push(Box::new(webhook_id.to_string()));
    values.push(Box::new(room_id.to_string()));
    let param_refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&sql, param_refs.as_slice())?;

    Ok(Json(serde_json::json!({"updated": true, "id": webhook_id})))
}

#[rocket::delete("/rooms/<room_id>/incoming-webhooks/<webhook_id>")]
pub async fn delete_incoming_webhook(
    room_id: &str,
    webhook_id: &str,
    user: AuthenticatedUser,
    db: &State<Db>,
) -> Result<Status, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;
    require_owner(&conn, room_id, &user.0.username)?;

    let deleted = conn.execute(
        "DELETE FROM incoming_webhooks WHERE id = ?1 AND room_id = ?2",
        params![webhook_id, room_id],
    )?;
    if deleted == 0 {
        return Err(AppError::NotFound(format!("incoming webhook {webhook_id} not found")));
    }
    Ok(Status::NoContent)
}

/// Post a message via incoming webhook token. No bearer token needed — the
/// token in the path IS the credential, scoped to a single room.
#[rocket::post("/hook/<token>", data = "<body>")]
pub async fn post_via_hook(
    token: &str,
    body: Json<IncomingWebhookMessage>,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
    limiter: &State<RateLimiter>,
    ip: ClientIp,
) -> Result<Json<Message>, AppError> {
    if !limiter.check(&format!("hook:{token}:{}", ip.0), 60, 60) {
        return Err(AppError::RateLimited { retry_after_secs: 60, limit: 60 });
    }

    let content = body.content.trim().to_string();
    if content.is_empty() || content.len() > 10_000 {
        return Err(AppError::Validation("content must be 1-10000 characters".to_string()));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let message = {
        let conn = db.conn.lock().unwrap();

        let hook = conn
            .query_row(
                "SELECT room_id, name, active FROM incoming_webhooks WHERE token = ?1",
                params![token],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?)),
            )
            .optional()?
            .ok_or_else(|| AppError::Unauthorized("invalid webhook token".to_string()))?;
        let (room_id, hook_name, active) = hook;

        if active == 0 {
            return Err(AppError::Forbidden("this incoming webhook is disabled".to_string()));
        }
        room_exists(&conn, &room_id)?;

        let sender = body
            .sender
            .as_deref()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && s.len() <= 100)
            .unwrap_or(&hook_name)
            .to_string();
        let sender_type = body.sender_type.clone().or_else(|| Some("agent".to_string()));
        let metadata_str = serde_json::to_string(&body.metadata.clone().unwrap_or(serde_json::json!({})))
            .unwrap_or_else(|_| "{}".to_string());

        let id = uuid::Uuid::new_v4().to_string();
        let seq: i64 = conn.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM messages", [], |r| r.get(0))?;

        conn.execute(
            "INSERT INTO messages (id, room_id, sender, sender_type, content, content_format, type, metadata, created_at, parent_id, quoted_id, seq, is_pinned)
             VALUES (?1, ?2, ?3, ?4, ?5, 'text', 'message', ?6, ?7, NULL, NULL, ?8, 0)",
            params![&id, &room_id, &sender, &sender_type, &content, &metadata_str, &now, seq],
        )?;

        super::touch_participant(&conn, &room_id, &sender, sender_type.as_deref())?;
        super::bump_message_count(&conn, &room_id, &sender)?;
        upsert_fts(&conn, &id);

        conn.query_row("SELECT * FROM messages WHERE id = ?1", params![&id], row_to_message)?
    };

    hub.publish(ChatEvent::Message(message.clone())).await;
    Ok(Json(message))
}
