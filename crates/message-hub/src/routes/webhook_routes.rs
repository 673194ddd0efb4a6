use platform_core::auth::AuthenticatedUser;
use platform_core::error::AppError;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::{params, types::ToSql};

use crate::db::Db;
use crate::models::{CreateWebhook, UpdateWebhook, Webhook};

use super::{require_owner, room_exists};

const VALID_EVENTS: &[&str] = &[
    "message",
    "message_edited",
    "message_deleted",
    "message_pinned",
    "message_unpinned",
    "reaction_added",
    "reaction_removed",
    "presence_joined",
    "presence_left",
    "room_updated",
    "room_archived",
    "room_unarchived",
];

fn validate_events(events: &str) -> Result<(), AppError> {
    if events.is_empty() {
        return Err(AppError::Validation("events filter cannot be empty; use '*' for all events".to_string()));
    }
    if events == "*" {
        return Ok(());
    }
    for ev in events.split(',').map(|s| s.trim()) {
        if !VALID_EVENTS.contains(&ev) {
            return Err(AppError::Validation(format!(
                "unknown event type '{ev}'; valid events: {}",
                VALID_EVENTS.join(", ")
            )));
        }
    }
    Ok(())
}

#[rocket::post("/rooms/<room_id>/webhooks", data = "<body>")]
pub async fn create_webhook(
    room_id: &str,
    user: AuthenticatedUser,
    body: Json<CreateWebhook>,
    db: &State<Db>,
) -> Result<Json<Webhook>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;
    require_owner(&conn, room_id, &user.0.username)?;

    let url = body.url.trim().to_string();
    if url.is_empty() || (!url.starts_with("http://") && !url.starts_with("https://")) {
        return Err(AppError::Validation("webhook url must start with http:// or https://".to_string()));
    }
    validate_events(&body.events)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO webhooks (id, room_id, url, events, secret, created_by, created_at, active) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
        params![&id, room_id, &url, &body.events, &body.secret, &user.0.username, &now],
    )?;

    Ok(Json(Webhook {
        id,
        room_id: room_id.to_string(),
        url,
        events: body.events.clone(),
        created_by: user.0.username.clone(),
        created_at: now,
        active: true,
    }))
}

#[rocket::get("/rooms/<room_id>/webhooks")]
pub async fn list_webhooks(
    room_id: &str,
    user: AuthenticatedUser,
    db: &State<Db>,
) -> Result<Json<Vec<Webhook>>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;
    require_owner(&conn, room_id, &user.0.username)?;

    let mut stmt = conn.prepare(
        "SELECT id, room_id, url, events, created_by, created_at, active FROM webhooks WHERE room_id = ?1 ORDER BY created_at DESC",
    )?;
    let webhooks: Vec<Webhook> = stmt
        .query_map(params![room_id], |row| {
            Ok(Webhook {
                id: row.get(0)?,
                room_id: row.get(1)?,
                url: row.get(2)?,
                events: row.get(3)?,
                created_by: row.get(4)?,
                created_at: row.get(5)?,
                active: row.get::<_, i64>(6)? != 0,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(Json(webhooks))
}

#[rocket::put("/rooms/<room_id>/webhooks/<webhook_id>", data = "<body>")]
pub async fn update_webhook(
    room_id: &str,
    webhook_id: &str,
    user: AuthenticatedUser,
    body: Json<UpdateWebhook>,
    db: &State<Db>,
) -> Result<Json<serde_json::Value>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;
    require_owner(&conn, room_id, &user.0.username)?;

    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM webhooks WHERE id = ?1 AND room_id = ?2",
            params![webhook_id, room_id],
            |r| r.get::<_, i64>(0),
        )
        .unwrap_or(0)
        > 0;
    if !exists {
        return Err(AppError::NotFound(format!("webhook {webhook_id} not found")));
    }

    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(url) = &body.url {
        let url = url.trim();
        if url.is_empty() || (!url.starts_with("http://") && !url.starts_with("https://")) {
            return Err(AppError::Validation("invalid webhook url".to_string()));
        }
        clauses.push("url = ?".to_string());
        values.push(Box::new(url.to_string()));
    }
    if let Some(events) = &body.events {
        validate_events(events)?;
        clauses.push("events = ?".to_string());
        values.push(Box::new(events.clone()));
    }
    if let Some(secret) = &body.secret {
        clauses.push("secret = ?".to_string());
        values.push(Box::new(secret.clone()));
    }
    if let Some(active) = body.active {
        clauses.push("active = ?".to_string());
        values.push(Box::new(active as i64));
    }

    if clauses.is_empty() {
        return Err(AppError::Validation("no fields to update".to_string()));
    }

    let sql = format!("UPDATE webhooks SET {} WHERE id = ? AND room_id = ?", clauses.join(", "));
    values.push(Box::new(webhook_id.to_string()));
    values.push(Box::new(room_id.to_string()));
    let param_refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&sql, param_refs.as_slice())?;

    Ok(Json(serde_json::json!({"updated": true, "id": webhook_id})))
}

#[rocket::delete("/rooms/<room_id>/webhooks/<webhook_id>")]
pub async fn delete_webhook(
    room_id: &str,
    webhook_id: &str,
    user: AuthenticatedUser,
    db: &State<Db>,
) -> Result<rocket::http::Status, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;
    require_owner(&conn, room_id, &user.0.username)?;

    let deleted = conn.execute(
        "DELETE FROM webhooks WHERE id = ?1 AND room_id = ?2",
        params![webhook_id, room_id],
    )?;
    if deleted == 0 {
        return Err(AppError::NotFound(format!("webhook {webhook_id} not found")));
    }
    Ok(rocket::http::Status::NoContent)
}
