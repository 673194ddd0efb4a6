use std::sync::Arc;

use platform_core::auth::AuthenticatedUser;
use platform_core::error::AppError;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::attachment_client::AttachmentClient;
use crate::db::{upsert_fts, Db};
use crate::events::ChatEvent;
use crate::hub::Hub;
use crate::models::{
    Attachment, ContentFormat, EditHistoryEntry, EditMessage, Message, MessageType, ParticipantRole, SendMessage,
};
use crate::rate_limit::{RateLimitConfig, RateLimited, RateLimitedError, RateLimiter};

use super::{bump_message_count, participant_role, require_active_sender, role_at_least, room_exists, ClientIp};

pub(crate) fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let content_format_str: String = row.get("content_format")?;
    let content_format = ContentFormat::parse(&content_format_str);
    let type_str: String = row.get("type")?;
    let message_type = MessageType::parse(&type_str);
    let metadata_str: String = row.get("metadata")?;
    Ok(Message {
        id: row.get("id")?,
        room_id: row.get("room_id")?,
        sender: row.get("sender")?,
        sender_type: row.get("sender_type")?,
        content: row.get("content")?,
        content_format,
        message_type,
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({})),
        created_at: row.get("created_at")?,
        edited_at: row.get("edited_at")?,
        parent_id: row.get("parent_id")?,
        quoted_id: row.get("quoted_id")?,
        seq: row.get("seq")?,
        is_pinned: row.get::<_, i64>("is_pinned")? != 0,
        pinned_at: row.get("pinned_at")?,
        pinned_by: row.get("pinned_by")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn load_attachments(conn: &rusqlite::Connection, message_id: &str) -> rusqlite::Result<Vec<Attachment>> {
    let mut stmt = conn.prepare(
        "SELECT id, message_id, storage_ref, filename, content_type, size, created_at
         FROM attachments WHERE message_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt
        .query_map(params![message_id], |row| {
            Ok(Attachment {
                id: row.get(0)?,
                message_id: row.get(1)?,
                storage_ref: row.get(2)?,
                filename: row.get(3)?,
                content_type: row.get(4)?,
                size: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

#[rocket::post("/rooms/<room_id>/messages", data = "<body>")]
pub async fn send_message(
    room_id: &str,
    user: AuthenticatedUser,
    body: Json<SendMessage>,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
    attachments: &State<Arc<AttachmentClient>>,
    limiter: &State<RateLimiter>,
    rate_config: &State<RateLimitConfig>,
    ip: ClientIp,
) -> Result<Result<RateLimited<Message>, RateLimitedError>, AppError> {
    let info = limiter.check_with_info(
        &format!("send_msg:{}", ip.0),
        rate_config.messages_max,
        rate_config.messages_window_secs,
    );
    if !info.allowed {
        return Ok(Err(RateLimitedError {
            message: format!("rate limited: max {} messages per window", rate_config.messages_max),
            info,
        }));
    }

    let content = body.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::MissingField("content".to_string()));
    }
    if content.len() > 10_000 {
        return Err(AppError::MessageTooLarge(format!(
            "message content exceeds 10000 bytes ({})",
            content.len()
        )));
    }

    let sender = user.0.username.clone();
    let sender_type = body.sender_type.clone();

    let mut resolved = Vec::new();
    for att in &body.attachments {
        let info = attachments.resolve(&att.storage_ref).await?;
        resolved.push(info);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let content_format = body.content_format.unwrap_or(ContentFormat::Plain);
    let metadata_str = serde_json::to_string(&body.metadata.clone().unwrap_or(serde_json::json!({})))
        .unwrap_or_else(|_| "{}".to_string());

    let message = {
        let conn = db.conn.lock().unwrap();
        room_exists(&conn, room_id)?;
        require_active_sender(&conn, room_id, &sender)?;

        if let Some(parent_id) = &body.parent_id {
            let parent_room: Option<String> = conn
                .query_row(
                    "SELECT room_id FROM messages WHERE id = ?1 AND deleted_at IS NULL",
                    params![parent_id],
                    |r| r.get(0),
                )
                .optional()?;
            match parent_room {
                Some(r) if r == room_id => {}
                Some(_) => return Err(AppError::Validation("parent_id belongs to a different room".to_string())),
                None => return Err(AppError::NotFound(format!("parent message {parent_id} not found"))),
            }
        }
        if let Some(quoted_id) = &body.quoted_id {
            let quoted_room: Option<String> = conn
                .query_row(
                    "SELECT room_id FROM messages WHERE id = ?1 AND deleted_at IS NULL",
                    params![quoted_id],
                    |r| r.get(0),
                )
                .optional()?;
            match quoted_room {
                Some(r) if r == room_id => {}
                Some(_) => return Err(AppError::Validation("quoted_id belongs to a different room".to_string())),
                None => return Err(AppError::NotFound(format!("quoted message {quoted_id} not found"))),
            }
        }

        let message_type = match body.message_type {
            Some(mt) => mt,
            None if !resolved.is_empty() => MessageType::File,
            None if body.quoted_id.is_some() => MessageType::Quote,
            None if body.parent_id.is_some() => MessageType::Reply,
            None => MessageType::Text,
        };
        if message_type == MessageType::File && resolved.is_empty() {
            return Err(AppError::Validation("file messages require at least one attachment".to_string()));
        }

        let seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE room_id = ?1",
            params![room_id],
            |r| r.get(0),
        )?;

        conn.execute(
            "INSERT INTO messages (id, room_id, sender, sender_type, content, content_format, type, metadata, created_at, parent_id, quoted_id, seq, is_pinned)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0)",
            params![&id, room_id, &sender, &sender_type, &content, content_format.as_str(), message_type.as_str(), &metadata_str, &now, &body.parent_id, &body.quoted_id, seq],
        )?;

        for info in &resolved {
            let att_id = uuid::Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO attachments (id, message_id, storage_ref, filename, content_type, size, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![&att_id, &id, &info.reference_id, &info.filename, &info.content_type, info.size, &now],
            )?;
        }

        bump_message_count(&conn, room_id, &sender)?;
        upsert_fts(&conn, &id);

        conn.query_row("SELECT * FROM messages WHERE id = ?1", params![&id], row_to_message)?
    };

    hub.publish(ChatEvent::Message(message.clone())).await;
    Ok(Ok(RateLimited::new(Json(message), info)))
}

#[rocket::get(
    "/rooms/<room_id>/messages?<since>&<limit>&<before>&<sender>&<sender_type>&<after>&<before_seq>"
)]
#[allow(clippy::too_many_arguments)]
pub async fn get_messages(
    room_id: &str,
    since: Option<&str>,
    limit: Option<i64>,
    before: Option<&str>,
    sender: Option<&str>,
    sender_type: Option<&str>,
    after: Option<i64>,
    before_seq: Option<i64>,
    db: &State<Db>,
) -> Result<Json<Vec<Message>>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;

    let limit = limit.unwrap_or(50).clamp(1, 500);
    let mut sql = String::from("SELECT * FROM messages WHERE room_id = ?1 AND deleted_at IS NULL");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(room_id.to_string())];

    if let Some(since) = since {
        sql.push_str(" AND created_at > ?");
        params_vec.push(Box::new(since.to_string()));
    }
    if let Some(before) = before {
        sql.push_str(" AND created_at < ?");
        params_vec.push(Box::new(before.to_string()));
    }
    if let Some(after) = after {
        sql.push_str(" AND seq > ?");
        params_vec.push(Box::new(after));
    }
    if let Some(sender) = sender {
        sql.push_str(" AND sender = ?");
        params_vec.push(Box::new(sender.to_string()));
    }
    if let Some(sender_type) = sender_type {
        sql.push_str(" AND sender_type = ?");
        params_vec.push(Box::new(sender_type.to_string()));
    }

    let reverse_page = before_seq.is_some() && after.is_none();
    if let Some(before_seq) = before_seq {
        sql.push_str(" AND seq < ?");
        params_vec.push(Box::new(before_seq));
    }

    if reverse_page {
        sql.push_str(" ORDER BY seq DESC LIMIT ?");
    } else {
        sql.push_str(" ORDER BY seq ASC LIMIT ?");
    }
    params_vec.push(Box::new(limit));

    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn rusqlite::types::ToSql> = params_vec.iter().map(|v| v.as_ref()).collect();
    let mut messages: Vec<Message> = stmt
        .query_map(params_ref.as_slice(), row_to_message)?
        .filter_map(|r| r.ok())
        .collect();

    if reverse_page {
        messages.reverse();
    }
    Ok(Json(messages))
}

#[rocket::patch("/rooms/<room_id>/messages/<message_id>", data = "<body>")]
pub async fn edit_message(
    room_id: &str,
    message_id: &str,
    user: AuthenticatedUser,
    body: Json<EditMessage>,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
) -> Result<Json<Message>, AppError> {
    let content = body.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::MissingField("content".to_string()));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let (message, edit_number) = {
        let conn = db.conn.lock().unwrap();
        let existing = conn
            .query_row(
                "SELECT * FROM messages WHERE id = ?1 AND room_id = ?2 AND deleted_at IS NULL",
                params![message_id, room_id],
                row_to_message,
            )
            .optional()?
            .ok_or_else(|| AppError::NotFound(format!("message {message_id} not found")))?;

        let is_sender = existing.sender == user.0.username;
        let authorized = is_sender
            || participant_role(&conn, room_id, &user.0.username)
                .is_some_and(|role| role_at_least(role, ParticipantRole::Moderator));
        if !authorized {
            return Err(AppError::Forbidden(
                "only the original sender or a moderator can edit this message".to_string(),
            ));
        }

        let edit_number: i64 = conn.query_row(
            "SELECT COALESCE(MAX(edit_number), 0) + 1 FROM edit_history WHERE message_id = ?1",
            params![message_id],
            |r| r.get(0),
        )?;
        let history_id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO edit_history (id, message_id, edit_number, content, content_format, metadata, edited_by, edited_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &history_id,
                message_id,
                edit_number,
                &existing.content,
                existing.content_format.as_str(),
                serde_json::to_string(&existing.metadata).unwrap_or_else(|_| "{}".to_string()),
                &user.0.username,
                &now
            ],
        )?;

        let metadata_str = body
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m).unwrap_or_else(|_| "{}".to_string()));
        if let Some(metadata_str) = metadata_str {
            conn.execute(
                "UPDATE messages SET content = ?1, metadata = ?2, edited_at = ?3 WHERE id = ?4",
                params![&content, &metadata_str, &now, message_id],
            )?;
        } else {
            conn.execute(
                "UPDATE messages SET content = ?1, edited_at = ?2 WHERE id = ?3",
                params![&content, &now, message_id],
            )?;
        }
        upsert_fts(&conn, message_id);
        let updated = conn.query_row("SELECT * FROM messages WHERE id = ?1", params![message_id], row_to_message)?;
        (updated, edit_number)
    };

    hub.publish(ChatEvent::MessageEdited { message: message.clone(), edit_number }).await;
    Ok(Json(message))
}

#[rocket::delete("/rooms/<room_id>/messages/<message_id>")]
pub async fn delete_message(
    room_id: &str,
    message_id: &str,
    user: AuthenticatedUser,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
) -> Result<rocket::http::Status, AppError> {
    let now = chrono::Utc::now().to_rfc3339();
    {
        let conn = db.conn.lock().unwrap();
        let sender: String = conn
            .query_row(
                "SELECT sender FROM messages WHERE id = ?1 AND room_id = ?2 AND deleted_at IS NULL",
                params![message_id, room_id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or_else(|| AppError::NotFound(format!("message {message_id} not found")))?;

        let is_owner = super::require_owner(&conn, room_id, &user.0.username).is_ok();
        if sender != user.0.username && !is_owner {
            return Err(AppError::Forbidden("only the sender or a room owner can delete this message".to_string()));
        }

        conn.execute(
            "UPDATE messages SET deleted_at = ?1 WHERE id = ?2",
            params![&now, message_id],
        )?;
        crate::db::delete_fts(&conn, message_id);
    }
    hub.publish(ChatEvent::MessageDeleted {
        room_id: room_id.to_string(),
        message_id: message_id.to_string(),
    })
    .await;
    Ok(rocket::http::Status::NoContent)
}

#[rocket::post("/rooms/<room_id>/messages/<message_id>/pin")]
pub async fn pin_message(
    room_id: &str,
    message_id: &str,
    user: AuthenticatedUser,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
) -> Result<Json<Message>, AppError> {
    let now = chrono::Utc::now().to_rfc3339();
    let message = {
        let conn = db.conn.lock().unwrap();
        room_exists(&conn, room_id)?;
        super::require_owner(&conn, room_id, &user.0.username)?;
        conn.execute(
            "UPDATE messages SET is_pinned = 1, pinned_at = ?1, pinned_by = ?2
             WHERE id = ?3 AND room_id = ?4 AND deleted_at IS NULL",
            params![&now, &user.0.username, message_id, room_id],
        )?;
        conn.query_row(
            "SELECT * FROM messages WHERE id = ?1 AND room_id = ?2",
            params![message_id, room_id],
            row_to_message,
        )
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("message {message_id} not found")))?
    };
    hub.publish(ChatEvent::MessagePinned(message.clone())).await;
    Ok(Json(message))
}

#[rocket::post("/rooms/<room_id>/messages/<message_id>/unpin")]
pub async fn unpin_message(
    room_id: &str,
    message_id: &str,
    user: AuthenticatedUser,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
) -> Result<Json<Message>, AppError> {
    let message = {
        let conn = db.conn.lock().unwrap();
        room_exists(&conn, room_id)?;
        super::require_owner(&conn, room_id, &user.0.username)?;
        conn.execute(
            "UPDATE messages SET is_pinned = 0, pinned_at = NULL, pinned_by = NULL
             WHERE id = ?1 AND room_id = ?2 AND deleted_at IS NULL",
            params![message_id, room_id],
        )?;
        conn.query_row(
            "SELECT * FROM messages WHERE id = ?1 AND room_id = ?2",
            params![message_id, room_id],
            row_to_message,
        )
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("message {message_id} not found")))?
    };
    hub.publish(ChatEvent::MessageUnpinned(message.clone())).await;
    Ok(Json(message))
}

/// A message within a thread, with attachments resolved.
#[derive(Debug, Serialize)]
pub struct ThreadMessage {
    #[serde(flatten)]
    pub message: Message,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub root: ThreadMessage,
    pub replies: Vec<ThreadMessage>,
    pub total_replies: usize,
}

#[rocket::get("/rooms/<room_id>/messages/<message_id>/thread")]
pub async fn get_thread(room_id: &str, message_id: &str, db: &State<Db>) -> Result<Json<ThreadResponse>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;

    let root_msg = conn
        .query_row(
            "SELECT * FROM messages WHERE id = ?1 AND room_id = ?2 AND deleted_at IS NULL",
            params![message_id, room_id],
            row_to_message,
        )
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("message {message_id} not found")))?;

    let root_attachments = load_attachments(&conn, &root_msg.id)?;
    let root = ThreadMessage { message: root_msg, attachments: root_attachments };

    let mut stmt = conn.prepare(
        "SELECT * FROM messages WHERE parent_id = ?1 AND room_id = ?2 AND deleted_at IS NULL ORDER BY seq ASC",
    )?;
    let replies: Vec<Message> = stmt
        .query_map(params![message_id, room_id], row_to_message)?
        .filter_map(|r| r.ok())
        .collect();

    let mut reply_msgs = Vec::with_capacity(replies.len());
    for msg in replies {
        let attachments = load_attachments(&conn, &msg.id)?;
        reply_msgs.push(ThreadMessage { message: msg, attachments });
    }

    Ok(Json(ThreadResponse {
        total_replies: reply_msgs.len(),
        root,
        replies: reply_msgs,
    }))
}

fn row_to_edit_history(row: &rusqlite::Row) -> rusqlite::Result<EditHistoryEntry> {
    let content_format_str: String = row.get("content_format")?;
    let metadata_str: String = row.get("metadata")?;
    Ok(EditHistoryEntry {
        id: row.get("id")?,
        message_id: row.get("message_id")?,
        edit_number: row.get("edit_number")?,
        content: row.get("content")?,
        content_format: ContentFormat::parse(&content_format_str),
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({})),
        edited_by: row.get("edited_by")?,
        edited_at: row.get("edited_at")?,
    })
}

/// The immutable revision history of an edited message, oldest first.
#[rocket::get("/rooms/<room_id>/messages/<message_id>/history")]
pub async fn get_edit_history(
    room_id: &str,
    message_id: &str,
    db: &State<Db>,
) -> Result<Json<Vec<EditHistoryEntry>>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;

    let mut stmt = conn.prepare(
        "SELECT eh.* FROM edit_history eh JOIN messages m ON m.id = eh.message_id
         WHERE eh.message_id = ?1 AND m.room_id = ?2 ORDER BY eh.edit_number ASC",
    )?;
    let entries: Vec<EditHistoryEntry> = stmt
        .query_map(params![message_id, room_id], row_to_edit_history)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(Json(entries))
}
