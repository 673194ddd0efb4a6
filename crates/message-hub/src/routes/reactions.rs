use std::sync::Arc;

use platform_core::auth::AuthenticatedUser;
use platform_core::error::AppError;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::params;

use crate::db::Db;
use crate::events::ChatEvent;
use crate::hub::Hub;
use crate::models::{AddReaction, Reaction, ReactionSummary, ReactionsResponse, RoomReactionsResponse};

use super::{room_exists, touch_participant};

fn message_exists(conn: &rusqlite::Connection, room_id: &str, message_id: &str) -> Result<(), AppError> {
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM messages WHERE id = ?1 AND room_id = ?2 AND deleted_at IS NULL",
            params![message_id, room_id],
            |r| r.get::<_, i64>(0),
        )
        .map(|c| c > 0)
        .unwrap_or(false);
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("message {message_id} not found in room {room_id}")))
    }
}

#[rocket::post("/rooms/<room_id>/messages/<message_id>/reactions", data = "<body>")]
pub async fn add_reaction(
    room_id: &str,
    message_id: &str,
    user: AuthenticatedUser,
    body: Json<AddReaction>,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
) -> Result<Json<Reaction>, AppError> {
    let emoji = body.emoji.trim().to_string();
    if emoji.is_empty() {
        return Err(AppError::MissingField("emoji".to_string()));
    }
    if emoji.len() > 32 {
        return Err(AppError::Validation("emoji too long (max 32 characters)".to_string()));
    }

    let sender = user.0.username.clone();
    let conn = db.conn.lock().unwrap();
    message_exists(&conn, room_id, message_id)?;

    let existing_id: Option<String> = conn
        .query_row(
            "SELECT id FROM message_reactions WHERE message_id = ?1 AND sender = ?2 AND emoji = ?3",
            params![message_id, &sender, &emoji],
            |r| r.get(0),
        )
        .ok();

    if let Some(existing) = existing_id {
        conn.execute("DELETE FROM message_reactions WHERE id = ?1", params![&existing])?;
        let reaction = Reaction {
            id: existing,
            message_id: message_id.to_string(),
            room_id: room_id.to_string(),
            sender: sender.clone(),
            emoji: emoji.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        drop(conn);
        hub.publish(ChatEvent::ReactionRemoved {
            room_id: room_id.to_string(),
            message_id: message_id.to_string(),
            sender,
            emoji,
        })
        .await;
        return Ok(Json(reaction));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO message_reactions (id, message_id, sender, emoji, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, message_id, &sender, &emoji, &now],
    )?;
    touch_participant(&conn, room_id, &sender, None)?;

    let reaction = Reaction {
        id,
        message_id: message_id.to_string(),
        room_id: room_id.to_string(),
        sender,
        emoji,
        created_at: now,
    };
    drop(conn);
    hub.publish(ChatEvent::ReactionAdded(reaction.clone())).await;
    Ok(Json(reaction))
}

#[rocket::delete("/rooms/<room_id>/messages/<message_id>/reactions?<emoji>")]
pub async fn remove_reaction(
    room_id: &str,
    message_id: &str,
    emoji: &str,
    user: AuthenticatedUser,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
) -> Result<rocket::http::Status, AppError> {
    let emoji = emoji.trim();
    if emoji.is_empty() {
        return Err(AppError::MissingField("emoji".to_string()));
    }
    let sender = user.0.username.clone();

    let reaction_id: Option<String> = {
        let conn = db.conn.lock().unwrap();
        message_exists(&conn, room_id, message_id)?;
        let id: Option<String> = conn
            .query_row(
                "SELECT id FROM message_reactions WHERE message_id = ?1 AND sender = ?2 AND emoji = ?3",
                params![message_id, &sender, emoji],
                |r| r.get(0),
            )
            .ok();
        if let Some(rid) = &id {
            conn.execute("DELETE FROM message_reactions WHERE id = ?1", params![rid])?;
        }
        id
    };

    match reaction_id {
        Some(_) => {
            hub.publish(ChatEvent::ReactionRemoved {
                room_id: room_id.to_string(),
                message_id: message_id.to_string(),
                sender,
                emoji: emoji.to_string(),
            })
            .await;
            Ok(rocket::http::Status::NoContent)
        }
        None => Err(AppError::NotFound("reaction not found".to_string())),
    }
}

#[rocket::get("/rooms/<room_id>/messages/<message_id>/reactions")]
pub async fn get_reactions(
    room_id: &str,
    message_id: &str,
    db: &State<Db>,
) -> Result<Json<ReactionsResponse>, AppError> {
    let conn = db.conn.lock().unwrap();
    message_exists(&conn, room_id, message_id)?;

    let mut stmt = conn.prepare(
        "SELECT emoji, GROUP_CONCAT(sender, ','), COUNT(*) FROM message_reactions
         WHERE message_id = ?1 GROUP BY emoji ORDER BY MIN(created_at) ASC",
    )?;
    let reactions: Vec<ReactionSummary> = stmt
        .query_map(params![message_id], |row| {
            let senders_str: String = row.get(1)?;
            Ok(ReactionSummary {
                emoji: row.get(0)?,
                count: row.get(2)?,
                senders: senders_str.split(',').map(|s| s.to_string()).collect(),
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(Json(ReactionsResponse { message_id: message_id.to_string(), reactions }))
}

#[rocket::get("/rooms/<room_id>/reactions")]
pub async fn get_room_reactions(room_id: &str, db: &State<Db>) -> Result<Json<RoomReactionsResponse>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;

    let mut stmt = conn.prepare(
        "SELECT mr.message_id, mr.emoji, GROUP_CONCAT(mr.sender, ','), COUNT(*)
         FROM message_reactions mr
         JOIN messages m ON mr.message_id = m.id AND m.room_id = ?1
         GROUP BY mr.message_id, mr.emoji
         ORDER BY mr.message_id, MIN(mr.created_at) ASC",
    )?;
    let rows: Vec<(String, String, String, i64)> = stmt
        .query_map(params![room_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .filter_map(|r| r.ok())
        .collect();

    let mut reactions_map: std::collections::HashMap<String, Vec<ReactionSummary>> = std::collections::HashMap::new();
    for (message_id, emoji, senders_str, count) in rows {
        reactions_map.entry(message_id).or_default().push(ReactionSummary {
            emoji,
            count,
            senders: senders_str.split(',').map(|s| s.to_string()).collect(),
        });
    }

    Ok(Json(RoomReactionsResponse { room_id: room_id.to_string(), reactions: reactions_map }))
}
