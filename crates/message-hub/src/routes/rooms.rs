use std::sync::Arc;

use platform_core::auth::AuthenticatedUser;
use platform_core::error::AppError;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::{params, types::ToSql, OptionalExtension};

use crate::db::Db;
use crate::events::ChatEvent;
use crate::hub::Hub;
use crate::models::{CreateRoom, EntityRef, Room, RoomType, RoomWithStats, UpdateRoom};
use crate::rate_limit::{RateLimitConfig, RateLimitedError, RateLimiter};

use super::{require_owner, room_exists, seed_owner, touch_participant, ClientIp};

fn row_to_room(row: &rusqlite::Row) -> rusqlite::Result<Room> {
    let room_type_str: String = row.get("room_type")?;
    let room_type = RoomType::parse(&room_type_str);
    let entity_type: Option<String> = row.get("entity_type")?;
    let entity_id: Option<String> = row.get("entity_id")?;
    let entity_ref = match (entity_type, entity_id) {
        (Some(entity_type), Some(entity_id)) => Some(EntityRef { entity_type, id: entity_id }),
        _ => None,
    };
    Ok(Room {
        id: row.get("id")?,
        room_type,
        entity_ref,
        name: row.get("name")?,
        description: row.get("description")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        is_private: row.get::<_, i64>("is_private")? != 0,
        is_archived: row.get::<_, i64>("is_archived")? != 0,
        archived_at: row.get("archived_at")?,
        deleted_at: row.get("deleted_at")?,
        max_messages: row.get("max_messages")?,
        max_message_age_hours: row.get("max_message_age_hours")?,
    })
}

/// Sorted, colon-joined pair that keys a direct-message room regardless of
/// which side opened it, so `find_or_create_direct_room(a, b)` and
/// `find_or_create_direct_room(b, a)` land on the same room.
fn dm_key(user_a: &str, user_b: &str) -> String {
    let mut pair = [user_a, user_b];
    pair.sort_unstable();
    format!("{}:{}", pair[0], pair[1])
}

#[rocket::post("/rooms", data = "<body>")]
pub async fn create_room(
    user: AuthenticatedUser,
    body: Json<CreateRoom>,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
    limiter: &State<RateLimiter>,
    rate_config: &State<RateLimitConfig>,
    ip: ClientIp,
) -> Result<Result<Json<Room>, RateLimitedError>, AppError> {
    let info = limiter.check_with_info(
        &format!("create_room:{}", ip.0),
        rate_config.rooms_max,
        rate_config.rooms_window_secs,
    );
    if !info.allowed {
        return Ok(Err(RateLimitedError {
            info,
            message: "room creation rate limit exceeded".to_string(),
        }));
    }

    if body.name.trim().is_empty() {
        return Err(AppError::MissingField("name".to_string()));
    }

    let room_type = body.room_type.unwrap_or(RoomType::Group);
    if room_type == RoomType::Direct {
        return Err(AppError::Validation(
            "direct rooms are opened via /rooms/direct, not created directly".to_string(),
        ));
    }
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let creator = &user.0.username;
    let (entity_type, entity_id) = match &body.entity_ref {
        Some(r) => (Some(r.entity_type.clone()), Some(r.id.clone())),
        None => (None, None),
    };

    let room = {
        let conn = db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO rooms (id, room_type, entity_type, entity_id, name, description, created_by, created_at, updated_at, is_private, is_archived, max_messages, max_message_age_hours)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9, 0, ?10, ?11)",
            params![
                &id,
                room_type.as_str(),
                entity_type,
                entity_id,
                body.name.trim(),
                &body.description,
                creator,
                &now,
                body.is_private as i64,
                body.max_messages,
                body.max_message_age_hours,
            ],
        )?;
        seed_owner(&conn, &id, creator)?;
        conn.query_row("SELECT * FROM rooms WHERE id = ?1", params![&id], row_to_room)?
    };

    hub.publish(ChatEvent::RoomUpdated(room.clone())).await;
    Ok(Ok(Json(room)))
}

/// Folds direct-message room creation into the normal room pipeline, keyed
/// by the sorted participant pair so repeated opens between the same two
/// users return the existing room instead of creating a duplicate.
#[rocket::post("/rooms/direct/<other_user>")]
pub async fn find_or_create_direct_room(
    other_user: &str,
    user: AuthenticatedUser,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
) -> Result<Json<Room>, AppError> {
    let requester = &user.0.username;
    if other_user == requester {
        return Err(AppError::Validation("cannot open a direct room with yourself".to_string()));
    }
    let key = dm_key(requester, other_user);

    let conn = db.conn.lock().unwrap();
    let existing = conn
        .query_row("SELECT * FROM rooms WHERE dm_key = ?1 AND deleted_at IS NULL", params![&key], row_to_room)
        .optional()?;
    if let Some(room) = existing {
        return Ok(Json(room));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let name = format!("{requester},{other_user}");
    conn.execute(
        "INSERT INTO rooms (id, room_type, dm_key, name, description, created_by, created_at, updated_at, is_private, is_archived)
         VALUES (?1, 'direct', ?2, ?3, '', ?4, ?5, ?5, 1, 0)",
        params![&id, &key, &name, requester, &now],
    )?;
    seed_owner(&conn, &id, requester)?;
    touch_participant(&conn, &id, other_user, None)?;
    let room = conn.query_row("SELECT * FROM rooms WHERE id = ?1", params![&id], row_to_room)?;
    drop(conn);

    hub.publish(ChatEvent::RoomUpdated(room.clone())).await;
    Ok(Json(room))
}

#[rocket::get("/rooms")]
pub async fn list_rooms(db: &State<Db>) -> Result<Json<Vec<RoomWithStats>>, AppError> {
    let conn = db.conn.lock().unwrap();
    let mut stmt = conn.prepare(
        "SELECT r.*,
            (SELECT COUNT(*) FROM messages m WHERE m.room_id = r.id AND m.deleted_at IS NULL) AS message_count,
            (SELECT MAX(m.created_at) FROM messages m WHERE m.room_id = r.id AND m.deleted_at IS NULL) AS last_activity,
            (SELECT m.sender FROM messages m WHERE m.room_id = r.id AND m.deleted_at IS NULL ORDER BY m.seq DESC LIMIT 1) AS last_message_sender,
            (SELECT substr(m.content, 1, 200) FROM messages m WHERE m.room_id = r.id AND m.deleted_at IS NULL ORDER BY m.seq DESC LIMIT 1) AS last_message_preview
         FROM rooms r
         WHERE r.deleted_at IS NULL
         ORDER BY COALESCE(last_activity, r.created_at) DESC",
    )?;
    let rooms = stmt
        .query_map([], |row| {
            Ok(RoomWithStats {
                room: row_to_room(row)?,
                message_count: row.get("message_count")?,
                last_activity: row.get("last_activity")?,
                last_message_sender: row.get("last_message_sender")?,
                last_message_preview: row.get("last_message_preview")?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(Json(rooms))
}

#[rocket::get("/rooms/<room_id>")]
pub async fn get_room(room_id: &str, db: &State<Db>) -> Result<Json<Room>, AppError> {
    let conn = db.conn.lock().unwrap();
    let room = conn
        .query_row(
            "SELECT * FROM rooms WHERE id = ?1 AND deleted_at IS NULL",
            params![room_id],
            row_to_room,
        )
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("room {room_id} not found")))?;
    Ok(Json(room))
}

#[rocket::patch("/rooms/<room_id>", data = "<body>")]
pub async fn update_room(
    room_id: &str,
    user: AuthenticatedUser,
    body: Json<UpdateRoom>,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
) -> Result<Json<Room>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;
    require_owner(&conn, room_id, &user.0.username)?;

    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("name cannot be empty".to_string()));
        }
        clauses.push("name = ?".to_string());
        values.push(Box::new(name.trim().to_string()));
    }
    if let Some(description) = &body.description {
        clauses.push("description = ?".to_string());
        values.push(Box::new(description.clone()));
    }
    if let Some(max_messages) = body.max_messages {
        clauses.push("max_messages = ?".to_string());
        values.push(Box::new(max_messages));
    }
    if let Some(max_message_age_hours) = body.max_message_age_hours {
        clauses.push("max_message_age_hours = ?".to_string());
        values.push(Box::new(max_message_age_hours));
    }

    if clauses.is_empty() {
        return Err(AppError::Validation("no fields to update".to_string()));
    }

    clauses.push("updated_at = ?".to_string());
    let now = chrono::Utc::now().to_rfc3339();
    values.push(Box::new(now));

    let sql = format!("UPDATE rooms SET {} WHERE id = ?", clauses.join(", "));
    values.push(Box::new(room_id.to_string()));
    let params_ref: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&sql, params_ref.as_slice())?;

    let room = conn.query_row("SELECT * FROM rooms WHERE id = ?1", params![room_id], row_to_room)?;
    drop(conn);
    hub.publish(ChatEvent::RoomUpdated(room.clone())).await;
    Ok(Json(room))
}

#[rocket::post("/rooms/<room_id>/archive")]
pub async fn archive_room(
    room_id: &str,
    user: AuthenticatedUser,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
) -> Result<Json<Room>, AppError> {
    let now = chrono::Utc::now().to_rfc3339();
    let room = {
        let conn = db.conn.lock().unwrap();
        room_exists(&conn, room_id)?;
        require_owner(&conn, room_id, &user.0.username)?;
        conn.execute(
            "UPDATE rooms SET is_archived = 1, archived_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![&now, room_id],
        )?;
        conn.query_row("SELECT * FROM rooms WHERE id = ?1", params![room_id], row_to_room)?
    };
    hub.publish(ChatEvent::RoomArchived { room_id: room_id.to_string() }).await;
    Ok(Json(room))
}

#[rocket::post("/rooms/<room_id>/unarchive")]
pub async fn unarchive_room(
    room_id: &str,
    user: AuthenticatedUser,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
) -> Result<Json<Room>, AppError> {
    let now = chrono::Utc::now().to_rfc3339();
    let room = {
        let conn = db.conn.lock().unwrap();
        room_exists(&conn, room_id)?;
        require_owner(&conn, room_id, &user.0.username)?;
        conn.execute(
            "UPDATE rooms SET is_archived = 0, archived_at = NULL, updated_at = ?1 WHERE id = ?2",
            params![&now, room_id],
        )?;
        conn.query_row("SELECT * FROM rooms WHERE id = ?1", params![room_id], row_to_room)?
    };
    hub.publish(ChatEvent::RoomUnarchived { room_id: room_id.to_string() }).await;
    Ok(Json(room))
}

#[rocket::delete("/rooms/<room_id>")]
pub async fn delete_room(
    room_id: &str,
    user: AuthenticatedUser,
    db: &State<Db>,
) -> Result<rocket::http::Status, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;
    require_owner(&conn, room_id, &user.0.username)?;
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE rooms SET deleted_at = ?1 WHERE id = ?2",
        params![&now, room_id],
    )?;
    Ok(rocket::http::Status::NoContent)
}
