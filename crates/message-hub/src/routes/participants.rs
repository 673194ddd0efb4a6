use platform_core::error::AppError;
use platform_core::auth::AuthenticatedUser;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::params;

use crate::db::Db;
use crate::models::{Participant, ParticipantRole};

use super::{room_exists, room_is_archived, touch_participant};

fn row_to_participant(row: &rusqlite::Row) -> rusqlite::Result<Participant> {
    let role_str: String = row.get("role")?;
    let role = ParticipantRole::parse(&role_str);
    Ok(Participant {
        room_id: row.get("room_id")?,
        sender: row.get("sender")?,
        sender_type: row.get("sender_type")?,
        role,
        is_muted: row.get::<_, i64>("is_muted")? != 0,
        message_count: row.get("message_count")?,
        first_seen: row.get("first_seen")?,
        last_seen: row.get("last_seen")?,
    })
}

#[rocket::get("/rooms/<room_id>/participants")]
pub async fn room_participants(room_id: &str, db: &State<Db>) -> Result<Json<Vec<Participant>>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;

    let mut stmt = conn.prepare("SELECT * FROM participants WHERE room_id = ?1 ORDER BY last_seen DESC")?;
    let participants = stmt
        .query_map(params![room_id], row_to_participant)?
        .filter_map(|r| r.ok())
        .collect();

    Ok(Json(participants))
}

/// Explicit self-service join: the caller becomes a `Member` participant of
/// `room_id`, the only way (besides room creation) to satisfy the
/// active-participant check `send_message` enforces before accepting a post.
/// Refuses archived rooms the same way sending does.
#[rocket::post("/rooms/<room_id>/join")]
pub async fn join_room(room_id: &str, user: AuthenticatedUser, db: &State<Db>) -> Result<Json<Participant>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;
    if room_is_archived(&conn, room_id)? {
        return Err(AppError::Forbidden(format!("room {room_id} is archived")));
    }
    touch_participant(&conn, room_id, &user.0.username, None)?;
    let participant = conn.query_row(
        "SELECT * FROM participants WHERE room_id = ?1 AND sender = ?2",
        params![room_id, &user.0.username],
        row_to_participant,
    )?;
    Ok(Json(participant))
}
