use std::sync::Arc;

use platform_core::auth::AuthenticatedUser;
use platform_core::error::AppError;
use rocket::serde::json::Json;
use rocket::State;
use rusqlite::params;

use crate::db::Db;
use crate::events::ChatEvent;
use crate::hub::Hub;
use crate::models::{ReadPosition, UnreadInfo, UnreadResponse, UpdateReadPosition};

use super::room_exists;

#[rocket::put("/rooms/<room_id>/read", data = "<body>")]
pub async fn update_read_position(
    room_id: &str,
    user: AuthenticatedUser,
    body: Json<UpdateReadPosition>,
    db: &State<Db>,
    hub: &State<Arc<Hub>>,
) -> Result<Json<ReadPosition>, AppError> {
    if body.last_read_seq < 0 {
        return Err(AppError::Validation("last_read_seq must be non-negative".to_string()));
    }

    let sender = user.0.username.clone();
    let now = chrono::Utc::now().to_rfc3339();
    let position = {
        let conn = db.conn.lock().unwrap();
        room_exists(&conn, room_id)?;

        conn.execute(
            "INSERT INTO read_positions (room_id, sender, last_read_seq, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(room_id, sender) DO UPDATE SET
               last_read_seq = MAX(read_positions.last_read_seq, excluded.last_read_seq),
               updated_at = excluded.updated_at
             WHERE excluded.last_read_seq > read_positions.last_read_seq",
            params![room_id, &sender, body.last_read_seq, &now],
        )?;

        conn.query_row(
            "SELECT room_id, sender, last_read_seq, updated_at FROM read_positions WHERE room_id = ?1 AND sender = ?2",
            params![room_id, &sender],
            |row| {
                Ok(ReadPosition {
                    room_id: row.get(0)?,
                    sender: row.get(1)?,
                    last_read_seq: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        )?
    };

    hub.publish(ChatEvent::ReadPositionUpdated(position.clone())).await;
    Ok(Json(position))
}

#[rocket::get("/rooms/<room_id>/read")]
pub async fn get_read_positions(room_id: &str, db: &State<Db>) -> Result<Json<Vec<ReadPosition>>, AppError> {
    let conn = db.conn.lock().unwrap();
    room_exists(&conn, room_id)?;

    let mut stmt = conn.prepare(
        "SELECT room_id, sender, last_read_seq, updated_at FROM read_positions WHERE room_id = ?1 ORDER BY updated_at DESC",
    )?;
    let positions: Vec<ReadPosition> = stmt
        .query_map(params![room_id], |row| {
            Ok(ReadPosition {
                room_id: row.get(0)?,
                sender: row.get(1)?,
                last_read_seq: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(Json(positions))
}

#[rocket::get("/unread")]
pub async fn get_unread(user: AuthenticatedUser, db: &State<Db>) -> Result<Json<UnreadResponse>, AppError> {
    let sender = user.0.username.clone();
    let conn = db.conn.lock().unwrap();

    let mut stmt = conn.prepare(
        "SELECT r.id, r.name,
                COALESCE(MAX(m.seq), 0) as latest_seq,
                COALESCE(rp.last_read_seq, 0) as last_read_seq,
                COUNT(CASE WHEN m.seq > COALESCE(rp.last_read_seq, 0) THEN 1 END) as unread_count
         FROM rooms r
         LEFT JOIN messages m ON m.room_id = r.id AND m.deleted_at IS NULL
         LEFT JOIN read_positions rp ON rp.room_id = r.id AND rp.sender = ?1
         WHERE r.deleted_at IS NULL
         GROUP BY r.id
         ORDER BY r.name",
    )?;
    let rooms: Vec<UnreadInfo> = stmt
        .query_map(params![&sender], |row| {
            Ok(UnreadInfo {
                room_id: row.get(0)?,
                room_name: row.get(1)?,
                latest_seq: row.get(2)?,
                last_read_seq: row.get(3)?,
                unread_count: row.get(4)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    let total_unread: i64 = rooms.iter().map(|r| r.unread_count).sum();
    Ok(Json(UnreadResponse { sender, rooms, total_unread }))
}
