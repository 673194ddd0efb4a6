// Route module decomposition — each domain area in its own file.
// Shared request guards and permission helpers live here.

mod incoming_hooks;
mod messages;
mod participants;
mod read_positions;
mod reactions;
mod rooms;
mod search;
mod system;
mod webhook_routes;

pub use incoming_hooks::{
    create_incoming_webhook, delete_incoming_webhook, list_incoming_webhooks, post_via_hook,
    update_incoming_webhook,
};
pub use messages::{
    delete_message, edit_message, get_edit_history, get_messages, get_thread, pin_message, send_message,
    unpin_message,
};
pub use participants::{join_room, room_participants};
pub use read_positions::{get_read_positions, get_unread, update_read_position};
pub use reactions::{add_reaction, get_reactions, get_room_reactions, remove_reaction};
pub use rooms::{
    archive_room, create_room, delete_room, find_or_create_direct_room, get_room, list_rooms, unarchive_room,
    update_room,
};
pub use search::search_messages;
pub use system::{health, not_found, run_retention_now, stats, too_many_requests};
pub use webhook_routes::{create_webhook, delete_webhook, list_webhooks, update_webhook};

use platform_core::error::AppError;
use rocket::request::{FromRequest, Outcome, Request};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::ParticipantRole;

/// Client IP, used only as a rate-limit key — never as an identity.
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let ip = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| req.remote().map(|r| r.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

pub(crate) fn room_exists(conn: &Connection, room_id: &str) -> Result<(), AppError> {
    let exists: bool = conn
        .query_row("SELECT COUNT(*) FROM rooms WHERE id = ?1 AND deleted_at IS NULL", params![room_id], |r| {
            r.get::<_, i64>(0)
        })
        .map(|c| c > 0)
        .unwrap_or(false);
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("room {room_id} not found")))
    }
}

/// Loads whether a (non-deleted) room is archived. `NotFound` if it doesn't
/// exist at all, distinct from `room_exists` so callers that also need the
/// archived flag don't pay for two queries.
pub(crate) fn room_is_archived(conn: &Connection, room_id: &str) -> Result<bool, AppError> {
    conn.query_row(
        "SELECT is_archived FROM rooms WHERE id = ?1 AND deleted_at IS NULL",
        params![room_id],
        |r| r.get::<_, i64>(0),
    )
    .optional()?
    .map(|v| v != 0)
    .ok_or_else(|| AppError::NotFound(format!("room {room_id} not found")))
}

/// Looks up `sender`'s role in `room_id`, if they're a participant at all.
pub(crate) fn participant_role(conn: &Connection, room_id: &str, sender: &str) -> Option<ParticipantRole> {
    conn.query_row(
        "SELECT role FROM participants WHERE room_id = ?1 AND sender = ?2",
        params![room_id, sender],
        |r| r.get::<_, String>(0),
    )
    .ok()
    .map(|s| ParticipantRole::parse(&s))
}

/// Enforces step 1 of the send-message authorization rule: the sender must
/// already be an active participant, and the room must not be archived
/// unless the sender holds admin+ (who can still post housekeeping notices
/// to an archived room).
pub(crate) fn require_active_sender(conn: &Connection, room_id: &str, sender: &str) -> Result<ParticipantRole, AppError> {
    let role = participant_role(conn, room_id, sender)
        .ok_or_else(|| AppError::Forbidden(format!("{sender} is not a participant of room {room_id}")))?;
    if room_is_archived(conn, room_id)? && !role_at_least(role, ParticipantRole::Admin) {
        return Err(AppError::Forbidden(format!("room {room_id} is archived")));
    }
    Ok(role)
}

/// Ensures `sender` is recorded as a participant of `room_id`, creating a
/// `Member` row on first contact. Called whenever a sender takes an action
/// (send message, react, mark read) so participant listings stay accurate
/// without a separate join/invite step.
pub(crate) fn touch_participant(
    conn: &Connection,
    room_id: &str,
    sender: &str,
    sender_type: Option<&str>,
) -> Result<(), AppError> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO participants (room_id, sender, sender_type, role, is_muted, message_count, first_seen, last_seen)
         VALUES (?1, ?2, ?3, 'member', 0, 0, ?4, ?4)
         ON CONFLICT(room_id, sender) DO UPDATE SET
           last_seen = excluded.last_seen,
           sender_type = COALESCE(participants.sender_type, excluded.sender_type)",
        params![room_id, sender, sender_type, &now],
    )?;
    Ok(())
}

pub(crate) fn bump_message_count(conn: &Connection, room_id: &str, sender: &str) -> Result<(), AppError> {
    conn.execute(
        "UPDATE participants SET message_count = message_count + 1 WHERE room_id = ?1 AND sender = ?2",
        params![room_id, sender],
    )?;
    Ok(())
}

/// Registers `sender` as the room's first participant with `Owner` role.
/// Called once, at room creation.
pub(crate) fn seed_owner(conn: &Connection, room_id: &str, sender: &str) -> Result<(), AppError> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO participants (room_id, sender, sender_type, role, is_muted, message_count, first_seen, last_seen)
         VALUES (?1, ?2, NULL, 'owner', 0, 0, ?3, ?3)",
        params![room_id, sender, &now],
    )?;
    Ok(())
}

/// Fails the route with `Forbidden` unless `sender` holds the `Owner` role
/// in `room_id`. Used to gate room administration (update/archive/delete,
/// webhook management) the way a room-scoped admin key once did.
pub(crate) fn require_owner(conn: &Connection, room_id: &str, sender: &str) -> Result<(), AppError> {
    let role: Option<String> = conn
        .query_row(
            "SELECT role FROM participants WHERE room_id = ?1 AND sender = ?2",
            params![room_id, sender],
            |r| r.get(0),
        )
        .ok();
    match role.as_deref() {
        Some("owner") => Ok(()),
        _ => Err(AppError::Forbidden(format!(
            "{sender} is not an owner of room {room_id}"
        ))),
    }
}

pub(crate) fn role_at_least(role: ParticipantRole, min: ParticipantRole) -> bool {
    role.rank() >= min.rank()
}

