use rusqlite::{Connection, params};
use std::sync::Mutex;

pub struct Db {
    pub conn: Mutex<Connection>,
}

/// Generate an incoming webhook token: `whk_<32 hex chars>`
pub fn generate_webhook_token() -> String {
    format!("whk_{:032x}", uuid::Uuid::new_v4().as_u128())
}

impl Db {
    pub fn new(path: &str) -> Self {
        let conn = Connection::open(path).expect("Failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .expect("Failed to set pragmas");
        let db = Db {
            conn: Mutex::new(conn),
        };
        db.migrate();
        db
    }

    fn migrate(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                room_type TEXT NOT NULL DEFAULT 'group',
                entity_type TEXT,
                entity_id TEXT,
                dm_key TEXT,
                name TEXT NOT NULL,
                description TEXT DEFAULT '',
                created_by TEXT DEFAULT 'anonymous',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                is_private INTEGER NOT NULL DEFAULT 0,
                is_archived INTEGER NOT NULL DEFAULT 0,
                archived_at TEXT,
                deleted_at TEXT,
                max_messages INTEGER,
                max_message_age_hours INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_rooms_entity_ref ON rooms(entity_type, entity_id);
            CREATE INDEX IF NOT EXISTS idx_rooms_room_type ON rooms(room_type);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_rooms_dm_key ON rooms(dm_key) WHERE dm_key IS NOT NULL;

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                sender TEXT NOT NULL,
                sender_type TEXT,
                content TEXT NOT NULL,
                content_format TEXT NOT NULL DEFAULT 'plain',
                type TEXT NOT NULL DEFAULT 'text',
                metadata TEXT DEFAULT '{}',
                created_at TEXT NOT NULL,
                edited_at TEXT,
                parent_id TEXT,
                quoted_id TEXT,
                seq INTEGER,
                is_pinned INTEGER NOT NULL DEFAULT 0,
                pinned_at TEXT,
                pinned_by TEXT,
                deleted_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_messages_room_created ON messages(room_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender);
            CREATE INDEX IF NOT EXISTS idx_messages_seq ON messages(seq);
            CREATE INDEX IF NOT EXISTS idx_messages_room_seq ON messages(room_id, seq);
            CREATE INDEX IF NOT EXISTS idx_messages_parent ON messages(parent_id);",
        )
        .expect("Failed to run migrations");

        // Edit history, one row per prior revision of an edited message.
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS edit_history (
                id TEXT PRIMARY KEY,
                message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                edit_number INTEGER NOT NULL,
                content TEXT NOT NULL,
                content_format TEXT NOT NULL DEFAULT 'plain',
                metadata TEXT DEFAULT '{}',
                edited_by TEXT NOT NULL DEFAULT 'unknown',
                edited_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_edit_history_message ON edit_history(message_id);",
        )
        .expect("Failed to create edit_history table");

        // Attachments reference the content-addressed store by storage_ref;
        // the binary itself never lives in this database.
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS attachments (
                id TEXT PRIMARY KEY,
                message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                storage_ref TEXT NOT NULL,
                filename TEXT NOT NULL,
                content_type TEXT NOT NULL DEFAULT 'application/octet-stream',
                size INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_attachments_message ON attachments(message_id);",
        )
        .expect("Failed to create attachments table");

        // Message reactions
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS message_reactions (
                id TEXT PRIMARY KEY,
                message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                sender TEXT NOT NULL,
                emoji TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(message_id, sender, emoji)
            );
            CREATE INDEX IF NOT EXISTS idx_reactions_message ON message_reactions(message_id);
            CREATE INDEX IF NOT EXISTS idx_reactions_sender ON message_reactions(sender);",
        )
        .expect("Failed to create message_reactions table");

        // Read positions table for server-side unread tracking
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS read_positions (
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                sender TEXT NOT NULL,
                last_read_seq INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (room_id, sender)
            );
            CREATE INDEX IF NOT EXISTS idx_read_positions_sender ON read_positions(sender);",
        )
        .expect("Failed to create read_positions table");

        // Participants: per-room membership, role, mute state, activity counters.
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS participants (
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                sender TEXT NOT NULL,
                sender_type TEXT,
                role TEXT NOT NULL DEFAULT 'member',
                is_muted INTEGER NOT NULL DEFAULT 0,
                message_count INTEGER NOT NULL DEFAULT 0,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                PRIMARY KEY (room_id, sender)
            );
            CREATE INDEX IF NOT EXISTS idx_participants_sender ON participants(sender);",
        )
        .expect("Failed to create participants table");

        // Webhooks table for outbound event notifications
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS webhooks (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                url TEXT NOT NULL,
                events TEXT NOT NULL DEFAULT '*',
                secret TEXT,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_webhooks_room ON webhooks(room_id);
            CREATE INDEX IF NOT EXISTS idx_webhooks_active ON webhooks(active);",
        )
        .expect("Failed to create webhooks table");

        // Incoming webhooks table (external systems post messages into rooms via token URL)
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS incoming_webhooks (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                token TEXT NOT NULL UNIQUE,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_incoming_webhooks_token ON incoming_webhooks(token);
            CREATE INDEX IF NOT EXISTS idx_incoming_webhooks_room ON incoming_webhooks(room_id);",
        )
        .expect("Failed to create incoming_webhooks table");

        // Backfill seq for any messages inserted before the column existed.
        let needs_seq_backfill: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages WHERE seq IS NULL", [], |r| {
                r.get(0)
            })
            .unwrap_or(0);
        if needs_seq_backfill > 0 {
            let mut stmt = conn
                .prepare(
                    "SELECT id FROM messages WHERE seq IS NULL ORDER BY created_at ASC, id ASC",
                )
                .unwrap();
            let ids: Vec<String> = stmt
                .query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect();
            drop(stmt);
            let max_seq: i64 = conn
                .query_row("SELECT COALESCE(MAX(seq), 0) FROM messages", [], |r| {
                    r.get(0)
                })
                .unwrap_or(0);
            for (i, id) in ids.iter().enumerate() {
                conn.execute(
                    "UPDATE messages SET seq = ?1 WHERE id = ?2",
                    params![max_seq + (i as i64) + 1, &id],
                )
                .ok();
            }
        }

        // FTS5 full-text search index for messages
        conn.execute_batch(
            "CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
                message_id UNINDEXED,
                sender,
                content,
                tokenize='porter unicode61'
            );",
        )
        .expect("Failed to create FTS5 table");

        // Rebuild FTS index from existing messages (idempotent)
        rebuild_fts_index(&conn);

        // Seed a default public #general room if it doesn't exist.
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM rooms WHERE name = 'general'",
                [],
                |r| r.get(0),
            )
            .unwrap_or(0);
        if count == 0 {
            let now = chrono::Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO rooms (id, room_type, name, description, created_by, created_at, updated_at, is_private, is_archived)
                 VALUES (?1, 'group', ?2, ?3, ?4, ?5, ?6, 0, 0)",
                params![uuid::Uuid::new_v4().to_string(), "general", "Default chat room", "system", &now, &now],
            )
            .ok();
        }
    }
}

/// Rebuild the FTS5 index from all messages. Called on startup.
pub fn rebuild_fts_index(conn: &Connection) {
    conn.execute("DELETE FROM messages_fts", []).ok();
    conn.execute_batch(
        "INSERT INTO messages_fts (message_id, sender, content)
         SELECT id, sender, content FROM messages WHERE deleted_at IS NULL;",
    )
    .ok();
}

/// Insert or update a message in the FTS index (call after create/edit).
pub fn upsert_fts(conn: &Connection, message_id: &str) {
    conn.execute("DELETE FROM messages_fts WHERE message_id = ?1", [message_id])
        .ok();
    conn.execute(
        "INSERT INTO messages_fts (message_id, sender, content)
         SELECT id, sender, content FROM messages WHERE id = ?1 AND deleted_at IS NULL",
        [message_id],
    )
    .ok();
}

/// Remove a message from the FTS index (call after delete).
pub fn delete_fts(conn: &Connection, message_id: &str) {
    conn.execute("DELETE FROM messages_fts WHERE message_id = ?1", [message_id])
        .ok();
}
