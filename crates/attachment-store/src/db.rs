use rusqlite::Connection;
use std::sync::Mutex;

pub struct Db {
    pub conn: Mutex<Connection>,
}

impl Db {
    pub fn new(path: &str) -> Self {
        let conn = Connection::open(path).expect("failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .expect("failed to set pragmas");
        let db = Db { conn: Mutex::new(conn) };
        db.migrate();
        db
    }

    fn migrate(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS physical_files (
                hash TEXT PRIMARY KEY,
                size INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                extension TEXT,
                ref_count INTEGER NOT NULL DEFAULT 0,
                primary_path TEXT NOT NULL,
                backup_path TEXT,
                mirror_path TEXT,
                virus_scan_status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                last_accessed TEXT NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS references_ (
                id TEXT PRIMARY KEY,
                file_hash TEXT NOT NULL REFERENCES physical_files(hash),
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                description TEXT,
                uploader_id TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0,
                deleted_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_references_hash ON references_(file_hash);
            CREATE INDEX IF NOT EXISTS idx_references_entity ON references_(entity_type, entity_id);
            CREATE INDEX IF NOT EXISTS idx_references_uploader ON references_(uploader_id);

            CREATE TABLE IF NOT EXISTS storage_endpoints (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                endpoint_type TEXT NOT NULL,
                role TEXT NOT NULL,
                adapter_config TEXT NOT NULL DEFAULT '{}',
                priority INTEGER NOT NULL DEFAULT 0,
                enabled INTEGER NOT NULL DEFAULT 1,
                max_size INTEGER,
                current_size INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS storage_health (
                endpoint_id TEXT NOT NULL,
                check_time TEXT NOT NULL,
                status TEXT NOT NULL,
                latency_ms INTEGER NOT NULL,
                available_bytes INTEGER,
                PRIMARY KEY (endpoint_id, check_time)
            );
            CREATE INDEX IF NOT EXISTS idx_storage_health_endpoint ON storage_health(endpoint_id);

            CREATE TABLE IF NOT EXISTS quotas (
                user_id TEXT PRIMARY KEY,
                max_bytes INTEGER NOT NULL,
                used_bytes INTEGER NOT NULL DEFAULT 0,
                max_files INTEGER NOT NULL,
                used_files INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS presigned_urls (
                token TEXT PRIMARY KEY,
                reference_id TEXT NOT NULL REFERENCES references_(id),
                expires_at TEXT NOT NULL,
                max_downloads INTEGER NOT NULL,
                download_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS access_log (
                id TEXT PRIMARY KEY,
                reference_id TEXT NOT NULL,
                accessor TEXT NOT NULL,
                action TEXT NOT NULL,
                at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_access_log_reference ON access_log(reference_id);

            CREATE TABLE IF NOT EXISTS cleanup_jobs (
                id TEXT PRIMARY KEY,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                orphans_deleted INTEGER NOT NULL DEFAULT 0,
                presigned_urls_expired INTEGER NOT NULL DEFAULT 0,
                health_rows_pruned INTEGER NOT NULL DEFAULT 0,
                items_deleted INTEGER NOT NULL DEFAULT 0
            );",
        )
        .expect("failed to create attachment-store schema");
    }
}

/// Quota usage by distinct (user, hash) pairs with a live reference, per
/// spec: dedup does not reduce a user's own usage accounting.
pub fn default_quota_for(conn: &Connection, user_id: &str, max_bytes: i64, max_files: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO quotas (user_id, max_bytes, used_bytes, max_files, used_files) VALUES (?1, ?2, 0, ?3, 0)",
        rusqlite::params![user_id, max_bytes, max_files],
    )?;
    Ok(())
}
