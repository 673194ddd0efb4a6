use platform_core::error::AppError;
use rocket::serde::json::Json;
use rocket::State;

use crate::db::Db;
use crate::models::{SearchResponse, SearchResult};

#[rocket::get("/search?<q>&<room_id>&<sender>&<limit>")]
pub async fn search_messages(
    db: &State<Db>,
    q: &str,
    room_id: Option<&str>,
    sender: Option<&str>,
    limit: Option<i64>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = q.trim();
    if query.is_empty() {
        return Err(AppError::MissingField("q".to_string()));
    }
    if query.len() > 500 {
        return Err(AppError::Validation("query too long (max 500 characters)".to_string()));
    }

    let conn = db.conn.lock().unwrap();
    let limit = limit.unwrap_or(50).clamp(1, 200);

    // FTS5 first, falling back to a LIKE scan on any FTS syntax error.
    let fts_result: Result<Vec<SearchResult>, rusqlite::Error> = (|| {
        let fts_query: String = query
            .split_whitespace()
            .map(|word| {
                let clean: String = word
                    .chars()
                    .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || *c == '\'')
                    .collect();
                let escaped = clean.replace('"', "\"\"");
                format!("\"{escaped}\"")
            })
            .filter(|s| s != "\"\"")
            .collect::<Vec<_>>()
            .join(" ");

        let mut sql = String::from(
            "SELECT m.id, m.room_id, r.name, m.sender, m.content, m.created_at, m.seq
             FROM messages_fts f
             JOIN messages m ON m.id = f.message_id
             JOIN rooms r ON m.room_id = r.id
             WHERE messages_fts MATCH ?1 AND m.deleted_at IS NULL",
        );
        let mut param_values: Vec<String> = vec![fts_query];
        let mut idx = 2;

        if let Some(room_val) = room_id {
            sql.push_str(&format!(" AND m.room_id = ?{idx}"));
            param_values.push(room_val.to_string());
            idx += 1;
        }
        if let Some(sender_val) = sender {
            sql.push_str(&format!(" AND m.sender = ?{idx}"));
            param_values.push(sender_val.to_string());
            idx += 1;
        }

        sql.push_str(&format!(" ORDER BY rank LIMIT ?{idx}"));
        param_values.push(limit.to_string());

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|v| v as &dyn rusqlite::types::ToSql).collect();

        let results: Vec<SearchResult> = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok(SearchResult {
                    message_id: row.get(0)?,
                    room_id: row.get(1)?,
                    room_name: row.get(2)?,
                    sender: row.get(3)?,
                    content: row.get(4)?,
                    created_at: row.get(5)?,
                    seq: row.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(results)
    })();

    let results = match fts_result {
        Ok(r) => r,
        Err(_) => {
            let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            let like_pattern = format!("%{escaped}%");

            let mut sql = String::from(
                "SELECT m.id, m.room_id, r.name, m.sender, m.content, m.created_at, m.seq
                 FROM messages m JOIN rooms r ON m.room_id = r.id
                 WHERE m.content LIKE ?1 ESCAPE '\\' AND m.deleted_at IS NULL",
            );
            let mut param_values: Vec<String> = vec![like_pattern];
            let mut idx = 2;

            if let Some(room_val) = room_id {
                sql.push_str(&format!(" AND m.room_id = ?{idx}"));
                param_values.push(room_val.to_string());
                idx += 1;
            }
            if let Some(sender_val) = sender {
                sql.push_str(&format!(" AND m.sender = ?{idx}"));
                param_values.push(sender_val.to_string());
                idx += 1;
            }

            sql.push_str(&format!(" ORDER BY m.seq DESC LIMIT ?{idx}"));
            param_values.push(limit.to_string());

            let mut stmt = conn.prepare(&sql)?;
            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|v| v as &dyn rusqlite::types::ToSql).collect();

            stmt.query_map(params_refs.as_slice(), |row| {
                Ok(SearchResult {
                    message_id: row.get(0)?,
                    room_id: row.get(1)?,
                    room_name: row.get(2)?,
                    sender: row.get(3)?,
                    content: row.get(4)?,
                    created_at: row.get(5)?,
                    seq: row.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect()
        }
    };

    let count = results.len();
    Ok(Json(SearchResponse { results, count, query: query.to_string() }))
}
