mod content;
mod delete;
mod ingest;
mod metadata;
mod share;
mod system;

pub use content::{download_content, download_shared};
pub use delete::delete_reference;
pub use ingest::upload_reference;
pub use metadata::{get_reference, list_references};
pub use share::create_share;
pub use system::{health, not_found, run_gc_now, stats, too_many_requests};

use platform_core::error::AppError;
use rusqlite::{params, Connection};

/// Loads the owning reference (not soft-deleted) and enforces that
/// `uploader_id` is either the original uploader or has no ownership
/// restriction — attachment store references have a single uploader, no
/// shared-room ownership model, so this is a straight equality check.
pub(crate) fn require_uploader(conn: &Connection, reference_id: &str, uploader_id: &str) -> Result<(), AppError> {
    let actual: Option<String> = conn
        .query_row(
            "SELECT uploader_id FROM references_ WHERE id = ?1 AND deleted = 0",
            params![reference_id],
            |r| r.get(0),
        )
        .ok();
    match actual {
        None => Err(AppError::NotFound(format!("reference {reference_id} not found"))),
        Some(uploader) if uploader == uploader_id => Ok(()),
        Some(_) => Err(AppError::Forbidden(format!("{uploader_id} did not upload reference {reference_id}"))),
    }
}
