use std::sync::Arc;

use attachment_store::db::Db;
use rocket::http::Status;

use crate::common::{auth_header, multipart_body, multipart_content_type_header, test_client, upload_test_file};

/// Forces a quota row to exist for `user_id`, then shrinks it to the given
/// limits. Manipulating the row directly is far cheaper than uploading
/// enough references to exhaust the real 5 GiB / 10,000 file defaults.
fn shrink_quota(db: &Db, user_id: &str, max_bytes: i64, max_files: i64) {
    let conn = db.conn.lock().unwrap();
    conn.execute(
        "INSERT INTO quotas (user_id, max_bytes, used_bytes, max_files, used_files)
         VALUES (?1, ?2, 0, ?3, 0)
         ON CONFLICT(user_id) DO UPDATE SET max_bytes = excluded.max_bytes, max_files = excluded.max_files",
        rusqlite::params![user_id, max_bytes, max_files],
    )
    .unwrap();
}

fn used_bytes(db: &Db, user_id: &str) -> i64 {
    let conn = db.conn.lock().unwrap();
    conn.query_row("SELECT used_bytes FROM quotas WHERE user_id = ?1", rusqlite::params![user_id], |r| r.get(0))
        .unwrap()
}

#[rocket::async_test]
async fn upload_over_byte_quota_rejected() {
    let client = test_client().await;
    let db = client.rocket().state::<Arc<Db>>().unwrap();
    shrink_quota(db, "tight-byte-user", 5, 10_000);

    let body = multipart_body("task", "t1", "f.txt", "text/plain", "this is more than five bytes");
    let res = client
        .post("/attachments")
        .header(multipart_content_type_header())
        .header(auth_header("tight-byte-user"))
        .body(body)
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::new(422));
}

#[rocket::async_test]
async fn upload_over_file_quota_rejected() {
    let client = test_client().await;
    let db = client.rocket().state::<Arc<Db>>().unwrap();
    shrink_quota(db, "tight-file-user", 5 * 1024 * 1024 * 1024, 0);

    let body = multipart_body("task", "t1", "f.txt", "text/plain", "small");
    let res = client
        .post("/attachments")
        .header(multipart_content_type_header())
        .header(auth_header("tight-file-user"))
        .body(body)
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::new(422));
}

#[rocket::async_test]
async fn upload_exceeding_max_attachment_size_rejected() {
    let client = test_client().await;
    let huge = "x".repeat(11_000_000);
    let body = multipart_body("task", "t1", "huge.bin", "application/octet-stream", &huge);
    let res = client
        .post("/attachments")
        .header(multipart_content_type_header())
        .header(auth_header("alice"))
        .body(body)
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::PayloadTooLarge);
}

/// Quota is charged per distinct (uploader, hash) pair. A second upload of
/// identical content by the same uploader must dedup the physical file
/// without charging their byte/file quota again.
#[rocket::async_test]
async fn repeated_upload_by_same_uploader_not_double_charged() {
    let client = test_client().await;
    let db = client.rocket().state::<Arc<Db>>().unwrap().clone();

    let first = upload_test_file(&client, "dana", "a.txt", "charge me once").await;
    let after_first = used_bytes(&db, "dana");
    assert_eq!(after_first, first["size"].as_i64().unwrap());

    let second = upload_test_file(&client, "dana", "b.txt", "charge me once").await;
    assert_eq!(second["deduplicated"], true);
    let after_second = used_bytes(&db, "dana");
    assert_eq!(after_second, after_first, "re-uploading the same content must not charge quota twice");
}

/// A different uploader referencing the same content is a distinct (user,
/// hash) pair and does get its own quota charge.
#[rocket::async_test]
async fn dedup_across_different_uploaders_still_charges_each() {
    let client = test_client().await;
    let db = client.rocket().state::<Arc<Db>>().unwrap().clone();

    let first = upload_test_file(&client, "erin", "a.txt", "shared across users").await;
    let second = upload_test_file(&client, "frank", "b.txt", "shared across users").await;
    assert_eq!(second["deduplicated"], true);

    assert_eq!(used_bytes(&db, "erin"), first["size"].as_i64().unwrap());
    assert_eq!(used_bytes(&db, "frank"), second["size"].as_i64().unwrap());
}
