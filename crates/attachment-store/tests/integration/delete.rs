use std::sync::Arc;

use attachment_store::db::Db;
use rocket::http::Status;

use crate::common::{auth_header, test_client, upload_test_file};

#[rocket::async_test]
async fn uploader_can_delete_own_reference() {
    let client = test_client().await;
    let uploaded = upload_test_file(&client, "alice", "doc.txt", "contents").await;
    let reference_id = uploaded["reference_id"].as_str().unwrap();

    let res = client.delete(format!("/attachments/{reference_id}")).header(auth_header("alice")).dispatch().await;
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .get(format!("/attachments/{reference_id}"))
        .header(auth_header("alice"))
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::NotFound);
}

#[rocket::async_test]
async fn non_uploader_cannot_delete_reference() {
    let client = test_client().await;
    let uploaded = upload_test_file(&client, "alice", "doc.txt", "contents").await;
    let reference_id = uploaded["reference_id"].as_str().unwrap();

    let res = client.delete(format!("/attachments/{reference_id}")).header(auth_header("mallory")).dispatch().await;
    assert_eq!(res.status(), Status::Forbidden);
}

#[rocket::async_test]
async fn deleting_missing_reference_404s() {
    let client = test_client().await;
    let res = client.delete("/attachments/does-not-exist").header(auth_header("alice")).dispatch().await;
    assert_eq!(res.status(), Status::NotFound);
}

#[rocket::async_test]
async fn deleting_one_reference_keeps_deduplicated_sibling() {
    let client = test_client().await;
    let first = upload_test_file(&client, "alice", "a.txt", "shared bytes").await;
    let second = upload_test_file(&client, "bob", "b.txt", "shared bytes").await;
    let first_id = first["reference_id"].as_str().unwrap();
    let second_id = second["reference_id"].as_str().unwrap();

    let res = client.delete(format!("/attachments/{first_id}")).header(auth_header("alice")).dispatch().await;
    assert_eq!(res.status(), Status::Ok);

    let res = client.get(format!("/attachments/{second_id}")).header(auth_header("bob")).dispatch().await;
    assert_eq!(res.status(), Status::Ok);
}

/// A user who holds two references to identical content and deletes one of
/// them still has a live reference to that hash, so their quota must not be
/// released — only deleting the last live reference frees it.
#[rocket::async_test]
async fn deleting_one_of_own_duplicate_references_keeps_quota_charged() {
    let client = test_client().await;
    let db = client.rocket().state::<Arc<Db>>().unwrap().clone();

    let first = upload_test_file(&client, "carol", "a.txt", "same content twice").await;
    let second = upload_test_file(&client, "carol", "b.txt", "same content twice").await;
    assert_eq!(second["deduplicated"], true);

    let used_before: i64 = {
        let conn = db.conn.lock().unwrap();
        conn.query_row("SELECT used_bytes FROM quotas WHERE user_id = 'carol'", [], |r| r.get(0)).unwrap()
    };

    let first_id = first["reference_id"].as_str().unwrap();
    let res = client.delete(format!("/attachments/{first_id}")).header(auth_header("carol")).dispatch().await;
    assert_eq!(res.status(), Status::Ok);

    let used_after: i64 = {
        let conn = db.conn.lock().unwrap();
        conn.query_row("SELECT used_bytes FROM quotas WHERE user_id = 'carol'", [], |r| r.get(0)).unwrap()
    };
    assert_eq!(used_before, used_after, "deleting one of two live references to the same hash must not release quota");
}
