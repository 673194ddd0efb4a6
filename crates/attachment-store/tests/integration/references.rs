use rocket::http::Status;

use crate::common::{auth_header, test_client, upload_test_file};

#[rocket::async_test]
async fn get_reference_returns_metadata() {
    let client = test_client().await;
    let uploaded = upload_test_file(&client, "alice", "doc.txt", "contents").await;
    let reference_id = uploaded["reference_id"].as_str().unwrap();

    let res = client
        .get(format!("/attachments/{reference_id}"))
        .header(auth_header("alice"))
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::Ok);
    let meta: serde_json::Value = res.into_json().await.unwrap();
    assert_eq!(meta["filename"], "doc.txt");
    assert_eq!(meta["content_type"], "text/plain");
    assert_eq!(meta["uploader_id"], "alice");
}

#[rocket::async_test]
async fn get_reference_requires_auth() {
    let client = test_client().await;
    let uploaded = upload_test_file(&client, "alice", "doc.txt", "contents").await;
    let reference_id = uploaded["reference_id"].as_str().unwrap();

    let res = client.get(format!("/attachments/{reference_id}")).dispatch().await;
    assert_eq!(res.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn get_missing_reference_404s() {
    let client = test_client().await;
    let res = client.get("/attachments/does-not-exist").header(auth_header("alice")).dispatch().await;
    assert_eq!(res.status(), Status::NotFound);
}

#[rocket::async_test]
async fn list_references_filters_by_entity() {
    let client = test_client().await;
    upload_test_file(&client, "alice", "a.txt", "aaa").await;

    let res = client.get("/entities/task/task-1/attachments").header(auth_header("alice")).dispatch().await;
    assert_eq!(res.status(), Status::Ok);
    let refs: Vec<serde_json::Value> = res.into_json().await.unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0]["filename"], "a.txt");

    let res = client.get("/entities/task/other-task/attachments").header(auth_header("alice")).dispatch().await;
    let refs: Vec<serde_json::Value> = res.into_json().await.unwrap();
    assert!(refs.is_empty());
}
