use rocket::http::Status;

use crate::common::{auth_header, multipart_body, multipart_content_type_header, test_client, upload_test_file};

#[rocket::async_test]
async fn upload_returns_hash_and_size() {
    let client = test_client().await;
    let res = upload_test_file(&client, "alice", "hello.txt", "hello world").await;
    assert_eq!(res["deduplicated"], false);
    assert_eq!(res["size"], 11);
    assert!(res["hash"].as_str().unwrap().len() == 64);
}

#[rocket::async_test]
async fn identical_content_deduplicates() {
    let client = test_client().await;
    let first = upload_test_file(&client, "alice", "a.txt", "same bytes").await;
    let second = upload_test_file(&client, "bob", "b.txt", "same bytes").await;

    assert_eq!(first["hash"], second["hash"]);
    assert_eq!(second["deduplicated"], true);
    assert_ne!(first["reference_id"], second["reference_id"]);
}

#[rocket::async_test]
async fn upload_requires_auth() {
    let client = test_client().await;
    let body = multipart_body("task", "t1", "f.txt", "text/plain", "content");
    let res = client.post("/attachments").header(multipart_content_type_header()).body(body).dispatch().await;
    assert_eq!(res.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn empty_filename_rejected() {
    let client = test_client().await;
    let body = multipart_body("task", "t1", "", "text/plain", "content");
    let res = client
        .post("/attachments")
        .header(multipart_content_type_header())
        .header(auth_header("alice"))
        .body(body)
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn empty_file_data_rejected() {
    let client = test_client().await;
    let body = multipart_body("task", "t1", "f.txt", "text/plain", "");
    let res = client
        .post("/attachments")
        .header(multipart_content_type_header())
        .header(auth_header("alice"))
        .body(body)
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn missing_entity_fields_rejected() {
    let client = test_client().await;
    let body = multipart_body("", "", "f.txt", "text/plain", "content");
    let res = client
        .post("/attachments")
        .header(multipart_content_type_header())
        .header(auth_header("alice"))
        .body(body)
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::BadRequest);
}
