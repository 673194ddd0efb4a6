use rocket::http::{ContentType, Status};

use crate::common::{auth_header, test_client, upload_test_file};

#[rocket::async_test]
async fn mint_and_redeem_presigned_share() {
    let client = test_client().await;
    let uploaded = upload_test_file(&client, "alice", "doc.txt", "shared content").await;
    let reference_id = uploaded["reference_id"].as_str().unwrap();

    let res = client
        .post(format!("/attachments/{reference_id}/share"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"expires_in_secs": 3600, "max_downloads": 2}"#)
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::Ok);
    let share: serde_json::Value = res.into_json().await.unwrap();
    let token = share["token"].as_str().unwrap();

    let res = client.get(format!("/share/{token}")).dispatch().await;
    assert_eq!(res.status(), Status::Ok);
    let body = res.into_bytes().await.unwrap();
    assert_eq!(body, b"shared content");
}

#[rocket::async_test]
async fn only_uploader_can_mint_share() {
    let client = test_client().await;
    let uploaded = upload_test_file(&client, "alice", "doc.txt", "private content").await;
    let reference_id = uploaded["reference_id"].as_str().unwrap();

    let res = client
        .post(format!("/attachments/{reference_id}/share"))
        .header(ContentType::JSON)
        .header(auth_header("mallory"))
        .body(r#"{"expires_in_secs": 3600, "max_downloads": 1}"#)
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::Forbidden);
}

#[rocket::async_test]
async fn presigned_share_enforces_download_count() {
    let client = test_client().await;
    let uploaded = upload_test_file(&client, "alice", "doc.txt", "limited content").await;
    let reference_id = uploaded["reference_id"].as_str().unwrap();

    let res = client
        .post(format!("/attachments/{reference_id}/share"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"expires_in_secs": 3600, "max_downloads": 1}"#)
        .dispatch()
        .await;
    let share: serde_json::Value = res.into_json().await.unwrap();
    let token = share["token"].as_str().unwrap();

    let res = client.get(format!("/share/{token}")).dispatch().await;
    assert_eq!(res.status(), Status::Ok);

    let res = client.get(format!("/share/{token}")).dispatch().await;
    assert_eq!(res.status(), Status::Forbidden);
}

#[rocket::async_test]
async fn unknown_share_token_404s() {
    let client = test_client().await;
    let res = client.get("/share/not-a-real-token").dispatch().await;
    assert_eq!(res.status(), Status::NotFound);
}
