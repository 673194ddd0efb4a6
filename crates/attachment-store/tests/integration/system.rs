use rocket::http::Status;

use crate::common::{test_client, upload_test_file};

#[rocket::async_test]
async fn health_reports_ok() {
    let client = test_client().await;
    let res = client.get("/health").dispatch().await;
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "attachment-store");
}

#[rocket::async_test]
async fn stats_reflects_uploads_and_dedup_ratio() {
    let client = test_client().await;
    upload_test_file(&client, "alice", "a.txt", "dedup me").await;
    upload_test_file(&client, "bob", "b.txt", "dedup me").await;

    let res = client.get("/stats").dispatch().await;
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().await.unwrap();
    assert_eq!(body["physical_files"], 1);
    assert_eq!(body["references"], 2);
    assert_eq!(body["deduplication_ratio"], 2.0);
}

#[rocket::async_test]
async fn unknown_path_hits_404_catcher() {
    let client = test_client().await;
    let res = client.get("/not-a-real-route").dispatch().await;
    assert_eq!(res.status(), Status::NotFound);
    let body: serde_json::Value = res.into_json().await.unwrap();
    assert_eq!(body["error"], "not found");
}

#[rocket::async_test]
async fn manual_gc_run_reports_counts() {
    let client = test_client().await;
    let res = client.post("/admin/gc/run").dispatch().await;
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().await.unwrap();
    assert!(body["orphans_deleted"].is_number());
    assert!(body["presigned_urls_expired"].is_number());
}
