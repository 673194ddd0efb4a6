use rocket::http::Status;

use crate::common::test_client;

#[test]
fn health_reports_ok() {
    let client = test_client();
    let res = client.get("/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "message-hub");
    assert!(body["version"].is_string());
}

#[test]
fn stats_reflects_seeded_general_room() {
    let client = test_client();
    let res = client.get("/stats").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["rooms"].as_i64().unwrap() >= 1);
    assert_eq!(body["messages"], 0);
}

#[test]
fn unknown_path_hits_404_catcher() {
    let client = test_client();
    let res = client.get("/not-a-real-route").dispatch();
    assert_eq!(res.status(), Status::NotFound);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["error"], "not found");
}
