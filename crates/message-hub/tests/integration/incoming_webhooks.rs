use rocket::http::{ContentType, Status};

use crate::common::{auth_header, create_test_room, test_client};

#[test]
fn owner_can_create_incoming_webhook_and_post_via_token() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "hook-room");

    let res = client
        .post(format!("/rooms/{room_id}/incoming-webhooks"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"name": "ci-bot", "created_by": "alice"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let hook: serde_json::Value = res.into_json().unwrap();
    let token = hook["token"].as_str().unwrap();
    assert!(hook["url"].as_str().unwrap().contains(token));

    let res = client
        .post(format!("/hook/{token}"))
        .header(ContentType::JSON)
        .body(r#"{"content": "build passed"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let msg: serde_json::Value = res.into_json().unwrap();
    assert_eq!(msg["content"], "build passed");
    assert_eq!(msg["sender"], "ci-bot");
}

#[test]
fn post_via_unknown_token_unauthorized() {
    let client = test_client();
    let res = client
        .post("/hook/not-a-real-token")
        .header(ContentType::JSON)
        .body(r#"{"content": "hi"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn disabled_incoming_webhook_rejects_posts() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "hook-room-2");

    let res = client
        .post(format!("/rooms/{room_id}/incoming-webhooks"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"name": "ci-bot", "created_by": "alice"}"#)
        .dispatch();
    let hook: serde_json::Value = res.into_json().unwrap();
    let hook_id = hook["id"].as_str().unwrap();
    let token = hook["token"].as_str().unwrap();

    let res = client
        .put(format!("/rooms/{room_id}/incoming-webhooks/{hook_id}"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"active": false}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post(format!("/hook/{token}"))
        .header(ContentType::JSON)
        .body(r#"{"content": "should fail"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn non_owner_cannot_create_incoming_webhook() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "hook-room-3");

    let res = client
        .post(format!("/rooms/{room_id}/incoming-webhooks"))
        .header(ContentType::JSON)
        .header(auth_header("mallory"))
        .body(r#"{"name": "ci-bot", "created_by": "mallory"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}
