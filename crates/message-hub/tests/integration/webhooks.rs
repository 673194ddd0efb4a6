use rocket::http::{ContentType, Status};

use crate::common::{auth_header, create_test_room, test_client};

#[test]
fn owner_can_create_and_list_webhooks() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "webhook-room");

    let res = client
        .post(format!("/rooms/{room_id}/webhooks"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"url": "https://example.com/hook", "events": "message"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["url"], "https://example.com/hook");
    assert_eq!(body["active"], true);

    let res = client.get(format!("/rooms/{room_id}/webhooks")).header(auth_header("alice")).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let webhooks: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(webhooks.len(), 1);
}

#[test]
fn non_owner_cannot_create_webhook() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "webhook-room-2");

    let res = client
        .post(format!("/rooms/{room_id}/webhooks"))
        .header(ContentType::JSON)
        .header(auth_header("mallory"))
        .body(r#"{"url": "https://example.com/hook", "events": "*"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn invalid_url_scheme_rejected() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "webhook-room-3");

    let res = client
        .post(format!("/rooms/{room_id}/webhooks"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"url": "ftp://example.com/hook", "events": "*"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn unknown_event_type_rejected() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "webhook-room-4");

    let res = client
        .post(format!("/rooms/{room_id}/webhooks"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"url": "https://example.com/hook", "events": "not_a_real_event"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn owner_can_update_and_delete_webhook() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "webhook-room-5");

    let res = client
        .post(format!("/rooms/{room_id}/webhooks"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"url": "https://example.com/hook", "events": "*"}"#)
        .dispatch();
    let created: serde_json::Value = res.into_json().unwrap();
    let webhook_id = created["id"].as_str().unwrap();

    let res = client
        .put(format!("/rooms/{room_id}/webhooks/{webhook_id}"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"active": false}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .delete(format!("/rooms/{room_id}/webhooks/{webhook_id}"))
        .header(auth_header("alice"))
        .dispatch();
    assert_eq!(res.status(), Status::NoContent);

    let res = client
        .delete(format!("/rooms/{room_id}/webhooks/{webhook_id}"))
        .header(auth_header("alice"))
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);
}
