use rocket::http::{ContentType, Status};

use crate::common::{auth_header, create_test_room, send_test_message, test_client};

#[test]
fn sender_can_edit_own_message() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "edit-room");
    let msg = send_test_message(&client, &room_id, "alice", "original");
    let message_id = msg["id"].as_str().unwrap();

    let res = client
        .patch(format!("/rooms/{room_id}/messages/{message_id}"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"content": "edited"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["content"], "edited");
    assert!(body["edited_at"].is_string());
}

#[test]
fn non_sender_cannot_edit_message() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "edit-room-2");
    let msg = send_test_message(&client, &room_id, "alice", "original");
    let message_id = msg["id"].as_str().unwrap();

    let res = client
        .patch(format!("/rooms/{room_id}/messages/{message_id}"))
        .header(ContentType::JSON)
        .header(auth_header("mallory"))
        .body(r#"{"content": "hijacked"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn sender_can_delete_own_message() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "del-room");
    let msg = send_test_message(&client, &room_id, "bob", "to delete");
    let message_id = msg["id"].as_str().unwrap();

    let res = client
        .delete(format!("/rooms/{room_id}/messages/{message_id}"))
        .header(auth_header("bob"))
        .dispatch();
    assert_eq!(res.status(), Status::NoContent);

    let res = client.get(format!("/rooms/{room_id}/messages")).dispatch();
    let messages: Vec<serde_json::Value> = res.into_json().unwrap();
    assert!(messages.is_empty());
}

#[test]
fn room_owner_can_delete_others_message() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "owner-del-room");
    let msg = send_test_message(&client, &room_id, "bob", "bob's message");
    let message_id = msg["id"].as_str().unwrap();

    let res = client
        .delete(format!("/rooms/{room_id}/messages/{message_id}"))
        .header(auth_header("alice"))
        .dispatch();
    assert_eq!(res.status(), Status::NoContent);
}

#[test]
fn non_owner_non_sender_cannot_delete_message() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "protected-room");
    let msg = send_test_message(&client, &room_id, "bob", "bob's message");
    let message_id = msg["id"].as_str().unwrap();

    let res = client
        .delete(format!("/rooms/{room_id}/messages/{message_id}"))
        .header(auth_header("mallory"))
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn only_owner_can_pin_and_unpin() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "pin-room");
    let msg = send_test_message(&client, &room_id, "bob", "pin me");
    let message_id = msg["id"].as_str().unwrap();

    let res = client
        .post(format!("/rooms/{room_id}/messages/{message_id}/pin"))
        .header(auth_header("bob"))
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);

    let res = client
        .post(format!("/rooms/{room_id}/messages/{message_id}/pin"))
        .header(auth_header("alice"))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["is_pinned"], true);

    let res = client
        .post(format!("/rooms/{room_id}/messages/{message_id}/unpin"))
        .header(auth_header("alice"))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["is_pinned"], false);
}
