use rocket::http::{ContentType, Status};

use crate::common::{auth_header, create_test_room, join_test_room, send_test_message, test_client};

#[test]
fn send_and_list_messages() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "chat-room");

    let msg = send_test_message(&client, &room_id, "alice", "hello world");
    assert_eq!(msg["content"], "hello world");
    assert_eq!(msg["sender"], "alice");

    let res = client.get(format!("/rooms/{room_id}/messages")).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let messages: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "hello world");
}

#[test]
fn send_message_requires_auth() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "auth-room");

    let res = client
        .post(format!("/rooms/{room_id}/messages"))
        .header(ContentType::JSON)
        .body(r#"{"content": "no token"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn send_message_empty_content_rejected() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "empty-room");

    let res = client
        .post(format!("/rooms/{room_id}/messages"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"content": "   "}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn send_message_oversized_content_rejected() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "big-room");
    let huge = "x".repeat(10_001);

    let res = client
        .post(format!("/rooms/{room_id}/messages"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(format!(r#"{{"content": "{huge}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::PayloadTooLarge);
}

#[test]
fn send_message_to_missing_room_404s() {
    let client = test_client();
    let res = client
        .post("/rooms/does-not-exist/messages")
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"content": "hi"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn get_messages_filters_by_sender() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "filter-room");
    send_test_message(&client, &room_id, "alice", "from alice");
    send_test_message(&client, &room_id, "bob", "from bob");

    let res = client.get(format!("/rooms/{room_id}/messages?sender=bob")).dispatch();
    let messages: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["sender"], "bob");
}

#[test]
fn reply_to_message_sets_parent_id() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "thread-room");
    let root = send_test_message(&client, &room_id, "alice", "root message");
    let root_id = root["id"].as_str().unwrap();
    join_test_room(&client, &room_id, "bob");

    let res = client
        .post(format!("/rooms/{room_id}/messages"))
        .header(ContentType::JSON)
        .header(auth_header("bob"))
        .body(format!(r#"{{"content": "a reply", "parent_id": "{root_id}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let reply: serde_json::Value = res.into_json().unwrap();
    assert_eq!(reply["parent_id"], root_id);

    let res = client.get(format!("/rooms/{room_id}/messages/{root_id}/thread")).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let thread: serde_json::Value = res.into_json().unwrap();
    assert_eq!(thread["total_replies"], 1);
    assert_eq!(thread["replies"][0]["content"], "a reply");
}

#[test]
fn reply_parent_in_other_room_rejected() {
    let client = test_client();
    let room_a = create_test_room(&client, "alice", "room-a");
    let room_b = create_test_room(&client, "alice", "room-b");
    let root = send_test_message(&client, &room_a, "alice", "root in room a");
    let root_id = root["id"].as_str().unwrap();

    let res = client
        .post(format!("/rooms/{room_b}/messages"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(format!(r#"{{"content": "cross-room reply", "parent_id": "{root_id}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}
