use rocket::http::{ContentType, Status};

use crate::common::{auth_header, send_test_message, test_client};

#[test]
fn retention_prunes_by_max_messages() {
    let client = test_client();
    let res = client
        .post("/rooms")
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"name": "retention-room", "max_messages": 2}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let room: serde_json::Value = res.into_json().unwrap();
    let room_id = room["id"].as_str().unwrap();

    for i in 0..5 {
        send_test_message(&client, room_id, "alice", &format!("message {i}"));
    }

    let res = client.post("/admin/retention/run").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let result: serde_json::Value = res.into_json().unwrap();
    assert!(result["total_pruned"].as_i64().unwrap() >= 3);

    let res = client.get(format!("/rooms/{room_id}/messages")).dispatch();
    let messages: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(messages.len(), 2);
}

#[test]
fn pinned_messages_survive_retention() {
    let client = test_client();
    let res = client
        .post("/rooms")
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"name": "pin-retention-room", "max_messages": 1}"#)
        .dispatch();
    let room: serde_json::Value = res.into_json().unwrap();
    let room_id = room["id"].as_str().unwrap();

    let first = send_test_message(&client, room_id, "alice", "pin me");
    let first_id = first["id"].as_str().unwrap();
    client.post(format!("/rooms/{room_id}/messages/{first_id}/pin")).header(auth_header("alice")).dispatch();

    send_test_message(&client, room_id, "alice", "second");
    send_test_message(&client, room_id, "alice", "third");

    client.post("/admin/retention/run").dispatch();

    let res = client.get(format!("/rooms/{room_id}/messages")).dispatch();
    let messages: Vec<serde_json::Value> = res.into_json().unwrap();
    assert!(messages.iter().any(|m| m["id"] == first_id));
}

#[test]
fn rooms_without_retention_settings_are_untouched() {
    let client = test_client();
    let res = client
        .post("/rooms")
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"name": "no-retention-room"}"#)
        .dispatch();
    let room: serde_json::Value = res.into_json().unwrap();
    let room_id = room["id"].as_str().unwrap();

    for i in 0..10 {
        send_test_message(&client, room_id, "alice", &format!("message {i}"));
    }

    client.post("/admin/retention/run").dispatch();

    let res = client.get(format!("/rooms/{room_id}/messages")).dispatch();
    let messages: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(messages.len(), 10);
}
