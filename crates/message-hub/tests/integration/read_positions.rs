use rocket::http::{ContentType, Status};

use crate::common::{auth_header, create_test_room, send_test_message, test_client};

#[test]
fn update_and_fetch_read_position() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "read-room");
    send_test_message(&client, &room_id, "alice", "first");
    send_test_message(&client, &room_id, "alice", "second");

    let res = client
        .put(format!("/rooms/{room_id}/read"))
        .header(ContentType::JSON)
        .header(auth_header("bob"))
        .body(r#"{"last_read_seq": 1}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["last_read_seq"], 1);

    let res = client.get(format!("/rooms/{room_id}/read")).dispatch();
    let positions: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0]["sender"], "bob");
}

#[test]
fn read_position_never_moves_backward() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "read-room-2");
    send_test_message(&client, &room_id, "alice", "first");
    send_test_message(&client, &room_id, "alice", "second");

    client
        .put(format!("/rooms/{room_id}/read"))
        .header(ContentType::JSON)
        .header(auth_header("bob"))
        .body(r#"{"last_read_seq": 2}"#)
        .dispatch();

    let res = client
        .put(format!("/rooms/{room_id}/read"))
        .header(ContentType::JSON)
        .header(auth_header("bob"))
        .body(r#"{"last_read_seq": 1}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["last_read_seq"], 2);
}

#[test]
fn negative_last_read_seq_rejected() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "read-room-3");

    let res = client
        .put(format!("/rooms/{room_id}/read"))
        .header(ContentType::JSON)
        .header(auth_header("bob"))
        .body(r#"{"last_read_seq": -1}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn unread_counts_unread_messages_per_room() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "unread-room");
    send_test_message(&client, &room_id, "alice", "msg 1");
    send_test_message(&client, &room_id, "alice", "msg 2");

    let res = client.get("/unread").header(auth_header("bob")).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["sender"], "bob");
    let room_entry = body["rooms"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["room_id"] == room_id)
        .unwrap();
    assert_eq!(room_entry["unread_count"], 2);
}
