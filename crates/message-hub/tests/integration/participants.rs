use rocket::http::Status;

use crate::common::{create_test_room, send_test_message, test_client};

#[test]
fn participants_tracks_message_senders() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "participants-room");
    send_test_message(&client, &room_id, "bob", "hi");

    let res = client.get(format!("/rooms/{room_id}/participants")).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let participants: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(participants.len(), 2);
    let bob = participants.iter().find(|p| p["sender"] == "bob").unwrap();
    assert_eq!(bob["role"], "member");
    assert_eq!(bob["message_count"], 1);
}

#[test]
fn creator_is_seeded_as_owner() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "owner-seed-room");

    let res = client.get(format!("/rooms/{room_id}/participants")).dispatch();
    let participants: Vec<serde_json::Value> = res.into_json().unwrap();
    let alice = participants.iter().find(|p| p["sender"] == "alice").unwrap();
    assert_eq!(alice["role"], "owner");
}

#[test]
fn participants_for_missing_room_404s() {
    let client = test_client();
    let res = client.get("/rooms/nonexistent/participants").dispatch();
    assert_eq!(res.status(), Status::NotFound);
}
