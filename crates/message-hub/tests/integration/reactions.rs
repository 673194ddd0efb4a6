use rocket::http::{ContentType, Status};

use crate::common::{auth_header, create_test_room, send_test_message, test_client};

#[test]
fn add_reaction_then_toggle_removes_it() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "react-room");
    let msg = send_test_message(&client, &room_id, "alice", "react to me");
    let message_id = msg["id"].as_str().unwrap();

    let res = client
        .post(format!("/rooms/{room_id}/messages/{message_id}/reactions"))
        .header(ContentType::JSON)
        .header(auth_header("bob"))
        .body(r#"{"emoji": "👍"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get(format!("/rooms/{room_id}/messages/{message_id}/reactions")).dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["reactions"][0]["emoji"], "👍");
    assert_eq!(body["reactions"][0]["count"], 1);

    // Same sender + emoji again toggles it off.
    let res = client
        .post(format!("/rooms/{room_id}/messages/{message_id}/reactions"))
        .header(ContentType::JSON)
        .header(auth_header("bob"))
        .body(r#"{"emoji": "👍"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get(format!("/rooms/{room_id}/messages/{message_id}/reactions")).dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["reactions"].as_array().unwrap().is_empty());
}

#[test]
fn remove_reaction_requires_existing_reaction() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "react-room-2");
    let msg = send_test_message(&client, &room_id, "alice", "react to me");
    let message_id = msg["id"].as_str().unwrap();

    let res = client
        .delete(format!("/rooms/{room_id}/messages/{message_id}/reactions?emoji=👍"))
        .header(auth_header("bob"))
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn empty_emoji_rejected() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "react-room-3");
    let msg = send_test_message(&client, &room_id, "alice", "react to me");
    let message_id = msg["id"].as_str().unwrap();

    let res = client
        .post(format!("/rooms/{room_id}/messages/{message_id}/reactions"))
        .header(ContentType::JSON)
        .header(auth_header("bob"))
        .body(r#"{"emoji": ""}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn room_reactions_groups_by_message() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "react-room-4");
    let msg = send_test_message(&client, &room_id, "alice", "react to me");
    let message_id = msg["id"].as_str().unwrap();

    client
        .post(format!("/rooms/{room_id}/messages/{message_id}/reactions"))
        .header(ContentType::JSON)
        .header(auth_header("bob"))
        .body(r#"{"emoji": "🎉"}"#)
        .dispatch();

    let res = client.get(format!("/rooms/{room_id}/reactions")).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["reactions"][message_id].is_array());
}
