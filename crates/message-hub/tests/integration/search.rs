use rocket::http::Status;

use crate::common::{create_test_room, send_test_message, test_client};

#[test]
fn search_finds_matching_message() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "search-room");
    send_test_message(&client, &room_id, "alice", "the quick brown fox");
    send_test_message(&client, &room_id, "alice", "an unrelated message");

    let res = client.get("/search?q=quick").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["count"], 1);
    assert!(body["results"][0]["content"].as_str().unwrap().contains("quick"));
}

#[test]
fn search_scoped_to_room() {
    let client = test_client();
    let room_a = create_test_room(&client, "alice", "search-room-a");
    let room_b = create_test_room(&client, "alice", "search-room-b");
    send_test_message(&client, &room_a, "alice", "shared keyword apple");
    send_test_message(&client, &room_b, "alice", "shared keyword apple");

    let res = client.get(format!("/search?q=apple&room_id={room_a}")).dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["room_id"], room_a);
}

#[test]
fn empty_query_rejected() {
    let client = test_client();
    let res = client.get("/search?q=").dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn search_handles_special_characters_via_like_fallback() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "search-room-special");
    send_test_message(&client, &room_id, "alice", "100% done!");

    let res = client.get("/search?q=%done").dispatch();
    assert_eq!(res.status(), Status::Ok);
}
