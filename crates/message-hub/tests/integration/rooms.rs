use rocket::http::{ContentType, Status};

use crate::common::{auth_header, test_client};

#[test]
fn default_general_room_is_seeded() {
    let client = test_client();
    let res = client.get("/rooms").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let rooms: Vec<serde_json::Value> = res.into_json().unwrap();
    assert!(rooms.iter().any(|r| r["name"] == "general"));
}

#[test]
fn create_room_requires_auth() {
    let client = test_client();
    let res = client
        .post("/rooms")
        .header(ContentType::JSON)
        .body(r#"{"name": "no-auth"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn create_room_seeds_creator_as_owner() {
    let client = test_client();
    let res = client
        .post("/rooms")
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"name": "test-room", "description": "A test room"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["name"], "test-room");
    assert_eq!(body["created_by"], "alice");
    assert!(!body["id"].as_str().unwrap().is_empty());
    let room_id = body["id"].as_str().unwrap();

    let res = client.get(format!("/rooms/{room_id}/participants")).dispatch();
    let participants: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["sender"], "alice");
    assert_eq!(participants[0]["role"], "owner");
}

#[test]
fn create_room_empty_name_rejected() {
    let client = test_client();
    let res = client
        .post("/rooms")
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"name": ""}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn get_room_not_found() {
    let client = test_client();
    let res = client.get("/rooms/nonexistent-id").dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn update_room_requires_owner() {
    let client = test_client();
    let res = client
        .post("/rooms")
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"name": "owned-room"}"#)
        .dispatch();
    let room: serde_json::Value = res.into_json().unwrap();
    let room_id = room["id"].as_str().unwrap();

    let res = client
        .patch(format!("/rooms/{room_id}"))
        .header(ContentType::JSON)
        .header(auth_header("mallory"))
        .body(r#"{"description": "hijacked"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);

    let res = client
        .patch(format!("/rooms/{room_id}"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"description": "updated by owner"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["description"], "updated by owner");
}

#[test]
fn archive_and_unarchive_room() {
    let client = test_client();
    let res = client
        .post("/rooms")
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"name": "archive-test"}"#)
        .dispatch();
    let room: serde_json::Value = res.into_json().unwrap();
    let room_id = room["id"].as_str().unwrap();

    let res = client.post(format!("/rooms/{room_id}/archive")).header(auth_header("alice")).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["is_archived"], true);

    let res = client.post(format!("/rooms/{room_id}/unarchive")).header(auth_header("alice")).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["is_archived"], false);
}

#[test]
fn delete_room_requires_owner_then_soft_deletes() {
    let client = test_client();
    let res = client
        .post("/rooms")
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"name": "del-test"}"#)
        .dispatch();
    let room: serde_json::Value = res.into_json().unwrap();
    let room_id = room["id"].as_str().unwrap();

    let res = client.delete(format!("/rooms/{room_id}")).header(auth_header("mallory")).dispatch();
    assert_eq!(res.status(), Status::Forbidden);

    let res = client.delete(format!("/rooms/{room_id}")).header(auth_header("alice")).dispatch();
    assert_eq!(res.status(), Status::NoContent);

    let res = client.get(format!("/rooms/{room_id}")).dispatch();
    assert_eq!(res.status(), Status::NotFound);
}
