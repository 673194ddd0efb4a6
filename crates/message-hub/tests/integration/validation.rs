use rocket::http::{ContentType, Status};

use crate::common::{auth_header, create_test_room, test_client};

#[test]
fn send_message_hits_rate_limit_headers() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "rate-room");

    let res = client
        .post(format!("/rooms/{room_id}/messages"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body(r#"{"content": "hello"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    assert!(res.headers().get_one("X-RateLimit-Limit").is_some());
    assert!(res.headers().get_one("X-RateLimit-Remaining").is_some());
}

#[test]
fn invalid_json_body_is_rejected() {
    let client = test_client();
    let room_id = create_test_room(&client, "alice", "bad-json-room");

    let res = client
        .post(format!("/rooms/{room_id}/messages"))
        .header(ContentType::JSON)
        .header(auth_header("alice"))
        .body("not json")
        .dispatch();
    assert!(res.status().code >= 400 && res.status().code < 500);
}

#[test]
fn malformed_bearer_token_is_unauthorized() {
    let client = test_client();
    let res = client
        .get("/unread")
        .header(rocket::http::Header::new("Authorization", "Bearer not-a-real-jwt"))
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn missing_authorization_header_is_unauthorized() {
    let client = test_client();
    let res = client.get("/unread").dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}
