use rocket::local::blocking::Client;

/// Wrapper around Client that auto-deletes the temp DB on drop.
/// Prevents /tmp file accumulation across test runs.
pub struct TestClient {
    client: Option<Client>,
    db_path: String,
}

impl Drop for TestClient {
    fn drop(&mut self) {
        drop(self.client.take());
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_path));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_path));
    }
}

impl std::ops::Deref for TestClient {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().unwrap()
    }
}

pub fn test_client() -> TestClient {
    let db_path = format!(
        "/tmp/message_hub_test_{}.db",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    );
    let rocket = message_hub::rocket_with_db(&db_path);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient { client: Some(client), db_path }
}

/// Mints a bearer token accepted by the default dev JWT verifier
/// (`JwtConfig::from_env` falls back to `dev-secret-change-me` /
/// `platform-auth` when no env vars are set, which is exactly the
/// configuration `rocket_with_db` builds in tests).
pub fn bearer_token(username: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        username: String,
        user_id: uuid::Uuid,
        role: String,
        permissions: Vec<String>,
        exp: i64,
        iat: i64,
        iss: String,
    }

    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: username.to_string(),
        username: username.to_string(),
        user_id: uuid::Uuid::new_v4(),
        role: "member".to_string(),
        permissions: vec![],
        exp: now + 3600,
        iat: now,
        iss: "platform-auth".to_string(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"dev-secret-change-me")).unwrap()
}

pub fn auth_header(username: &str) -> rocket::http::Header<'static> {
    rocket::http::Header::new("Authorization", format!("Bearer {}", bearer_token(username)))
}

/// Creates a room as `owner` and returns its id.
pub fn create_test_room(client: &Client, owner: &str, name: &str) -> String {
    use rocket::http::{ContentType, Status};
    let res = client
        .post("/rooms")
        .header(ContentType::JSON)
        .header(auth_header(owner))
        .body(format!(r#"{{"name": "{name}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    body["id"].as_str().unwrap().to_string()
}

/// Joins `sender` to `room_id` as a `Member`, idempotently. Tests that post
/// as someone other than the room's creator must call this first now that
/// sending requires an active participant.
pub fn join_test_room(client: &Client, room_id: &str, sender: &str) {
    use rocket::http::Status;
    let res = client.post(format!("/rooms/{room_id}/join")).header(auth_header(sender)).dispatch();
    assert_eq!(res.status(), Status::Ok);
}

/// Sends a message as `sender` and returns the response body. Joins `sender`
/// to the room first if they aren't already a participant.
pub fn send_test_message(client: &Client, room_id: &str, sender: &str, content: &str) -> serde_json::Value {
    use rocket::http::{ContentType, Status};
    join_test_room(client, room_id, sender);
    let res = client
        .post(format!("/rooms/{room_id}/messages"))
        .header(ContentType::JSON)
        .header(auth_header(sender))
        .body(format!(r#"{{"content": "{content}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    res.into_json().unwrap()
}
