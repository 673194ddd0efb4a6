use rocket::local::asynchronous::Client;

/// Wrapper around Client that auto-deletes the temp DB on drop.
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

pub async fn test_client() -> TestClient {
    let db_path = format!(
        "/tmp/attachment_store_test_{}.db",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    );
    let rocket = attachment_store::rocket_with_db(&db_path).await;
    let client = Client::tracked(rocket).await.expect("valid rocket instance");
    TestClient { client: Some(client), db_path }
}

/// Mints a bearer token accepted by the default dev JWT verifier
/// (`JwtConfig::from_env` falls back to `dev-secret-change-me` /
/// `platform-auth` when no env vars are set, matching what
/// `rocket_with_db` builds in tests).
pub fn bearer_token(user_id: &str) -> String {
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
        sub: user_id.to_string(),
        username: user_id.to_string(),
        user_id: uuid::Uuid::new_v4(),
        role: "member".to_string(),
        permissions: vec![],
        exp: now + 3600,
        iat: now,
        iss: "platform-auth".to_string(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"dev-secret-change-me")).unwrap()
}

pub fn auth_header(user_id: &str) -> rocket::http::Header<'static> {
    rocket::http::Header::new("Authorization", format!("Bearer {}", bearer_token(user_id)))
}

pub const BOUNDARY: &str = "attachment-store-test-boundary";

/// Hand-builds a `multipart/form-data` body matching `UploadForm`'s fields,
/// since the ingest endpoint takes a real multipart upload rather than a
/// JSON body. `filename` is used both as the `filename` field and as the
/// file part's own `filename=` attribute.
pub fn multipart_body(entity_type: &str, entity_id: &str, filename: &str, content_type: &str, content: &str) -> String {
    let mut body = String::new();
    for (name, value) in [("entity_type", entity_type), ("entity_id", entity_id), ("filename", filename), ("content_type", content_type)] {
        body.push_str(&format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n{content}\r\n"
    ));
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

pub fn multipart_content_type_header() -> rocket::http::Header<'static> {
    rocket::http::Header::new("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}"))
}

/// Uploads a reference as `uploader` and returns the parsed JSON response.
pub async fn upload_test_file(
    client: &Client,
    uploader: &str,
    filename: &str,
    content: &str,
) -> serde_json::Value {
    use rocket::http::Status;
    let body = multipart_body("task", "task-1", filename, "text/plain", content);
    let res = client
        .post("/attachments")
        .header(multipart_content_type_header())
        .header(auth_header(uploader))
        .body(body)
        .dispatch()
        .await;
    assert_eq!(res.status(), Status::Ok);
    res.into_json().await.unwrap()
}
