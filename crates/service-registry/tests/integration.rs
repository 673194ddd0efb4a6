use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;

fn client() -> Client {
    Client::tracked(service_registry::rocket()).expect("valid rocket instance")
}

fn register(client: &Client, name: &str, port: u16) -> serde_json::Value {
    let res = client
        .post("/services/register")
        .header(ContentType::JSON)
        .body(format!(
            r#"{{"name": "{name}", "address": "127.0.0.1", "port": {port}, "health_url": "http://127.0.0.1:{port}/health", "tags": ["v1"]}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    res.into_json().unwrap()
}

#[test]
fn register_then_discover_excludes_unhealthy_instance() {
    let client = client();
    register(&client, "widget-service", 19001);

    let res = client.get("/services/widget-service").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: Vec<serde_json::Value> = res.into_json().unwrap();
    assert!(body.is_empty(), "newly registered instance starts as registering, not discoverable yet");
}

#[test]
fn register_rejects_missing_health_url() {
    let client = client();
    let res = client
        .post("/services/register")
        .header(ContentType::JSON)
        .body(r#"{"name": "x", "address": "127.0.0.1", "port": 19010, "health_url": ""}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn register_conflicts_on_duplicate_port() {
    let client = client();
    register(&client, "svc-a", 19020);
    let res = client
        .post("/services/register")
        .header(ContentType::JSON)
        .body(r#"{"name": "svc-a", "address": "127.0.0.1", "port": 19020, "health_url": "http://127.0.0.1:19020/health"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Conflict);
}

#[test]
fn decommission_removes_instance_from_discovery() {
    let client = client();
    let registered = register(&client, "svc-b", 19030);
    let id = registered["id"].as_str().unwrap();

    let res = client.post(format!("/services/{id}/decommission")).dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get(format!("/services/{id}/health")).dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn rotate_marks_instance_decommissioning() {
    let client = client();
    let registered = register(&client, "svc-c", 19040);
    let id = registered["id"].as_str().unwrap();

    let res = client.post(format!("/services/{id}/rotate")).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "decommissioning");
}

#[test]
fn heartbeat_increments_request_count() {
    let client = client();
    let registered = register(&client, "svc-d", 19050);
    let id = registered["id"].as_str().unwrap();

    for _ in 0..3 {
        let res = client.post(format!("/services/{id}/heartbeat")).dispatch();
        assert_eq!(res.status(), Status::Ok);
    }
}

#[test]
fn discover_filtered_matches_tags_and_metadata() {
    let client = client();
    let res = client
        .post("/services/register")
        .header(ContentType::JSON)
        .body(r#"{"name": "svc-e", "address": "127.0.0.1", "port": 19060, "health_url": "http://127.0.0.1:19060/health", "tags": ["prod", "eu"], "metadata": {"region": "eu-west"}}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    let id = body["id"].as_str().unwrap();

    let res = client.post(format!("/services/{id}/health")).header(ContentType::JSON).body("true").dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/services/discover")
        .header(ContentType::JSON)
        .body(r#"{"name": "svc-e", "tags": ["prod"], "metadata": {"region": "eu-west"}}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let results: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(results.len(), 1);

    let res = client
        .post("/services/discover")
        .header(ContentType::JSON)
        .body(r#"{"name": "svc-e", "tags": ["prod"], "metadata": {"region": "us-east"}}"#)
        .dispatch();
    let results: Vec<serde_json::Value> = res.into_json().unwrap();
    assert!(results.is_empty());
}

#[test]
fn stats_reports_instance_counts() {
    let client = client();
    register(&client, "svc-f", 19070);

    let res = client.get("/stats").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["by_status"]["registering"], 1);
}
