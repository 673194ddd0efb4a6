pub mod attachment_client;
pub mod db;
pub mod events;
pub mod hub;
pub mod models;
pub mod presence;
pub mod rate_limit;
pub mod retention;
pub mod routes;
pub mod session;
pub mod typing;
pub mod webhooks;

use std::env;
use std::sync::Arc;

use platform_core::auth::JwtVerifier;
use platform_core::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use platform_core::config::{DatabaseConfig, JwtConfig, SecurityConfig, ServerConfig};
use platform_core::registry_client::{RegisterRequest, RegistryClient};
use rocket_cors::CorsOptions;

use attachment_client::AttachmentClient;
use db::Db;
use hub::Hub;
use presence::PresenceTracker;
use rate_limit::{RateLimitConfig, RateLimiter};
use typing::TypingTracker;

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    let db_config = DatabaseConfig::from_env("MESSAGE_HUB", "data/message-hub.db");
    build_rocket(&db_config.path)
}

pub fn rocket_with_db(db_path: &str) -> rocket::Rocket<rocket::Build> {
    build_rocket(db_path)
}

fn build_rocket(db_path: &str) -> rocket::Rocket<rocket::Build> {
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let jwt_config = JwtConfig::from_env("MESSAGE_HUB");
    let security_config = SecurityConfig::from_env("MESSAGE_HUB");
    let rate_limit_config = RateLimitConfig::from_env();

    let db = Db::new(db_path);
    let hub = Arc::new(Hub::new());
    let presence_tracker = Arc::new(PresenceTracker::default());
    let typing_tracker = Arc::new(TypingTracker::default());
    let jwt_verifier = Arc::new(JwtVerifier::new(
        jwt_config.secret.clone(),
        jwt_config.issuer.clone(),
        jwt_config.audience.clone(),
    ));

    let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default()));
    let attachment_store_url =
        env::var("ATTACHMENT_STORE_URL").unwrap_or_else(|_| "http://localhost:9002".to_string());
    let attachment_client = Arc::new(AttachmentClient::new(attachment_store_url, breakers.clone()));

    // Subscribed before Rocket takes ownership of the hub's event bus, so no
    // event published during liftoff is missed.
    let webhook_receiver = hub.events.sender.subscribe();
    let webhook_db_path = db_path.to_string();
    let retention_db_path = db_path.to_string();

    let cors = CorsOptions::default().to_cors().expect("failed to create CORS");
    let figment = rocket::Config::figment()
        .merge(("limits.json", security_config.max_message_size.max(1_000_000)));

    let registry_base_url =
        env::var("SERVICE_REGISTRY_URL").unwrap_or_else(|_| "http://localhost:9000".to_string());
    let registry_client = Arc::new(RegistryClient::new(registry_base_url, breakers.clone()));
    let server_config = ServerConfig::from_env("MESSAGE_HUB");

    rocket::custom(figment)
        .manage(db)
        .manage(hub)
        .manage(presence_tracker)
        .manage(typing_tracker)
        .manage(jwt_verifier)
        .manage(attachment_client)
        .manage(breakers)
        .manage(rate_limit_config)
        .manage(RateLimiter::new())
        .attach(cors)
        .register("/", rocket::catchers![routes::too_many_requests, routes::not_found])
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::stats,
                routes::run_retention_now,
                routes::create_room,
                routes::find_or_create_direct_room,
                routes::list_rooms,
                routes::get_room,
                routes::update_room,
                routes::archive_room,
                routes::unarchive_room,
                routes::delete_room,
                routes::send_message,
                routes::get_messages,
                routes::edit_message,
                routes::get_edit_history,
                routes::delete_message,
                routes::pin_message,
                routes::unpin_message,
                routes::get_thread,
                routes::add_reaction,
                routes::remove_reaction,
                routes::get_reactions,
                routes::get_room_reactions,
                routes::update_read_position,
                routes::get_read_positions,
                routes::get_unread,
                routes::join_room,
                routes::room_participants,
                routes::search_messages,
                routes::create_webhook,
                routes::list_webhooks,
                routes::update_webhook,
                routes::delete_webhook,
                routes::create_incoming_webhook,
                routes::list_incoming_webhooks,
                routes::update_incoming_webhook,
                routes::delete_incoming_webhook,
                routes::post_via_hook,
                session::ws_connect,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff("Webhook Dispatcher", move |_rocket| {
            Box::pin(async move {
                webhooks::spawn_dispatcher(webhook_receiver, webhook_db_path);
                tracing::info!("webhook dispatcher started");
            })
        }))
        .attach(rocket::fairing::AdHoc::on_liftoff("Message Retention", move |_rocket| {
            Box::pin(async move {
                retention::spawn_retention_task(retention_db_path);
                tracing::info!("message retention task started");
            })
        }))
        .attach(rocket::fairing::AdHoc::on_liftoff("Typing Sweeper", |rocket| {
            let tracker = rocket
                .state::<Arc<TypingTracker>>()
                .expect("typing tracker not managed")
                .clone();
            Box::pin(async move {
                typing::spawn_sweeper(tracker);
                tracing::info!("typing sweeper started");
            })
        }))
        .attach(rocket::fairing::AdHoc::on_liftoff("Service Registration", move |rocket| {
            Box::pin(async move {
                let port = rocket.config().port;
                let address = server_config.address.clone();
                let req = RegisterRequest {
                    name: "message-hub".to_string(),
                    address: address.clone(),
                    port,
                    tags: vec!["messaging".to_string(), "websocket".to_string()],
                    metadata: std::collections::HashMap::new(),
                    health_url: format!("http://{address}:{port}/health"),
                    supports_rotation: true,
                };
                match registry_client.register(&req).await {
                    Ok(id) => tracing::info!(instance_id = %id, "registered with service registry"),
                    Err(e) => tracing::warn!(error = %e, "failed to register with service registry"),
                }
            })
        }))
}
