pub mod db;
pub mod gc;
pub mod health;
pub mod models;
pub mod presigned;
pub mod quota;
pub mod replication;
pub mod routes;
pub mod storage;
pub mod virus_scan;

use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex};

use platform_core::auth::JwtVerifier;
use platform_core::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use platform_core::config::{DatabaseConfig, JwtConfig, SecurityConfig, ServerConfig};
use platform_core::registry_client::{RegisterRequest, RegistryClient};
use rocket_cors::CorsOptions;

use db::Db;
use gc::GcConfig;
use health::HealthMonitorConfig;
use models::EndpointRole;
use replication::{EndpointHandle, ReplicationManager};
use storage::{LocalAdapter, MinioAdapter, S3Adapter, StorageAdapter};
use virus_scan::{ClamavScanner, NoopScanner, VirusScanner};

pub async fn rocket() -> rocket::Rocket<rocket::Build> {
    let db_config = DatabaseConfig::from_env("ATTACHMENT_STORE", "data/attachment-store.db");
    build_rocket(&db_config.path).await
}

pub async fn rocket_with_db(db_path: &str) -> rocket::Rocket<rocket::Build> {
    build_rocket(db_path).await
}

async fn build_rocket(db_path: &str) -> rocket::Rocket<rocket::Build> {
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let jwt_config = JwtConfig::from_env("ATTACHMENT_STORE");
    let security_config = SecurityConfig::from_env("ATTACHMENT_STORE");
    let gc_config = GcConfig::from_env("ATTACHMENT_STORE");

    let db = Arc::new(Db::new(db_path));
    let jwt_verifier = JwtVerifier::new(jwt_config.secret.clone(), jwt_config.issuer.clone(), jwt_config.audience.clone());

    let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default()));

    let endpoints = build_endpoints().await;
    let replication = Arc::new(ReplicationManager::new(endpoints, breakers.clone(), 8));

    let scanner: Arc<dyn VirusScanner> = match env::var("ATTACHMENT_STORE_CLAMAV_URL") {
        Ok(url) => Arc::new(ClamavScanner::new(url)),
        Err(_) => Arc::new(NoopScanner),
    };

    let gc_db = db.clone();
    let health_db = db.clone();
    let gc_replication = replication.clone();
    let health_replication = replication.clone();
    let orphan_retention_days = gc_config.orphan_retention_days;

    let cors = CorsOptions::default().to_cors().expect("failed to create CORS");
    let attachment_limit = security_config.max_attachment_size.max(10_000_000);
    let figment = rocket::Config::figment()
        .merge(("limits.json", attachment_limit))
        .merge(("limits.file", attachment_limit))
        .merge(("limits.data-form", attachment_limit));

    let registry_base_url = env::var("SERVICE_REGISTRY_URL").unwrap_or_else(|_| "http://localhost:9000".to_string());
    let registry_client = Arc::new(RegistryClient::new(registry_base_url, breakers.clone()));
    let server_config = ServerConfig::from_env("ATTACHMENT_STORE");

    rocket::custom(figment)
        .manage(db)
        .manage(jwt_verifier)
        .manage(breakers)
        .manage(replication)
        .manage(scanner)
        .manage(security_config)
        .manage(gc_config)
        .attach(cors)
        .register("/", rocket::catchers![routes::too_many_requests, routes::not_found])
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::stats,
                routes::run_gc_now,
                routes::upload_reference,
                routes::get_reference,
                routes::list_references,
                routes::download_content,
                routes::delete_reference,
                routes::create_share,
                routes::download_shared,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff("Garbage Collector", move |_rocket| {
            Box::pin(async move {
                gc::spawn_gc_task(gc_db, gc_replication, orphan_retention_days);
                tracing::info!("attachment gc task started");
            })
        }))
        .attach(rocket::fairing::AdHoc::on_liftoff("Storage Health Monitor", move |_rocket| {
            Box::pin(async move {
                health::spawn_health_monitor(health_replication, health_db, HealthMonitorConfig::default());
                tracing::info!("storage health monitor started");
            })
        }))
        .attach(rocket::fairing::AdHoc::on_liftoff("Service Registration", move |rocket| {
            Box::pin(async move {
                let port = rocket.config().port;
                let address = server_config.address.clone();
                let req = RegisterRequest {
                    name: "attachment-store".to_string(),
                    address: address.clone(),
                    port,
                    tags: vec!["storage".to_string(), "attachments".to_string()],
                    metadata: HashMap::new(),
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

/// Builds the configured storage endpoints. A local primary is always
/// present (attachment-store needs somewhere to write even with no object
/// storage configured); backup/mirror endpoints are added when their env
/// vars are set.
async fn build_endpoints() -> Vec<EndpointHandle> {
    let mut endpoints = Vec::new();

    let local_dir = env::var("ATTACHMENT_STORE_LOCAL_DIR").unwrap_or_else(|_| "data/attachment-store/blobs".to_string());
    let primary: Arc<dyn StorageAdapter> = Arc::new(LocalAdapter::new(local_dir));
    endpoints.push(EndpointHandle {
        id: "local-primary".to_string(),
        role: EndpointRole::Primary,
        priority: 0,
        adapter: primary,
    });

    if let Ok(bucket) = env::var("ATTACHMENT_STORE_BACKUP_S3_BUCKET") {
        let prefix = env::var("ATTACHMENT_STORE_BACKUP_S3_PREFIX").ok();
        let adapter: Arc<dyn StorageAdapter> = Arc::new(S3Adapter::new(bucket, prefix).await);
        endpoints.push(EndpointHandle {
            id: "s3-backup".to_string(),
            role: EndpointRole::Backup,
            priority: 0,
            adapter,
        });
    }

    if let Ok(endpoint_url) = env::var("ATTACHMENT_STORE_MIRROR_MINIO_ENDPOINT") {
        let access_key = env::var("ATTACHMENT_STORE_MIRROR_MINIO_ACCESS_KEY").unwrap_or_default();
        let secret_key = env::var("ATTACHMENT_STORE_MIRROR_MINIO_SECRET_KEY").unwrap_or_default();
        let bucket = env::var("ATTACHMENT_STORE_MIRROR_MINIO_BUCKET").unwrap_or_else(|_| "attachments".to_string());
        let prefix = env::var("ATTACHMENT_STORE_MIRROR_MINIO_PREFIX").ok();
        let adapter: Arc<dyn StorageAdapter> = Arc::new(MinioAdapter::new(endpoint_url, access_key, secret_key, bucket, prefix));
        endpoints.push(EndpointHandle {
            id: "minio-mirror".to_string(),
            role: EndpointRole::Mirror,
            priority: 0,
            adapter,
        });
    }

    endpoints
}
