pub mod index;
pub mod models;
pub mod prober;
pub mod rotation;
pub mod routes;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use index::Registry;
use rocket_cors::CorsOptions;
use rotation::RotationConfig;

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    build_rocket()
}

fn build_rocket() -> rocket::Rocket<rocket::Build> {
    let registry = Arc::new(Registry::new());
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build prober http client");

    let prober_config = prober::ProberConfig::default();
    let rotation_config = RotationConfig {
        check_interval: env::var("ROTATION_CHECK_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(rotation::DEFAULT_CHECK_INTERVAL),
        drain_seconds: env::var("ROTATION_DRAIN_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30),
    };

    let cors = CorsOptions::default().to_cors().expect("failed to create CORS");

    rocket::build()
        .manage(registry.clone())
        .manage(rotation_config.clone())
        .attach(cors)
        .register("/", rocket::catchers![routes::not_found])
        .mount(
            "/",
            rocket::routes![
                routes::liveness,
                routes::stats,
                routes::register,
                routes::discover_by_name,
                routes::discover_filtered,
                routes::instance_health,
                routes::report_health,
                routes::rotate,
                routes::decommission,
                routes::heartbeat,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff("Health Prober", {
            let registry = registry.clone();
            move |_rocket| {
                Box::pin(async move {
                    prober::spawn(registry, http, prober_config);
                    tracing::info!("health prober started");
                })
            }
        }))
        .attach(rocket::fairing::AdHoc::on_liftoff("Rotation Controller", {
            let registry = registry.clone();
            move |_rocket| {
                Box::pin(async move {
                    rotation::spawn(registry, rotation_config);
                    tracing::info!("rotation controller started");
                })
            }
        }))
}
