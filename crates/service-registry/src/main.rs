use platform_core::config::LoggerConfig;

#[rocket::main]
async fn main() {
    let logger = LoggerConfig::from_env("SERVICE_REGISTRY");
    platform_core::logging::init(&logger.level);

    if let Err(e) = service_registry::rocket().launch().await {
        tracing::error!(error = %e, "service-registry exited with error");
        std::process::exit(1);
    }
}
