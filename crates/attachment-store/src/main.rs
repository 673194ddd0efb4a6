use platform_core::config::LoggerConfig;

#[rocket::main]
async fn main() {
    let logger = LoggerConfig::from_env("ATTACHMENT_STORE");
    platform_core::logging::init(&logger.level);

    if let Err(e) = attachment_store::rocket().await.launch().await {
        tracing::error!(error = %e, "attachment-store exited with error");
        std::process::exit(1);
    }
}
