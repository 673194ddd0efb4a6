use platform_core::config::LoggerConfig;

#[rocket::main]
async fn main() {
    let logger = LoggerConfig::from_env("MESSAGE_HUB");
    platform_core::logging::init(&logger.level);

    if let Err(e) = message_hub::rocket().launch().await {
        tracing::error!(error = %e, "message-hub exited with error");
        std::process::exit(1);
    }
}
