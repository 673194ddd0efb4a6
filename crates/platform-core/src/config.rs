use std::env;

/// `server` configuration group shared by all three services (spec.md §9).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub port_range: (u16, u16),
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl ServerConfig {
    pub fn from_env(prefix: &str) -> Self {
        ServerConfig {
            address: env_var(prefix, "ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port_range: (
                env_var(prefix, "PORT_RANGE_MIN")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(9000),
                env_var(prefix, "PORT_RANGE_MAX")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(9100),
            ),
            read_timeout_secs: env_var(prefix, "READ_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            write_timeout_secs: env_var(prefix, "WRITE_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

/// `database` configuration group.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: usize,
}

impl DatabaseConfig {
    pub fn from_env(prefix: &str, default_path: &str) -> Self {
        DatabaseConfig {
            path: env_var(prefix, "DATABASE_PATH").unwrap_or_else(|| default_path.to_string()),
            pool_size: env_var(prefix, "DATABASE_POOL_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
        }
    }
}

/// `jwt` configuration group — verification parameters only; none of the
/// core services issue tokens.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: Option<String>,
    pub expiry_secs: i64,
}

impl JwtConfig {
    pub fn from_env(prefix: &str) -> Self {
        JwtConfig {
            secret: env_var(prefix, "JWT_SECRET").unwrap_or_else(|| "dev-secret-change-me".to_string()),
            issuer: env_var(prefix, "JWT_ISSUER").unwrap_or_else(|| "platform-auth".to_string()),
            audience: env_var(prefix, "JWT_AUDIENCE"),
            expiry_secs: env_var(prefix, "JWT_EXPIRY_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        }
    }
}

/// `security` configuration group.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub rate_limit_per_minute: usize,
    pub max_message_size: usize,
    pub max_attachment_size: u64,
    pub allowed_origins: Vec<String>,
}

impl SecurityConfig {
    pub fn from_env(prefix: &str) -> Self {
        SecurityConfig {
            rate_limit_per_minute: env_var(prefix, "RATE_LIMIT_PER_MINUTE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            max_message_size: env_var(prefix, "MAX_MESSAGE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(16_000),
            max_attachment_size: env_var(prefix, "MAX_ATTACHMENT_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5 * 1024 * 1024),
            allowed_origins: env_var(prefix, "ALLOWED_ORIGINS")
                .map(|v| v.split(',').map(str::trim).map(String::from).collect())
                .unwrap_or_default(),
        }
    }
}

/// `logger` configuration group.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub level: String,
}

impl LoggerConfig {
    pub fn from_env(prefix: &str) -> Self {
        LoggerConfig {
            level: env_var(prefix, "LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }
}

fn env_var(prefix: &str, suffix: &str) -> Option<String> {
    env::var(format!("{prefix}_{suffix}")).ok().filter(|v| !v.is_empty())
}
