use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VirusScanStatus {
    Pending,
    Clean,
    Infected,
    Failed,
    Skipped,
}

impl VirusScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VirusScanStatus::Pending => "pending",
            VirusScanStatus::Clean => "clean",
            VirusScanStatus::Infected => "infected",
            VirusScanStatus::Failed => "failed",
            VirusScanStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "clean" => VirusScanStatus::Clean,
            "infected" => VirusScanStatus::Infected,
            "failed" => VirusScanStatus::Failed,
            "skipped" => VirusScanStatus::Skipped,
            _ => VirusScanStatus::Pending,
        }
    }
}

/// A unique blob of bytes, keyed by its SHA-256 digest. Many `Reference`s
/// may point at one `PhysicalFile`; the bytes are stored once.
#[derive(Debug, Clone, Serialize)]
pub struct PhysicalFile {
    pub hash: String,
    pub size: i64,
    pub mime_type: String,
    pub extension: Option<String>,
    pub ref_count: i64,
    pub primary_path: String,
    pub backup_path: Option<String>,
    pub mirror_path: Option<String>,
    pub virus_scan_status: VirusScanStatus,
    pub created_at: String,
    pub last_accessed: String,
    pub deleted: bool,
}

/// A named, user-facing pointer at a `PhysicalFile`. What callers upload
/// and delete; what quotas are billed against.
#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    pub id: String,
    pub file_hash: String,
    pub entity_type: String,
    pub entity_id: String,
    pub filename: String,
    pub description: Option<String>,
    pub uploader_id: String,
    pub version: i64,
    pub tags: Vec<String>,
    pub created_at: String,
    pub deleted: bool,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceInfo {
    pub reference_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointType {
    Local,
    S3,
    Minio,
    Azure,
    Gcs,
    Custom,
}

impl EndpointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointType::Local => "local",
            EndpointType::S3 => "s3",
            EndpointType::Minio => "minio",
            EndpointType::Azure => "azure",
            EndpointType::Gcs => "gcs",
            EndpointType::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "s3" => EndpointType::S3,
            "minio" => EndpointType::Minio,
            "azure" => EndpointType::Azure,
            "gcs" => EndpointType::Gcs,
            "custom" => EndpointType::Custom,
            _ => EndpointType::Local,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRole {
    Primary,
    Backup,
    Mirror,
}

impl EndpointRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointRole::Primary => "primary",
            EndpointRole::Backup => "backup",
            EndpointRole::Mirror => "mirror",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "backup" => EndpointRole::Backup,
            "mirror" => EndpointRole::Mirror,
            _ => EndpointRole::Primary,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageEndpoint {
    pub id: String,
    pub name: String,
    pub endpoint_type: EndpointType,
    pub role: EndpointRole,
    pub adapter_config: serde_json::Value,
    pub priority: i64,
    pub enabled: bool,
    pub max_size: Option<i64>,
    pub current_size: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "degraded" => HealthStatus::Degraded,
            "unhealthy" => HealthStatus::Unhealthy,
            _ => HealthStatus::Healthy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageHealth {
    pub endpoint_id: String,
    pub check_time: String,
    pub status: HealthStatus,
    pub latency_ms: i64,
    pub available_bytes: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Quota {
    pub user_id: String,
    pub max_bytes: i64,
    pub used_bytes: i64,
    pub max_files: i64,
    pub used_files: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresignedUrl {
    pub token: String,
    pub reference_id: String,
    pub expires_at: String,
    pub max_downloads: i64,
    pub download_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    pub id: String,
    pub reference_id: String,
    pub accessor: String,
    pub action: String,
    pub at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupJob {
    pub id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub orphans_deleted: i64,
    pub presigned_urls_expired: i64,
    pub health_rows_pruned: i64,
    pub items_deleted: i64,
}

// --- Wire DTOs ---

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub reference_id: String,
    pub hash: String,
    pub size: i64,
    pub mime_type: String,
    pub deduplicated: bool,
}

#[derive(Debug, Serialize)]
pub struct ReferenceMetadata {
    pub reference_id: String,
    pub hash: String,
    pub entity_type: String,
    pub entity_id: String,
    pub filename: String,
    pub description: Option<String>,
    pub uploader_id: String,
    pub version: i64,
    pub tags: Vec<String>,
    pub size: i64,
    #[serde(rename = "content_type")]
    pub mime_type: String,
    pub virus_scan_status: VirusScanStatus,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    #[serde(default = "default_share_expiry_secs")]
    pub expires_in_secs: i64,
    #[serde(default = "default_max_downloads")]
    pub max_downloads: i64,
}

fn default_share_expiry_secs() -> i64 {
    3600
}

fn default_max_downloads() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub token: String,
    pub url: String,
    pub expires_at: String,
    pub max_downloads: i64,
}
