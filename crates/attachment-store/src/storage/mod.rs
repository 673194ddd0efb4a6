pub mod local;
pub mod minio;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use platform_core::error::AppError;

pub use local::LocalAdapter;
pub use minio::MinioAdapter;
pub use s3::S3Adapter;

/// Capacity snapshot for a storage endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Capacity {
    pub total: u64,
    pub used: u64,
    pub available: u64,
}

/// Closed set of storage backends (per the "small capability set" design
/// note): hash-addressed blob operations only, nothing filesystem-shaped
/// leaks through. Each variant holds its own credentials/client and is
/// selected at boot from `StorageEndpoint` configuration.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Writes `bytes` under the hash-sharded key for `hash`. Idempotent:
    /// calling twice with the same hash is a no-op on the second call.
    async fn store(&self, hash: &str, bytes: Bytes) -> Result<String, AppError>;

    async fn retrieve(&self, path: &str) -> Result<Bytes, AppError>;

    async fn delete(&self, path: &str) -> Result<(), AppError>;

    async fn exists(&self, path: &str) -> Result<bool, AppError>;

    async fn size(&self, path: &str) -> Result<u64, AppError>;

    async fn ping(&self) -> Result<(), AppError>;

    async fn capacity(&self) -> Result<Capacity, AppError>;

    fn type_name(&self) -> &'static str;
}

/// `ab/cd/abcd...` sharding from the first four hex characters of the
/// digest, bounding directory/prefix fan-out to 256 * 256 buckets.
pub fn sharded_key(hash: &str) -> String {
    if hash.len() < 4 {
        return hash.to_string();
    }
    format!("{}/{}/{}", &hash[0..2], &hash[2..4], hash)
}
