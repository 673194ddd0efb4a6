use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client;
use bytes::Bytes;
use platform_core::error::AppError;

use super::{Capacity, S3Adapter, StorageAdapter};

/// MinIO speaks the S3 API, so this is the same client as `S3Adapter` with
/// a fixed endpoint and forced path-style addressing (MinIO doesn't do
/// virtual-hosted buckets by default). Kept as a distinct type so
/// `StorageEndpoint::endpoint_type` round-trips and boot-time wiring reads
/// cleanly, but all request logic delegates to the inner adapter.
pub struct MinioAdapter {
    inner: S3Adapter,
}

impl MinioAdapter {
    pub fn new(
        endpoint_url: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
    ) -> Self {
        let creds = Credentials::new(access_key.into(), secret_key.into(), None, None, "minio-static");
        let config = aws_sdk_s3::Config::builder()
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint_url.into())
            .credentials_provider(creds)
            .force_path_style(true)
            .build();
        let client = Client::from_conf(config);
        MinioAdapter { inner: S3Adapter::with_client(client, bucket, prefix) }
    }
}

#[async_trait]
impl StorageAdapter for MinioAdapter {
    async fn store(&self, hash: &str, bytes: Bytes) -> Result<String, AppError> {
        self.inner.store(hash, bytes).await
    }

    async fn retrieve(&self, path: &str) -> Result<Bytes, AppError> {
        self.inner.retrieve(path).await
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        self.inner.delete(path).await
    }

    async fn exists(&self, path: &str) -> Result<bool, AppError> {
        self.inner.exists(path).await
    }

    async fn size(&self, path: &str) -> Result<u64, AppError> {
        self.inner.size(path).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.inner.ping().await
    }

    async fn capacity(&self) -> Result<Capacity, AppError> {
        self.inner.capacity().await
    }

    fn type_name(&self) -> &'static str {
        "minio"
    }
}
