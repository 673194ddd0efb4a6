use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use platform_core::error::AppError;

use super::{sharded_key, Capacity, StorageAdapter};

/// S3-backed adapter. `endpoint_url` is `None` for real AWS S3; set for
/// S3-compatible services (see `MinioAdapter`, which wraps this with a
/// required endpoint and path-style addressing).
pub struct S3Adapter {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Adapter {
    pub async fn new(bucket: impl Into<String>, prefix: Option<String>) -> Self {
        let config = aws_config::load_from_env().await;
        let client = Client::new(&config);
        S3Adapter { client, bucket: bucket.into(), prefix }
    }

    pub fn with_client(client: Client, bucket: impl Into<String>, prefix: Option<String>) -> Self {
        S3Adapter { client, bucket: bucket.into(), prefix }
    }

    fn key_for(&self, path: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), path),
            None => path.to_string(),
        }
    }
}

#[async_trait]
impl StorageAdapter for S3Adapter {
    async fn store(&self, hash: &str, bytes: Bytes) -> Result<String, AppError> {
        let rel = sharded_key(hash);
        let key = self.key_for(&rel);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("s3 put_object failed: {e}")))?;
        Ok(rel)
    }

    async fn retrieve(&self, path: &str) -> Result<Bytes, AppError> {
        let key = self.key_for(path);
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|_| AppError::NotFound(format!("object {path} not found in s3")))?;
        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("s3 body read failed: {e}")))?;
        Ok(data.into_bytes())
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        let key = self.key_for(path);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("s3 delete_object failed: {e}")))?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, AppError> {
        let key = self.key_for(path);
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    async fn size(&self, path: &str) -> Result<u64, AppError> {
        let key = self.key_for(path);
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|_| AppError::NotFound(format!("object {path} not found in s3")))?;
        Ok(resp.content_length().unwrap_or(0).max(0) as u64)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("s3 bucket unreachable: {e}")))?;
        Ok(())
    }

    async fn capacity(&self) -> Result<Capacity, AppError> {
        // Object storage has no fixed capacity; quotas are enforced at the
        // application layer instead.
        Ok(Capacity { total: u64::MAX, used: 0, available: u64::MAX })
    }

    fn type_name(&self) -> &'static str {
        "s3"
    }
}
