use std::sync::Arc;
use std::time::Duration;

use platform_core::circuit_breaker::CircuitBreakerRegistry;
use platform_core::error::AppError;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceInfo {
    pub reference_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
}

/// Client used to validate message attachments against the attachment
/// store before a message referencing them is persisted. Every call is
/// routed through a circuit breaker so a degraded attachment store
/// degrades message sends gracefully instead of hanging the hub.
pub struct AttachmentClient {
    base_url: String,
    http: reqwest::Client,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl AttachmentClient {
    pub fn new(base_url: impl Into<String>, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        AttachmentClient {
            base_url: base_url.into(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("failed to build attachment client"),
            breakers,
        }
    }

    /// Confirms `reference_id` exists and is not expired/deleted, returning
    /// its canonical metadata (used to populate the message's `Attachment`
    /// row even if the caller's claimed filename/size was stale).
    pub async fn resolve(&self, reference_id: &str) -> Result<ReferenceInfo, AppError> {
        let url = format!("{}/attachments/{}", self.base_url, reference_id);
        let target = "attachment-store";
        let resp = self
            .breakers
            .call(target, || async { self.http.get(&url).send().await })
            .await
            .map_err(|_| AppError::ServiceUnavailable("attachment-store unreachable".to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("attachment reference {reference_id} not found")));
        }
        if !resp.status().is_success() {
            return Err(AppError::ServiceUnavailable(format!(
                "attachment-store returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("bad attachment response: {e}")))
    }
}
