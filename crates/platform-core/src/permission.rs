use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    subject: String,
    action: String,
    resource: String,
    resource_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub allow: bool,
    pub reason: Option<String>,
}

struct CacheEntry {
    decision: PermissionDecision,
    inserted_at: Instant,
}

/// Client for the permission collaborator. Caches decisions in-memory
/// keyed by `(subject, action, resource, resource_id)` with a TTL capped at
/// 60s, per spec.
pub struct PermissionClient {
    base_url: String,
    http: reqwest::Client,
    cache: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl PermissionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        PermissionClient {
            base_url: base_url.into(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("failed to build permission client"),
            cache: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(60),
        }
    }

    pub async fn check(
        &self,
        subject: &str,
        action: &str,
        resource: &str,
        resource_id: Option<&str>,
    ) -> Result<PermissionDecision, AppError> {
        let key = CacheKey {
            subject: subject.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
            resource_id: resource_id.map(str::to_string),
        };

        if let Some(decision) = self.cached(&key) {
            return Ok(decision);
        }

        let url = format!("{}/permissions/check", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "subject": subject,
                "action": action,
                "resource": resource,
                "resource_id": resource_id,
            }))
            .send()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("permission service: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::ServiceUnavailable(format!(
                "permission service returned {}",
                resp.status()
            )));
        }

        let decision: PermissionDecision = resp
            .json()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("permission service: {e}")))?;

        self.store(key, decision.clone());
        Ok(decision)
    }

    fn cached(&self, key: &CacheKey) -> Option<PermissionDecision> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(key).and_then(|entry| {
            if entry.inserted_at.elapsed() < self.ttl {
                Some(entry.decision.clone())
            } else {
                None
            }
        })
    }

    fn store(&self, key: CacheKey, decision: PermissionDecision) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(
            key,
            CacheEntry {
                decision,
                inserted_at: Instant::now(),
            },
        );
        // Opportunistic eviction so the map doesn't grow unbounded.
        cache.retain(|_, v| v.inserted_at.elapsed() < self.ttl * 4);
    }
}
