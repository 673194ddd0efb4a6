use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub health_url: String,
    pub supports_rotation: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEndpoint {
    pub id: String,
    pub address: String,
    pub port: u16,
    pub health: String,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
}

/// Client used by the message hub and attachment store to register
/// themselves with the service registry, discover peers, and route every
/// outbound inter-service call through a per-target circuit breaker.
pub struct RegistryClient {
    base_url: String,
    http: reqwest::Client,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        RegistryClient {
            base_url: base_url.into(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build registry client"),
            breakers,
        }
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<String, AppError> {
        let url = format!("{}/services/register", self.base_url);
        let target = "service-registry";
        let resp = self
            .breakers
            .call(target, || async {
                self.http.post(&url).json(req).send().await
            })
            .await
            .map_err(|_| AppError::ServiceUnavailable("service-registry unreachable".to_string()))?;

        if !resp.status().is_success() {
            return Err(AppError::ServiceUnavailable(format!(
                "registration rejected: {}",
                resp.status()
            )));
        }
        let body: RegisterResponse = resp
            .json()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("bad registration response: {e}")))?;
        Ok(body.id)
    }

    pub async fn discover(&self, name: &str) -> Result<Vec<ServiceEndpoint>, AppError> {
        let url = format!("{}/services/{}", self.base_url, name);
        let target = "service-registry";
        let resp = self
            .breakers
            .call(target, || async { self.http.get(&url).send().await })
            .await
            .map_err(|_| AppError::ServiceUnavailable("service-registry unreachable".to_string()))?;
        resp.json()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("bad discover response: {e}")))
    }

    pub async fn decommission(&self, instance_id: &str) -> Result<(), AppError> {
        let url = format!("{}/services/{}/decommission", self.base_url, instance_id);
        self.breakers
            .call("service-registry", || async { self.http.post(&url).send().await })
            .await
            .map_err(|_| AppError::ServiceUnavailable("service-registry unreachable".to_string()))?;
        Ok(())
    }
}
