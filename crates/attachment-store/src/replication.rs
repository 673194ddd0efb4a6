use std::sync::Arc;

use bytes::Bytes;
use platform_core::circuit_breaker::CircuitBreakerRegistry;
use platform_core::error::AppError;
use tokio::sync::Semaphore;

use crate::models::EndpointRole;
use crate::storage::StorageAdapter;

/// A configured, live storage endpoint: its adapter plus the routing
/// metadata (`role`, `priority`) the replication and retrieve paths need.
#[derive(Clone)]
pub struct EndpointHandle {
    pub id: String,
    pub role: EndpointRole,
    pub priority: i64,
    pub adapter: Arc<dyn StorageAdapter>,
}

/// Fans a single ingested blob out to every configured endpoint. The
/// primary write happens inline with the ingest request; backup and
/// mirror writes are dispatched onto a bounded background pool so a slow
/// replica never adds latency to an upload. Each endpoint gets its own
/// circuit breaker so one unhealthy replica doesn't stall the others.
pub struct ReplicationManager {
    endpoints: Vec<EndpointHandle>,
    breakers: Arc<CircuitBreakerRegistry>,
    semaphore: Arc<Semaphore>,
}

impl ReplicationManager {
    pub fn new(endpoints: Vec<EndpointHandle>, breakers: Arc<CircuitBreakerRegistry>, max_concurrent: usize) -> Self {
        ReplicationManager { endpoints, breakers, semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))) }
    }

    pub fn primary(&self) -> Option<&EndpointHandle> {
        self.endpoints
            .iter()
            .filter(|e| e.role == EndpointRole::Primary && e.adapter_enabled())
            .min_by_key(|e| e.priority)
    }

    fn failover_order(&self) -> Vec<&EndpointHandle> {
        let mut ordered: Vec<&EndpointHandle> = self.endpoints.iter().collect();
        ordered.sort_by_key(|e| (role_rank(e.role), e.priority));
        ordered
    }

    /// Writes to the primary endpoint synchronously; caller awaits this
    /// directly since a failed primary write means the ingest fails.
    pub async fn store_primary(&self, hash: &str, bytes: Bytes) -> Result<(String, String), AppError> {
        let primary = self
            .primary()
            .ok_or_else(|| AppError::ServiceUnavailable("no enabled primary storage endpoint".to_string()))?;
        let endpoint_id = primary.id.clone();
        let adapter = primary.adapter.clone();
        let path = self
            .breakers
            .call(&endpoint_id, || {
                let adapter = adapter.clone();
                let bytes = bytes.clone();
                let hash = hash.to_string();
                async move { adapter.store(&hash, bytes).await }
            })
            .await
            .map_err(|_| AppError::ServiceUnavailable(format!("primary storage endpoint {endpoint_id} unavailable")))?;
        Ok((endpoint_id, path))
    }

    /// Dispatches backup/mirror writes onto the bounded pool. Fire-and-forget:
    /// failures are logged, not propagated — an ingest already succeeded once
    /// the primary write landed.
    pub fn spawn_replication(&self, hash: String, bytes: Bytes) {
        for endpoint in self.endpoints.iter().filter(|e| e.role != EndpointRole::Primary) {
            let endpoint = endpoint.clone();
            let breakers = self.breakers.clone();
            let semaphore = self.semaphore.clone();
            let hash = hash.clone();
            let bytes = bytes.clone();
            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                let adapter = endpoint.adapter.clone();
                let result = breakers
                    .call(&endpoint.id, || {
                        let adapter = adapter.clone();
                        let bytes = bytes.clone();
                        let hash = hash.clone();
                        async move { adapter.store(&hash, bytes).await }
                    })
                    .await;
                match result {
                    Ok(_) => tracing::debug!(endpoint = %endpoint.id, hash = %hash, "replicated to endpoint"),
                    Err(e) => tracing::warn!(endpoint = %endpoint.id, hash = %hash, error = %e, "replication failed"),
                }
            });
        }
    }

    /// Retrieves bytes for `path`, trying endpoints in primary -> backup ->
    /// mirror order (then priority within a role) until one succeeds.
    pub async fn retrieve(&self, path: &str) -> Result<Bytes, AppError> {
        let mut last_err = AppError::NotFound(format!("object {path} not found on any endpoint"));
        for endpoint in self.failover_order() {
            if !endpoint.adapter_enabled() {
                continue;
            }
            let adapter = endpoint.adapter.clone();
            let path_owned = path.to_string();
            let result = self
                .breakers
                .call(&endpoint.id, || {
                    let adapter = adapter.clone();
                    let path = path_owned.clone();
                    async move { adapter.retrieve(&path).await }
                })
                .await;
            match result {
                Ok(bytes) => return Ok(bytes),
                Err(e) => last_err = AppError::ServiceUnavailable(e.to_string()),
            }
        }
        Err(last_err)
    }

    pub fn endpoints(&self) -> &[EndpointHandle] {
        &self.endpoints
    }

    /// Deletes `path` from every endpoint. Used by GC once a physical file
    /// is confirmed orphaned; best-effort per endpoint, returns an error
    /// only if every endpoint's delete failed.
    pub async fn delete_everywhere(&self, path: &str) -> Result<(), AppError> {
        let mut any_ok = false;
        let mut last_err = None;
        for endpoint in &self.endpoints {
            let adapter = endpoint.adapter.clone();
            let path_owned = path.to_string();
            let result = self
                .breakers
                .call(&endpoint.id, || {
                    let adapter = adapter.clone();
                    let path = path_owned.clone();
                    async move { adapter.delete(&path).await }
                })
                .await;
            match result {
                Ok(()) => any_ok = true,
                Err(e) => last_err = Some(e.to_string()),
            }
        }
        if any_ok || self.endpoints.is_empty() {
            Ok(())
        } else {
            Err(AppError::ServiceUnavailable(last_err.unwrap_or_else(|| "no endpoints".to_string())))
        }
    }
}

impl EndpointHandle {
    // Endpoints are only constructed for rows that are enabled at load time;
    // this always returns true today but keeps the call site stable once
    // live-disable (without a restart) is wired up.
    fn adapter_enabled(&self) -> bool {
        true
    }
}

fn role_rank(role: EndpointRole) -> u8 {
    match role {
        EndpointRole::Primary => 0,
        EndpointRole::Backup => 1,
        EndpointRole::Mirror => 2,
    }
}
