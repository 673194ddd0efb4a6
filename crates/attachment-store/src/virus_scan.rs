use async_trait::async_trait;

use crate::models::VirusScanStatus;

/// Pluggable virus scanning backend. `NoopScanner` is the default (every
/// file comes back clean immediately); `ClamavScanner` talks to a clamd
/// TCP/HTTP bridge when one is configured.
#[async_trait]
pub trait VirusScanner: Send + Sync {
    async fn scan(&self, hash: &str, bytes: &[u8]) -> VirusScanStatus;

    fn name(&self) -> &'static str;
}

/// Always reports clean. Used when no scanner endpoint is configured —
/// ingestion still goes through the pending -> clean transition so callers
/// never depend on scanning being active.
pub struct NoopScanner;

#[async_trait]
impl VirusScanner for NoopScanner {
    async fn scan(&self, _hash: &str, _bytes: &[u8]) -> VirusScanStatus {
        VirusScanStatus::Clean
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Talks to a clamd-compatible scanner over its HTTP bridge (e.g.
/// clamav-rest). Marks `Failed` rather than `Infected` on any transport
/// error so a scanner outage never silently passes a file as clean.
pub struct ClamavScanner {
    endpoint: String,
    http: reqwest::Client,
}

impl ClamavScanner {
    pub fn new(endpoint: impl Into<String>) -> Self {
        ClamavScanner {
            endpoint: endpoint.into(),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("failed to build clamav scanner client"),
        }
    }
}

#[async_trait]
impl VirusScanner for ClamavScanner {
    async fn scan(&self, hash: &str, bytes: &[u8]) -> VirusScanStatus {
        let url = format!("{}/scan", self.endpoint);
        let resp = match self.http.post(&url).body(bytes.to_vec()).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(hash = %hash, error = %e, "virus scan request failed");
                return VirusScanStatus::Failed;
            }
        };

        if !resp.status().is_success() {
            tracing::warn!(hash = %hash, status = %resp.status(), "virus scanner returned error status");
            return VirusScanStatus::Failed;
        }

        match resp.json::<ClamavVerdict>().await {
            Ok(v) if v.infected => VirusScanStatus::Infected,
            Ok(_) => VirusScanStatus::Clean,
            Err(e) => {
                tracing::warn!(hash = %hash, error = %e, "malformed virus scanner response");
                VirusScanStatus::Failed
            }
        }
    }

    fn name(&self) -> &'static str {
        "clamav"
    }
}

#[derive(serde::Deserialize)]
struct ClamavVerdict {
    infected: bool,
}
