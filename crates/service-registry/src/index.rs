use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use arc_swap::ArcSwap;
use chrono::Utc;

use platform_core::error::AppError;

use crate::models::{DiscoverEntry, InstanceStatus, RegisterBody, ServiceInstance};

/// Immutable snapshot of the instance table. `discover` reads this without
/// taking any lock; writers build a new snapshot and publish it atomically.
#[derive(Default, Clone)]
pub struct InstanceIndex {
    instances: HashMap<String, ServiceInstance>,
}

impl InstanceIndex {
    fn with(&self, id: String, instance: ServiceInstance) -> Self {
        let mut instances = self.instances.clone();
        instances.insert(id, instance);
        InstanceIndex { instances }
    }

    fn without(&self, id: &str) -> Self {
        let mut instances = self.instances.clone();
        instances.remove(id);
        InstanceIndex { instances }
    }
}

/// The registry's authoritative instance table. `discover` is a lock-free
/// read over `snapshot`; all mutations go through `write_lock` to
/// serialize read-modify-write sequences before publishing a new snapshot.
pub struct Registry {
    snapshot: ArcSwap<InstanceIndex>,
    write_lock: Mutex<()>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            snapshot: ArcSwap::from_pointee(InstanceIndex::default()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn register(&self, req: RegisterBody) -> Result<ServiceInstance, AppError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.snapshot.load();

        let port = match req.port {
            Some(p) => {
                if self.port_taken(&current, &req.name, &req.address, p) {
                    return Err(AppError::Conflict(format!(
                        "port {p} already in use for {}@{}",
                        req.name, req.address
                    )));
                }
                p
            }
            None => {
                let (lo, hi) = req
                    .port_range
                    .ok_or_else(|| AppError::Validation("port or port_range required".to_string()))?;
                self.pick_port(&current, &req.name, &req.address, lo, hi)
                    .ok_or_else(|| {
                        AppError::Conflict(format!("no free port in range {lo}-{hi}"))
                    })?
            }
        };

        let now = Utc::now().to_rfc3339();
        let id = uuid::Uuid::new_v4().to_string();
        let instance = ServiceInstance {
            id: id.clone(),
            name: req.name,
            address: req.address,
            port,
            tags: req.tags.into_iter().collect::<HashSet<_>>(),
            supports_rotation: req.supports_rotation,
            metadata: req.metadata,
            health_check_url: req.health_url,
            registration_time: now.clone(),
            last_seen: now,
            status: InstanceStatus::Registering,
            max_age_secs: req.max_age_secs,
            max_requests: req.max_requests,
            request_count: 0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            critical_since: None,
            decommission_since: None,
            latency_ema_ms: 0.0,
        };

        let next = current.with(id, instance.clone());
        self.snapshot.store(std::sync::Arc::new(next));
        Ok(instance)
    }

    fn port_taken(&self, idx: &InstanceIndex, name: &str, address: &str, port: u16) -> bool {
        idx.instances.values().any(|i| {
            i.status != InstanceStatus::Gone
                && i.name == name
                && i.address == address
                && i.port == port
        })
    }

    fn pick_port(&self, idx: &InstanceIndex, name: &str, address: &str, lo: u16, hi: u16) -> Option<u16> {
        (lo..=hi).find(|p| !self.port_taken(idx, name, address, *p))
    }

    /// All non-gone instances whose status is healthy or degraded, matching
    /// `tags`/`metadata` exactly (AND of both filters), healthy first, then
    /// by ascending latency EMA, then by registration time ascending.
    pub fn discover(
        &self,
        name: &str,
        tags: &HashSet<String>,
        metadata: &HashMap<String, String>,
    ) -> Vec<DiscoverEntry> {
        let snap = self.snapshot.load();
        let mut matches: Vec<&ServiceInstance> = snap
            .instances
            .values()
            .filter(|i| {
                i.name == name
                    && matches!(i.status, InstanceStatus::Healthy | InstanceStatus::Degraded)
                    && tags.is_subset(&i.tags)
                    && metadata.iter().all(|(k, v)| i.metadata.get(k) == Some(v))
            })
            .collect();

        matches.sort_by(|a, b| {
            let rank = |s: InstanceStatus| if s == InstanceStatus::Healthy { 0 } else { 1 };
            rank(a.status)
                .cmp(&rank(b.status))
                .then(a.latency_ema_ms.total_cmp(&b.latency_ema_ms))
                .then(a.registration_time.cmp(&b.registration_time))
        });

        matches
            .into_iter()
            .map(|i| DiscoverEntry {
                id: i.id.clone(),
                address: i.address.clone(),
                port: i.port,
                health: i.status,
                tags: i.tags.iter().cloned().collect(),
                metadata: i.metadata.clone(),
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<ServiceInstance> {
        self.snapshot.load().instances.get(id).cloned()
    }

    pub fn all_non_terminal(&self) -> Vec<ServiceInstance> {
        self.snapshot
            .load()
            .instances
            .values()
            .filter(|i| i.status != InstanceStatus::Gone)
            .cloned()
            .collect()
    }

    /// Applies a mutation to one instance and republishes the snapshot.
    /// Returns `NotFound` if the instance is absent.
    pub fn update<F>(&self, id: &str, f: F) -> Result<ServiceInstance, AppError>
    where
        F: FnOnce(&mut ServiceInstance),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.snapshot.load();
        let mut instance = current
            .instances
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("instance {id} not found")))?;
        f(&mut instance);
        let next = current.with(id.to_string(), instance.clone());
        self.snapshot.store(std::sync::Arc::new(next));
        Ok(instance)
    }

    pub fn remove(&self, id: &str) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.snapshot.load();
        if current.instances.contains_key(id) {
            let next = current.without(id);
            self.snapshot.store(std::sync::Arc::new(next));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(name: &str, port: u16) -> RegisterBody {
        RegisterBody {
            name: name.to_string(),
            address: "127.0.0.1".to_string(),
            port: Some(port),
            port_range: None,
            tags: vec!["v1".to_string()],
            metadata: HashMap::new(),
            health_url: format!("http://127.0.0.1:{port}/health"),
            supports_rotation: false,
            max_age_secs: None,
            max_requests: None,
        }
    }

    #[test]
    fn register_rejects_duplicate_port() {
        let reg = Registry::new();
        reg.register(body("svc", 9001)).unwrap();
        let err = reg.register(body("svc", 9001)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn discover_excludes_registering_and_gone() {
        let reg = Registry::new();
        let instance = reg.register(body("svc", 9002)).unwrap();
        assert!(reg.discover("svc", &HashSet::new(), &HashMap::new()).is_empty());

        reg.update(&instance.id, |i| i.status = InstanceStatus::Healthy).unwrap();
        assert_eq!(reg.discover("svc", &HashSet::new(), &HashMap::new()).len(), 1);

        reg.update(&instance.id, |i| i.status = InstanceStatus::Gone).unwrap();
        assert!(reg.discover("svc", &HashSet::new(), &HashMap::new()).is_empty());
    }

    #[test]
    fn discover_requires_full_tag_containment() {
        let reg = Registry::new();
        let instance = reg.register(body("svc", 9003)).unwrap();
        reg.update(&instance.id, |i| i.status = InstanceStatus::Healthy).unwrap();

        let wanted: HashSet<String> = ["v1", "edge"].iter().map(|s| s.to_string()).collect();
        assert!(reg.discover("svc", &wanted, &HashMap::new()).is_empty());

        let wanted: HashSet<String> = ["v1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(reg.discover("svc", &wanted, &HashMap::new()).len(), 1);
    }

    #[test]
    fn discover_requires_exact_metadata_match() {
        let reg = Registry::new();
        let mut req = body("svc", 9004);
        req.metadata.insert("region".to_string(), "us-east".to_string());
        let instance = reg.register(req).unwrap();
        reg.update(&instance.id, |i| i.status = InstanceStatus::Healthy).unwrap();

        let mut wanted = HashMap::new();
        wanted.insert("region".to_string(), "us-west".to_string());
        assert!(reg.discover("svc", &HashSet::new(), &wanted).is_empty());

        wanted.insert("region".to_string(), "us-east".to_string());
        assert_eq!(reg.discover("svc", &HashSet::new(), &wanted).len(), 1);
    }

    #[test]
    fn update_on_missing_instance_is_not_found() {
        let reg = Registry::new();
        let err = reg.update("nope", |_| {}).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
