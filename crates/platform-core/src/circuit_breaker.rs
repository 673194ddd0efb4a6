use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Three-state circuit breaker for calls to a single peer/endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerEntry {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Set once half-open has let one trial call through, to avoid a
    /// stampede of concurrent trial calls while the breaker is half-open.
    half_open_trial_in_flight: bool,
}

impl BreakerEntry {
    fn new() -> Self {
        BreakerEntry {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_trial_in_flight: false,
        }
    }
}

pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// A registry of per-target breakers, keyed by service/endpoint id. Shared
/// across tasks by `Arc`; the calling service owns one instance.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<String, BreakerEntry>>,
}

/// Returned by `try_call` / `before_call` — tells the caller whether to
/// proceed, and (on success/failure) how to report the outcome back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPermit {
    /// The call may proceed.
    Allowed,
    /// The call may proceed as a half-open trial; report the outcome.
    Trial,
    /// Breaker is open and still within its timeout — do not call.
    Denied,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        CircuitBreakerRegistry {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether a call to `target` may proceed, transitioning
    /// open -> half-open if the timeout has elapsed.
    pub fn before_call(&self, target: &str) -> CallPermit {
        let mut map = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        let entry = map.entry(target.to_string()).or_insert_with(BreakerEntry::new);

        match entry.state {
            BreakerState::Closed => CallPermit::Allowed,
            BreakerState::HalfOpen => {
                if entry.half_open_trial_in_flight {
                    CallPermit::Denied
                } else {
                    entry.half_open_trial_in_flight = true;
                    CallPermit::Trial
                }
            }
            BreakerState::Open => {
                let elapsed = entry
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.open_timeout {
                    entry.state = BreakerState::HalfOpen;
                    entry.half_open_trial_in_flight = true;
                    CallPermit::Trial
                } else {
                    CallPermit::Denied
                }
            }
        }
    }

    pub fn record_success(&self, target: &str) {
        let mut map = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        let entry = map.entry(target.to_string()).or_insert_with(BreakerEntry::new);
        entry.state = BreakerState::Closed;
        entry.consecutive_failures = 0;
        entry.opened_at = None;
        entry.half_open_trial_in_flight = false;
    }

    pub fn record_failure(&self, target: &str) {
        let mut map = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        let entry = map.entry(target.to_string()).or_insert_with(BreakerEntry::new);
        entry.half_open_trial_in_flight = false;
        match entry.state {
            BreakerState::HalfOpen => {
                entry.state = BreakerState::Open;
                entry.opened_at = Some(Instant::now());
            }
            BreakerState::Closed => {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= self.config.failure_threshold {
                    entry.state = BreakerState::Open;
                    entry.opened_at = Some(Instant::now());
                }
            }
            BreakerState::Open => {
                entry.opened_at = Some(Instant::now());
            }
        }
    }

    pub fn state(&self, target: &str) -> BreakerState {
        let map = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        map.get(target).map(|e| e.state).unwrap_or(BreakerState::Closed)
    }

    /// Runs an async call through the breaker: denies fast if open, records
    /// the outcome on success/failure. `f` is only invoked when permitted.
    pub async fn call<F, Fut, T, E>(&self, target: &str, f: F) -> Result<T, BreakerCallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        match self.before_call(target) {
            CallPermit::Denied => Err(BreakerCallError::Open),
            CallPermit::Allowed | CallPermit::Trial => match f().await {
                Ok(v) => {
                    self.record_success(target);
                    Ok(v)
                }
                Err(e) => {
                    self.record_failure(target);
                    Err(BreakerCallError::Inner(e))
                }
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BreakerCallError<E> {
    #[error("circuit breaker open")]
    Open,
    #[error(transparent)]
    Inner(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let reg = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        });
        for _ in 0..2 {
            assert_eq!(reg.before_call("peer"), CallPermit::Allowed);
            reg.record_failure("peer");
        }
        assert_eq!(reg.state("peer"), BreakerState::Closed);
        assert_eq!(reg.before_call("peer"), CallPermit::Allowed);
        reg.record_failure("peer");
        assert_eq!(reg.state("peer"), BreakerState::Open);
        assert_eq!(reg.before_call("peer"), CallPermit::Denied);
    }

    #[test]
    fn half_open_failure_reopens() {
        let reg = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_millis(1),
        });
        reg.before_call("peer");
        reg.record_failure("peer");
        assert_eq!(reg.state("peer"), BreakerState::Open);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(reg.before_call("peer"), CallPermit::Trial);
        reg.record_failure("peer");
        assert_eq!(reg.state("peer"), BreakerState::Open);
    }

    #[test]
    fn half_open_success_closes_and_resets() {
        let reg = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_millis(1),
        });
        reg.before_call("peer");
        reg.record_failure("peer");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(reg.before_call("peer"), CallPermit::Trial);
        reg.record_success("peer");
        assert_eq!(reg.state("peer"), BreakerState::Closed);
        assert_eq!(reg.before_call("peer"), CallPermit::Allowed);
    }
}
