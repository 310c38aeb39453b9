//! Per-client fixed-window admission control.
//!
//! Each client key owns a window that starts on its first request and resets
//! on the first request after it expires. Every call counts, including
//! denied ones.
//!
//! The map never holds more than `max_entries` windows. New keys are
//! inserted one at a time; when full, expired windows are swept first, then
//! the unthrottled window closest to expiry is evicted. Throttled windows are
//! only evicted when every tracked client is throttled.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after_secs: u64 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counter map shared by all requests to one endpoint.
pub struct RateGate {
    name: &'static str,
    windows: DashMap<String, Window>,
    window: Duration,
    max_requests: u32,
    max_entries: usize,
    /// Serializes inserts of new keys so the capacity check holds.
    inserting: Mutex<()>,
}

impl RateGate {
    pub fn new(name: &'static str, window: Duration, max_requests: u32, max_entries: usize) -> Self {
        Self {
            name,
            windows: DashMap::new(),
            window,
            max_requests,
            max_entries: max_entries.max(1),
            inserting: Mutex::new(()),
        }
    }

    pub fn from_config(name: &'static str, config: &RateLimitConfig) -> Self {
        Self::new(
            name,
            Duration::from_millis(config.window_ms),
            config.max_requests,
            config.max_tracked_clients,
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of client windows currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    pub fn admit(&self, client_key: &str) -> Admission {
        self.admit_at(client_key, Instant::now())
    }

    /// Admission check against an explicit clock reading.
    pub fn admit_at(&self, client_key: &str, now: Instant) -> Admission {
        // A window evicted between insert and lookup is simply re-inserted.
        let mut entry = loop {
            if let Some(entry) = self.windows.get_mut(client_key) {
                break entry;
            }
            self.insert_window(client_key, now);
        };

        // The guard holds the shard lock, so increments for one key are serialized.
        if now > entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }
        entry.count = entry.count.saturating_add(1);

        if entry.count > self.max_requests {
            let remaining = entry.reset_at.saturating_duration_since(now);
            let retry_after_secs = remaining.as_millis().div_ceil(1000).max(1) as u64;
            drop(entry);

            tracing::warn!(gate = self.name, client = %client_key, retry_after_secs, "Rate limit exceeded");
            metrics::record_rate_limited(self.name);
            return Admission::Denied { retry_after_secs };
        }

        Admission::Allowed
    }

    fn insert_window(&self, client_key: &str, now: Instant) {
        let _inserting = self.inserting.lock().unwrap_or_else(|e| e.into_inner());
        if self.windows.contains_key(client_key) {
            return;
        }
        if self.windows.len() >= self.max_entries {
            self.make_room(now);
        }
        self.windows.insert(
            client_key.to_string(),
            Window {
                count: 0,
                reset_at: now + self.window,
            },
        );
    }

    /// Drop every window that has already expired. Returns how many were removed.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| now <= w.reset_at);
        let removed = before.saturating_sub(self.windows.len());
        metrics::record_gate_entries(self.name, self.windows.len());
        removed
    }

    fn make_room(&self, now: Instant) {
        if self.sweep_expired(now) > 0 {
            return;
        }
        // Still full: evict the window closest to expiry, sparing throttled clients.
        let victim = self
            .windows
            .iter()
            .min_by_key(|e| (e.value().count > self.max_requests, e.value().reset_at))
            .map(|e| e.key().clone());
        if let Some(key) = victim {
            self.windows.remove(&key);
            tracing::debug!(gate = self.name, client = %key, "Evicted rate window at capacity");
        }
    }

    /// Periodically sweep expired windows until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep_expired(Instant::now());
                    if removed > 0 {
                        tracing::debug!(gate = self.name, removed, tracked = self.tracked(), "Swept expired rate windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!(gate = self.name, "Rate gate sweeper stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(max: u32, window_ms: u64) -> RateGate {
        RateGate::new("test", Duration::from_millis(window_ms), max, 100)
    }

    #[test]
    fn test_allows_then_denies_then_resets() {
        let gate = gate(1, 1000);
        let t0 = Instant::now();

        assert_eq!(gate.admit_at("1.2.3.4", t0), Admission::Allowed);
        assert_eq!(
            gate.admit_at("1.2.3.4", t0 + Duration::from_millis(10)),
            Admission::Denied { retry_after_secs: 1 }
        );
        assert_eq!(
            gate.admit_at("1.2.3.4", t0 + Duration::from_millis(1001)),
            Admission::Allowed
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let gate = gate(1, 1000);
        let t0 = Instant::now();

        assert!(gate.admit_at("a", t0).is_allowed());
        assert!(gate.admit_at("b", t0).is_allowed());
        assert!(!gate.admit_at("a", t0).is_allowed());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let gate = gate(2, 5000);
        let t0 = Instant::now();
        gate.admit_at("k", t0);
        gate.admit_at("k", t0);

        let denied = gate.admit_at("k", t0 + Duration::from_millis(1500));
        // 3500ms left in the window.
        assert_eq!(denied, Admission::Denied { retry_after_secs: 4 });
    }

    #[test]
    fn test_window_does_not_slide_on_denials() {
        let gate = gate(1, 1000);
        let t0 = Instant::now();
        gate.admit_at("k", t0);
        for ms in [100, 500, 900, 1000] {
            assert!(!gate.admit_at("k", t0 + Duration::from_millis(ms)).is_allowed());
        }
        assert!(gate.admit_at("k", t0 + Duration::from_millis(1001)).is_allowed());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let gate = gate(5, 1000);
        let t0 = Instant::now();
        gate.admit_at("old", t0);
        gate.admit_at("new", t0 + Duration::from_millis(800));

        let removed = gate.sweep_expired(t0 + Duration::from_millis(1200));
        assert_eq!(removed, 1);
        assert_eq!(gate.tracked(), 1);
    }

    #[test]
    fn test_capacity_is_bounded() {
        let gate = RateGate::new("test", Duration::from_secs(60), 5, 3);
        let t0 = Instant::now();
        for (i, key) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            gate.admit_at(key, t0 + Duration::from_millis(i as u64));
        }
        assert_eq!(gate.tracked(), 3);
        assert!(!gate.windows.contains_key("a"));
        assert!(!gate.windows.contains_key("b"));
        assert!(gate.windows.contains_key("e"));
    }

    #[test]
    fn test_churn_does_not_reset_throttled_client() {
        let gate = RateGate::new("test", Duration::from_secs(60), 1, 2);
        let t0 = Instant::now();
        gate.admit_at("hot", t0);
        assert!(!gate.admit_at("hot", t0).is_allowed());

        for i in 0..20u64 {
            let at = t0 + Duration::from_millis(10 + i);
            assert!(gate.admit_at(&format!("visitor-{i}"), at).is_allowed());
            assert_eq!(gate.tracked(), 2);
        }
        assert!(!gate.admit_at("hot", t0 + Duration::from_millis(100)).is_allowed());
    }

    #[test]
    fn test_concurrent_new_keys_stay_within_capacity() {
        let gate = Arc::new(RateGate::new("test", Duration::from_secs(60), 5, 16));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let gate = gate.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        assert!(gate.admit(&format!("{t}-{i}")).is_allowed());
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(gate.tracked(), 16);
    }

    #[test]
    fn test_concurrent_admits_do_not_lose_increments() {
        let gate = Arc::new(RateGate::new("test", Duration::from_secs(60), 1000, 10));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || {
                    (0..200).filter(|_| gate.admit("shared").is_allowed()).count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 1000);
    }
}
