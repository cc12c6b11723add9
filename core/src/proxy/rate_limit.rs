//! Per-client rate limiting
//!
//! Fixed-window counter keyed by client address. Windows are created on
//! first sight and reset lazily when a request arrives after expiry.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

struct Window {
    started_at: Instant,
    count: u32,
}

pub struct RateLimiter {
    enabled: bool,
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            windows: DashMap::new(),
        }
    }

    /// Record one request for `client` and report whether it is allowed.
    pub fn check(&self, client: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let mut entry = self.windows.entry(client.to_string()).or_insert(Window {
            started_at: Instant::now(),
            count: 0,
        });

        if entry.started_at.elapsed() >= self.window {
            entry.started_at = Instant::now();
            entry.count = 0;
        }

        entry.count += 1;
        entry.count <= self.max_requests
    }

    /// Drop windows that have fully elapsed. Bounds memory when many
    /// distinct clients come and go.
    pub fn cleanup_expired(&self) -> usize {
        let window = self.window;
        let before = self.windows.len();
        self.windows
            .retain(|_, w| w.started_at.elapsed() < window);
        before - self.windows.len()
    }
}
