use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use synod_core::SynodError;

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window request limiter, keyed per credential.
///
/// Holds the only cross-request state in the process. Timestamps older than
/// one minute are discarded on each check, so memory stays bounded by the
/// number of active credentials times the limit.
pub struct RateLimiter {
    limit: u32,
    windows: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` requests per minute per key.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SynodError::RateLimit`] when the key has already used its
    /// quota for the current window; the rejected request is not counted.
    pub fn check(&self, key: &str) -> Result<(), SynodError> {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        let timestamps = windows.entry(key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < WINDOW);

        if timestamps.len() >= self.limit as usize {
            return Err(SynodError::RateLimit { limit: self.limit });
        }
        timestamps.push(now);
        Ok(())
    }
}
