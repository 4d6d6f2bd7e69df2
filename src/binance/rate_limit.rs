// =============================================================================
// Rate-Limit Tracker — request-weight accounting for public market data
// =============================================================================
//
// Binance allows 1200 request weight per minute per IP; we hard-cap ourselves
// at 1000.  The tracker reads `X-MBX-USED-WEIGHT-1M` after every response and
// remembers which wall-clock minute the reading belongs to, so a stale reading
// from a previous minute never blocks new requests.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use tracing::{debug, warn};

/// Hard ceiling at which we refuse to send additional requests.
pub const WEIGHT_HARD_LIMIT: u32 = 1000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 800;

const WEIGHT_HEADER: &str = "X-MBX-USED-WEIGHT-1M";

/// Thread-safe rate-limit tracker backed by atomic counters.
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
    /// Unix minute of the last header reading.
    window_minute: AtomicI64,
}

/// Serialisable view of the tracker for the state endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
    pub hard_limit: u32,
}

fn unix_minute(now_ms: i64) -> i64 {
    now_ms.div_euclid(60_000)
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
            window_minute: AtomicI64::new(0),
        }
    }

    /// Record the weight reported by Binance at `now_ms`.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap, now_ms: i64) {
        let Some(w) = headers
            .get(WEIGHT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };
        self.record_weight(w, now_ms);
    }

    pub fn record_weight(&self, weight: u32, now_ms: i64) {
        let prev = self.current_weight(now_ms);
        self.used_weight_1m.store(weight, Ordering::Relaxed);
        self.window_minute.store(unix_minute(now_ms), Ordering::Relaxed);

        if weight >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = weight, "rate-limit weight updated from header");
    }

    /// Weight used in the minute containing `now_ms`; zero once that minute
    /// has rolled over.
    pub fn current_weight(&self, now_ms: i64) -> u32 {
        if self.window_minute.load(Ordering::Relaxed) == unix_minute(now_ms) {
            self.used_weight_1m.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    /// `true` if spending `weight` more stays within the hard limit.
    pub fn can_send_request(&self, weight: u32, now_ms: i64) -> bool {
        let current = self.current_weight(now_ms);
        let allowed = current + weight <= WEIGHT_HARD_LIMIT;
        if !allowed {
            warn!(
                current_weight = current,
                requested_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "request blocked, would exceed rate-limit"
            );
        }
        allowed
    }

    pub fn snapshot(&self, now_ms: i64) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.current_weight(now_ms),
            hard_limit: WEIGHT_HARD_LIMIT,
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.used_weight_1m.load(Ordering::Relaxed))
            .field("window_minute", &self.window_minute.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    const T: i64 = 1_700_000_040_000; // 40s into a minute

    #[test]
    fn header_updates_weight() {
        let tracker = RateLimitTracker::new();
        let mut headers = HeaderMap::new();
        headers.insert(WEIGHT_HEADER, HeaderValue::from_static("420"));
        tracker.update_from_headers(&headers, T);
        assert_eq!(tracker.current_weight(T), 420);
    }

    #[test]
    fn missing_or_garbage_header_is_ignored() {
        let tracker = RateLimitTracker::new();
        tracker.record_weight(10, T);
        let mut headers = HeaderMap::new();
        tracker.update_from_headers(&headers, T);
        headers.insert(WEIGHT_HEADER, HeaderValue::from_static("lots"));
        tracker.update_from_headers(&headers, T);
        assert_eq!(tracker.current_weight(T), 10);
    }

    #[test]
    fn blocks_above_hard_limit_until_minute_rolls() {
        let tracker = RateLimitTracker::new();
        tracker.record_weight(999, T);
        assert!(tracker.can_send_request(1, T));
        assert!(!tracker.can_send_request(2, T));

        let next_minute = T + 30_000;
        assert!(tracker.can_send_request(2, next_minute));
        assert_eq!(tracker.snapshot(next_minute).used_weight_1m, 0);
    }
}
