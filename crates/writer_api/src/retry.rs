use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Backoff schedule for idempotent reads (status resync and draft fetches).
///
/// Writes never consult this policy; a replayed save or feedback post could
/// land twice on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// A policy that sends every request exactly once.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay before retry number `attempt` (zero-based), doubling up to `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

fn transient_body_pattern() -> Option<&'static Regex> {
    static CACHED: OnceLock<Option<Regex>> = OnceLock::new();
    CACHED
        .get_or_init(|| {
            Regex::new(r"(?i)temporar(il)?y.?unavailable|bad.?gateway|upstream|try.?again").ok()
        })
        .as_ref()
}

/// Whether a non-success response is worth retrying.
///
/// Gateway statuses always are. A 500 only when its body says the failure is
/// transient, since the writing pipeline reports genuine faults as 500 too.
pub fn is_transient_status(status: u16, body: &str) -> bool {
    match status {
        408 | 429 | 502 | 503 | 504 => true,
        500 => transient_body_pattern().is_some_and(|pattern| pattern.is_match(body)),
        _ => false,
    }
}
