use std::time::Duration;

pub const DEFAULT_VALIDITY_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCacheConfig {
    /// How long a stored entry is served before it is treated as stale.
    pub validity_window: Duration,
}

impl SessionCacheConfig {
    pub fn from_millis(validity_window_ms: u64) -> Self {
        Self {
            validity_window: Duration::from_millis(validity_window_ms),
        }
    }
}

impl Default for SessionCacheConfig {
    fn default() -> Self {
        Self {
            validity_window: DEFAULT_VALIDITY_WINDOW,
        }
    }
}
