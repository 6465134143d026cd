//! Live query engine configuration.

use serde::Deserialize;

/// Configuration of a `LiveQuery` engine.
///
/// Deserializable so embedders can load it from their own configuration
/// files; missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LiveQueryConfig {
    /// Maximum number of queued (unsubscribed) queries kept warm.
    /// `None` keeps every queued query until reconnect or close.
    pub queue_capacity: Option<usize>,
    /// Refresh a queued query whose last refresh failed when it is reactivated.
    pub refresh_stale_on_reactivate: bool,
}

impl Default for LiveQueryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            refresh_stale_on_reactivate: true,
        }
    }
}

impl LiveQueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the queue.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Sets whether stale queued queries refresh on reactivation.
    pub fn with_refresh_stale_on_reactivate(mut self, refresh: bool) -> Self {
        self.refresh_stale_on_reactivate = refresh;
        self
    }
}
