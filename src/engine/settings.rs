//! Engine runtime settings.

use std::time::Duration;

/// Timeouts and limits applied by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Fixed delay between a termination signal and shutdown (default 2s).
    ///
    /// This is a grace delay, not a completion-based drain.
    pub drain_timeout: Duration,
    /// Upper bound for each component's `shutdown` (default 5s).
    pub shutdown_timeout: Duration,
    /// Upper bound for each component's `start` (default: unbounded).
    pub start_timeout: Option<Duration>,
    /// Capacity of the shared error channel (default 32).
    pub error_channel_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(5),
            start_timeout: None,
            error_channel_capacity: 32,
        }
    }
}

impl EngineSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_start_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.start_timeout = timeout;
        self
    }

    /// Set the error channel capacity; zero is raised to one.
    pub fn with_error_channel_capacity(mut self, capacity: usize) -> Self {
        self.error_channel_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = EngineSettings::default();
        assert_eq!(settings.drain_timeout, Duration::from_secs(2));
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(settings.start_timeout, None);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let settings = EngineSettings::new().with_error_channel_capacity(0);
        assert_eq!(settings.error_channel_capacity, 1);
    }
}
