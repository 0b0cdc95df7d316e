//! Store configuration.

use std::time::Duration;

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long `submit` waits for the writer before giving up.
    pub transaction_timeout: Duration,

    /// Commits slower than this are logged at warn level.
    pub slow_transaction_threshold: Duration,

    /// Whether durable backends fsync on every commit.
    pub sync_on_commit: bool,

    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: Duration::from_secs(120 * 60),
            slow_transaction_threshold: Duration::from_millis(500),
            sync_on_commit: true,
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the submit timeout.
    #[must_use]
    pub const fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Sets the slow-commit warning threshold.
    #[must_use]
    pub const fn slow_transaction_threshold(mut self, threshold: Duration) -> Self {
        self.slow_transaction_threshold = threshold;
        self
    }

    /// Sets whether to fsync on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.transaction_timeout, Duration::from_secs(7200));
        assert!(config.sync_on_commit);
        assert!(config.create_if_missing);
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .transaction_timeout(Duration::from_secs(1))
            .sync_on_commit(false)
            .create_if_missing(false);

        assert_eq!(config.transaction_timeout, Duration::from_secs(1));
        assert!(!config.sync_on_commit);
        assert!(!config.create_if_missing);
    }
}
