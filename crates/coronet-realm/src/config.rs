//! Configuration consumed by the state machine core.

use std::time::Duration;

/// Tunable timings and limits for one device's state machine.
#[derive(Debug, Clone)]
pub struct RealmConfig {
    /// Grace period given to a newly self-promoted King or Prince before
    /// subordinates attempt to reconnect to it.
    pub crowning_preparation_timeout: Duration,

    /// Connection attempts when chasing a Prince or a new King.
    pub max_connect_retries: u32,

    /// How long a Free device scans before crowning itself King of a
    /// single-device kingdom.
    pub discovery_timeout: Duration,

    /// Cadence of the King's census broadcast.
    pub census_interval: Duration,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            crowning_preparation_timeout: Duration::from_millis(1500),
            max_connect_retries: 4,
            discovery_timeout: Duration::from_secs(10),
            census_interval: Duration::from_secs(5),
        }
    }
}

impl RealmConfig {
    /// Set the crowning preparation grace period.
    #[must_use]
    pub fn with_crowning_preparation_timeout(mut self, timeout: Duration) -> Self {
        self.crowning_preparation_timeout = timeout;
        self
    }

    /// Set the bounded retry count for prince/king connection attempts.
    #[must_use]
    pub fn with_max_connect_retries(mut self, retries: u32) -> Self {
        self.max_connect_retries = retries;
        self
    }

    /// Set how long a Free device scans before self-promoting.
    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the census broadcast cadence.
    #[must_use]
    pub fn with_census_interval(mut self, interval: Duration) -> Self {
        self.census_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_retry_default() {
        assert_eq!(RealmConfig::default().max_connect_retries, 4);
    }

    #[test]
    fn builders_override_defaults() {
        let config = RealmConfig::default()
            .with_crowning_preparation_timeout(Duration::from_millis(10))
            .with_discovery_timeout(Duration::from_millis(20))
            .with_census_interval(Duration::from_millis(30))
            .with_max_connect_retries(2);
        assert_eq!(config.crowning_preparation_timeout, Duration::from_millis(10));
        assert_eq!(config.discovery_timeout, Duration::from_millis(20));
        assert_eq!(config.census_interval, Duration::from_millis(30));
        assert_eq!(config.max_connect_retries, 2);
    }
}
