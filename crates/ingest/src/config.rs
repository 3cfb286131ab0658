use archiver_core::config::Settings;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: u64 = 100;
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Pacing for backfill and polling. Defaults are applied once, here, so the
/// controllers never see a zero page size or a zero wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig {
    batch_size: u64,
    request_delay: Duration,
    poll_interval: Duration,
}

impl IngestConfig {
    pub fn new(batch_size: i64, request_delay: Duration, poll_interval: Duration) -> Self {
        let batch_size = if batch_size > 0 {
            batch_size as u64
        } else {
            DEFAULT_BATCH_SIZE
        };
        let request_delay = if request_delay.is_zero() {
            DEFAULT_REQUEST_DELAY
        } else {
            request_delay
        };
        let poll_interval = if poll_interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            poll_interval
        };

        Self {
            batch_size,
            request_delay,
            poll_interval,
        }
    }

    /// Page size for every history request.
    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Fixed wait between consecutive backfill pages.
    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }
}

impl From<&Settings> for IngestConfig {
    fn from(settings: &Settings) -> Self {
        Self::new(
            settings.batch_size,
            Duration::from_secs(settings.request_delay_secs),
            Duration::from_secs(settings.poll_interval_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_values_use_defaults() {
        let config = IngestConfig::new(-5, Duration::ZERO, Duration::ZERO);
        assert_eq!(config.batch_size(), 100);
        assert_eq!(config.request_delay(), Duration::from_secs(2));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config, IngestConfig::default());
    }

    #[test]
    fn test_explicit_values_are_kept() {
        let config = IngestConfig::new(20, Duration::from_millis(5), Duration::from_secs(1));
        assert_eq!(config.batch_size(), 20);
        assert_eq!(config.request_delay(), Duration::from_millis(5));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            database_url: "sqlite::memory:".to_string(),
            gateway_url: "http://gw".to_string(),
            gateway_token: None,
            batch_size: 0,
            request_delay_secs: 7,
            poll_interval_secs: 0,
            max_retries: 3,
        };
        let config = IngestConfig::from(&settings);
        assert_eq!(config.batch_size(), 100);
        assert_eq!(config.request_delay(), Duration::from_secs(7));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
    }
}
