//! Configuration for the chat synchronization core.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ChatError, ChatResult};

/// Configuration for a chat session and its poll scheduler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the backend API (e.g. `https://api.example.com/api`).
    pub base_url: String,
    /// Interval between scheduled poll ticks.
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,
    /// Upper bound on the random delay before the first tick, so fleets of
    /// clients do not poll in lockstep.
    #[serde(with = "duration_serde")]
    pub start_jitter: Duration,
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Display label used when a conversation has neither a title nor a
    /// counterpart name.
    pub fallback_label: String,
    /// Capacity of the acknowledged-message-id cache.
    pub acked_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4000/api".to_owned(),
            poll_interval: Duration::from_secs(10),
            start_jitter: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            fallback_label: "Support".to_owned(),
            acked_capacity: 256,
        }
    }
}

impl ChatConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the startup jitter upper bound.
    #[must_use]
    pub const fn with_start_jitter(mut self, jitter: Duration) -> Self {
        self.start_jitter = jitter;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the fallback display label.
    #[must_use]
    pub fn with_fallback_label(mut self, label: impl Into<String>) -> Self {
        self.fallback_label = label.into();
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL does not parse, cannot carry path
    /// segments, or if a zero value would stall the scheduler or cache.
    pub fn validate(&self) -> ChatResult<()> {
        let url = Url::parse(&self.base_url)?;
        if url.cannot_be_a_base() {
            return Err(ChatError::Config(format!(
                "base_url cannot carry path segments: {}",
                self.base_url
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(ChatError::Config("poll_interval must be > 0".to_owned()));
        }
        if self.acked_capacity == 0 {
            return Err(ChatError::Config("acked_capacity must be > 0".to_owned()));
        }
        Ok(())
    }
}

/// Serde module for Duration serialization (as whole milliseconds).
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ChatConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.fallback_label, "Support");
    }

    #[test]
    fn test_config_builder() {
        let config = ChatConfig::new()
            .with_base_url("https://market.example.com/api")
            .with_poll_interval(Duration::from_secs(5))
            .with_fallback_label("Conseiller");

        assert_eq!(config.base_url, "https://market.example.com/api");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.fallback_label, "Conseiller");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ChatConfig::new().with_base_url("not a url").validate().is_err());
        assert!(
            ChatConfig::new()
                .with_poll_interval(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_duration_serde_roundtrip() {
        let config = ChatConfig::new().with_poll_interval(Duration::from_millis(2500));
        let json = serde_json::to_string(&config).unwrap_or_default();
        let back: ChatConfig = serde_json::from_str(&json).unwrap_or_default();
        assert_eq!(back.poll_interval, Duration::from_millis(2500));
    }
}
