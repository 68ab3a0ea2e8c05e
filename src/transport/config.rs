//! Transport configuration

use std::time::Duration;

/// Maximum automatic reconnect attempts before giving up
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Signaling socket configuration options
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Coordination server URL (ws:// or wss://)
    pub url: String,

    /// First reconnect delay; doubles on each consecutive failure
    pub base_delay: Duration,

    /// Ceiling for the computed reconnect delay
    pub max_delay: Duration,

    /// Upper bound of the random jitter added to each reconnect delay
    pub jitter_max: Duration,

    /// Automatic reconnect attempts before stopping (manual reconnect
    /// always remains possible)
    pub max_retries: u32,

    /// Connection attempt must produce an open socket within this time
    pub connect_timeout: Duration,

    /// Capacity of the outbound frame queue
    pub send_queue_size: usize,

    /// Capacity of the transport event channel
    pub event_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8787/ws".into(),
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            jitter_max: Duration::from_secs(1),
            max_retries: DEFAULT_MAX_RETRIES,
            connect_timeout: Duration::from_secs(10),
            send_queue_size: 64,
            event_capacity: 256,
        }
    }
}

impl TransportConfig {
    /// Create a config pointing at the given server URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the server URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the base reconnect delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the reconnect delay ceiling
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter upper bound
    pub fn jitter_max(mut self, jitter: Duration) -> Self {
        self.jitter_max = jitter;
        self
    }

    /// Set the automatic reconnect ceiling
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();

        assert_eq!(config.base_delay, Duration::from_secs(2));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder_chaining() {
        let config = TransportConfig::with_url("ws://10.0.0.5:9000/ws")
            .base_delay(Duration::from_millis(500))
            .max_delay(Duration::from_secs(10))
            .max_retries(3)
            .connect_timeout(Duration::from_secs(2));

        assert_eq!(config.url, "ws://10.0.0.5:9000/ws");
        assert_eq!(config.base_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
    }
}
