//! Session configuration.

use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_KEEP_ALIVE_INTERVAL_MS: u64 = 20_000;
pub const DEFAULT_RETRY_REQUEST_DELAY_MS: u64 = 3_000;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 60_000;

/// Client name and version announced to the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Browser {
    pub name: String,
    pub version: String,
}

impl Default for Browser {
    fn default() -> Self {
        Self {
            name: "Lotus".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Browser {
    /// `User-Agent` header value
    pub fn user_agent(&self) -> String {
        format!("WhatsApp/{} {}", self.version, self.name)
    }
}

/// Timing and retry policy for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Abort pairing or resume if `open` is not reached in time
    pub connect_timeout: Duration,
    /// Period of the liveness frame while `open`
    pub keep_alive_interval: Duration,
    /// Base delay between retries of a request/response command
    pub retry_request_delay: Duration,
    /// Retries after the first attempt of a request/response command
    pub max_retries: u32,
    /// How long a request/response command waits for its result
    pub query_timeout: Duration,
    pub browser: Browser,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_millis(
            DEFAULT_CONNECT_TIMEOUT_MS,
            DEFAULT_KEEP_ALIVE_INTERVAL_MS,
            DEFAULT_RETRY_REQUEST_DELAY_MS,
            DEFAULT_MAX_RETRIES,
        )
    }
}

impl SessionConfig {
    /// Build from the millisecond options operators configure
    pub fn from_millis(
        connect_timeout_ms: u64,
        keep_alive_interval_ms: u64,
        retry_request_delay_ms: u64,
        max_retries: u32,
    ) -> Self {
        Self {
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            keep_alive_interval: Duration::from_millis(keep_alive_interval_ms),
            retry_request_delay: Duration::from_millis(retry_request_delay_ms),
            max_retries,
            query_timeout: Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS),
            browser: Browser::default(),
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_browser(mut self, browser: Browser) -> Self {
        self.browser = browser;
        self
    }
}
