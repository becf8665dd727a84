//! Lotus configuration file handling
//!
//! Operator configuration in TOML, stored next to the auth folder:
//! - Auth folder: ~/.local/share/lotus/auth/
//! - Config: ~/.local/share/lotus/config.toml
//!
//! Every section except `[auth]` may be omitted; missing values fall back to
//! the session defaults.

use lotus::socket::config::{
    Browser, SessionConfig, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_KEEP_ALIVE_INTERVAL_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_QUERY_TIMEOUT_MS, DEFAULT_RETRY_REQUEST_DELAY_MS,
};
use lotus::socket::websocket::{DEFAULT_ORIGIN, DEFAULT_URL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotusConfig {
    /// Where credentials live
    pub auth: AuthConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Folder holding creds.json and the key collections
    pub folder: PathBuf,
}

/// Endpoint and timing options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_origin")]
    pub origin: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_keep_alive_interval_ms")]
    pub keep_alive_interval_ms: u64,

    #[serde(default = "default_retry_request_delay_ms")]
    pub retry_request_delay_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins over it
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Client name and version announced in the `User-Agent`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_browser_name")]
    pub name: String,

    #[serde(default = "default_browser_version")]
    pub version: String,
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_keep_alive_interval_ms() -> u64 {
    DEFAULT_KEEP_ALIVE_INTERVAL_MS
}

fn default_retry_request_delay_ms() -> u64 {
    DEFAULT_RETRY_REQUEST_DELAY_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_query_timeout_ms() -> u64 {
    DEFAULT_QUERY_TIMEOUT_MS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_browser_name() -> String {
    Browser::default().name
}

fn default_browser_version() -> String {
    Browser::default().version
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            origin: default_origin(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            keep_alive_interval_ms: DEFAULT_KEEP_ALIVE_INTERVAL_MS,
            retry_request_delay_ms: DEFAULT_RETRY_REQUEST_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            name: default_browser_name(),
            version: default_browser_version(),
        }
    }
}

impl LotusConfig {
    #[allow(dead_code)]
    pub fn new(auth_folder: PathBuf) -> Self {
        Self {
            auth: AuthConfig {
                folder: auth_folder,
            },
            connection: ConnectionConfig::default(),
            logging: LoggingConfig::default(),
            browser: BrowserConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: LotusConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    #[allow(dead_code)]
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Session timing and identity derived from this file
    pub fn session_config(&self) -> SessionConfig {
        let c = &self.connection;
        SessionConfig::from_millis(
            c.connect_timeout_ms,
            c.keep_alive_interval_ms,
            c.retry_request_delay_ms,
            c.max_retries,
        )
        .with_query_timeout(Duration::from_millis(c.query_timeout_ms))
        .with_browser(Browser {
            name: self.browser.name.clone(),
            version: self.browser.version.clone(),
        })
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(auth_folder: &Path) -> String {
        format!(
            r#"# Lotus Configuration

[auth]
# Folder holding the paired credentials (creds.json, pre-keys.json, ...)
folder = "{auth_folder}"

[connection]
url = "{url}"
origin = "{origin}"

# Give up pairing or resume after this long
connect_timeout_ms = {connect_timeout_ms}

# Liveness frame period while connected
keep_alive_interval_ms = {keep_alive_interval_ms}

# Group, status and profile commands: base retry delay, retry count and
# how long to wait for the server's answer
retry_request_delay_ms = {retry_request_delay_ms}
max_retries = {max_retries}
query_timeout_ms = {query_timeout_ms}

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
level = "{level}"

[browser]
# Announced as "User-Agent: WhatsApp/<version> <name>"
name = "{browser_name}"
# version = "{browser_version}"
"#,
            auth_folder = auth_folder.display(),
            url = DEFAULT_URL,
            origin = DEFAULT_ORIGIN,
            connect_timeout_ms = DEFAULT_CONNECT_TIMEOUT_MS,
            keep_alive_interval_ms = DEFAULT_KEEP_ALIVE_INTERVAL_MS,
            retry_request_delay_ms = DEFAULT_RETRY_REQUEST_DELAY_MS,
            max_retries = DEFAULT_MAX_RETRIES,
            query_timeout_ms = DEFAULT_QUERY_TIMEOUT_MS,
            level = DEFAULT_LOG_LEVEL,
            browser_name = default_browser_name(),
            browser_version = default_browser_version(),
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(
        config_path: &Path,
        auth_folder: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml(auth_folder);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// Config file path for an auth folder
///
/// The config sits in the auth folder's parent:
/// - Auth: /data/lotus/auth/
/// - Config: /data/lotus/config.toml
pub fn default_config_path(auth_folder: &Path) -> PathBuf {
    auth_folder
        .parent()
        .unwrap_or(auth_folder)
        .join("config.toml")
}

/// Get the default auth folder
pub fn default_auth_folder() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lotus")
        .join("auth")
}

/// Load the config at `config_path` (or next to the auth folder), creating
/// a default one on first run. An explicit `auth_folder` overrides the file.
pub fn load_or_create(
    config_path: Option<&str>,
    auth_folder: Option<&str>,
) -> Result<(LotusConfig, PathBuf), Box<dyn std::error::Error>> {
    let folder = auth_folder
        .map(PathBuf::from)
        .unwrap_or_else(default_auth_folder);
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(|| default_config_path(&folder));

    if !config_path.exists() {
        LotusConfig::create_default(&config_path, &folder)?;
    }
    let mut config = LotusConfig::load(&config_path)?;
    if auth_folder.is_some() {
        config.auth.folder = folder;
    }
    Ok((config, config_path))
}
