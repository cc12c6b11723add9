use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Proxy server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub nonce: NonceConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Include upstream error detail in JSON responses. Leave off in
    /// production; clients only see a generic failure message.
    #[serde(default)]
    pub expose_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            expose_errors: false,
        }
    }
}

/// Where the nonce page and the chat AJAX endpoint live.
///
/// Both are undocumented third-party URLs; the defaults match the site the
/// proxy was written against and may need updating if it moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_origin_url")]
    pub origin_url: String,

    #[serde(default = "default_chat_url")]
    pub chat_url: String,

    #[serde(default = "default_chat_action")]
    pub chat_action: String,

    /// Sent as Origin/Referer on the AJAX call; the backend rejects
    /// requests without them.
    #[serde(default = "default_referer")]
    pub referer: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin_url: default_origin_url(),
            chat_url: default_chat_url(),
            chat_action: default_chat_action(),
            referer: default_referer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceConfig {
    /// How long a scraped nonce is trusted. The real upstream TTL is
    /// unknown, so this is deliberately conservative.
    #[serde(default = "default_nonce_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Drop the cached nonce when the chat endpoint rejects a request.
    /// Off by default: a rejection may be rate limiting or content policy,
    /// not necessarily a dead token.
    #[serde(default)]
    pub invalidate_on_reject: bool,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_nonce_ttl_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            invalidate_on_reject: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_user_message")]
    pub default_user_message: String,

    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_user_message: default_user_message(),
            default_system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,

    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            nonce: NonceConfig::default(),
            chat: ChatConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// Default value functions
fn default_port() -> u16 {
    3040
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_origin_url() -> String {
    "https://chatgptfree.ai/chat/".to_string()
}
fn default_chat_url() -> String {
    "https://chatgptfree.ai/wp-admin/admin-ajax.php".to_string()
}
fn default_chat_action() -> String {
    "wpaicg_chat_shortcode_message".to_string()
}
fn default_referer() -> String {
    "https://chatgptfree.ai/chat/".to_string()
}
fn default_nonce_ttl_secs() -> u64 {
    3600
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    1000
}
fn default_user_message() -> String {
    "Hello".to_string()
}
fn default_system_prompt() -> String {
    "You are a helpful assistant. Answer clearly and concisely.".to_string()
}
fn default_rate_limit_enabled() -> bool {
    true
}
fn default_max_requests() -> u32 {
    30
}
fn default_window_secs() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Get default config file path
/// Uses ~/.config/relaychat-proxy/config.toml for Unix-like CLI experience
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("relaychat-proxy")
        .join("config.toml")
}

/// Load config from file, or return defaults if not found.
///
/// Loading order:
/// 1. Specified path (if provided)
/// 2. ./config.toml (if exists)
/// 3. default_config_path() (usually ~/.config/relaychat-proxy/config.toml)
pub fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    if let Some(config_path) = path {
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::info!("Loaded config from specified path {:?}", config_path);
            return Ok(config);
        } else {
            anyhow::bail!("Specified config file not found: {:?}", config_path);
        }
    }

    // Try current directory config.toml
    let local_config = PathBuf::from("config.toml");
    if local_config.exists() {
        match std::fs::read_to_string(&local_config) {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from current directory {:?}", local_config);
                    return Ok(config);
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to parse ./config.toml: {}. Falling back to default path.",
                        e
                    );
                }
            },
            Err(e) => {
                tracing::error!(
                    "Failed to read ./config.toml: {}. Falling back to default path.",
                    e
                );
            }
        }
    }

    let default_path = default_config_path();
    if default_path.exists() {
        let content = std::fs::read_to_string(&default_path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::info!("Loaded config from default path {:?}", default_path);
        Ok(config)
    } else {
        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.nonce.max_retries, 3);
        assert_eq!(config.nonce.ttl_secs, 3600);
        assert!(!config.nonce.invalidate_on_reject);
        assert!(!config.server.expose_errors);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [nonce]
            invalidate_on_reject = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.nonce.invalidate_on_reject);
        assert_eq!(config.nonce.max_retries, 3);
        assert_eq!(config.rate_limit.max_requests, 30);
    }
}
