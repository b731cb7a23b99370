//! Bootstrap configuration loading and config file resolution
//!
//! Config file resolution order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. `./memestash.toml` in the working directory
//! 4. OS-dependent config directory (`~/.config/memestash/memestash.toml` on Linux)
//!
//! Every field has a built-in default, so a missing file yields a runnable
//! configuration (offline analysis, no Discord token).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name looked up in the working directory and config dir
pub const CONFIG_FILE_NAME: &str = "memestash.toml";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to SQLite database file (relative or absolute)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub discord: DiscordConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local file locations used by the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory downloaded images are written to
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Newline-delimited list of Discord thread URLs swept on schedule
    #[serde(default = "default_thread_list_file")]
    pub thread_list_file: PathBuf,

    /// Prompt template sent as the system message
    #[serde(default = "default_prompt_file")]
    pub prompt_file: PathBuf,
}

/// Vision model endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Bearer key; blank means offline placeholder mode
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_ai_api_base")]
    pub api_base: String,

    #[serde(default = "default_ai_model")]
    pub model: String,

    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

/// Discord bot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default = "default_discord_api_base")]
    pub api_base: String,

    /// Pause between message-history pages
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Pause between attachment downloads
    #[serde(default = "default_download_delay_ms")]
    pub download_delay_ms: u64,
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Proxy applied to every outbound request; blank means direct
    #[serde(default)]
    pub proxy_url: Option<String>,

    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
}

/// Interval trigger and retry limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_fetch_interval_minutes")]
    pub fetch_interval_minutes: u64,

    #[serde(default = "default_retry_interval_minutes")]
    pub retry_interval_minutes: u64,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr only if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("memes.db")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_thread_list_file() -> PathBuf {
    PathBuf::from("memes.txt")
}

fn default_prompt_file() -> PathBuf {
    PathBuf::from("prompt.md")
}

fn default_ai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ai_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_ai_timeout_secs() -> u64 {
    60
}

fn default_discord_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_page_delay_ms() -> u64 {
    500
}

fn default_download_delay_ms() -> u64 {
    100
}

fn default_remote_timeout_secs() -> u64 {
    30
}

fn default_fetch_interval_minutes() -> u64 {
    1440
}

fn default_retry_interval_minutes() -> u64 {
    60
}

fn default_max_retry_attempts() -> u32 {
    24
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            paths: PathsConfig::default(),
            ai: AiConfig::default(),
            discord: DiscordConfig::default(),
            network: NetworkConfig::default(),
            schedule: ScheduleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            thread_list_file: default_thread_list_file(),
            prompt_file: default_prompt_file(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_ai_api_base(),
            model: default_ai_model(),
            timeout_secs: default_ai_timeout_secs(),
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_discord_api_base(),
            page_delay_ms: default_page_delay_ms(),
            download_delay_ms: default_download_delay_ms(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            remote_timeout_secs: default_remote_timeout_secs(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            fetch_interval_minutes: default_fetch_interval_minutes(),
            retry_interval_minutes: default_retry_interval_minutes(),
            max_retry_attempts: default_max_retry_attempts(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Resolve the config file path following the documented priority order
///
/// Returns `None` when no candidate exists; callers fall back to defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument (returned even if missing so the caller reports it)
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Working directory
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    // Priority 4: OS config directory
    dirs::config_dir()
        .map(|d| d.join("memestash").join(CONFIG_FILE_NAME))
        .filter(|p| p.exists())
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    parse_toml_config(&content)
}

/// Parse TOML config text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load config from the resolved path, or built-in defaults when none is found
pub fn load_or_default(cli_arg: Option<&Path>, env_var_name: &str) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg, env_var_name) {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            load_toml_config(&path)
        }
        None => {
            tracing::info!("No configuration file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}
