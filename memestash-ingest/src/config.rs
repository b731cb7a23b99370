//! Secret resolution for memestash-ingest
//!
//! Provides two-tier resolution with ENV → TOML priority for the AI key,
//! the Discord bot token and the outbound proxy.

use memestash_common::config::TomlConfig;
use tracing::{info, warn};

pub const AI_API_KEY_ENV: &str = "MEMESTASH_AI_API_KEY";
pub const DISCORD_TOKEN_ENV: &str = "MEMESTASH_DISCORD_TOKEN";
pub const PROXY_URL_ENV: &str = "MEMESTASH_PROXY_URL";

/// Secrets and endpoints after resolution
#[derive(Debug, Clone, Default)]
pub struct ResolvedSecrets {
    /// `None` selects offline analysis
    pub ai_api_key: Option<String>,
    pub discord_token: Option<String>,
    pub proxy_url: Option<String>,
}

impl ResolvedSecrets {
    pub fn resolve(toml_config: &TomlConfig) -> Self {
        Self {
            ai_api_key: resolve_secret(
                "AI API key",
                std::env::var(AI_API_KEY_ENV).ok(),
                toml_config.ai.api_key.clone(),
            ),
            discord_token: resolve_secret(
                "Discord bot token",
                std::env::var(DISCORD_TOKEN_ENV).ok(),
                toml_config.discord.bot_token.clone(),
            ),
            proxy_url: resolve_secret(
                "Proxy URL",
                std::env::var(PROXY_URL_ENV).ok(),
                toml_config.network.proxy_url.clone(),
            ),
        }
    }
}

/// Pick the environment value over the TOML value, ignoring blank ones
///
/// **Priority:** ENV → TOML
fn resolve_secret(label: &str, env_value: Option<String>, toml_value: Option<String>) -> Option<String> {
    let env_value = env_value.filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in multiple sources: environment, TOML. Using environment (highest priority).",
            label
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment", label);
        return Some(value.trim().to_string());
    }
    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", label);
        return Some(value.trim().to_string());
    }

    info!("{} not configured", label);
    None
}

/// A key is usable when it is not blank
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
