//! Service configuration resolution for mkb-content
//!
//! Upstream settings come from the TOML bootstrap config; each can be
//! overridden by an environment variable. Priority: ENV → TOML → default.

use mkb_common::config::{TomlConfig, UpstreamConfig};
use std::time::Duration;
use tracing::{info, warn};

pub const GENERATIVE_API_URL_ENV: &str = "MKB_GENERATIVE_API_URL";
pub const GENERATIVE_STORAGE_URL_ENV: &str = "MKB_GENERATIVE_STORAGE_URL";
pub const SOCIAL_API_URL_ENV: &str = "MKB_SOCIAL_API_URL";
pub const SOCIAL_API_TOKEN_ENV: &str = "MKB_SOCIAL_API_TOKEN";
pub const PUBLIC_BASE_URL_ENV: &str = "MKB_PUBLIC_BASE_URL";

/// Resolved upstream configuration used by the clients and services
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Generative microservice base, no trailing slash
    pub generative_api_url: String,
    /// Secondary image storage base, no trailing slash
    pub generative_storage_url: String,
    /// Social publishing service base, no trailing slash
    pub social_api_url: String,
    /// Service-level credential for the social service
    pub social_api_token: Option<String>,
    /// Public base URL of this backend, no trailing slash
    pub public_base_url: String,
    pub text_timeout: Duration,
    pub image_timeout: Duration,
    pub media_timeout: Duration,
    pub publish_timeout: Duration,
}

impl ServiceConfig {
    /// Build from the TOML upstream section without consulting the environment
    pub fn from_upstream(upstream: &UpstreamConfig) -> Self {
        Self {
            generative_api_url: trim_base(&upstream.generative_api_url),
            generative_storage_url: trim_base(&upstream.generative_storage_url),
            social_api_url: trim_base(&upstream.social_api_url),
            social_api_token: upstream
                .social_api_token
                .as_deref()
                .filter(|t| is_valid_token(t))
                .map(str::to_string),
            public_base_url: trim_base(&upstream.public_base_url),
            text_timeout: Duration::from_secs(upstream.text_timeout_secs),
            image_timeout: Duration::from_secs(upstream.image_timeout_secs),
            media_timeout: Duration::from_secs(upstream.media_timeout_secs),
            publish_timeout: Duration::from_secs(upstream.publish_timeout_secs),
        }
    }

    /// Build from the TOML config with environment overrides applied
    pub fn resolve(toml_config: &TomlConfig) -> Self {
        let mut config = Self::from_upstream(&toml_config.upstream);

        if let Some(url) = env_override(GENERATIVE_API_URL_ENV) {
            config.generative_api_url = trim_base(&url);
        }
        if let Some(url) = env_override(GENERATIVE_STORAGE_URL_ENV) {
            config.generative_storage_url = trim_base(&url);
        }
        if let Some(url) = env_override(SOCIAL_API_URL_ENV) {
            config.social_api_url = trim_base(&url);
        }
        if let Some(url) = env_override(PUBLIC_BASE_URL_ENV) {
            config.public_base_url = trim_base(&url);
        }

        config.social_api_token = resolve_social_api_token(
            std::env::var(SOCIAL_API_TOKEN_ENV).ok(),
            toml_config.upstream.social_api_token.clone(),
        );

        config
    }
}

/// Resolve the social service token: ENV → TOML
///
/// Returns None when neither source holds a usable value; publishing then
/// falls back to forwarding the caller's credential.
pub fn resolve_social_api_token(
    env_token: Option<String>,
    toml_token: Option<String>,
) -> Option<String> {
    let env_token = env_token.filter(|t| is_valid_token(t));
    let toml_token = toml_token.filter(|t| is_valid_token(t));

    if env_token.is_some() && toml_token.is_some() {
        warn!("Social API token found in environment and TOML config. Using environment.");
    }

    if let Some(token) = env_token {
        info!("Social API token loaded from environment variable");
        return Some(token.trim().to_string());
    }

    if let Some(token) = toml_token {
        info!("Social API token loaded from TOML config");
        return Some(token.trim().to_string());
    }

    info!("No social API token configured; caller credentials will be forwarded");
    None
}

fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
