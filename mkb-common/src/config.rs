//! Bootstrap configuration loading and root folder resolution
//!
//! Configuration sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: the service logs a warning and starts
//! with defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "MKB_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "mkb.db";

/// Media cache directory name inside the root folder
pub const MEDIA_DIR: &str = "media";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root folder holding the database and media cache
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Upstream service endpoints
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            root_folder: None,
            logging: LoggingConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
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

/// Upstream endpoints and per-call timeouts
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the generative microservice (text, image, image download)
    #[serde(default = "default_generative_api_url")]
    pub generative_api_url: String,

    /// Secondary storage path where generated images are also exposed
    #[serde(default = "default_generative_storage_url")]
    pub generative_storage_url: String,

    /// Base URL of the social media publishing service
    #[serde(default = "default_social_api_url")]
    pub social_api_url: String,

    /// Service-level credential forwarded to the social service
    #[serde(default)]
    pub social_api_token: Option<String>,

    /// Public base URL of this backend, used for preview and fallback media URLs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default = "default_text_timeout_secs")]
    pub text_timeout_secs: u64,

    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,

    #[serde(default = "default_media_timeout_secs")]
    pub media_timeout_secs: u64,

    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            generative_api_url: default_generative_api_url(),
            generative_storage_url: default_generative_storage_url(),
            social_api_url: default_social_api_url(),
            social_api_token: None,
            public_base_url: default_public_base_url(),
            text_timeout_secs: default_text_timeout_secs(),
            image_timeout_secs: default_image_timeout_secs(),
            media_timeout_secs: default_media_timeout_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
        }
    }
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_generative_api_url() -> String {
    "http://127.0.0.1:8004/api/v1/marketing".to_string()
}

fn default_generative_storage_url() -> String {
    "http://127.0.0.1:8004/storage".to_string()
}

fn default_social_api_url() -> String {
    "http://127.0.0.1:8005/api/v1/marketing".to_string()
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_text_timeout_secs() -> u64 {
    30
}

fn default_image_timeout_secs() -> u64 {
    60
}

fn default_media_timeout_secs() -> u64 {
    15
}

fn default_publish_timeout_secs() -> u64 {
    30
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
}

/// Load the TOML config, falling back to defaults when no file is available
///
/// An explicitly requested file that fails to parse is an error; a missing
/// default-location file is not.
pub fn load_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        let config = load_toml_config(path)?;
        info!("Loaded config file: {}", path.display());
        return Ok(config);
    }

    match default_config_file() {
        Some(path) => match load_toml_config(&path) {
            Ok(config) => {
                info!("Loaded config file: {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                Ok(TomlConfig::default())
            }
        },
        None => {
            warn!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Find the first existing config file in the platform locations
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("mkb").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/mkb/config.toml");
    if cfg!(target_os = "linux") && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mkb"))
        .unwrap_or_else(|| PathBuf::from("./mkb_data"))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// Media cache directory inside a root folder
pub fn media_path(root_folder: &Path) -> PathBuf {
    root_folder.join(MEDIA_DIR)
}
