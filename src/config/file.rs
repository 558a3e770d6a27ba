// src/config/file.rs
// File-based configuration from ~/.config/versebot/config.toml

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::env::parse_bool;
use crate::error::{ConfigError, ConfigResult};

/// Top-level config structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct VerseBotConfig {
    #[serde(default)]
    pub bot: BotSection,
    #[serde(default)]
    pub api_keys: ApiKeysSection,
    #[serde(default)]
    pub endpoints: EndpointsSection,
}

/// `[bot]` section, as written. Validated by `Settings::from_config`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotSection {
    pub default_translation: String,
    /// Accepts booleans and "true"/"yes"/"1"/"on"
    #[serde(deserialize_with = "flexible_bool")]
    pub detect_references_anywhere: bool,
    pub preserve_poetry_formatting: bool,
    pub translation_suffix: bool,
    pub max_message_length: i64,
    /// 0 disables splitting below the message limit
    pub split_message_length: i64,
    pub cache_enabled: bool,
    pub cache_max_entries: u64,
    pub cache_ttl_secs: u64,
    pub lookup_timeout_secs: u64,
    pub send_timeout_secs: u64,
    pub backoff_base_ms: u64,
    pub report_transient_errors: bool,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            default_translation: "kjv".to_string(),
            detect_references_anywhere: false,
            preserve_poetry_formatting: false,
            translation_suffix: true,
            max_message_length: 2000,
            split_message_length: 0,
            cache_enabled: true,
            cache_max_entries: 100,
            cache_ttl_secs: 3600,
            lookup_timeout_secs: 10,
            send_timeout_secs: 30,
            backoff_base_ms: 1000,
            report_transient_errors: true,
        }
    }
}

/// `[api_keys]` section
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct ApiKeysSection {
    pub esv: Option<String>,
}

/// `[endpoints]` section; unset entries use the public services
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct EndpointsSection {
    pub esv_url: Option<String>,
    pub bible_api_url: Option<String>,
}

impl VerseBotConfig {
    /// Load config from `path`, or the default location.
    ///
    /// A missing file yields defaults; unreadable or malformed files are errors.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config from file");
        Ok(config)
    }

    /// Default config file path
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("versebot")
            .join("config.toml")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlexibleBool {
    Bool(bool),
    Int(i64),
    Str(String),
}

fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match FlexibleBool::deserialize(deserializer)? {
        FlexibleBool::Bool(b) => b,
        FlexibleBool::Int(i) => i == 1,
        FlexibleBool::Str(s) => parse_bool(&s).unwrap_or(false),
    })
}
