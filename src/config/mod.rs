// src/config/mod.rs
// Configuration: file + environment, validated into runtime settings

pub mod env;
pub mod file;

pub use env::{ApiKeys, ESV_API_KEY_VAR, load_dotenv, parse_bool};
pub use file::VerseBotConfig;

use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::delivery::{
    Backoff, DEFAULT_MAX_MESSAGE_LENGTH, DeliveryConfig, Limits, MIN_PRACTICAL_CHUNK_SIZE,
};
use crate::error::{ConfigError, ConfigResult};
use crate::format::FormatOptions;
use crate::passage::{CachePolicy, Endpoints};
use crate::pipeline::PipelineSettings;
use crate::reference::{MatchMode, Translation};

/// Validated runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub default_translation: Translation,
    pub match_mode: MatchMode,
    pub format: FormatOptions,
    pub limits: Limits,
    pub cache: CachePolicy,
    pub lookup_timeout: Duration,
    pub send_timeout: Duration,
    pub backoff_base: Duration,
    pub report_transient_errors: bool,
    pub endpoints: Endpoints,
    pub api_keys: ApiKeys,
}

impl Settings {
    /// Load the config file, apply `.env` and environment overrides, validate.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(VerseBotConfig::config_path);
        load_dotenv(config_path.parent());
        let config = VerseBotConfig::load(Some(&config_path))?;
        let keys = ApiKeys::from_env(config.api_keys.esv.as_deref());
        Self::from_config(&config, keys)
    }

    /// Validate a parsed config together with resolved API keys.
    pub fn from_config(config: &VerseBotConfig, api_keys: ApiKeys) -> ConfigResult<Self> {
        let bot = &config.bot;

        let default_translation =
            Translation::from_code(bot.default_translation.trim()).ok_or_else(|| ConfigError::InvalidValue {
                key: "bot.default_translation",
                value: bot.default_translation.clone(),
            })?;

        let match_mode = if bot.detect_references_anywhere {
            MatchMode::Anywhere
        } else {
            MatchMode::Exact
        };

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            esv_url: config.endpoints.esv_url.clone().unwrap_or(defaults.esv_url),
            bible_api_url: config
                .endpoints
                .bible_api_url
                .clone()
                .unwrap_or(defaults.bible_api_url),
        };

        Ok(Self {
            default_translation,
            match_mode,
            format: FormatOptions {
                preserve_poetry: bot.preserve_poetry_formatting,
                translation_suffix: bot.translation_suffix,
            },
            limits: validate_limits(bot.max_message_length, bot.split_message_length),
            cache: CachePolicy {
                enabled: bot.cache_enabled,
                max_entries: bot.cache_max_entries,
                ttl: Duration::from_secs(bot.cache_ttl_secs),
            },
            lookup_timeout: Duration::from_secs(bot.lookup_timeout_secs.max(1)),
            send_timeout: Duration::from_secs(bot.send_timeout_secs.max(1)),
            backoff_base: Duration::from_millis(bot.backoff_base_ms),
            report_transient_errors: bot.report_transient_errors,
            endpoints,
            api_keys,
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            match_mode: self.match_mode,
            format: self.format,
            report_transient_errors: self.report_transient_errors,
        }
    }

    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            limits: self.limits,
            backoff: Backoff {
                base: self.backoff_base,
                ..Backoff::default()
            },
            send_timeout: self.send_timeout,
        }
    }
}

impl Default for Settings {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::from_config(&VerseBotConfig::default(), ApiKeys::default()).expect("default config validates")
    }
}

/// Clamp message limits into a usable shape.
///
/// Non-positive max → default; split 0 → same as max; small splits are
/// raised to the practical minimum; splits above max are capped.
pub fn validate_limits(max_message_length: i64, split_message_length: i64) -> Limits {
    let max = if max_message_length <= 0 {
        warn!(
            value = max_message_length,
            default = DEFAULT_MAX_MESSAGE_LENGTH,
            "max_message_length must be positive, using default"
        );
        DEFAULT_MAX_MESSAGE_LENGTH
    } else {
        max_message_length as usize
    };

    let split = if split_message_length <= 0 {
        if split_message_length < 0 {
            warn!(value = split_message_length, "Negative split_message_length, splitting at max_message_length");
        }
        max
    } else {
        let split = split_message_length as usize;
        if split < MIN_PRACTICAL_CHUNK_SIZE {
            warn!(
                value = split,
                min = MIN_PRACTICAL_CHUNK_SIZE,
                "split_message_length too small, raising to minimum"
            );
            MIN_PRACTICAL_CHUNK_SIZE.min(max)
        } else if split > max {
            warn!(value = split, max, "split_message_length exceeds max_message_length, capping");
            max
        } else {
            split
        }
    };

    Limits::new(max, split)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.default_translation, Translation::Kjv);
        assert_eq!(settings.match_mode, MatchMode::Exact);
        assert_eq!(settings.limits, Limits::new(2000, 2000));
        assert_eq!(settings.cache, CachePolicy::default());
        assert_eq!(settings.backoff_base, Duration::from_secs(1));
        assert_eq!(settings.endpoints, Endpoints::default());
        assert!(settings.report_transient_errors);
    }

    #[test]
    fn test_validate_limits() {
        assert_eq!(validate_limits(0, 0), Limits::new(2000, 2000));
        assert_eq!(validate_limits(-5, 100), Limits::new(2000, 100));
        assert_eq!(validate_limits(500, 0), Limits::new(500, 500));
        assert_eq!(validate_limits(500, 3), Limits::new(500, 8));
        assert_eq!(validate_limits(500, 900), Limits::new(500, 500));
        assert_eq!(validate_limits(500, 200), Limits::new(500, 200));
        assert_eq!(validate_limits(5, 3), Limits::new(5, 5));
    }

    #[test]
    fn test_from_config() {
        let toml = r#"
[bot]
default_translation = "ESV"
detect_references_anywhere = "on"
preserve_poetry_formatting = true
split_message_length = 300
cache_enabled = false
backoff_base_ms = 250

[endpoints]
esv_url = "http://localhost:9000/esv"
"#;
        let config: VerseBotConfig = toml::from_str(toml).unwrap();
        let keys = ApiKeys {
            esv: Some("key".into()),
        };
        let settings = Settings::from_config(&config, keys).unwrap();

        assert_eq!(settings.default_translation, Translation::Esv);
        assert_eq!(settings.match_mode, MatchMode::Anywhere);
        assert!(settings.format.preserve_poetry);
        assert_eq!(settings.limits, Limits::new(2000, 300));
        assert!(!settings.cache.enabled);
        assert_eq!(settings.endpoints.esv_url, "http://localhost:9000/esv");
        assert_eq!(settings.endpoints.bible_api_url, Endpoints::default().bible_api_url);

        let pipeline = settings.pipeline_settings();
        assert_eq!(pipeline.match_mode, MatchMode::Anywhere);
        let delivery = settings.delivery_config();
        assert_eq!(delivery.backoff.base, Duration::from_millis(250));
        assert_eq!(delivery.backoff.max_retries, 3);
    }

    #[test]
    fn test_unknown_default_translation() {
        let mut config = VerseBotConfig::default();
        config.bot.default_translation = "msg".into();
        assert!(matches!(
            Settings::from_config(&config, ApiKeys::default()),
            Err(ConfigError::InvalidValue {
                key: "bot.default_translation",
                ..
            })
        ));
    }

    #[test]
    fn test_load_from_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bot]\ndefault_translation = \"web\"\nmax_message_length = 100\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.default_translation, Translation::Web);
        assert_eq!(settings.limits, Limits::new(100, 100));
    }
}
