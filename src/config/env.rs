// src/config/env.rs
// Environment overrides and .env loading

use std::path::Path;
use tracing::{debug, warn};

/// ESV API key variable; wins over the config file
pub const ESV_API_KEY_VAR: &str = "ESV_API_KEY";

/// API keys resolved from the environment and the config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    /// ESV API key (ESV_API_KEY or `[api_keys] esv`)
    pub esv: Option<String>,
}

impl ApiKeys {
    /// Resolve keys from the process environment, falling back to `file_esv`.
    pub fn from_env(file_esv: Option<&str>) -> Self {
        Self::from_lookup(|name| std::env::var(name).ok(), file_esv)
    }

    /// Resolve keys through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F, file_esv: Option<&str>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = read_key(&lookup, ESV_API_KEY_VAR);
        if from_env.is_some() {
            debug!("Using ESV API key from environment");
        }
        let esv = from_env.or_else(|| {
            file_esv
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
        });

        let keys = Self { esv };
        keys.log_status();
        keys
    }

    /// Log which API keys are available (without exposing values)
    fn log_status(&self) {
        if self.esv.is_none() {
            warn!("No ESV API key configured - ESV requests will be refused");
        } else {
            debug!(keys = ?["ESV"], "API keys loaded");
        }
    }

    pub fn has_esv(&self) -> bool {
        self.esv.is_some()
    }
}

/// Read a single key, filtering empty values
fn read_key<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<String> {
    lookup(name)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Load `.env` from the config directory, then from the current directory.
///
/// Variables already set in the process are never overwritten.
pub fn load_dotenv(config_dir: Option<&Path>) {
    if let Some(dir) = config_dir {
        let path = dir.join(".env");
        if dotenvy::from_path(&path).is_ok() {
            debug!(path = %path.display(), "Loaded .env next to config");
        }
    }
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "Loaded .env from current directory");
    }
}

/// Lenient boolean: "1", "true", "yes", "on" and their negatives.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
