//! Application configuration management.
//!
//! Configuration is read from `~/.config/caseload/config.json` and then
//! overridden field by field from `CASELOAD_*` environment variables.
//! A missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for the config directory path
const APP_NAME: &str = "caseload";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Reference collections change slowly; two minutes keeps rosters current
/// without refetching on every view.
const DEFAULT_CACHE_TTL_SECS: u64 = 120;

/// Minimum spacing between billing draft generation runs.
const DEFAULT_DRAFT_SYNC_INTERVAL_SECS: u64 = 300;

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_URL: &str = "CASELOAD_SUPABASE_URL";
const ENV_KEY: &str = "CASELOAD_SUPABASE_ANON_KEY";
const ENV_CACHE_TTL: &str = "CASELOAD_CACHE_TTL_SECS";
const ENV_SYNC_INTERVAL: &str = "CASELOAD_DRAFT_SYNC_INTERVAL_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub cache_ttl_secs: Option<u64>,
    pub draft_sync_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

/// Connection settings for the hosted store. Only exists when both the URL
/// and the key are present.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub url: String,
    pub anon_key: String,
    pub request_timeout: Duration,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Override fields from variables resolved by `lookup`. Unparseable
    /// numbers are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_URL) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = lookup(ENV_KEY) {
            self.supabase_anon_key = Some(key);
        }
        if let Some(ttl) = lookup(ENV_CACHE_TTL).and_then(|v| v.trim().parse().ok()) {
            self.cache_ttl_secs = Some(ttl);
        }
        if let Some(interval) = lookup(ENV_SYNC_INTERVAL).and_then(|v| v.trim().parse().ok()) {
            self.draft_sync_interval_secs = Some(interval);
        }
    }

    /// Remote store settings, or `None` when the store is not configured and
    /// callers should fall back to the static dataset.
    pub fn remote(&self) -> Option<RemoteConfig> {
        let url = self.supabase_url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let key = self
            .supabase_anon_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        Some(RemoteConfig {
            url: url.to_string(),
            anon_key: key.to_string(),
            request_timeout: self.request_timeout(),
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS))
    }

    pub fn draft_sync_interval(&self) -> Duration {
        Duration::from_secs(
            self.draft_sync_interval_secs
                .unwrap_or(DEFAULT_DRAFT_SYNC_INTERVAL_SECS),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(120));
        assert_eq!(config.draft_sync_interval(), Duration::from_secs(300));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.remote().is_none());
    }

    #[test]
    fn test_remote_requires_url_and_key() {
        let mut config = Config {
            supabase_url: Some("https://example.supabase.co".to_string()),
            ..Default::default()
        };
        assert!(config.remote().is_none());

        config.supabase_anon_key = Some("   ".to_string());
        assert!(config.remote().is_none());

        config.supabase_anon_key = Some("anon".to_string());
        let remote = config.remote().expect("remote should be configured");
        assert_eq!(remote.url, "https://example.supabase.co");
        assert_eq!(remote.anon_key, "anon");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config {
            cache_ttl_secs: Some(10),
            ..Default::default()
        };
        config.apply_overrides(lookup(&[
            (ENV_URL, "https://env.supabase.co"),
            (ENV_KEY, "env-key"),
            (ENV_CACHE_TTL, " 45 "),
            (ENV_SYNC_INTERVAL, "not-a-number"),
        ]));

        assert_eq!(config.supabase_url.as_deref(), Some("https://env.supabase.co"));
        assert_eq!(config.cache_ttl(), Duration::from_secs(45));
        assert_eq!(config.draft_sync_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let path = std::env::temp_dir()
            .join(format!("caseload-missing-{}", std::process::id()))
            .join(CONFIG_FILE);
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_load_from_partial_file() {
        let dir = std::env::temp_dir().join(format!("caseload-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        std::fs::write(&path, r#"{"cache_ttl_secs": 30}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.cache_ttl(), Duration::from_secs(30));
        assert!(config.supabase_url.is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
