//! Configuration loading for the `larder` CLI.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.larder/config.toml` (user)
//! 3. `/etc/larder/config.toml` (system)
//! 4. built-in defaults
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.larder/secrets.toml` (user, must be 0600)
//! 2. `/etc/larder/secrets.toml` (system, must be 0600)
//! 3. `SPOONACULAR_API_KEYS` (comma-separated)

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::gateway::CacheTtls;
use crate::quota::DEFAULT_DAILY_LIMIT;
use crate::store::FileStore;
use crate::{LarderError, Result};

/// Environment variable holding comma-separated Spoonacular keys.
pub const API_KEYS_ENV_VAR: &str = "SPOONACULAR_API_KEYS";

/// CLI configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub quota: QuotaSection,
    #[serde(default)]
    pub spoonacular: SpoonacularSection,
    #[serde(default)]
    pub fallback: FallbackSection,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// In-memory entry cap (default: 500, 0 disables caching).
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
    /// Default TTL in seconds (default: 3600).
    #[serde(default = "default_std_ttl")]
    pub std_ttl_secs: u64,
    /// Expired-entry sweep interval in seconds (default: 600, 0 disables).
    #[serde(default = "default_check_period")]
    pub check_period_secs: u64,
    /// Durable store directory (default: `<cache dir>/larder/store`).
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub ttl: TtlSection,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_keys: default_max_keys(),
            std_ttl_secs: default_std_ttl(),
            check_period_secs: default_check_period(),
            dir: None,
            ttl: TtlSection::default(),
        }
    }
}

fn default_max_keys() -> usize {
    500
}

fn default_std_ttl() -> u64 {
    3600
}

fn default_check_period() -> u64 {
    600
}

/// Per-operation TTL overrides in seconds. Unset fields keep the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TtlSection {
    #[serde(default)]
    pub personalized_secs: Option<u64>,
    #[serde(default)]
    pub search_secs: Option<u64>,
    #[serde(default)]
    pub random_secs: Option<u64>,
    #[serde(default)]
    pub details_secs: Option<u64>,
}

/// Quota configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaSection {
    /// Requests per key per day (default: 150).
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
}

impl Default for QuotaSection {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
        }
    }
}

fn default_daily_limit() -> u32 {
    DEFAULT_DAILY_LIMIT
}

/// Keyed provider configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpoonacularSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Fallback sources.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackSection {
    /// Use TheMealDB when the keyed provider fails (default: true).
    #[serde(default = "default_true")]
    pub mealdb: bool,
    #[serde(default)]
    pub mealdb_base_url: Option<String>,
    /// Serve built-in samples as a last resort (default: true).
    #[serde(default = "default_true")]
    pub samples: bool,
}

impl Default for FallbackSection {
    fn default() -> Self {
        Self {
            mealdb: true,
            mealdb_base_url: None,
            samples: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the first existing standard
    /// file is used, or defaults when there is none.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LarderError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            LarderError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(LarderError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".larder").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/larder/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    pub fn cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig::new()
            .max_keys(self.cache.max_keys)
            .std_ttl(Duration::from_secs(self.cache.std_ttl_secs));
        config = match self.cache.check_period_secs {
            0 => config.no_check_period(),
            secs => config.check_period(Duration::from_secs(secs)),
        };
        config
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        let ttl = &self.cache.ttl;
        let mut ttls = CacheTtls::default();
        if let Some(secs) = ttl.personalized_secs {
            ttls = ttls.personalized(Duration::from_secs(secs));
        }
        if let Some(secs) = ttl.search_secs {
            ttls = ttls.search(Duration::from_secs(secs));
        }
        if let Some(secs) = ttl.random_secs {
            ttls = ttls.random(Duration::from_secs(secs));
        }
        if let Some(secs) = ttl.details_secs {
            ttls = ttls.details(Duration::from_secs(secs));
        }
        ttls
    }

    /// Durable store directory.
    pub fn store_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(FileStore::default_dir)
    }
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub spoonacular: Option<SpoonacularSecrets>,
}

/// Spoonacular keys, in rotation order.
#[derive(Debug, Clone, Deserialize)]
pub struct SpoonacularSecrets {
    pub api_keys: Vec<String>,
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (keys may come from the
    /// environment).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".larder").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/larder/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load a secrets file after checking its permissions.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            LarderError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            LarderError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            LarderError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(LarderError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Spoonacular keys from the secrets file, falling back to
    /// `SPOONACULAR_API_KEYS`.
    pub fn api_keys(&self) -> Vec<String> {
        let from_file = self
            .spoonacular
            .as_ref()
            .map(|s| clean_keys(s.api_keys.iter().map(String::as_str)))
            .unwrap_or_default();
        if !from_file.is_empty() {
            return from_file;
        }
        std::env::var(API_KEYS_ENV_VAR)
            .map(|raw| clean_keys(raw.split(',')))
            .unwrap_or_default()
    }
}

fn clean_keys<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    keys.map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
