use std::time::Duration;
use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use common::prelude::{CacheConfig, DriveConfig, LockConfig, RetryPolicy};

pub const APP_NAME: &str = "drive";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port for the HTTP API
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Base URL of the remote node store
    #[serde(default)]
    pub api_base_url: Option<Url>,
    /// Bearer key for the remote node store (`DRIVE_API_KEY` overrides)
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_listing_ttl_secs")]
    pub listing_ttl_secs: u64,
    /// Cached entries kept before least-recently-used eviction
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: u64,
    /// How often expired cache entries are reclaimed
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Directory for log files (stdout only if not set)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_listen_port() -> u16 {
    3000
}

fn default_lock_timeout_secs() -> u64 {
    300
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_listing_ttl_secs() -> u64 {
    180
}

fn default_cache_max_entries() -> u64 {
    10_000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            api_base_url: None,
            api_key: None,
            lock_timeout_secs: default_lock_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            listing_ttl_secs: default_listing_ttl_secs(),
            cache_max_entries: default_cache_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Core tunables derived from this file
    pub fn drive_config(&self) -> DriveConfig {
        DriveConfig {
            lock: LockConfig {
                timeout: Duration::from_secs(self.lock_timeout_secs),
            },
            cache: CacheConfig {
                default_ttl: Duration::from_secs(self.cache_ttl_secs),
                listing_ttl: Duration::from_secs(self.listing_ttl_secs),
                max_entries: self.cache_max_entries,
            },
            retry: RetryPolicy::new(
                self.retry_attempts.max(1),
                Duration::from_millis(self.retry_base_delay_ms),
            ),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the drive directory (~/.drive)
    pub drive_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the drive directory path (custom or default ~/.drive)
    pub fn drive_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new drive directory with a config file
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let drive_dir = Self::drive_dir(custom_path)?;

        if drive_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }
        fs::create_dir_all(&drive_dir)?;

        let config = config.unwrap_or_default();
        let config_path = drive_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            drive_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the drive directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let drive_dir = Self::drive_dir(custom_path)?;

        if !drive_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = drive_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            drive_dir,
            config_path,
            config,
        })
    }

    /// Where log files go: the configured directory, else `<drive_dir>/logs`
    pub fn log_dir(&self) -> PathBuf {
        self.config
            .log_dir
            .clone()
            .unwrap_or_else(|| self.drive_dir.join(LOGS_DIR_NAME))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("drive directory not initialized. Run 'drive init' first")]
    NotInitialized,

    #[error("drive directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("drive");

        let config = AppConfig {
            listen_port: 4000,
            api_base_url: Some(Url::parse("https://api.example.com/v1").unwrap()),
            ..Default::default()
        };
        let created = AppState::init(Some(dir.clone()), Some(config.clone())).unwrap();
        assert!(created.config_path.exists());

        let loaded = AppState::load(Some(dir)).unwrap();
        assert_eq!(loaded.config, config);
    }

    #[test]
    fn test_init_twice_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("drive");

        AppState::init(Some(dir.clone()), None).unwrap();
        let err = AppState::init(Some(dir), None).unwrap_err();
        assert!(matches!(err, StateError::AlreadyInitialized));
    }

    #[test]
    fn test_load_requires_init() {
        let tmp = tempfile::tempdir().unwrap();
        let err = AppState::load(Some(tmp.path().join("missing"))).unwrap_err();
        assert!(matches!(err, StateError::NotInitialized));

        let err = AppState::load(Some(tmp.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, StateError::MissingFile(_)));
    }

    #[test]
    fn test_partial_config_gets_defaults() {
        let config: AppConfig =
            toml::from_str("listen_port = 8081\nlock_timeout_secs = 60\n").unwrap();
        assert_eq!(config.listen_port, 8081);
        assert_eq!(config.listing_ttl_secs, 180);

        let drive = config.drive_config();
        assert_eq!(drive.lock.timeout, Duration::from_secs(60));
        assert_eq!(drive.cache.default_ttl, Duration::from_secs(300));
        assert_eq!(drive.cache.max_entries, 10_000);
        assert_eq!(drive.retry.max_attempts, 3);
        assert_eq!(drive.retry.base_delay, Duration::from_millis(1000));
    }
}
