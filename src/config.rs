//! Application-level configuration loading, including the bout rules and storage selection.

use std::{env, fmt, fs, io::ErrorKind, path::PathBuf, str::FromStr, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::state::{budget::BudgetRules, clock::ClockRules, command::BoutRules};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DERBY_BOUT_BACK_CONFIG_PATH";
/// Environment variable that overrides the configured storage backend.
const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";
/// Default directory scanned for roster files.
const DEFAULT_ROSTER_DIR: &str = "rosters";
/// Shortest accepted clock ticker period.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);
/// Shortest accepted periodic persistence period.
const MIN_PERSIST_INTERVAL: Duration = Duration::from_millis(100);

/// Where bout snapshots are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON files in a local directory.
    #[default]
    File,
    /// MongoDB collection.
    Mongo,
    /// CouchDB database.
    Couch,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "couch" | "couchdb" => Ok(StorageBackend::Couch),
            other => Err(format!("unknown storage backend `{other}`")),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::File => f.write_str("file"),
            StorageBackend::Mongo => f.write_str("mongo"),
            StorageBackend::Couch => f.write_str("couch"),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Rules every new bout is played under.
    pub rules: BoutRules,
    /// Directory holding the roster text files.
    pub roster_dir: PathBuf,
    /// Selected storage backend.
    pub storage_backend: StorageBackend,
    /// Period of the clock ticker.
    pub tick_interval: Duration,
    /// Period at which a bout with running clocks is saved again.
    pub persist_interval: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    ///
    /// `STORAGE_BACKEND` takes precedence over the backend named in the file.
    pub fn load() -> Self {
        let mut config = Self::from_file();
        if let Some(value) = env::var(STORAGE_BACKEND_ENV)
            .ok()
            .filter(|value| !value.is_empty())
        {
            match value.parse() {
                Ok(backend) => config.storage_backend = backend,
                Err(err) => warn!(
                    error = %err,
                    configured = %config.storage_backend,
                    "ignoring {STORAGE_BACKEND_ENV}"
                ),
            }
        }
        config
    }

    fn from_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        backend = %app_config.storage_backend,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    rules: RawRules,
    roster_dir: PathBuf,
    storage_backend: StorageBackend,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "tick_interval_ms")]
    tick_interval: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "persist_interval_ms")]
    persist_interval: Duration,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            rules: RawRules::default(),
            roster_dir: PathBuf::from(DEFAULT_ROSTER_DIR),
            storage_backend: StorageBackend::default(),
            tick_interval: Duration::from_millis(100),
            persist_interval: Duration::from_secs(1),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            rules: value.rules.into(),
            roster_dir: value.roster_dir,
            storage_backend: value.storage_backend,
            tick_interval: value.tick_interval.max(MIN_TICK_INTERVAL),
            persist_interval: value.persist_interval.max(MIN_PERSIST_INTERVAL),
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
/// Rule section of the configuration file. Durations are in seconds.
struct RawRules {
    #[serde_as(as = "DurationSeconds<u64>")]
    period_seconds: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    jam_seconds: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    lineup_seconds: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    team_timeout_seconds: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    intermission_seconds: Duration,
    timeouts_per_period: u8,
    reviews_per_period: u8,
    retained_review_restores_credit: bool,
}

impl Default for RawRules {
    fn default() -> Self {
        let clock = ClockRules::default();
        let budget = BudgetRules::default();
        Self {
            period_seconds: clock.period,
            jam_seconds: clock.jam,
            lineup_seconds: clock.lineup,
            team_timeout_seconds: clock.team_timeout,
            intermission_seconds: clock.intermission,
            timeouts_per_period: budget.timeouts_per_period,
            reviews_per_period: budget.reviews_per_period,
            retained_review_restores_credit: budget.retained_review_restores_credit,
        }
    }
}

impl From<RawRules> for BoutRules {
    fn from(value: RawRules) -> Self {
        Self {
            clock: ClockRules {
                period: value.period_seconds,
                jam: value.jam_seconds,
                lineup: value.lineup_seconds,
                team_timeout: value.team_timeout_seconds,
                intermission: value.intermission_seconds,
            },
            budget: BudgetRules {
                timeouts_per_period: value.timeouts_per_period,
                reviews_per_period: value.reviews_per_period,
                retained_review_restores_credit: value.retained_review_restores_credit,
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
