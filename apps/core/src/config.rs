use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::settings::{validate_grid_columns, WeightFactor};

const APP_DIR_NAME: &str = "pinboard";
const CONFIG_FILE_NAME: &str = "config.toml";
const HOME_ENV: &str = "PINBOARD_HOME";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid_columns: u16,
    pub show_favorites: bool,
    pub weight_factor: WeightFactor,
    pub max_favorites: u16,
    pub recompute_debounce_ms: u64,
    pub index_db_path: PathBuf,
    pub log_level: String,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let base = stable_app_data_dir();
        Self {
            grid_columns: 5,
            show_favorites: true,
            weight_factor: WeightFactor::Default,
            max_favorites: 100,
            recompute_debounce_ms: 30,
            index_db_path: base.join("favorites.sqlite3"),
            log_level: "info".to_string(),
            config_path: base.join(CONFIG_FILE_NAME),
        }
    }
}

/// Per-user directory holding the database, config and logs.
pub fn stable_app_data_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    stable_app_data_dir().join(CONFIG_FILE_NAME)
}

pub fn validate(cfg: &Config) -> Result<(), String> {
    validate_grid_columns(cfg.grid_columns)?;

    if cfg.max_favorites == 0 || cfg.max_favorites > 1000 {
        return Err("max_favorites out of range".into());
    }

    if cfg.recompute_debounce_ms > 5_000 {
        return Err("recompute_debounce_ms must be at most 5000".into());
    }

    if cfg.index_db_path.as_os_str().is_empty() {
        return Err("index_db_path is required".into());
    }

    if cfg.log_level.trim().is_empty() {
        return Err("log_level is required".into());
    }

    Ok(())
}

/// Loads the config at `path` (or the default location).
///
/// A missing file yields the defaults. `.json` and `.json5` files are read
/// as JSON5; everything else as TOML.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    if !config_path.exists() {
        let cfg = Config {
            config_path,
            ..Config::default()
        };
        validate(&cfg).map_err(ConfigError::Invalid)?;
        return Ok(cfg);
    }

    let raw = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
        path: config_path.clone(),
        source,
    })?;
    let mut cfg = parse(&config_path, &raw)?;
    cfg.config_path = config_path;
    validate(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    validate(cfg).map_err(ConfigError::Invalid)?;
    let encoded = toml::to_string_pretty(cfg)?;
    if let Some(parent) = cfg.config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(&cfg.config_path, encoded).map_err(|source| ConfigError::Io {
        path: cfg.config_path.clone(),
        source,
    })
}

fn parse(path: &Path, raw: &str) -> Result<Config, ConfigError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("json5"));

    let parsed = if is_json {
        json5::from_str::<Config>(raw).map_err(|e| e.to_string())
    } else {
        toml::from_str::<Config>(raw).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}
