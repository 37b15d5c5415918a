use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::Config;

pub const MAX_GRID_COLUMNS: u16 = 12;

/// How strongly a single launch moves an item's weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightFactor {
    Low,
    #[default]
    Default,
    High,
}

impl WeightFactor {
    pub fn alpha(self) -> f64 {
        match self {
            Self::Low => 0.1,
            Self::Default => 0.2,
            Self::High => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LauncherSettings {
    pub grid_columns: usize,
    pub show_favorites: bool,
    pub weight_factor: WeightFactor,
}

impl LauncherSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            grid_columns: cfg.grid_columns.max(1) as usize,
            show_favorites: cfg.show_favorites,
            weight_factor: cfg.weight_factor,
        }
    }
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub fn validate_grid_columns(value: u16) -> Result<(), String> {
    if (1..=MAX_GRID_COLUMNS).contains(&value) {
        Ok(())
    } else {
        Err(format!("Grid columns must be between 1 and {MAX_GRID_COLUMNS}."))
    }
}

/// Reactive preference source. Every subscriber is woken when a setting
/// actually changes; writes of an identical value are swallowed.
pub struct SettingsStore {
    tx: watch::Sender<LauncherSettings>,
}

impl SettingsStore {
    pub fn new(initial: LauncherSettings) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> LauncherSettings {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LauncherSettings> {
        self.tx.subscribe()
    }

    pub fn set_grid_columns(&self, columns: u16) -> Result<(), String> {
        validate_grid_columns(columns)?;
        self.update(|settings| settings.grid_columns = columns as usize);
        Ok(())
    }

    pub fn set_show_favorites(&self, show: bool) {
        self.update(|settings| settings.show_favorites = show);
    }

    pub fn set_weight_factor(&self, factor: WeightFactor) {
        self.update(|settings| settings.weight_factor = factor);
    }

    fn update(&self, apply: impl FnOnce(&mut LauncherSettings)) {
        self.tx.send_if_modified(|settings| {
            let before = *settings;
            apply(settings);
            *settings != before
        });
    }
}
