//! Flat JSON file store for [`Settings`].

use crate::error::Result;
use crate::settings::model::{Settings, Tab, DEFAULT_AP_PASSWORD, DEFAULT_AP_SSID};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads and rewrites the settings document at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings, falling back to defaults when the file is
    /// missing or unreadable. The document is migrated on every read.
    pub fn load(&self) -> Settings {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) => {
                debug!("No settings at {:?} ({}), using defaults", self.path, err);
                return Settings::default();
            }
        };
        match migrate(&text) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Ignoring unreadable settings file {:?}: {}", self.path, err);
                Settings::default()
            }
        }
    }

    /// Write the whole document.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json)?;
        debug!("Settings saved to {:?}", self.path);
        Ok(())
    }

    /// Read-modify-write. Nothing is written when `change` fails.
    pub fn update<T>(&self, change: impl FnOnce(&mut Settings) -> Result<T>) -> Result<T> {
        let mut settings = self.load();
        let value = change(&mut settings)?;
        self.save(&settings)?;
        Ok(value)
    }
}

/// Every shape the settings document has had on disk.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoredSettings {
    wifi_ssid: String,
    wifi_password: String,
    api_key: String,
    ap_ssid: Option<String>,
    ap_password: Option<String>,
    tabs: Option<Vec<Tab>>,
    active_tab_id: Option<String>,
    // single-route documents kept these at the top level
    selected_stop_id: Option<String>,
    stop_id: Option<String>,
    station_from: Option<String>,
    station_to: Option<String>,
}

/// Parse a stored document of any revision into current [`Settings`].
fn migrate(text: &str) -> Result<Settings> {
    let stored: StoredSettings = serde_json::from_str(text)?;

    let tabs = match stored.tabs {
        Some(tabs) => tabs,
        None => {
            let mut route = Tab::default_route("1");
            if let Some(stop) = stored.selected_stop_id.or(stored.stop_id) {
                route.stop_id = stop;
            }
            if let Some(from) = stored.station_from {
                route.station_from = from;
            }
            if let Some(to) = stored.station_to {
                route.station_to = to;
            }
            vec![Tab::settings(), route]
        }
    };

    let mut settings = Settings {
        wifi_ssid: stored.wifi_ssid,
        wifi_password: stored.wifi_password,
        api_key: stored.api_key,
        ap_ssid: stored.ap_ssid.unwrap_or_else(|| DEFAULT_AP_SSID.to_string()),
        ap_password: stored
            .ap_password
            .unwrap_or_else(|| DEFAULT_AP_PASSWORD.to_string()),
        tabs,
        active_tab_id: stored.active_tab_id.unwrap_or_default(),
    };
    settings.normalize();
    Ok(settings)
}
