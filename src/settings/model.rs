//! Settings and tab data structures.

use crate::error::{BusboxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Identifier of the reserved tab that holds the device settings.
pub const SETTINGS_TAB_ID: &str = "settings";

/// Bus stop shown on a fresh device (Lima Court, Reading).
pub const DEFAULT_STOP_ID: &str = "039026550001";

/// Default train route origin (Reading).
pub const DEFAULT_STATION_FROM: &str = "RDG";

/// Default train route destination (London Paddington).
pub const DEFAULT_STATION_TO: &str = "PAD";

/// Default access point credentials used for first-time setup.
pub const DEFAULT_AP_SSID: &str = "busbox";
pub const DEFAULT_AP_PASSWORD: &str = "busboxBUSBOX";

const MASK: &str = "**********************************";

/// A latitude/longitude pair cached alongside a stop or station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// A saved bus/train route the dashboard can switch between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Tab {
    /// Stable identifier; `"settings"` is reserved
    pub id: String,
    /// Name shown in the dashboard tab bar
    pub name: String,
    /// Reading Buses stop (ActoCode), empty when unset
    pub stop_id: String,
    pub stop_coordinates: Option<Coordinates>,
    /// Train origin CRS code, empty when unset
    pub station_from: String,
    /// Train destination CRS code, empty when unset
    pub station_to: String,
    pub from_coordinates: Option<Coordinates>,
    pub to_coordinates: Option<Coordinates>,
}

impl Tab {
    /// The reserved settings tab.
    pub fn settings() -> Self {
        Self {
            id: SETTINGS_TAB_ID.to_string(),
            name: "Settings".to_string(),
            ..Default::default()
        }
    }

    /// An empty route tab.
    pub fn route(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// The route tab a fresh device starts with.
    pub fn default_route(id: impl Into<String>) -> Self {
        Self {
            stop_id: DEFAULT_STOP_ID.to_string(),
            station_from: DEFAULT_STATION_FROM.to_string(),
            station_to: DEFAULT_STATION_TO.to_string(),
            ..Self::route(id, "Home")
        }
    }

    pub fn is_settings(&self) -> bool {
        self.id == SETTINGS_TAB_ID
    }

    pub fn has_bus_stop(&self) -> bool {
        !self.stop_id.trim().is_empty()
    }

    pub fn has_train_route(&self) -> bool {
        !self.station_from.trim().is_empty() && !self.station_to.trim().is_empty()
    }

    /// Best coordinates to use for the weather of this tab.
    pub fn weather_coordinates(&self) -> Option<Coordinates> {
        self.stop_coordinates.or(self.from_coordinates)
    }
}

/// The single persisted settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub wifi_ssid: String,
    pub wifi_password: String,
    /// Reading Buses open data token
    pub api_key: String,
    pub ap_ssid: String,
    pub ap_password: String,
    /// All tabs; the settings tab is always first
    pub tabs: Vec<Tab>,
    pub active_tab_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        let route = Tab::default_route("1");
        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            api_key: String::new(),
            ap_ssid: DEFAULT_AP_SSID.to_string(),
            ap_password: DEFAULT_AP_PASSWORD.to_string(),
            active_tab_id: route.id.clone(),
            tabs: vec![Tab::settings(), route],
        }
    }
}

impl Settings {
    /// Restore the tab invariants after loading a hand-edited or old document.
    ///
    /// - tabs without an id and duplicate ids are dropped (first one wins)
    /// - the settings tab exists and sits at index 0
    /// - at least one route tab exists
    /// - `active_tab_id` names an existing tab
    pub fn normalize(&mut self) {
        let mut seen = HashSet::new();
        self.tabs
            .retain(|tab| !tab.id.trim().is_empty() && seen.insert(tab.id.clone()));

        let settings_tab = match self.tabs.iter().position(Tab::is_settings) {
            Some(index) => self.tabs.remove(index),
            None => Tab::settings(),
        };
        self.tabs.insert(0, settings_tab);

        if self.route_tabs().next().is_none() {
            let id = self.next_tab_id();
            self.tabs.push(Tab::default_route(id));
        }

        if self.tab(&self.active_tab_id).is_none() {
            self.active_tab_id = self.first_route_id();
        }
    }

    /// Tabs other than the reserved settings tab.
    pub fn route_tabs(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.iter().filter(|tab| !tab.is_settings())
    }

    pub fn tab(&self, id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tab(&self.active_tab_id)
    }

    /// The tab the display should show: the active one, or the first
    /// route tab while the settings tab is selected.
    pub fn display_tab(&self) -> Option<&Tab> {
        match self.active_tab() {
            Some(tab) if !tab.is_settings() => Some(tab),
            _ => self.route_tabs().next(),
        }
    }

    /// One more than the largest numeric tab id, or the smallest free id
    /// once the largest is `u32::MAX`.
    pub fn next_tab_id(&self) -> String {
        let ids = self
            .tabs
            .iter()
            .filter_map(|tab| tab.id.parse::<u32>().ok())
            .collect::<Vec<_>>();
        let max = ids.iter().copied().max().unwrap_or(0);
        let next = max
            .checked_add(1)
            .or_else(|| (1..=u32::MAX).find(|id| !ids.contains(id)))
            .unwrap_or_default();
        next.to_string()
    }

    /// Append a new empty route tab, select it and return its id.
    pub fn add_tab(&mut self, name: &str) -> String {
        let id = self.next_tab_id();
        let name = match name.trim() {
            "" => format!("Tab {}", id),
            trimmed => trimmed.to_string(),
        };
        self.tabs.push(Tab::route(id.clone(), name));
        self.active_tab_id = id.clone();
        id
    }

    /// Remove a route tab. The settings tab and the last route tab stay.
    pub fn remove_tab(&mut self, id: &str) -> Result<()> {
        if id == SETTINGS_TAB_ID {
            return Err(BusboxError::settings_error("the settings tab cannot be removed"));
        }
        let index = self
            .tabs
            .iter()
            .position(|tab| tab.id == id)
            .ok_or_else(|| BusboxError::settings_error(format!("unknown tab: {}", id)))?;
        if self.route_tabs().count() <= 1 {
            return Err(BusboxError::settings_error("at least one route tab must remain"));
        }

        self.tabs.remove(index);
        if self.active_tab_id == id {
            self.active_tab_id = self.first_route_id();
        }
        Ok(())
    }

    pub fn select_tab(&mut self, id: &str) -> Result<()> {
        if self.tab(id).is_none() {
            return Err(BusboxError::settings_error(format!("unknown tab: {}", id)));
        }
        self.active_tab_id = id.to_string();
        Ok(())
    }

    pub fn rename_tab(&mut self, id: &str, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BusboxError::settings_error("tab name cannot be empty"));
        }
        self.route_tab_mut(id)?.name = name.to_string();
        Ok(())
    }

    pub fn set_stop(&mut self, id: &str, stop_id: &str, coordinates: Option<Coordinates>) -> Result<()> {
        let tab = self.route_tab_mut(id)?;
        tab.stop_id = stop_id.trim().to_string();
        tab.stop_coordinates = coordinates;
        Ok(())
    }

    /// Store a train route; CRS codes are kept upper-case.
    pub fn set_train_route(
        &mut self,
        id: &str,
        from: &str,
        to: &str,
        from_coordinates: Option<Coordinates>,
        to_coordinates: Option<Coordinates>,
    ) -> Result<()> {
        let tab = self.route_tab_mut(id)?;
        tab.station_from = from.trim().to_uppercase();
        tab.station_to = to.trim().to_uppercase();
        tab.from_coordinates = from_coordinates;
        tab.to_coordinates = to_coordinates;
        Ok(())
    }

    fn route_tab_mut(&mut self, id: &str) -> Result<&mut Tab> {
        if id == SETTINGS_TAB_ID {
            return Err(BusboxError::settings_error("select a route tab first"));
        }
        self.tabs
            .iter_mut()
            .find(|tab| tab.id == id)
            .ok_or_else(|| BusboxError::settings_error(format!("unknown tab: {}", id)))
    }

    fn first_route_id(&self) -> String {
        self.route_tabs()
            .next()
            .map(|tab| tab.id.clone())
            .unwrap_or_else(|| SETTINGS_TAB_ID.to_string())
    }
}

/// Hide all but the last three characters of an API key.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    match chars.len() {
        0 => String::new(),
        n if n <= 3 => "***".to_string(),
        n => {
            let tail: String = chars[n - 3..].iter().collect();
            format!("{}{}", MASK, tail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariants(settings: &Settings) {
        assert!(settings.tabs[0].is_settings(), "settings tab must be first");
        assert_eq!(settings.tabs.iter().filter(|t| t.is_settings()).count(), 1);
        assert!(settings.route_tabs().count() >= 1, "a route tab must remain");
        assert!(settings.active_tab().is_some(), "active tab must exist");
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_invariants(&settings);
        assert_eq!(settings.active_tab_id, "1");
        assert_eq!(settings.ap_ssid, DEFAULT_AP_SSID);
        let home = settings.display_tab().unwrap();
        assert_eq!(home.stop_id, DEFAULT_STOP_ID);
        assert!(home.has_train_route());
    }

    #[test]
    fn test_add_tab_selects_new_tab() {
        let mut settings = Settings::default();
        let id = settings.add_tab("  Work ");
        assert_eq!(id, "2");
        assert_eq!(settings.active_tab_id, "2");
        assert_eq!(settings.active_tab().unwrap().name, "Work");

        let unnamed = settings.add_tab("");
        assert_eq!(settings.tab(&unnamed).unwrap().name, "Tab 3");
        assert_invariants(&settings);
    }

    #[test]
    fn test_next_tab_id_at_the_top_of_the_range() {
        let mut settings = Settings {
            tabs: vec![Tab::settings(), Tab::route("4294967295", "Edited"), Tab::route("1", "Home")],
            active_tab_id: "1".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.next_tab_id(), "2");

        let id = settings.add_tab("Work");
        assert_eq!(id, "2");
        assert_invariants(&settings);
    }

    #[test]
    fn test_settings_tab_is_never_removed() {
        let mut settings = Settings::default();
        settings.add_tab("Work");
        assert!(settings.remove_tab(SETTINGS_TAB_ID).is_err());
        assert_invariants(&settings);
    }

    #[test]
    fn test_last_route_tab_is_kept() {
        let mut settings = Settings::default();
        assert!(settings.remove_tab("1").is_err());
        assert_invariants(&settings);

        let id = settings.add_tab("Work");
        settings.remove_tab("1").unwrap();
        assert_eq!(settings.active_tab_id, id);
        assert!(settings.remove_tab(&id).is_err());
        assert_invariants(&settings);
    }

    #[test]
    fn test_remove_active_tab_reselects_first_route() {
        let mut settings = Settings::default();
        let second = settings.add_tab("Work");
        let third = settings.add_tab("Gym");
        settings.select_tab(&third).unwrap();
        settings.remove_tab(&third).unwrap();
        assert_eq!(settings.active_tab_id, "1");

        settings.select_tab(&second).unwrap();
        settings.remove_tab("1").unwrap();
        assert_eq!(settings.active_tab_id, second);
        assert!(settings.remove_tab("nope").is_err());
    }

    #[test]
    fn test_select_and_display_tab() {
        let mut settings = Settings::default();
        settings.select_tab(SETTINGS_TAB_ID).unwrap();
        assert!(settings.active_tab().unwrap().is_settings());
        assert_eq!(settings.display_tab().unwrap().id, "1");
        assert!(settings.select_tab("42").is_err());
        assert_eq!(settings.active_tab_id, SETTINGS_TAB_ID);
    }

    #[test]
    fn test_route_edits_reject_settings_tab() {
        let mut settings = Settings::default();
        assert!(settings.rename_tab(SETTINGS_TAB_ID, "Mine").is_err());
        assert!(settings.set_stop(SETTINGS_TAB_ID, "123", None).is_err());
        assert!(settings
            .set_train_route(SETTINGS_TAB_ID, "RDG", "PAD", None, None)
            .is_err());
        assert!(settings.rename_tab("1", "   ").is_err());

        settings.rename_tab("1", "Commute").unwrap();
        settings
            .set_train_route("1", " twy ", "rdg", None, Some(Coordinates::new(51.4, -0.97)))
            .unwrap();
        let tab = settings.tab("1").unwrap();
        assert_eq!(tab.name, "Commute");
        assert_eq!(tab.station_from, "TWY");
        assert_eq!(tab.station_to, "RDG");
        assert!(tab.to_coordinates.is_some());
    }

    #[test]
    fn test_normalize_repairs_tabs() {
        let mut settings = Settings {
            tabs: vec![
                Tab::route("3", "B"),
                Tab::settings(),
                Tab::route("3", "duplicate"),
                Tab::route("", "no id"),
            ],
            active_tab_id: "missing".to_string(),
            ..Settings::default()
        };
        settings.normalize();
        assert_invariants(&settings);
        assert_eq!(settings.tabs.len(), 2);
        assert_eq!(settings.tabs[1].name, "B");
        assert_eq!(settings.active_tab_id, "3");
    }

    #[test]
    fn test_normalize_adds_route_tab_when_missing() {
        let mut settings = Settings {
            tabs: vec![],
            active_tab_id: String::new(),
            ..Settings::default()
        };
        settings.normalize();
        assert_invariants(&settings);
        assert_eq!(settings.active_tab_id, "1");
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key(""), "");
        assert_eq!(mask_api_key("ab"), "***");
        let masked = mask_api_key("secret-token-xyz");
        assert!(masked.ends_with("xyz"));
        assert!(!masked.contains("secret"));
    }

    #[test]
    fn test_coordinates_display() {
        assert_eq!(Coordinates::new(51.5, -0.25).to_string(), "51.5,-0.25");
    }
}
