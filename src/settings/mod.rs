//! Device settings: the Settings/Tab model and its JSON file store.
//!
//! The whole record is persisted as one JSON document that is read,
//! migrated and rewritten wholesale on every change. There is no locking;
//! the device has a single user.

pub mod model;
pub mod store;

// Re-export commonly used items
pub use model::{mask_api_key, Coordinates, Settings, Tab, SETTINGS_TAB_ID};
pub use store::SettingsStore;
