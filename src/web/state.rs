//! State shared by the dashboard handlers.

use crate::board::DepartureBoard;
use crate::settings::SettingsStore;
use crate::voice::Voice;
use crate::web::config::WebConfig;
use crate::wifi::WifiManager;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub struct AppState {
    pub store: Arc<SettingsStore>,
    pub board: Arc<DepartureBoard>,
    /// Present when the device manages its own Wi-Fi
    pub wifi: Option<Arc<WifiManager>>,
    /// Present when a cast device is configured
    pub voice: Option<Arc<Voice>>,
    pub audio_path: PathBuf,
    max_flash_messages: usize,
    flashes: Mutex<Vec<String>>,
    /// Set once a stop catalogue download was started for the current key
    stops_requested: AtomicBool,
}

impl AppState {
    pub fn new(store: Arc<SettingsStore>, board: Arc<DepartureBoard>, config: &WebConfig) -> Self {
        Self {
            store,
            board,
            wifi: None,
            voice: None,
            audio_path: config.audio_path.clone(),
            max_flash_messages: config.max_flash_messages,
            flashes: Mutex::new(Vec::new()),
            stops_requested: AtomicBool::new(false),
        }
    }

    pub fn with_wifi(mut self, wifi: Option<Arc<WifiManager>>) -> Self {
        self.wifi = wifi;
        self
    }

    pub fn with_voice(mut self, voice: Option<Arc<Voice>>) -> Self {
        self.voice = voice;
        self
    }

    /// Queue a message for the next page view. The oldest are dropped
    /// once the queue is full.
    pub fn flash(&self, message: impl Into<String>) {
        if let Ok(mut flashes) = self.flashes.lock() {
            flashes.push(message.into());
            let overflow = flashes.len().saturating_sub(self.max_flash_messages);
            flashes.drain(..overflow);
        }
    }

    /// Claim the one stop catalogue download allowed per API key. Returns
    /// false when one was already started.
    pub fn claim_stops_refresh(&self) -> bool {
        !self.stops_requested.swap(true, Ordering::SeqCst)
    }

    /// Allow another catalogue download, e.g. after the API key changed.
    pub fn reset_stops_refresh(&self) {
        self.stops_requested.store(false, Ordering::SeqCst);
    }

    /// Messages queued since the last page view.
    pub fn take_flashes(&self) -> Vec<String> {
        self.flashes
            .lock()
            .map(|mut flashes| std::mem::take(&mut *flashes))
            .unwrap_or_default()
    }
}
