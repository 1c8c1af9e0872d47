//! Web server configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the web server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Host to bind the server to
    pub host: String,
    /// Port to bind the server to
    pub port: u16,
    /// Synthesized speech served at `/tts.mp3`
    pub audio_path: PathBuf,
    /// Flash messages kept for the next page view
    pub max_flash_messages: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            audio_path: PathBuf::from(crate::voice::AUDIO_FILE),
            max_flash_messages: 10,
        }
    }
}

impl WebConfig {
    /// Create a new web configuration with custom host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_audio_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio_path = path.into();
        self
    }

    pub fn with_max_flash_messages(mut self, max: usize) -> Self {
        self.max_flash_messages = max;
        self
    }

    /// Get the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
