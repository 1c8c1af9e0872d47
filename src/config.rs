//! Runtime configuration from command-line flags and environment variables.

use crate::error::{BusboxError, Result};
use crate::transit::bus::DEFAULT_BUS_API_URL;
use crate::voice::{VoiceConfig, AUDIO_FILE, DEFAULT_LANG};
use crate::web::WebConfig;
use crate::{DEFAULT_REFRESH_SECS, DEFAULT_SCROLL_MS, DEFAULT_WEB_PORT};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Which panel the display writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DisplayKind {
    /// Plain-text file, for development off the Pi
    Emulator,
    /// SSD1306 over I2C (needs the `oled` feature)
    Ssd1306,
}

#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// Settings file
    #[arg(long, env = "BUSBOX_STATE_FILE", default_value = "state.json")]
    pub state_file: PathBuf,

    /// Bus stop catalogue cache
    #[arg(long, env = "BUSBOX_BUS_STOPS_FILE", default_value = "bus_stops.json")]
    pub bus_stops_file: PathBuf,

    /// Train station catalogue (JSON list of name, crs, latitude, longitude)
    #[arg(long, env = "BUSBOX_TRAIN_STATIONS_FILE", default_value = "train_stations.json")]
    pub train_stations_file: PathBuf,

    /// Reading Buses open data base URL
    #[arg(long, env = "BUSBOX_BUS_API_URL", default_value = DEFAULT_BUS_API_URL)]
    pub bus_api_url: String,

    /// National Rail OpenLDBWS token; train lookups fail without one
    #[arg(long, env = "LDB_TOKEN", default_value = "", hide_env_values = true)]
    pub ldb_token: String,

    /// Display driver
    #[arg(long, value_enum, default_value_t = DisplayKind::Emulator)]
    pub display: DisplayKind,

    /// Emulator output file
    #[arg(long, default_value = crate::display::sink::EMULATOR_FILE)]
    pub emulator_file: PathBuf,

    /// I2C bus of the OLED
    #[arg(long, default_value = "/dev/i2c-1")]
    pub i2c_bus: String,

    /// I2C address of the OLED
    #[arg(long, default_value = "0x3C", value_parser = parse_i2c_address)]
    pub i2c_address: u8,

    /// Scroll tick in milliseconds
    #[arg(long, default_value_t = DEFAULT_SCROLL_MS)]
    pub scroll_ms: u64,

    /// Departure and weather refresh in seconds
    #[arg(long, default_value_t = DEFAULT_REFRESH_SECS)]
    pub refresh_secs: u64,

    /// Wireless interface nmcli manages
    #[arg(long, default_value = "wlan0")]
    pub wifi_interface: String,

    /// Switch between client and access point mode with nmcli
    #[arg(long)]
    pub manage_wifi: bool,

    /// Cast device for spoken announcements
    #[arg(long, env = "BUSBOX_CAST_DEVICE")]
    pub cast_device: Option<String>,

    /// Require the voice to start
    #[arg(long)]
    pub voice: bool,

    /// Speech language
    #[arg(long, default_value = DEFAULT_LANG)]
    pub voice_lang: String,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    pub port: u16,
}

/// Accept `0x3C`, `3c` or `60`.
fn parse_i2c_address(value: &str) -> std::result::Result<u8, String> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None if value.chars().any(|c| c.is_ascii_alphabetic()) => u8::from_str_radix(value, 16),
        None => value.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid I2C address {:?}: {}", value, e))
}

impl AppConfig {
    /// Reject values the background tasks cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scroll_ms == 0 {
            return Err(BusboxError::config_error("--scroll-ms must be greater than 0"));
        }
        if self.refresh_secs == 0 {
            return Err(BusboxError::config_error("--refresh-secs must be greater than 0"));
        }
        if self.display == DisplayKind::Ssd1306 && !cfg!(feature = "oled") {
            return Err(BusboxError::config_error(
                "SSD1306 support not compiled in (enable the `oled` feature)",
            ));
        }
        Ok(())
    }

    pub fn scroll_interval(&self) -> Duration {
        Duration::from_millis(self.scroll_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn web_config(&self) -> WebConfig {
        WebConfig::default()
            .with_host(&self.host)
            .with_port(self.port)
            .with_audio_path(AUDIO_FILE)
    }

    pub fn voice_config(&self) -> VoiceConfig {
        VoiceConfig {
            cast_device: self.cast_device.clone(),
            lang: self.voice_lang.clone(),
            port: self.port,
            audio_path: PathBuf::from(AUDIO_FILE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: AppConfig,
    }

    fn parse(args: &[&str]) -> AppConfig {
        TestCli::try_parse_from(std::iter::once("busbox").chain(args.iter().copied()))
            .unwrap()
            .config
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.display, DisplayKind::Emulator);
        assert_eq!(config.i2c_bus, "/dev/i2c-1");
        assert_eq!(config.i2c_address, 0x3C);
        assert_eq!(config.scroll_interval(), Duration::from_millis(500));
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.wifi_interface, "wlan0");
        assert!(!config.manage_wifi);
        assert_eq!(config.web_config().bind_address(), "0.0.0.0:8000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags() {
        let config = parse(&[
            "--state-file", "/var/lib/busbox/state.json",
            "--i2c-address", "0x3d",
            "--port", "9000",
            "--cast-device", "Kitchen",
            "--manage-wifi",
        ]);
        assert_eq!(config.state_file, PathBuf::from("/var/lib/busbox/state.json"));
        assert_eq!(config.i2c_address, 0x3D);
        assert!(config.manage_wifi);

        let voice = config.voice_config();
        assert_eq!(voice.cast_device.as_deref(), Some("Kitchen"));
        assert_eq!(voice.port, 9000);

        let board = crate::board::DepartureBoard::from_config(&config, reqwest::Client::new());
        assert_eq!(board.web_port(), 9000);
    }

    #[test]
    fn test_i2c_address_forms() {
        assert_eq!(parse_i2c_address("0x3C"), Ok(0x3C));
        assert_eq!(parse_i2c_address("3d"), Ok(0x3D));
        assert_eq!(parse_i2c_address("60"), Ok(60));
        assert!(parse_i2c_address("0x1FF").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = parse(&[]);
        config.scroll_ms = 0;
        assert!(matches!(config.validate(), Err(BusboxError::Config(_))));
    }
}
