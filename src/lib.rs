//! # Bus Box - departures and weather on a Raspberry Pi OLED
//!
//! Shows the next buses, trains and today's weather for a saved route on a
//! 128x64 SSD1306 panel, with a small web dashboard for editing the
//! settings.
//!
//! ## Features
//!
//! - **Departure board**: Reading Buses SIRI-SM and National Rail OpenLDBWS
//! - **Weather**: one compact Open-Meteo line per day
//! - **Scrolling display**: marquee rows on an SSD1306 (feature `oled`) or a text-file emulator
//! - **Tabs**: several saved routes, edited from the dashboard
//! - **Wi-Fi fallback**: nmcli access point when the configured network is unreachable
//! - **Voice**: announcements on a cast device
//! - **Sensor logging**: DHT22 to RRD (feature `gpio`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use busbox::{
//!     transit::{http_client, BusClient, TrainClient, WeatherClient},
//!     DepartureBoard, Settings,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http = http_client()?;
//!     let board = DepartureBoard::new(
//!         BusClient::new(http.clone(), busbox::transit::bus::DEFAULT_BUS_API_URL, "bus_stops.json"),
//!         TrainClient::new(http.clone(), std::env::var("LDB_TOKEN").unwrap_or_default()),
//!         WeatherClient::new(http),
//!         Vec::new(),
//!     );
//!     for line in board.lines_for(&Settings::default()).await {
//!         println!("{}", line);
//!     }
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod config;
pub mod display;
pub mod error;
pub mod sensor;
pub mod settings;
pub mod shell;
pub mod transit;
pub mod voice;
pub mod web;
pub mod wifi;

// Re-export public API
pub use board::{ap_mode_lines, line_stream, BoardSnapshot, DepartureBoard};
pub use config::{AppConfig, DisplayKind};
pub use display::{run_display_loop, Display, DisplaySink, TextFileSink};
pub use error::{BusboxError, Result};
pub use settings::{Settings, SettingsStore, Tab};
pub use shell::{CommandRunner, SystemRunner};
pub use transit::{Departure, MAX_LINE_CHARS};
pub use voice::Voice;
pub use web::{start_web_server, AppState, WebConfig};
pub use wifi::{WifiManager, WifiMode};

#[cfg(feature = "oled")]
pub use display::Ssd1306Sink;

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8000;

/// The default scroll tick in milliseconds
pub const DEFAULT_SCROLL_MS: u64 = 500;

/// The default departure/weather refresh in seconds
pub const DEFAULT_REFRESH_SECS: u64 = 60;
