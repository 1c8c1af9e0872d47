//! Composition of the transit and weather clients into the lines shown on
//! the display for one tab.

use crate::config::AppConfig;
use crate::settings::{Coordinates, Settings, SettingsStore, Tab};
use crate::transit::bus::format_bus_lines;
use crate::transit::train::{format_train_lines, load_stations, station_coordinates};
use crate::transit::weather::{DEFAULT_COUNTRY, DEFAULT_PLACE};
use crate::transit::{BusClient, Condition, Station, Today, TrainClient, WeatherClient};
use crate::wifi::WifiManager;
use chrono::Local;
use futures_util::stream::{self, BoxStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info};

/// Address nmcli gives the device while it runs the hotspot.
pub const HOTSPOT_ADDRESS: &str = "10.42.0.1";

/// What the board shows for one tab.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub lines: Vec<String>,
    /// `None` when the forecast was unavailable
    pub condition: Option<Condition>,
}

pub struct DepartureBoard {
    bus: BusClient,
    train: TrainClient,
    weather: WeatherClient,
    stations: Vec<Station>,
    web_port: u16,
}

impl DepartureBoard {
    pub fn new(bus: BusClient, train: TrainClient, weather: WeatherClient, stations: Vec<Station>) -> Self {
        Self {
            bus,
            train,
            weather,
            stations,
            web_port: crate::DEFAULT_WEB_PORT,
        }
    }

    /// Port the setup screen points at.
    pub fn with_web_port(mut self, port: u16) -> Self {
        self.web_port = port;
        self
    }

    /// Clients and catalogues as configured, sharing one HTTP client.
    pub fn from_config(config: &AppConfig, http: reqwest::Client) -> Self {
        let stations = load_stations(&config.train_stations_file);
        info!("Loaded {} train stations", stations.len());
        Self::new(
            BusClient::new(http.clone(), &config.bus_api_url, &config.bus_stops_file),
            TrainClient::new(http.clone(), &config.ldb_token),
            WeatherClient::new(http),
            stations,
        )
        .with_web_port(config.port)
    }

    pub fn bus(&self) -> &BusClient {
        &self.bus
    }

    pub fn web_port(&self) -> u16 {
        self.web_port
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn station_coordinates(&self, crs: &str) -> Option<Coordinates> {
        station_coordinates(&self.stations, crs)
    }

    /// Today's weather for the tab, or for the default place when the tab
    /// has no coordinates cached.
    pub async fn weather(&self, tab: Option<&Tab>) -> Option<Today> {
        match tab.and_then(Tab::weather_coordinates) {
            Some(coordinates) => self.weather.today(coordinates).await,
            None => self.weather.today_for_place(DEFAULT_PLACE, DEFAULT_COUNTRY).await,
        }
    }

    /// Display lines for the tab the display follows.
    pub async fn lines_for(&self, settings: &Settings) -> Vec<String> {
        self.snapshot(settings).await.lines
    }

    pub async fn lines_at(&self, settings: &Settings, now: &str) -> Vec<String> {
        self.snapshot_at(settings, now).await.lines
    }

    /// Lines plus the day's condition, at the current local time.
    pub async fn snapshot(&self, settings: &Settings) -> BoardSnapshot {
        let now = Local::now().format("%H:%M").to_string();
        self.snapshot_at(settings, &now).await
    }

    /// Like [`snapshot`](Self::snapshot) with a fixed clock string.
    pub async fn snapshot_at(&self, settings: &Settings, now: &str) -> BoardSnapshot {
        let tab = settings.display_tab();

        let buses = async {
            match tab.filter(|t| t.has_bus_stop()) {
                Some(t) => {
                    let departures = self.bus.next_buses(&settings.api_key, &t.stop_id).await;
                    format_bus_lines(departures.as_deref())
                }
                None => Vec::new(),
            }
        };
        let trains = async {
            match tab.filter(|t| t.has_train_route()) {
                Some(t) => self
                    .train
                    .get_trains(&t.station_from, &t.station_to)
                    .await
                    .unwrap_or_else(|| format_train_lines(None)),
                None => Vec::new(),
            }
        };
        let (weather, buses, trains) = tokio::join!(self.weather(tab), buses, trains);

        let condition = weather.as_ref().map(|today| today.condition);
        let header = match weather.and_then(Today::summary) {
            Some(summary) => format!("{} {}", now, summary),
            None => now.to_string(),
        };

        let mut lines = vec![header];
        lines.extend(buses);
        lines.extend(trains);
        debug!("Board for tab {:?}: {:?}", tab.map(|t| &t.id), lines);
        BoardSnapshot { lines, condition }
    }
}

/// Setup screen shown while the device runs its own access point.
pub fn ap_mode_lines(ssid: &str, password: &str, port: u16) -> Vec<String> {
    vec![
        "Wi-Fi setup".to_string(),
        format!("SSID {}", ssid),
        format!("Pass {}", password),
        format!("http://{}:{}", HOTSPOT_ADDRESS, port),
    ]
}

/// Snapshots of the display lines, one per `interval`. While the device is
/// in AP mode the setup screen replaces the board.
pub fn line_stream(
    board: Arc<DepartureBoard>,
    store: Arc<SettingsStore>,
    wifi: Option<Arc<WifiManager>>,
    interval: Duration,
) -> BoxStream<'static, Vec<String>> {
    let stream = stream::unfold(
        (board, store, wifi, time::interval(interval)),
        |(board, store, wifi, mut interval)| async move {
            interval.tick().await;
            let settings = store.load();
            let ap_mode = wifi.as_ref().map(|w| w.is_ap_mode()).unwrap_or(false);
            let lines = if ap_mode {
                ap_mode_lines(&settings.ap_ssid, &settings.ap_password, board.web_port())
            } else {
                board.lines_for(&settings).await
            };
            Some((lines, (board, store, wifi, interval)))
        },
    );

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::testing::RecordingRunner;
    use crate::transit::bus::BUS_UNAVAILABLE;
    use crate::transit::train::TRAINS_UNAVAILABLE;
    use futures_util::StreamExt;
    use std::path::PathBuf;

    const UNREACHABLE: &str = "http://127.0.0.1:1";

    fn temp_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("busbox-board-{}-{}-{}", std::process::id(), nanos, name))
    }

    fn offline_board() -> DepartureBoard {
        let http = reqwest::Client::new();
        DepartureBoard::new(
            BusClient::new(http.clone(), UNREACHABLE, temp_path("stops.json")),
            TrainClient::new(http.clone(), "token").with_endpoint(UNREACHABLE),
            WeatherClient::new(http).with_urls(UNREACHABLE, UNREACHABLE),
            vec![Station {
                name: "Reading".to_string(),
                crs: "RDG".to_string(),
                latitude: 51.4587,
                longitude: -0.9718,
            }],
        )
    }

    #[tokio::test]
    async fn test_lines_degrade_when_offline() {
        let board = offline_board();
        let snapshot = board.snapshot_at(&Settings::default(), "12:00").await;
        assert_eq!(snapshot.lines, vec!["12:00", BUS_UNAVAILABLE, TRAINS_UNAVAILABLE]);
        assert_eq!(snapshot.condition, None);
    }

    #[tokio::test]
    async fn test_lines_skip_unset_sections() {
        let board = offline_board();
        let mut settings = Settings::default();
        let id = settings.add_tab("Empty");
        settings.select_tab(&id).unwrap();
        let lines = board.lines_at(&settings, "07:30").await;
        assert_eq!(lines, vec!["07:30"]);
    }

    #[test]
    fn test_ap_mode_lines() {
        let lines = ap_mode_lines("busbox", "busboxBUSBOX", 8000);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "SSID busbox");
        assert_eq!(lines[2], "Pass busboxBUSBOX");
        assert_eq!(lines[3], "http://10.42.0.1:8000");
        assert_eq!(offline_board().web_port(), crate::DEFAULT_WEB_PORT);
        assert!(offline_board().station_coordinates("rdg").is_some());
    }

    #[tokio::test]
    async fn test_line_stream_shows_setup_screen_in_ap_mode() {
        let store = Arc::new(SettingsStore::new(temp_path("state.json")));
        let wifi = Arc::new(WifiManager::new(Arc::new(RecordingRunner::default()), "wlan0"));
        wifi.start_ap_mode("busbox", "pw").unwrap();

        let mut lines = line_stream(
            Arc::new(offline_board().with_web_port(9090)),
            store,
            Some(wifi),
            Duration::from_millis(10),
        );
        let first = lines.next().await.unwrap();
        assert_eq!(first[0], "Wi-Fi setup");
        assert_eq!(first[1], "SSID busbox");
        assert_eq!(first[3], "http://10.42.0.1:9090");
    }
}
