//! Today's weather from Open-Meteo, reduced to one compact display line.

use crate::error::{BusboxError, Result};
use crate::settings::Coordinates;
use chrono::Local;
use serde::Deserialize;
use tracing::{debug, error, warn};

pub const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Place used when a tab has no coordinates of its own.
pub const DEFAULT_PLACE: &str = "Reading";
pub const DEFAULT_COUNTRY: &str = "GB";

const BASE_VARIABLES: &[&str] = &[
    "weathercode",
    "temperature_2m",
    "wind_speed_10m",
    "wind_gusts_10m",
    "precipitation",
    "rain",
    "snowfall",
    "cloudcover",
];

/// Not every model serves these; a 400 drops them.
const OPTIONAL_VARIABLES: &[&str] = &["precipitation_probability"];

const MINIMAL_VARIABLES: &[&str] = &[
    "weathercode",
    "temperature_2m",
    "wind_speed_10m",
    "wind_gusts_10m",
    "precipitation",
    "cloudcover",
];

/// First geocoding hit for a place name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Place {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Default, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<Place>>,
}

/// Hourly series for today. Variables the server did not send are empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Hourly {
    pub weathercode: Vec<Option<f64>>,
    pub temperature_2m: Vec<Option<f64>>,
    pub wind_speed_10m: Vec<Option<f64>>,
    pub wind_gusts_10m: Vec<Option<f64>>,
    /// mm
    pub precipitation: Vec<Option<f64>>,
    /// mm, rain only
    pub rain: Vec<Option<f64>>,
    /// cm
    pub snowfall: Vec<Option<f64>>,
    /// %
    pub cloudcover: Vec<Option<f64>>,
    /// %
    pub precipitation_probability: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    hourly: Hourly,
}

fn min_of(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::min)
}

fn max_of(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::max)
}

fn sum_of(values: &[Option<f64>]) -> f64 {
    values.iter().flatten().sum()
}

impl Hourly {
    /// Total rain in mm, using the rain-only series when it has any rain.
    pub fn rain_total(&self) -> f64 {
        let rain_only = self.rain.iter().flatten().any(|v| *v != 0.0);
        let series = if rain_only { &self.rain } else { &self.precipitation };
        (sum_of(series) * 10.0).round() / 10.0
    }

    /// Total snowfall in cm.
    pub fn snow_total(&self) -> f64 {
        (sum_of(&self.snowfall) * 10.0).round() / 10.0
    }

    fn mean_cloudcover(&self) -> Option<f64> {
        let values = self.cloudcover.iter().flatten().copied().collect::<Vec<_>>();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

/// `"{min}/{max}°C {p}% W{w}>{g}m/s"`. Segments without data are dropped,
/// as are a zero rain chance and a calm day.
pub fn build_compact_line(hourly: &Hourly) -> String {
    let mut parts = Vec::new();

    if let (Some(t_min), Some(t_max)) =
        (min_of(&hourly.temperature_2m), max_of(&hourly.temperature_2m))
    {
        parts.push(format!("{:.0}/{:.0}°C", t_min, t_max));
    }

    if let Some(p_max) = max_of(&hourly.precipitation_probability).filter(|p| *p > 0.0) {
        parts.push(format!("{:.0}%", p_max));
    }

    if let Some(w_max) = max_of(&hourly.wind_speed_10m).filter(|w| *w > 0.0) {
        match max_of(&hourly.wind_gusts_10m).filter(|g| *g > w_max) {
            Some(g_max) => parts.push(format!("W{:.0}>{:.0}m/s", w_max, g_max)),
            None => parts.push(format!("W{:.0}m/s", w_max)),
        }
    }

    parts.join(" ")
}

/// Overall condition of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Rain,
    FreezingRain,
    Snow,
    Thunderstorm,
    Unknown,
}

/// Ranking of WMO codes; the worst hour decides the day.
fn severity(code: Option<i64>) -> i8 {
    match code {
        None => -1,
        Some(95 | 96 | 99) => 6,
        Some(71 | 72 | 73 | 75 | 77 | 85 | 86) => 5,
        Some(51 | 53 | 55 | 56 | 57 | 61 | 63 | 65 | 66 | 67 | 80 | 81 | 82) => 4,
        Some(45 | 48) => 3,
        Some(3) => 2,
        Some(2) => 1,
        Some(_) => 0,
    }
}

impl Condition {
    pub fn from_wmo(code: i64) -> Self {
        match code {
            95 | 96 | 99 => Self::Thunderstorm,
            71 | 72 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            66 | 67 => Self::FreezingRain,
            51 | 53 | 55 | 56 | 57 | 61 | 63 | 65 | 80 | 81 | 82 => Self::Rain,
            45 | 48 => Self::Fog,
            3 => Self::Cloudy,
            2 => Self::PartlyCloudy,
            0 | 1 => Self::Clear,
            _ => Self::Unknown,
        }
    }

    /// Classify the day by its worst WMO code, or by snow, rain and cloud
    /// cover when no codes were sent.
    pub fn from_hourly(hourly: &Hourly) -> Self {
        if hourly.weathercode.is_empty() {
            if hourly.snow_total() > 0.0 {
                return Self::Snow;
            }
            if hourly.rain_total() > 0.0 {
                return Self::Rain;
            }
            return match hourly.mean_cloudcover() {
                None => Self::Clear,
                Some(c) if c < 25.0 => Self::Clear,
                Some(c) if c < 60.0 => Self::PartlyCloudy,
                Some(_) => Self::Cloudy,
            };
        }

        // first hour wins among equally severe codes
        let mut worst: Option<Option<i64>> = None;
        for code in hourly.weathercode.iter().map(|c| c.map(|c| c as i64)) {
            match worst {
                Some(current) if severity(code) <= severity(current) => {}
                _ => worst = Some(code),
            }
        }
        match worst.flatten() {
            Some(code) => Self::from_wmo(code),
            None => Self::Unknown,
        }
    }

    /// Symbol shown on the dashboard.
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Clear => "\u{2600}\u{fe0f}",
            Self::PartlyCloudy => "\u{26c5}",
            Self::Cloudy => "\u{2601}\u{fe0f}",
            Self::Fog => "\u{1f32b}\u{fe0f}",
            Self::Rain => "\u{1f327}\u{fe0f}",
            Self::FreezingRain => "\u{1f9ca}",
            Self::Snow => "\u{1f328}\u{fe0f}",
            Self::Thunderstorm => "\u{26c8}\u{fe0f}",
            Self::Unknown => "\u{2753}",
        }
    }
}

/// The day at a glance.
#[derive(Debug, Clone, PartialEq)]
pub struct Today {
    pub line: String,
    pub condition: Condition,
}

impl Today {
    /// The compact line, unless every segment was dropped.
    pub fn summary(self) -> Option<String> {
        Some(self.line).filter(|line| !line.is_empty())
    }
}

pub struct WeatherClient {
    http: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

impl WeatherClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            geocoding_url: GEOCODING_URL.to_string(),
            forecast_url: FORECAST_URL.to_string(),
        }
    }

    pub fn with_urls(mut self, geocoding_url: impl Into<String>, forecast_url: impl Into<String>) -> Self {
        self.geocoding_url = geocoding_url.into();
        self.forecast_url = forecast_url.into();
        self
    }

    pub async fn geocode(&self, place: &str, country: &str) -> Result<Place> {
        let response: GeocodingResponse = self
            .http
            .get(&self.geocoding_url)
            .query(&[
                ("name", place),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
                ("country", country),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        first_place(response, place, country)
    }

    /// Today's hourly series. A 400 means the model lacks a variable, so
    /// the request is retried without the optional ones and then with the
    /// minimal set.
    pub async fn fetch_today_hourly(&self, coordinates: Coordinates) -> Result<Hourly> {
        let with_optional = [BASE_VARIABLES, OPTIONAL_VARIABLES].concat();
        for variables in [with_optional.as_slice(), BASE_VARIABLES] {
            match self.request_hourly(coordinates, variables).await {
                Err(err) if err.http_status() == Some(400) => {
                    warn!("Forecast rejected {} variables, retrying with fewer", variables.len());
                }
                other => return other,
            }
        }
        self.request_hourly(coordinates, MINIMAL_VARIABLES).await
    }

    async fn request_hourly(&self, coordinates: Coordinates, variables: &[&str]) -> Result<Hourly> {
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        let latitude = coordinates.latitude.to_string();
        let longitude = coordinates.longitude.to_string();
        let hourly = variables.join(",");

        debug!("Requesting forecast for {} ({})", coordinates, hourly);
        let response: ForecastResponse = self
            .http
            .get(&self.forecast_url)
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("timezone", "UTC"),
                ("start_date", today.as_str()),
                ("end_date", today.as_str()),
                ("hourly", hourly.as_str()),
                ("wind_speed_unit", "ms"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.hourly)
    }

    /// Today's weather at `coordinates`, or `None` (logged) when the
    /// forecast is unavailable.
    pub async fn today(&self, coordinates: Coordinates) -> Option<Today> {
        match self.fetch_today_hourly(coordinates).await {
            Ok(hourly) => Some(Today {
                line: build_compact_line(&hourly),
                condition: Condition::from_hourly(&hourly),
            }),
            Err(err) => {
                error!("Failed to get weather for {}: {}", coordinates, err);
                None
            }
        }
    }

    pub async fn today_for_place(&self, place: &str, country: &str) -> Option<Today> {
        match self.geocode(place, country).await {
            Ok(hit) => self.today(hit.coordinates()).await,
            Err(err) => {
                error!("Failed to geocode {} ({}): {}", place, country, err);
                None
            }
        }
    }

    /// Compact line for today, `None` when unavailable or empty.
    pub async fn today_summary(&self, coordinates: Coordinates) -> Option<String> {
        self.today(coordinates).await.and_then(Today::summary)
    }

    pub async fn today_summary_for_place(&self, place: &str, country: &str) -> Option<String> {
        self.today_for_place(place, country).await.and_then(Today::summary)
    }
}

fn first_place(response: GeocodingResponse, place: &str, country: &str) -> Result<Place> {
    response
        .results
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| BusboxError::upstream_error(format!("Place not found: {} ({})", place, country)))
}
