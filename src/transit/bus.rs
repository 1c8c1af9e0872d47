//! Reading Buses open data: SIRI-SM stop monitoring and the stop catalogue.

use crate::error::Result;
use crate::settings::Coordinates;
use crate::transit::{fit_line, xml_child, xml_child_text, Departure};
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Default base URL of the Reading Buses open data portal.
pub const DEFAULT_BUS_API_URL: &str = "https://reading-opendata.r2p.com";

/// How many departures a stop shows.
pub const MAX_DEPARTURES: usize = 3;

/// Shown when the feed could not be reached.
pub const BUS_UNAVAILABLE: &str = "Bus info unavailable";

/// Shown when the feed answered with no visits.
pub const NO_DEPARTURES: &str = "No departures";

/// A stop from the operator's catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusStop {
    pub id: String,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl BusStop {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.latitude?, self.longitude?))
    }
}

pub struct BusClient {
    http: reqwest::Client,
    base_url: String,
    stops_cache: PathBuf,
}

impl BusClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        stops_cache: impl Into<PathBuf>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            stops_cache: stops_cache.into(),
        }
    }

    /// Fetch and parse the stop monitoring feed for one stop.
    pub async fn fetch_departures(&self, api_key: &str, stop_id: &str) -> Result<Vec<Departure>> {
        let url = format!("{}/api/v1/siri-sm", self.base_url);
        let body = self
            .http
            .get(&url)
            .query(&[("api_token", api_key), ("location", stop_id)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_siri(&body, &Local::now()))
    }

    /// Next departures for a stop, or `None` when the feed failed.
    pub async fn next_buses(&self, api_key: &str, stop_id: &str) -> Option<Vec<Departure>> {
        match self.fetch_departures(api_key, stop_id).await {
            Ok(departures) => Some(departures),
            Err(err) => {
                error!("Failed to get bus info for {}: {}", stop_id, err);
                None
            }
        }
    }

    /// The stop catalogue, from the local cache unless `reload` is set or
    /// there is no cache yet. A reload rewrites the cache.
    pub async fn bus_stops(&self, api_key: &str, reload: bool) -> Vec<BusStop> {
        if !reload && self.stops_cache.exists() {
            return self.cached_bus_stops();
        }

        match self.fetch_bus_stops(api_key).await {
            Ok(stops) => {
                if let Err(err) = write_stops(&self.stops_cache, &stops) {
                    warn!("Failed to cache bus stops at {:?}: {}", self.stops_cache, err);
                }
                info!("Loaded {} bus stops", stops.len());
                stops
            }
            Err(err) => {
                error!("Failed to get bus stops: {}", err);
                Vec::new()
            }
        }
    }

    /// Stops from the local cache; empty when there is none.
    pub fn cached_bus_stops(&self) -> Vec<BusStop> {
        match read_stops(&self.stops_cache) {
            Ok(stops) => stops,
            Err(err) => {
                debug!("No usable bus stop cache at {:?}: {}", self.stops_cache, err);
                Vec::new()
            }
        }
    }

    /// Coordinates of a stop according to the cached catalogue.
    pub fn bus_coordinates(&self, stop_id: &str) -> Option<Coordinates> {
        self.cached_bus_stops()
            .iter()
            .find(|stop| stop.id == stop_id)
            .and_then(BusStop::coordinates)
    }

    async fn fetch_bus_stops(&self, api_key: &str) -> Result<Vec<BusStop>> {
        let url = format!("{}/api/v1/busstops", self.base_url);
        let records: Vec<Value> = self
            .http
            .get(&url)
            .query(&[("api_token", api_key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(unique_stops(&records))
    }
}

fn read_stops(path: &Path) -> Result<Vec<BusStop>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn write_stops(path: &Path, stops: &[BusStop]) -> Result<()> {
    fs::write(path, serde_json::to_string(stops)?)?;
    Ok(())
}

/// Reduce catalogue records to one stop per `location_code`; later
/// records replace earlier ones.
pub fn unique_stops(records: &[Value]) -> Vec<BusStop> {
    let mut stops = BTreeMap::new();
    for record in records {
        let Some(id) = record.get("location_code").and_then(value_string) else {
            continue;
        };
        stops.insert(
            id.clone(),
            BusStop {
                id,
                name: record.get("description").and_then(value_string),
                latitude: record.get("latitude").and_then(value_number),
                longitude: record.get("longitude").and_then(value_number),
            },
        );
    }
    stops.into_values().collect()
}

fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extract up to [`MAX_DEPARTURES`] departures from a SIRI-SM document.
///
/// The expected time is used for monitored journeys, the aimed time
/// otherwise. Times are shown in the timezone of `now`. A document
/// without a stop monitoring delivery yields no departures.
pub fn parse_siri<Tz>(xml: &str, now: &DateTime<Tz>) -> Vec<Departure>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let doc = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(err) => {
            warn!("Unparseable SIRI document: {}", err);
            return Vec::new();
        }
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Siri" {
        return Vec::new();
    }
    let Some(delivery) = xml_child(root, "ServiceDelivery")
        .and_then(|service| xml_child(service, "StopMonitoringDelivery"))
    else {
        return Vec::new();
    };

    delivery
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "MonitoredStopVisit")
        .take(MAX_DEPARTURES)
        .map(|visit| {
            let journey = xml_child(visit, "MonitoredVehicleJourney");
            let text = |name: &str| journey.and_then(|j| xml_child_text(j, name));
            let call = journey.and_then(|j| xml_child(j, "MonitoredCall"));
            let call_time = |name: &str| {
                call.and_then(|c| xml_child_text(c, name))
                    .and_then(|ts| parse_timestamp(ts, now))
            };

            let monitored = text("Monitored")
                .map(|m| m.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            let expected = call_time("ExpectedArrivalTime");
            let chosen = match expected {
                Some(expected) if monitored => Some(expected),
                _ => call_time("AimedArrivalTime"),
            };

            Departure {
                line: text("PublishedLineName")
                    .or_else(|| text("LineRef"))
                    .unwrap_or_default()
                    .to_string(),
                destination: text("DestinationName")
                    .or_else(|| text("DestinationRef"))
                    .unwrap_or_default()
                    .to_string(),
                time: chosen
                    .as_ref()
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_default(),
                due_minutes: chosen.as_ref().map(|t| minutes_until(now, t)),
            }
        })
        .collect()
}

fn parse_timestamp<Tz: TimeZone>(ts: &str, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|t| t.with_timezone(&now.timezone()))
}

fn minutes_until<Tz: TimeZone>(now: &DateTime<Tz>, then: &DateTime<Tz>) -> i64 {
    let seconds = then.clone().signed_duration_since(now.clone()).num_seconds();
    (seconds as f64 / 60.0).round() as i64
}

/// `"{due}m {line} {destination}"`, with `--` for an unknown due time.
pub fn format_bus_line(departure: &Departure) -> String {
    let due = departure
        .due_minutes
        .map(|m| m.to_string())
        .unwrap_or_else(|| "--".to_string());
    let line = if departure.line.is_empty() { "??" } else { departure.line.as_str() };
    let destination = if departure.destination.is_empty() {
        "?"
    } else {
        departure.destination.as_str()
    };
    fit_line(&format!("{}m {} {}", due, line, destination))
}

/// Display lines for a stop; never empty.
pub fn format_bus_lines(departures: Option<&[Departure]>) -> Vec<String> {
    match departures {
        None => vec![BUS_UNAVAILABLE.to_string()],
        Some([]) => vec![NO_DEPARTURES.to_string()],
        Some(departures) => departures.iter().map(format_bus_line).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transit::MAX_LINE_CHARS;
    use chrono::Utc;

    const SIRI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Siri xmlns="http://www.siri.org.uk/siri" version="1.3">
  <ServiceDelivery>
    <StopMonitoringDelivery version="1.3">
      <MonitoredStopVisit>
        <MonitoredVehicleJourney>
          <LineRef>26</LineRef>
          <PublishedLineName>26</PublishedLineName>
          <DestinationName>Reading Station</DestinationName>
          <Monitored>true</Monitored>
          <MonitoredCall>
            <AimedArrivalTime>2024-05-01T12:10:00+00:00</AimedArrivalTime>
            <ExpectedArrivalTime>2024-05-01T12:12:00+00:00</ExpectedArrivalTime>
          </MonitoredCall>
        </MonitoredVehicleJourney>
      </MonitoredStopVisit>
      <MonitoredStopVisit>
        <MonitoredVehicleJourney>
          <LineRef>2a</LineRef>
          <DestinationRef>039028160001</DestinationRef>
          <Monitored>false</Monitored>
          <MonitoredCall>
            <AimedArrivalTime>2024-05-01T12:23:00Z</AimedArrivalTime>
            <ExpectedArrivalTime>2024-05-01T12:40:00Z</ExpectedArrivalTime>
          </MonitoredCall>
        </MonitoredVehicleJourney>
      </MonitoredStopVisit>
      <MonitoredStopVisit>
        <MonitoredVehicleJourney>
          <PublishedLineName>17</PublishedLineName>
          <DestinationName>Tilehurst</DestinationName>
        </MonitoredVehicleJourney>
      </MonitoredStopVisit>
      <MonitoredStopVisit>
        <MonitoredVehicleJourney>
          <PublishedLineName>33</PublishedLineName>
        </MonitoredVehicleJourney>
      </MonitoredStopVisit>
    </StopMonitoringDelivery>
  </ServiceDelivery>
</Siri>"#;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_siri_picks_time_by_monitoring() {
        let departures = parse_siri(SIRI, &noon());
        assert_eq!(departures.len(), MAX_DEPARTURES);

        assert_eq!(departures[0].line, "26");
        assert_eq!(departures[0].destination, "Reading Station");
        assert_eq!(departures[0].time, "12:12");
        assert_eq!(departures[0].due_minutes, Some(12));

        // not monitored: aimed time wins even though an expected time exists
        assert_eq!(departures[1].line, "2a");
        assert_eq!(departures[1].destination, "039028160001");
        assert_eq!(departures[1].time, "12:23");
        assert_eq!(departures[1].due_minutes, Some(23));

        assert_eq!(departures[2].time, "");
        assert_eq!(departures[2].due_minutes, None);
    }

    #[test]
    fn test_parse_siri_single_visit() {
        let xml = r#"<Siri><ServiceDelivery><StopMonitoringDelivery>
            <MonitoredStopVisit><MonitoredVehicleJourney>
              <PublishedLineName>X4</PublishedLineName>
              <DestinationName>Bracknell</DestinationName>
              <MonitoredCall><AimedArrivalTime>2024-05-01T11:59:10Z</AimedArrivalTime></MonitoredCall>
            </MonitoredVehicleJourney></MonitoredStopVisit>
            </StopMonitoringDelivery></ServiceDelivery></Siri>"#;
        let departures = parse_siri(xml, &noon());
        assert_eq!(departures.len(), 1);
        assert_eq!(departures[0].due_minutes, Some(-1));
    }

    #[test]
    fn test_parse_siri_malformed_documents() {
        assert!(parse_siri("not xml at all", &noon()).is_empty());
        assert!(parse_siri("<Other/>", &noon()).is_empty());
        assert!(parse_siri("<Siri><ServiceDelivery/></Siri>", &noon()).is_empty());
    }

    #[test]
    fn test_format_bus_lines() {
        let departures = parse_siri(SIRI, &noon());
        let lines = format_bus_lines(Some(departures.as_slice()));
        assert_eq!(lines[0], "12m 26 Reading Station");
        assert_eq!(lines[2], "--m 17 Tilehurst");

        assert_eq!(format_bus_lines(None), vec![BUS_UNAVAILABLE]);
        assert_eq!(format_bus_lines(Some(&[][..])), vec![NO_DEPARTURES]);
    }

    #[test]
    fn test_format_bus_line_is_bounded() {
        let departure = Departure {
            line: "X".repeat(30),
            destination: "Somewhere very far away indeed".repeat(3),
            time: String::new(),
            due_minutes: Some(999),
        };
        assert!(format_bus_line(&departure).chars().count() <= MAX_LINE_CHARS);

        let blank = Departure {
            line: String::new(),
            destination: String::new(),
            time: String::new(),
            due_minutes: None,
        };
        assert_eq!(format_bus_line(&blank), "--m ?? ?");
    }

    #[test]
    fn test_unique_stops() {
        let records: Vec<Value> = serde_json::from_str(
            r#"[
                {"location_code": "039026550001", "description": "Lima Court", "latitude": "51.45", "longitude": "-0.99"},
                {"location_code": "039026550001", "description": "Lima Court (dup)", "latitude": 51.46, "longitude": -0.98},
                {"description": "no code"},
                {"location_code": "039027180001", "description": "Russell Street"}
            ]"#,
        )
        .unwrap();
        let stops = unique_stops(&records);
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].name.as_deref(), Some("Lima Court (dup)"));
        assert_eq!(stops[0].coordinates(), Some(Coordinates::new(51.46, -0.98)));
        assert_eq!(stops[1].coordinates(), None);
    }

    #[test]
    fn test_bus_coordinates_from_cache() {
        let path = std::env::temp_dir().join(format!("busbox-stops-{}.json", std::process::id()));
        let stops = vec![BusStop {
            id: "A".to_string(),
            name: None,
            latitude: Some(1.5),
            longitude: Some(2.5),
        }];
        write_stops(&path, &stops).unwrap();

        let client = BusClient::new(reqwest::Client::new(), DEFAULT_BUS_API_URL, &path);
        assert_eq!(client.bus_coordinates("A"), Some(Coordinates::new(1.5, 2.5)));
        assert_eq!(client.bus_coordinates("B"), None);
        let _ = fs::remove_file(&path);
    }
}
