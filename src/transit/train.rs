//! National Rail OpenLDBWS departure boards and the station catalogue.

use crate::error::{BusboxError, Result};
use crate::settings::Coordinates;
use crate::transit::bus::NO_DEPARTURES;
use crate::transit::{escape_xml, fit_line, xml_child, xml_child_text};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, error, warn};

/// SOAP endpoint of the OpenLDBWS service.
pub const LDB_ENDPOINT: &str = "https://lite.realtime.nationalrail.co.uk/OpenLDBWS/ldb12.asmx";

const SOAP_ACTION: &str = "http://thalesgroup.com/RTTI/2015-05-14/ldb/GetDepBoardWithDetails";
const TOKEN_NS: &str = "http://thalesgroup.com/RTTI/2013-11-28/Token/types";
const LDB_NS: &str = "http://thalesgroup.com/RTTI/2021-11-01/ldb/";

/// Rows requested from the departure board.
pub const BOARD_ROWS: u32 = 10;

/// Shown when the board could not be fetched.
pub const TRAINS_UNAVAILABLE: &str = "Trains unavailable";

/// A service from the origin's board that calls at the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainService {
    /// Scheduled departure, HH:MM
    pub std: String,
    /// Estimated departure: "On time", "Delayed", "Cancelled" or HH:MM
    pub etd: String,
    pub platform: Option<String>,
    pub operator: String,
    /// Final destination of the service
    pub destination: String,
    /// Scheduled arrival at the requested destination, HH:MM
    pub arrival: String,
    /// Scheduled time at the last calling point of the service
    pub final_arrival: Option<String>,
}

impl TrainService {
    /// Estimated departure, falling back to the schedule when on time.
    pub fn estimated_departure(&self) -> &str {
        if self.etd.is_empty() || self.etd == "On time" {
            &self.std
        } else {
            &self.etd
        }
    }

    /// Minutes from scheduled departure to arrival at the destination.
    pub fn duration_minutes(&self) -> Option<i64> {
        minutes_between(&self.std, &self.arrival)
    }
}

pub struct TrainClient {
    http: reqwest::Client,
    token: String,
    endpoint: String,
}

impl TrainClient {
    pub fn new(http: reqwest::Client, token: impl Into<String>) -> Self {
        Self {
            http,
            token: token.into(),
            endpoint: LDB_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }

    /// Services from `from` that call at `to`.
    pub async fn departures(&self, from: &str, to: &str) -> Result<Vec<TrainService>> {
        if !self.has_token() {
            return Err(BusboxError::config_error("OpenLDBWS token is not configured (LDB_TOKEN)"));
        }

        let body = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", SOAP_ACTION)
            .body(departure_board_request(&self.token, from, BOARD_ROWS))
            .send()
            .await?
            .text()
            .await?;
        parse_board(&body, to)
    }

    /// Display lines for `from -> to`, or `None` (logged) on failure.
    pub async fn get_trains(&self, from: &str, to: &str) -> Option<Vec<String>> {
        match self.departures(from, to).await {
            Ok(services) => Some(format_train_lines(Some(services.as_slice()))),
            Err(err) => {
                error!("Failed to get trains {} -> {}: {}", from, to, err);
                None
            }
        }
    }
}

/// SOAP envelope for `GetDepBoardWithDetails`.
pub fn departure_board_request(token: &str, crs: &str, rows: u32) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:typ="{tns}" xmlns:ldb="{lns}">"#,
            "<soap:Header><typ:AccessToken><typ:TokenValue>{token}</typ:TokenValue></typ:AccessToken></soap:Header>",
            "<soap:Body><ldb:GetDepBoardWithDetailsRequest>",
            "<ldb:numRows>{rows}</ldb:numRows><ldb:crs>{crs}</ldb:crs>",
            "</ldb:GetDepBoardWithDetailsRequest></soap:Body></soap:Envelope>"
        ),
        tns = TOKEN_NS,
        lns = LDB_NS,
        token = escape_xml(token),
        rows = rows,
        crs = escape_xml(&crs.trim().to_uppercase()),
    )
}

/// Services on a departure board response that call at `to`.
pub fn parse_board(xml: &str, to: &str) -> Result<Vec<TrainService>> {
    let doc = roxmltree::Document::parse(xml)?;

    if let Some(fault) = doc.descendants().find(|n| n.tag_name().name() == "Fault") {
        let reason = xml_child_text(fault, "faultstring").unwrap_or("SOAP fault");
        return Err(BusboxError::upstream_error(reason.to_string()));
    }

    let to = to.trim().to_uppercase();
    let services = doc
        .descendants()
        .filter(|n| {
            n.tag_name().name() == "service"
                && n.parent_element()
                    .map(|p| p.tag_name().name() == "trainServices")
                    .unwrap_or(false)
        })
        .filter_map(|service| {
            let calling_points = xml_child(service, "subsequentCallingPoints")?
                .descendants()
                .filter(|n| n.tag_name().name() == "callingPoint")
                .collect::<Vec<_>>();
            let arrival = calling_points
                .iter()
                .find(|cp| xml_child_text(**cp, "crs") == Some(to.as_str()))
                .and_then(|cp| xml_child_text(*cp, "st"))?
                .to_string();
            let final_arrival = calling_points
                .last()
                .and_then(|cp| xml_child_text(*cp, "st"))
                .map(str::to_string);

            let destination = xml_child(service, "destination")
                .and_then(|d| d.descendants().find(|n| n.tag_name().name() == "locationName"))
                .and_then(|n| n.text())
                .map(|s| s.trim().to_string())
                .unwrap_or_default();

            Some(TrainService {
                std: xml_child_text(service, "std").unwrap_or_default().to_string(),
                etd: xml_child_text(service, "etd").unwrap_or_default().to_string(),
                platform: xml_child_text(service, "platform").map(str::to_string),
                operator: xml_child_text(service, "operatorCode")
                    .or_else(|| xml_child_text(service, "operator"))
                    .unwrap_or_default()
                    .to_string(),
                destination,
                arrival,
                final_arrival,
            })
        })
        .collect::<Vec<_>>();

    debug!("{} services call at {}", services.len(), to);
    Ok(services)
}

/// Minutes from `start` to `end` (both HH:MM), wrapping past midnight.
pub fn minutes_between(start: &str, end: &str) -> Option<i64> {
    let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").ok()?;
    let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").ok()?;
    let minutes = end.signed_duration_since(start).num_minutes();
    Some(if minutes <= 0 { minutes + 24 * 60 } else { minutes })
}

/// `"{est}->{arrival} p.{platform} {duration}m"`; the platform and
/// duration segments are dropped when unknown.
pub fn format_train_line(service: &TrainService) -> String {
    let mut line = format!("{}->{}", service.estimated_departure(), service.arrival);
    if let Some(platform) = &service.platform {
        line.push_str(&format!(" p.{}", platform));
    }
    if let Some(duration) = service.duration_minutes() {
        line.push_str(&format!(" {}m", duration));
    }
    fit_line(&line)
}

/// Display lines for a train route; never empty.
pub fn format_train_lines(services: Option<&[TrainService]>) -> Vec<String> {
    match services {
        None => vec![TRAINS_UNAVAILABLE.to_string()],
        Some([]) => vec![NO_DEPARTURES.to_string()],
        Some(services) => services.iter().map(format_train_line).collect(),
    }
}

/// A mainline station with its CRS code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub crs: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Station {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Load the station catalogue; missing or invalid files give an empty list.
pub fn load_stations(path: &Path) -> Vec<Station> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            debug!("No station catalogue at {:?}: {}", path, err);
            return Vec::new();
        }
    };
    serde_json::from_str(&text).unwrap_or_else(|err| {
        warn!("Invalid station catalogue {:?}: {}", path, err);
        Vec::new()
    })
}

/// Coordinates of the station with the given CRS code.
pub fn station_coordinates(stations: &[Station], crs: &str) -> Option<Coordinates> {
    let crs = crs.trim();
    stations
        .iter()
        .find(|s| s.crs.eq_ignore_ascii_case(crs))
        .map(Station::coordinates)
}
