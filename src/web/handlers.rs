//! HTTP handlers for the dashboard. Every form POST updates the settings
//! file, queues a flash message and redirects back to the dashboard.

use crate::board::ap_mode_lines;
use crate::error::Result;
use crate::settings::{mask_api_key, Settings};
use crate::web::page::{render_dashboard, DashboardView};
use crate::web::state::AppState;
use crate::wifi::{WifiMode, DEFAULT_INTERNET_TIMEOUT};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    Form,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

pub type SharedState = Arc<AppState>;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WifiForm {
    pub ssid: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StopForm {
    pub tab_id: String,
    pub stop_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TrainForm {
    pub tab_id: String,
    pub station_from: String,
    pub station_to: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiKeyForm {
    pub api_key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TabForm {
    pub tab_id: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SayForm {
    pub text: String,
}

fn back_to_dashboard() -> Redirect {
    Redirect::to("/")
}

/// Apply a settings change and flash `saved` or the reason it failed.
fn save(state: &AppState, saved: impl Into<String>, change: impl FnOnce(&mut Settings) -> Result<()>) {
    match state.store.update(change) {
        Ok(()) => state.flash(saved),
        Err(err) => {
            warn!("Settings change rejected: {}", err);
            state.flash(format!("Not saved: {}", err));
        }
    }
}

/// The dashboard page.
pub async fn index(State(state): State<SharedState>) -> Html<String> {
    let settings = state.store.load();
    let ap_mode = state.wifi.as_ref().map(|w| w.is_ap_mode()).unwrap_or(false);

    let (preview, condition) = if ap_mode {
        let port = state.board.web_port();
        (ap_mode_lines(&settings.ap_ssid, &settings.ap_password, port), None)
    } else {
        let snapshot = state.board.snapshot(&settings).await;
        (snapshot.lines, snapshot.condition)
    };
    let bus_stops = state.board.bus().cached_bus_stops();
    if bus_stops.is_empty() && !settings.api_key.is_empty() {
        refresh_bus_stops(&state, &settings.api_key);
    }

    let view = DashboardView {
        settings: &settings,
        masked_api_key: mask_api_key(&settings.api_key),
        flashes: state.take_flashes(),
        preview,
        weather_glyph: condition.map(|c| c.glyph()),
        bus_stops,
        stations: state.board.stations(),
        ap_mode,
        voice_enabled: state.voice.is_some(),
    };
    Html(render_dashboard(&view))
}

/// Download the stop catalogue in the background, at most once per API key.
/// The page shows the list once the cache is written.
fn refresh_bus_stops(state: &SharedState, api_key: &str) {
    if !state.claim_stops_refresh() {
        return;
    }
    info!("No bus stop cache, downloading the catalogue");
    let state = state.clone();
    let api_key = api_key.to_string();
    tokio::spawn(async move {
        let stops = state.board.bus().bus_stops(&api_key, true).await;
        if stops.is_empty() {
            warn!("Bus stop catalogue unavailable until the API key is saved again");
        }
    });
}

pub async fn save_wifi(State(state): State<SharedState>, Form(form): Form<WifiForm>) -> Redirect {
    let ssid = form.ssid.trim().to_string();
    let password = form.password.trim().to_string();

    save(&state, "Wi-Fi settings saved.", |settings| {
        settings.wifi_ssid = ssid.clone();
        settings.wifi_password = password.clone();
        Ok(())
    });

    if let Some(wifi) = state.wifi.clone() {
        let settings = state.store.load();
        state.flash(format!("Connecting to {}...", ssid));
        tokio::task::spawn_blocking(move || {
            match wifi.connect_with_fallback(
                &ssid,
                &password,
                &settings.ap_ssid,
                &settings.ap_password,
                DEFAULT_INTERNET_TIMEOUT,
            ) {
                Ok(WifiMode::Client) => info!("Connected to {}", ssid),
                Ok(WifiMode::AccessPoint) => warn!("Could not join {}, running access point", ssid),
                Err(err) => error!("Network switch failed: {}", err),
            }
        });
    }

    back_to_dashboard()
}

pub async fn save_stop(State(state): State<SharedState>, Form(form): Form<StopForm>) -> Redirect {
    let stop_id = form.stop_id.trim().to_string();
    let coordinates = state.board.bus().bus_coordinates(&stop_id);
    let label = if stop_id.is_empty() { "none" } else { stop_id.as_str() };

    save(&state, format!("Stop saved: {}", label), |settings| {
        settings.set_stop(&form.tab_id, &stop_id, coordinates)
    });
    back_to_dashboard()
}

pub async fn save_train_stop(State(state): State<SharedState>, Form(form): Form<TrainForm>) -> Redirect {
    let from = form.station_from.trim().to_uppercase();
    let to = form.station_to.trim().to_uppercase();
    let from_coordinates = state.board.station_coordinates(&from);
    let to_coordinates = state.board.station_coordinates(&to);

    save(&state, format!("Train route saved: {} -> {}", from, to), |settings| {
        settings.set_train_route(&form.tab_id, &from, &to, from_coordinates, to_coordinates)
    });
    back_to_dashboard()
}

pub async fn save_api_key(State(state): State<SharedState>, Form(form): Form<ApiKeyForm>) -> Redirect {
    let api_key = form.api_key.trim().to_string();
    save(&state, "API key saved.", |settings| {
        settings.api_key = api_key;
        Ok(())
    });
    state.reset_stops_refresh();
    back_to_dashboard()
}

pub async fn save_tab_name(State(state): State<SharedState>, Form(form): Form<TabForm>) -> Redirect {
    save(&state, "Tab renamed.", |settings| settings.rename_tab(&form.tab_id, &form.name));
    back_to_dashboard()
}

pub async fn select_tab(State(state): State<SharedState>, Form(form): Form<TabForm>) -> Redirect {
    if let Err(err) = state.store.update(|settings| settings.select_tab(&form.tab_id)) {
        warn!("Cannot select tab {}: {}", form.tab_id, err);
        state.flash(format!("Not saved: {}", err));
    }
    back_to_dashboard()
}

pub async fn add_tab(State(state): State<SharedState>, Form(form): Form<TabForm>) -> Redirect {
    match state.store.update(|settings| Ok(settings.add_tab(&form.name))) {
        Ok(id) => state.flash(format!("Tab {} added.", id)),
        Err(err) => {
            error!("Failed to add tab: {}", err);
            state.flash(format!("Not saved: {}", err));
        }
    }
    back_to_dashboard()
}

pub async fn remove_tab(State(state): State<SharedState>, Form(form): Form<TabForm>) -> Redirect {
    save(&state, "Tab removed.", |settings| settings.remove_tab(&form.tab_id));
    back_to_dashboard()
}

pub async fn say(State(state): State<SharedState>, Form(form): Form<SayForm>) -> Redirect {
    let text = form.text.trim();
    match &state.voice {
        None => state.flash("Voice is not configured."),
        Some(_) if text.is_empty() => state.flash("Nothing to say."),
        Some(voice) => match voice.say(text).await {
            Ok(()) => state.flash("Said it."),
            Err(err) => {
                error!("Failed to say {:?}: {}", text, err);
                state.flash(format!("Could not say it: {}", err));
            }
        },
    }
    back_to_dashboard()
}

/// The last synthesized speech, for the cast device to fetch.
pub async fn tts_audio(State(state): State<SharedState>) -> Response {
    match tokio::fs::read(&state.audio_path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response(),
        Err(err) => {
            warn!("No speech to serve at {:?}: {}", state.audio_path, err);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Health check endpoint.
pub async fn health_check(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let ap_mode = state.wifi.as_ref().map(|w| w.is_ap_mode()).unwrap_or(false);
    Json(json!({
        "status": "ok",
        "service": "busbox",
        "version": env!("CARGO_PKG_VERSION"),
        "ap_mode": ap_mode,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
