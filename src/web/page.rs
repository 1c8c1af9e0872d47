//! Server-rendered dashboard page.

use crate::settings::{Settings, Tab};
use crate::transit::{BusStop, Station};
use std::fmt::Write;

/// Everything the dashboard shows.
pub struct DashboardView<'a> {
    pub settings: &'a Settings,
    pub masked_api_key: String,
    pub flashes: Vec<String>,
    /// Lines the display is showing for the display tab
    pub preview: Vec<String>,
    /// Symbol for today's weather, when the forecast was available
    pub weather_glyph: Option<&'static str>,
    pub bus_stops: Vec<BusStop>,
    pub stations: &'a [Station],
    pub ap_mode: bool,
    pub voice_enabled: bool,
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const STYLE: &str = r#"
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #f4f5f7;
            color: #333;
            max-width: 720px;
            margin: 0 auto;
            padding: 20px;
        }
        h1 { font-size: 1.6rem; }
        .tabs { display: flex; flex-wrap: wrap; gap: 6px; margin-bottom: 16px; }
        .tabs form { display: inline; }
        .tabs button { padding: 6px 12px; border: 1px solid #ccc; border-radius: 6px; background: white; }
        .tabs button.active { background: #667eea; color: white; border-color: #667eea; }
        .card { background: white; border-radius: 10px; padding: 16px; margin-bottom: 16px; box-shadow: 0 2px 8px rgba(0,0,0,0.08); }
        .card h3 { margin-top: 0; color: #667eea; }
        label { display: block; margin: 6px 0; }
        input { padding: 4px; }
        .flash { background: #e7f7ec; border: 1px solid #9ad5aa; border-radius: 6px; padding: 8px; margin-bottom: 8px; }
        .warning { background: #fff4e0; border-color: #f0c060; }
        .oled { background: black; color: #9cf; font-family: monospace; padding: 10px; border-radius: 6px; white-space: pre; }
"#;

/// Render the full dashboard.
pub fn render_dashboard(view: &DashboardView<'_>) -> String {
    let settings = view.settings;
    let mut body = String::new();

    for message in &view.flashes {
        let _ = writeln!(body, r#"<div class="flash">{}</div>"#, escape_html(message));
    }
    if view.ap_mode {
        let _ = writeln!(
            body,
            r#"<div class="flash warning">Access point mode: join a Wi-Fi network below.</div>"#
        );
    }

    body.push_str(&render_tab_bar(settings));

    match settings.active_tab() {
        Some(tab) if !tab.is_settings() => body.push_str(&render_route_tab(view, tab)),
        _ => body.push_str(&render_settings_tab(view)),
    }

    let _ = write!(
        body,
        r#"<div class="card"><h3>Display {}</h3><div class="oled">{}</div></div>"#,
        view.weather_glyph.unwrap_or(""),
        view.preview
            .iter()
            .map(|line| escape_html(line))
            .collect::<Vec<_>>()
            .join("\n")
    );

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Bus Box</title>
    <style>{style}</style>
</head>
<body>
    <h1>Bus Box</h1>
{body}
</body>
</html>
"#,
        style = STYLE,
        body = body
    )
}

fn render_tab_bar(settings: &Settings) -> String {
    let mut html = String::from(r#"<div class="tabs">"#);
    for tab in &settings.tabs {
        let class = if tab.id == settings.active_tab_id { "active" } else { "" };
        let _ = write!(
            html,
            r#"<form method="post" action="/select_tab"><input type="hidden" name="tab_id" value="{id}"><button class="{class}">{name}</button></form>"#,
            id = escape_html(&tab.id),
            class = class,
            name = escape_html(&tab.name)
        );
    }
    html.push_str(
        r#"<form method="post" action="/add_tab"><input name="name" placeholder="New tab" size="8"><button>+</button></form>"#,
    );
    html.push_str("</div>\n");
    html
}

fn render_settings_tab(view: &DashboardView<'_>) -> String {
    let settings = view.settings;
    let mut html = String::new();

    let _ = write!(
        html,
        r#"<div class="card"><h3>Wi-Fi</h3>
<form method="post" action="/save_wifi">
<label>Network <input name="ssid" value="{ssid}"></label>
<label>Password <input name="password" type="password" value="{password}"></label>
<button>Save</button>
</form></div>
"#,
        ssid = escape_html(&settings.wifi_ssid),
        password = escape_html(&settings.wifi_password)
    );

    let _ = write!(
        html,
        r#"<div class="card"><h3>Reading Buses API key</h3>
<p>Current: <code>{masked}</code></p>
<form method="post" action="/save_api_key">
<label>New key <input name="api_key" autocomplete="off"></label>
<button>Save</button>
</form></div>
"#,
        masked = escape_html(&view.masked_api_key)
    );

    if view.voice_enabled {
        html.push_str(
            r#"<div class="card"><h3>Say something</h3>
<form method="post" action="/say">
<label><input name="text" size="40"></label>
<button>Say</button>
</form></div>
"#,
        );
    }
    html
}

fn render_route_tab(view: &DashboardView<'_>, tab: &Tab) -> String {
    let mut html = String::new();
    let id = escape_html(&tab.id);

    let _ = write!(
        html,
        r#"<div class="card"><h3>Tab</h3>
<form method="post" action="/save_tab_name">
<input type="hidden" name="tab_id" value="{id}">
<label>Name <input name="name" value="{name}"></label>
<button>Rename</button>
</form>
<form method="post" action="/remove_tab">
<input type="hidden" name="tab_id" value="{id}">
<button>Remove tab</button>
</form></div>
"#,
        id = id,
        name = escape_html(&tab.name)
    );

    let stop_options = view
        .bus_stops
        .iter()
        .map(|stop| {
            format!(
                r#"<option value="{}">{}</option>"#,
                escape_html(&stop.id),
                escape_html(stop.name.as_deref().unwrap_or(""))
            )
        })
        .collect::<String>();
    let _ = write!(
        html,
        r#"<div class="card"><h3>Bus stop</h3>
<form method="post" action="/save_stop">
<input type="hidden" name="tab_id" value="{id}">
<label>Stop code <input name="stop_id" list="bus-stops" value="{stop}"></label>
<datalist id="bus-stops">{options}</datalist>
<button>Save</button>
</form></div>
"#,
        id = id,
        stop = escape_html(&tab.stop_id),
        options = stop_options
    );

    let station_options = view
        .stations
        .iter()
        .map(|station| {
            format!(
                r#"<option value="{}">{}</option>"#,
                escape_html(&station.crs),
                escape_html(&station.name)
            )
        })
        .collect::<String>();
    let _ = write!(
        html,
        r#"<div class="card"><h3>Train</h3>
<form method="post" action="/save_train_stop">
<input type="hidden" name="tab_id" value="{id}">
<label>From <input name="station_from" list="stations" size="5" value="{from}"></label>
<label>To <input name="station_to" list="stations" size="5" value="{to}"></label>
<datalist id="stations">{options}</datalist>
<button>Save</button>
</form></div>
"#,
        id = id,
        from = escape_html(&tab.station_from),
        to = escape_html(&tab.station_to),
        options = station_options
    );
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::mask_api_key;

    fn view(settings: &Settings) -> DashboardView<'_> {
        DashboardView {
            settings,
            masked_api_key: mask_api_key(&settings.api_key),
            flashes: vec!["Saved <ok>".to_string()],
            preview: vec!["12:00 4/9°C".to_string(), "5m 26 Town".to_string()],
            weather_glyph: None,
            bus_stops: Vec::new(),
            stations: &[],
            ap_mode: false,
            voice_enabled: false,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn test_route_tab_page() {
        let mut settings = Settings::default();
        settings.rename_tab("1", "<Home>").unwrap();
        let html = render_dashboard(&view(&settings));

        assert!(html.contains("&lt;Home&gt;"));
        assert!(!html.contains("<Home>"));
        assert!(html.contains("Saved &lt;ok&gt;"));
        assert!(html.contains(r#"action="/save_stop""#));
        assert!(html.contains(r#"action="/save_train_stop""#));
        assert!(html.contains("5m 26 Town"));
        assert!(html.contains("<h3>Display </h3>"));
        assert!(!html.contains(r#"action="/save_wifi""#));
    }

    #[test]
    fn test_settings_tab_page_masks_key() {
        let mut settings = Settings::default();
        settings.api_key = "secretkey123".to_string();
        settings.select_tab("settings").unwrap();
        let mut view = view(&settings);
        view.voice_enabled = true;
        view.ap_mode = true;
        view.weather_glyph = Some(crate::transit::Condition::Rain.glyph());
        let html = render_dashboard(&view);

        assert!(html.contains(r#"action="/save_wifi""#));
        assert!(html.contains(r#"action="/say""#));
        assert!(html.contains("Access point mode"));
        assert!(html.contains(crate::transit::Condition::Rain.glyph()));
        assert!(html.contains("*123"));
        assert!(!html.contains("secretkey123"));
    }
}
