//! Clients for the public transit and weather services, and the reduction
//! of their responses to short display-ready strings.

pub mod bus;
pub mod train;
pub mod weather;

// Re-export commonly used items
pub use bus::{BusClient, BusStop};
pub use train::{Station, TrainClient, TrainService};
pub use weather::{Condition, Hourly, Today, WeatherClient};

use crate::error::Result;
use reqwest::header;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on the length of any formatted departure line, in characters.
pub const MAX_LINE_CHARS: usize = 48;

/// Default upstream request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One upcoming departure. Fetched per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Departure {
    /// Line or service identifier, e.g. "26"
    pub line: String,
    /// Destination text as published by the operator
    pub destination: String,
    /// Local departure time as HH:MM, empty when unknown
    pub time: String,
    /// Whole minutes until departure, negative when overdue
    pub due_minutes: Option<i64>,
}

/// Build the shared HTTP client used by every upstream call.
pub fn http_client() -> Result<reqwest::Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(concat!("busbox/", env!("CARGO_PKG_VERSION"))),
    );

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(DEFAULT_TIMEOUT)
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Cut `line` down to [`MAX_LINE_CHARS`] characters.
pub fn fit_line(line: &str) -> String {
    line.chars().take(MAX_LINE_CHARS).collect()
}

/// Escape text for inclusion in an XML document.
pub(crate) fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// First direct child element with the given local name.
pub(crate) fn xml_child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

/// Trimmed, non-empty text of the first direct child with the given name.
pub(crate) fn xml_child_text<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    xml_child(node, name)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_line_bounds_length() {
        assert_eq!(fit_line("short"), "short");
        let long = "x".repeat(200);
        assert_eq!(fit_line(&long).chars().count(), MAX_LINE_CHARS);
        let wide = "°".repeat(60);
        assert_eq!(fit_line(&wide).chars().count(), MAX_LINE_CHARS);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b>&'\""), "a&lt;b&gt;&amp;&apos;&quot;");
    }

    #[test]
    fn test_xml_child_text_ignores_namespaces() {
        let doc = roxmltree::Document::parse(
            r#"<a xmlns:x="urn:x"><x:b> hi </x:b><c/></a>"#,
        )
        .unwrap();
        let root = doc.root_element();
        assert_eq!(xml_child_text(root, "b"), Some("hi"));
        assert_eq!(xml_child_text(root, "c"), None);
        assert!(xml_child(root, "d").is_none());
    }
}
