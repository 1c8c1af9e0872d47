//! Error handling for the busbox crate.

/// A specialized `Result` type for busbox operations.
pub type Result<T> = std::result::Result<T, BusboxError>;

/// The main error type for busbox operations.
#[derive(Debug, thiserror::Error)]
pub enum BusboxError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request to an upstream service failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream XML document could not be parsed
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Upstream data did not have the expected shape
    #[error("Failed to parse upstream data: {0}")]
    ParseError(String),

    /// Network operation failed
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream service answered but with nothing usable
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Display write or initialisation failed
    #[error("Display error: {0}")]
    Display(String),

    /// External command exited unsuccessfully
    #[error("Command `{command}` failed with code {code:?}")]
    Command {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Settings mutation rejected
    #[error("Settings error: {0}")]
    Settings(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Sensor read failed
    #[error("Sensor error: {0}")]
    Sensor(String),
}

impl BusboxError {
    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a new network error
    pub fn network_error(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new upstream error
    pub fn upstream_error(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a new display error
    pub fn display_error(msg: impl Into<String>) -> Self {
        Self::Display(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new settings error
    pub fn settings_error(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new sensor error
    pub fn sensor_error(msg: impl Into<String>) -> Self {
        Self::Sensor(msg.into())
    }

    /// HTTP status of the upstream response, if this error carries one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
