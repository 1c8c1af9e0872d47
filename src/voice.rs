//! Spoken announcements: text-to-speech audio served by the web app and
//! played by a cast device on the LAN.

use crate::error::{BusboxError, Result};
use crate::shell::CommandRunner;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Google Translate speech endpoint.
pub const TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Longest text the TTS endpoint accepts per request.
pub const TTS_CHUNK_CHARS: usize = 100;

pub const DEFAULT_LANG: &str = "en";

/// Name the audio is written and served under.
pub const AUDIO_FILE: &str = "tts.mp3";

#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Cast device name as `catt -d` accepts it
    pub cast_device: Option<String>,
    pub lang: String,
    /// Port of the web server that serves the audio
    pub port: u16,
    pub audio_path: PathBuf,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            cast_device: None,
            lang: DEFAULT_LANG.to_string(),
            port: crate::DEFAULT_WEB_PORT,
            audio_path: PathBuf::from(AUDIO_FILE),
        }
    }
}

pub struct Voice {
    runner: Arc<dyn CommandRunner>,
    http: reqwest::Client,
    device: String,
    lang: String,
    address: IpAddr,
    port: u16,
    audio_path: PathBuf,
    tts_url: String,
}

impl Voice {
    /// Set up casting from this host's LAN address. Without a cast device
    /// there is nothing to speak through.
    pub fn start(config: &VoiceConfig, runner: Arc<dyn CommandRunner>, http: reqwest::Client) -> Result<Self> {
        if config.cast_device.is_none() {
            return Err(BusboxError::config_error("No cast device configured (--cast-device)"));
        }
        let address = local_ip_address::local_ip()
            .map_err(|e| BusboxError::network_error(format!("Cannot determine LAN address: {}", e)))?;
        Self::new(config, runner, http, address)
    }

    pub fn new(
        config: &VoiceConfig,
        runner: Arc<dyn CommandRunner>,
        http: reqwest::Client,
        address: IpAddr,
    ) -> Result<Self> {
        let device = config
            .cast_device
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| BusboxError::config_error("No cast device configured (--cast-device)"))?;

        info!("Voice ready: casting to {} from {}:{}", device, address, config.port);
        Ok(Self {
            runner,
            http,
            device: device.to_string(),
            lang: config.lang.clone(),
            address,
            port: config.port,
            audio_path: config.audio_path.clone(),
            tts_url: TTS_URL.to_string(),
        })
    }

    pub fn with_tts_url(mut self, url: impl Into<String>) -> Self {
        self.tts_url = url.into();
        self
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }

    /// Where the cast device fetches the audio from.
    pub fn audio_url(&self) -> String {
        format!("http://{}:{}/{}", self.address, self.port, AUDIO_FILE)
    }

    /// Fetch speech for `text` chunk by chunk and write the concatenated
    /// MP3 to the audio path.
    pub async fn synthesize(&self, text: &str, lang: &str) -> Result<PathBuf> {
        let chunks = split_tts_chunks(text, TTS_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(BusboxError::parse_error("Nothing to say"));
        }

        let total = chunks.len().to_string();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let bytes = self
                .http
                .get(&self.tts_url)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", lang),
                    ("q", chunk.as_str()),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            audio.extend_from_slice(&bytes);
        }

        tokio::fs::write(&self.audio_path, &audio).await?;
        debug!("Wrote {} bytes of speech to {:?}", audio.len(), self.audio_path);
        Ok(self.audio_path.clone())
    }

    /// Speak `text` on the cast device.
    pub async fn say(&self, text: &str) -> Result<()> {
        self.synthesize(text, &self.lang).await?;

        let runner = self.runner.clone();
        let device = self.device.clone();
        let url = self.audio_url();
        tokio::task::spawn_blocking(move || runner.run("catt", &["-d", &device, "cast", &url]))
            .await
            .map_err(|e| BusboxError::network_error(format!("Cast task failed: {}", e)))??;

        info!("Said {:?} on {}", text, self.device);
        Ok(())
    }
}

/// Split on whitespace into chunks of at most `max_chars` characters.
/// Words longer than that are cut.
pub fn split_tts_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if word_len > max_chars {
            let chars = word.chars().collect::<Vec<_>>();
            let mut pieces = chars.chunks(max_chars).map(|c| c.iter().collect::<String>());
            let mut last = pieces.next().unwrap_or_default();
            for piece in pieces {
                chunks.push(std::mem::replace(&mut last, piece));
            }
            current_len = last.chars().count();
            current = last;
            continue;
        }

        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
