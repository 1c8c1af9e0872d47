//! Wi-Fi mode switching through the NetworkManager CLI.
//!
//! The device is either a client on the configured network or, when that
//! network is unreachable, an access point serving the setup dashboard.
//! The current mode is the one piece of shared state in the process and
//! lives behind a mutex.

use crate::error::{BusboxError, Result};
use crate::shell::CommandRunner;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Connection name nmcli gives the hotspot it creates.
const HOTSPOT_CONNECTION: &str = "Hotspot";

/// Default connectivity probe target (Cloudflare DNS).
pub const DEFAULT_PROBE_HOST: &str = "1.1.1.1";

/// How long to wait for internet after joining a network.
pub const DEFAULT_INTERNET_TIMEOUT: Duration = Duration::from_secs(10);

/// Which side of the switch the device ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiMode {
    Client,
    AccessPoint,
}

pub struct WifiManager {
    runner: Arc<dyn CommandRunner>,
    interface: String,
    probe_interval: Duration,
    ap_mode: Mutex<bool>,
}

impl WifiManager {
    pub fn new(runner: Arc<dyn CommandRunner>, interface: impl Into<String>) -> Self {
        Self {
            runner,
            interface: interface.into(),
            probe_interval: Duration::from_secs(2),
            ap_mode: Mutex::new(false),
        }
    }

    /// Set the pause between connectivity probes.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn is_ap_mode(&self) -> bool {
        self.ap_mode.lock().map(|flag| *flag).unwrap_or(false)
    }

    fn set_ap_mode(&self, on: bool) {
        if let Ok(mut flag) = self.ap_mode.lock() {
            *flag = on;
        }
    }

    fn nmcli(&self, args: &[&str]) -> Result<()> {
        self.runner.run("nmcli", args).map(|_| ())
    }

    pub fn stop_all_connections(&self) -> Result<()> {
        self.nmcli(&["device", "disconnect", &self.interface])
    }

    pub fn start_ap_mode(&self, ssid: &str, password: &str) -> Result<()> {
        self.nmcli(&[
            "device", "wifi", "hotspot",
            "ifname", &self.interface,
            "ssid", ssid,
            "password", password,
        ])?;
        self.set_ap_mode(true);
        info!("AP mode ON: SSID={}", ssid);
        Ok(())
    }

    /// Join `ssid` with a freshly created WPA-PSK profile.
    pub fn start_client_mode(
        &self,
        ssid: &str,
        password: &str,
        connection_name: Option<&str>,
    ) -> Result<()> {
        let connection_name = connection_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("wifi-{}", ssid));

        // best-effort cleanup; each of these fails when there is nothing to undo
        if let Err(err) = self.stop_all_connections() {
            warn!("Disconnect failed: {}", err);
        }
        if let Err(err) = self.nmcli(&["connection", "down", HOTSPOT_CONNECTION]) {
            warn!("Hotspot down failed: {}", err);
        }
        if let Err(err) = self.nmcli(&["connection", "delete", &connection_name]) {
            warn!("Deleting old profile failed: {}", err);
        }

        self.nmcli(&[
            "connection", "add",
            "type", "wifi",
            "ifname", &self.interface,
            "con-name", &connection_name,
            "ssid", ssid,
        ])?;
        self.nmcli(&[
            "connection", "modify", &connection_name,
            "wifi-sec.key-mgmt", "wpa-psk",
            "wifi-sec.psk", password,
        ])?;
        self.nmcli(&["connection", "up", &connection_name])?;

        self.set_ap_mode(false);
        info!("Client mode ON: connected to SSID={} (connection {})", ssid, connection_name);
        Ok(())
    }

    /// Ping `host` until it answers or `timeout` passes.
    pub fn wait_for_internet(&self, timeout: Duration, host: &str) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            match self.runner.run("ping", &["-c", "1", "-W", "2", host]) {
                Ok(_) => {
                    info!("Internet OK (ping {} successful)", host);
                    return true;
                }
                Err(BusboxError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                    error!("ping command not found");
                    return false;
                }
                Err(_) => info!("No internet yet (ping {} failed)", host),
            }
            thread::sleep(self.probe_interval);
        }
        warn!("Internet did not appear within {:?}", timeout);
        false
    }

    /// Try to join the configured network and fall back to AP mode when
    /// that fails or no internet shows up.
    pub fn connect_with_fallback(
        &self,
        ssid: &str,
        password: &str,
        ap_ssid: &str,
        ap_password: &str,
        timeout: Duration,
    ) -> Result<WifiMode> {
        if ssid.trim().is_empty() {
            info!("No Wi-Fi network configured, starting AP mode");
            self.start_ap_mode(ap_ssid, ap_password)?;
            return Ok(WifiMode::AccessPoint);
        }

        if let Err(err) = self.start_client_mode(ssid, password, None) {
            error!("Failed to enable wifi: {}", err);
        }
        if self.wait_for_internet(timeout, DEFAULT_PROBE_HOST) {
            return Ok(WifiMode::Client);
        }

        warn!("Failed to connect to {}, fallback to AP mode", ssid);
        self.start_ap_mode(ap_ssid, ap_password)?;
        Ok(WifiMode::AccessPoint)
    }
}
