//! Bus Box - departure board binary
//!
//! Runs the display loop and the setup dashboard, or one of the one-shot
//! maintenance commands.

use busbox::{
    line_stream, run_display_loop, sensor, start_web_server,
    transit::http_client,
    wifi::{DEFAULT_INTERNET_TIMEOUT, DEFAULT_PROBE_HOST},
    AppConfig, AppState, CommandRunner, DepartureBoard, Display, DisplayKind, DisplaySink,
    SettingsStore, SystemRunner, TextFileSink, Voice, WifiManager, WifiMode,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "busbox")]
#[command(about = "🚌 Bus Box - departures and weather on a Raspberry Pi OLED")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Live bus, train and weather lines on a 128x64 OLED, with a setup dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    config: AppConfig,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, env = "BUSBOX_DEBUG")]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the display and the dashboard (default)
    Serve,

    /// Print the current display lines once and exit
    Lines,

    /// Log one DHT22 reading to the RRD database
    Sensor(SensorArgs),

    /// Switch the Wi-Fi mode once and exit
    Wifi(WifiArgs),
}

#[derive(Args)]
struct SensorArgs {
    /// BCM pin of the sensor data line
    #[arg(long, default_value_t = sensor::DEFAULT_PIN)]
    pin: u8,

    /// RRD database to update
    #[arg(long, default_value = sensor::DEFAULT_RRD)]
    rrd: PathBuf,
}

#[derive(Args)]
struct WifiArgs {
    #[command(subcommand)]
    action: WifiAction,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum WifiAction {
    /// Start the access point from the saved AP credentials
    Ap,
    /// Join the saved network, falling back to the access point
    Client,
    /// Check for internet connectivity
    Probe,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env is normal
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_logging(&cli)?;
    print_banner();
    cli.config.validate()?;

    match &cli.command {
        Some(Commands::Serve) | None => serve_command(&cli.config).await?,
        Some(Commands::Lines) => lines_command(&cli.config).await?,
        Some(Commands::Sensor(args)) => sensor_command(args)?,
        Some(Commands::Wifi(args)) => wifi_command(&cli.config, args).await?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn print_banner() {
    println!("🚌 Bus Box - departures and weather");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

fn open_sink(config: &AppConfig) -> Box<dyn DisplaySink> {
    match config.display {
        DisplayKind::Emulator => Box::new(TextFileSink::new(&config.emulator_file)),
        #[cfg(feature = "oled")]
        DisplayKind::Ssd1306 => Box::new(busbox::Ssd1306Sink::new(&config.i2c_bus, config.i2c_address)),
        #[cfg(not(feature = "oled"))]
        DisplayKind::Ssd1306 => {
            warn!("SSD1306 support not compiled in, writing to {:?}", config.emulator_file);
            Box::new(TextFileSink::new(&config.emulator_file))
        }
    }
}

async fn serve_command(config: &AppConfig) -> anyhow::Result<()> {
    info!("Starting Bus Box...");

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let http = http_client()?;
    let store = Arc::new(SettingsStore::new(&config.state_file));
    let board = Arc::new(DepartureBoard::from_config(config, http.clone()));

    let wifi = if config.manage_wifi {
        let wifi = Arc::new(WifiManager::new(runner.clone(), &config.wifi_interface));
        let settings = store.load();
        let switcher = wifi.clone();
        tokio::task::spawn_blocking(move || {
            match switcher.connect_with_fallback(
                &settings.wifi_ssid,
                &settings.wifi_password,
                &settings.ap_ssid,
                &settings.ap_password,
                DEFAULT_INTERNET_TIMEOUT,
            ) {
                Ok(WifiMode::Client) => info!("Wi-Fi client mode"),
                Ok(WifiMode::AccessPoint) => warn!("Wi-Fi access point mode"),
                Err(err) => error!("Network switch failed: {}", err),
            }
        });
        Some(wifi)
    } else {
        info!("Wi-Fi management disabled");
        None
    };

    let feed = line_stream(board.clone(), store.clone(), wifi.clone(), config.refresh_interval());
    let display = Display::new(open_sink(config));
    tokio::spawn(run_display_loop(display, feed, config.scroll_interval()));
    info!(
        "Display loop started ({:?}, scroll {}ms, refresh {}s)",
        config.display, config.scroll_ms, config.refresh_secs
    );

    let voice = match Voice::start(&config.voice_config(), runner, http) {
        Ok(voice) => {
            info!("Voice announcements on {}", voice.device());
            Some(Arc::new(voice))
        }
        Err(err) if config.voice => return Err(err.into()),
        Err(err) => {
            info!("Voice disabled: {}", err);
            None
        }
    };

    let web_config = config.web_config();
    info!("Web server configuration:");
    info!("  - Bind address: {}", web_config.bind_address());
    info!("  - Settings file: {:?}", config.state_file);

    let state = AppState::new(store, board, &web_config)
        .with_wifi(wifi)
        .with_voice(voice);
    start_web_server(web_config, Arc::new(state)).await?;

    Ok(())
}

async fn lines_command(config: &AppConfig) -> anyhow::Result<()> {
    let board = DepartureBoard::from_config(config, http_client()?);
    let settings = SettingsStore::new(&config.state_file).load();

    for line in board.lines_for(&settings).await {
        println!("{}", line);
    }
    Ok(())
}

fn sensor_command(args: &SensorArgs) -> anyhow::Result<()> {
    match sensor::log_once(&SystemRunner, &args.rrd, args.pin)? {
        Some(reading) => println!(
            "T={:.1}°C RH={:.1}% logged to {}",
            reading.temperature,
            reading.humidity,
            args.rrd.display()
        ),
        None => println!("No valid reading this cycle"),
    }
    Ok(())
}

async fn wifi_command(config: &AppConfig, args: &WifiArgs) -> anyhow::Result<()> {
    let settings = SettingsStore::new(&config.state_file).load();
    let wifi = WifiManager::new(Arc::new(SystemRunner), &config.wifi_interface);

    let action = args.action;
    let report = tokio::task::spawn_blocking(move || -> busbox::Result<String> {
        match action {
            WifiAction::Ap => {
                wifi.start_ap_mode(&settings.ap_ssid, &settings.ap_password)?;
                Ok(format!("Access point {} is up", settings.ap_ssid))
            }
            WifiAction::Client => {
                let mode = wifi.connect_with_fallback(
                    &settings.wifi_ssid,
                    &settings.wifi_password,
                    &settings.ap_ssid,
                    &settings.ap_password,
                    DEFAULT_INTERNET_TIMEOUT,
                )?;
                Ok(match mode {
                    WifiMode::Client => format!("Connected to {}", settings.wifi_ssid),
                    WifiMode::AccessPoint => format!("Fell back to access point {}", settings.ap_ssid),
                })
            }
            WifiAction::Probe => {
                let online = wifi.wait_for_internet(DEFAULT_INTERNET_TIMEOUT, DEFAULT_PROBE_HOST);
                Ok(if online { "Online".to_string() } else { "Offline".to_string() })
            }
        }
    })
    .await??;

    println!("{}", report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_serve() {
        let cli = Cli::try_parse_from(["busbox"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.debug);
        assert_eq!(cli.config.port, busbox::DEFAULT_WEB_PORT);
    }

    #[test]
    fn test_global_flags_before_subcommand() {
        let cli = Cli::try_parse_from(["busbox", "-v", "--port", "9000", "lines"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config.port, 9000);
        assert!(matches!(cli.command, Some(Commands::Lines)));
    }

    #[test]
    fn test_sensor_args() {
        let cli = Cli::try_parse_from(["busbox", "sensor", "--pin", "17", "--rrd", "/tmp/t.rrd"]).unwrap();
        match cli.command {
            Some(Commands::Sensor(args)) => {
                assert_eq!(args.pin, 17);
                assert_eq!(args.rrd, PathBuf::from("/tmp/t.rrd"));
            }
            _ => panic!("expected sensor command"),
        }
    }

    #[test]
    fn test_wifi_actions() {
        let cli = Cli::try_parse_from(["busbox", "wifi", "probe"]).unwrap();
        match cli.command {
            Some(Commands::Wifi(args)) => assert_eq!(args.action, WifiAction::Probe),
            _ => panic!("expected wifi command"),
        }
        assert!(Cli::try_parse_from(["busbox", "wifi", "sideways"]).is_err());
    }
}
