//! DHT22 temperature/humidity sensor logged to an RRD database.
//!
//! Meant to be run once per cron cycle. DHT22 reads fail routinely; a
//! failed read skips the cycle rather than failing it.

use crate::error::{BusboxError, Result};
use crate::shell::CommandRunner;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// BCM pin the sensor's data line is on (header pin 7).
pub const DEFAULT_PIN: u8 = 4;

/// Default RRD file.
pub const DEFAULT_RRD: &str = "dht22.rrd";

/// One sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// °C
    pub temperature: f64,
    /// %RH
    pub humidity: f64,
}

/// Decode the 5-byte DHT22 frame: humidity and temperature in tenths,
/// the temperature sign in bit 15, and a checksum byte.
pub fn decode_dht22(data: &[u8; 5]) -> Result<Reading> {
    let checksum = data[..4].iter().fold(0u8, |sum, b| sum.wrapping_add(*b));
    if checksum != data[4] {
        return Err(BusboxError::sensor_error(format!(
            "DHT22 checksum mismatch: computed {:#04x}, received {:#04x}",
            checksum, data[4]
        )));
    }

    let humidity = u16::from_be_bytes([data[0], data[1]]) as f64 / 10.0;
    let raw_temperature = u16::from_be_bytes([data[2], data[3]]);
    let magnitude = (raw_temperature & 0x7fff) as f64 / 10.0;
    let temperature = if raw_temperature & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    };

    Ok(Reading {
        temperature,
        humidity,
    })
}

/// Read the sensor on BCM `pin`. `Ok(None)` means the read was noisy and
/// this cycle should be skipped.
#[cfg(feature = "gpio")]
pub fn read_dht22(pin: u8) -> Result<Option<Reading>> {
    match dht22::read_frame(pin)? {
        Some(frame) => match decode_dht22(&frame) {
            Ok(reading) => Ok(Some(reading)),
            Err(err) => {
                tracing::warn!("Discarding DHT22 read: {}", err);
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

#[cfg(not(feature = "gpio"))]
pub fn read_dht22(_pin: u8) -> Result<Option<Reading>> {
    Err(BusboxError::sensor_error(
        "GPIO support not compiled in (enable the `gpio` feature)",
    ))
}

#[cfg(feature = "gpio")]
mod dht22 {
    use crate::error::{BusboxError, Result};
    use rppal::gpio::{Gpio, IoPin, Level, Mode};
    use std::thread;
    use std::time::{Duration, Instant};
    use tracing::debug;

    /// A high pulse longer than this is a 1 bit (0 is ~27µs, 1 is ~70µs).
    const ONE_THRESHOLD: Duration = Duration::from_micros(50);
    const PULSE_TIMEOUT: Duration = Duration::from_micros(200);

    fn wait_for(pin: &IoPin, level: Level) -> Option<Duration> {
        let start = Instant::now();
        while pin.read() != level {
            if start.elapsed() > PULSE_TIMEOUT {
                return None;
            }
        }
        Some(start.elapsed())
    }

    /// Bit-bang one frame off the single-wire bus.
    pub(super) fn read_frame(pin: u8) -> Result<Option<[u8; 5]>> {
        let gpio = Gpio::new().map_err(|e| BusboxError::sensor_error(format!("GPIO unavailable: {}", e)))?;
        let mut io = gpio
            .get(pin)
            .map_err(|e| BusboxError::sensor_error(format!("Pin {} unavailable: {}", pin, e)))?
            .into_io(Mode::Output);

        // start signal: hold low for >1ms, then release to the pull-up
        io.set_low();
        thread::sleep(Duration::from_millis(2));
        io.set_high();
        io.set_mode(Mode::Input);

        // sensor answers low 80µs, high 80µs
        if wait_for(&io, Level::Low).is_none()
            || wait_for(&io, Level::High).is_none()
            || wait_for(&io, Level::Low).is_none()
        {
            debug!("No response from DHT22 on pin {}", pin);
            return Ok(None);
        }

        let mut frame = [0u8; 5];
        for bit in 0..40 {
            if wait_for(&io, Level::High).is_none() {
                debug!("DHT22 timed out at bit {}", bit);
                return Ok(None);
            }
            let Some(high) = wait_for(&io, Level::Low) else {
                debug!("DHT22 timed out at bit {}", bit);
                return Ok(None);
            };
            if high > ONE_THRESHOLD {
                frame[bit / 8] |= 1 << (7 - bit % 8);
            }
        }
        Ok(Some(frame))
    }
}

/// `rrdtool update` argument for a reading.
pub fn rrd_update_arg(reading: &Reading) -> String {
    format!("N:{:.2}:{:.2}", reading.temperature, reading.humidity)
}

/// Append a reading to the RRD database.
pub fn log_reading(runner: &dyn CommandRunner, rrd: &Path, reading: &Reading) -> Result<()> {
    let rrd = rrd.to_string_lossy();
    runner.run("rrdtool", &["update", &rrd, &rrd_update_arg(reading)])?;
    Ok(())
}

/// One cron cycle: read the sensor and log the value. Returns the reading
/// that was logged, or `None` when the cycle was skipped.
pub fn log_once(runner: &dyn CommandRunner, rrd: &Path, pin: u8) -> Result<Option<Reading>> {
    let Some(reading) = read_dht22(pin)? else {
        info!("No DHT22 reading this cycle");
        return Ok(None);
    };
    log_with(runner, rrd, reading).map(Some)
}

fn log_with(runner: &dyn CommandRunner, rrd: &Path, reading: Reading) -> Result<Reading> {
    info!("t={:.2}, h={:.2}", reading.temperature, reading.humidity);
    log_reading(runner, rrd, &reading)?;
    info!("Saved reading to {:?}", rrd);
    Ok(reading)
}
