//! Output devices for rendered screens.

use crate::display::Screen;
use crate::error::Result;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// File the emulator writes the visible rows to.
pub const EMULATOR_FILE: &str = "oled_emu.txt";

/// Something a [`Screen`] can be shown on.
pub trait DisplaySink: Send {
    /// (Re)open the device. Called at start-up and after a failed write.
    fn init(&mut self) -> Result<()>;

    fn show(&mut self, screen: &Screen) -> Result<()>;
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn init(&mut self) -> Result<()> {
        (**self).init()
    }

    fn show(&mut self, screen: &Screen) -> Result<()> {
        (**self).show(screen)
    }
}

/// Emulated panel: the visible rows as plain text in a file.
#[derive(Debug, Clone)]
pub struct TextFileSink {
    path: PathBuf,
}

impl TextFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for TextFileSink {
    fn default() -> Self {
        Self::new(EMULATOR_FILE)
    }
}

impl DisplaySink for TextFileSink {
    fn init(&mut self) -> Result<()> {
        info!("Emulating display in {:?}", self.path);
        Ok(())
    }

    fn show(&mut self, screen: &Screen) -> Result<()> {
        fs::write(&self.path, screen.rows.join("\n"))?;
        Ok(())
    }
}

#[cfg(feature = "oled")]
pub use oled::Ssd1306Sink;

#[cfg(feature = "oled")]
mod oled {
    use super::DisplaySink;
    use crate::display::Screen;
    use crate::error::{BusboxError, Result};
    use embedded_graphics::prelude::*;
    use linux_embedded_hal::I2cdev;
    use ssd1306::{
        mode::BufferedGraphicsMode, prelude::*, size::DisplaySize128x64, I2CDisplayInterface,
        Ssd1306,
    };
    use tracing::info;

    type Panel = Ssd1306<I2CInterface<I2cdev>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

    /// SSD1306 128x64 panel on an I2C bus.
    pub struct Ssd1306Sink {
        bus_path: String,
        address: u8,
        panel: Option<Panel>,
    }

    impl Ssd1306Sink {
        pub fn new(bus_path: impl Into<String>, address: u8) -> Self {
            Self {
                bus_path: bus_path.into(),
                address,
                panel: None,
            }
        }
    }

    impl DisplaySink for Ssd1306Sink {
        fn init(&mut self) -> Result<()> {
            info!("Initializing SSD1306 on {} at address 0x{:02X}", self.bus_path, self.address);
            self.panel = None;

            let i2c = I2cdev::new(&self.bus_path).map_err(|e| {
                BusboxError::display_error(format!("Failed to open {}: {}", self.bus_path, e))
            })?;
            let interface = I2CDisplayInterface::new_custom_address(i2c, self.address);
            let mut panel = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
                .into_buffered_graphics_mode();
            panel
                .init()
                .map_err(|e| BusboxError::display_error(format!("Init failed: {:?}", e)))?;

            self.panel = Some(panel);
            Ok(())
        }

        fn show(&mut self, screen: &Screen) -> Result<()> {
            let panel = self
                .panel
                .as_mut()
                .ok_or_else(|| BusboxError::display_error("SSD1306 not initialized"))?;

            panel.clear_buffer();
            panel
                .draw_iter(screen.frame.pixels())
                .map_err(|e| BusboxError::display_error(format!("Draw failed: {:?}", e)))?;
            panel
                .flush()
                .map_err(|e| BusboxError::display_error(format!("Flush failed: {:?}", e)))
        }
    }
}
