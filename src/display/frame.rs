//! 1-bit framebuffer and the text layout of the 128x64 panel.

use embedded_graphics::mono_font::iso_8859_1::{FONT_6X10, FONT_7X13};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use std::convert::Infallible;

pub const SCREEN_WIDTH: u32 = 128;
pub const SCREEN_HEIGHT: u32 = 64;

/// Left margin in pixels.
const MARGIN_X: i32 = 1;

/// Fonts and spacing for the header row and the body rows.
#[derive(Clone, Copy)]
pub struct ScreenLayout {
    pub width: u32,
    pub height: u32,
    pub header_font: &'static MonoFont<'static>,
    pub header_line_height: u32,
    pub body_font: &'static MonoFont<'static>,
    pub body_line_height: u32,
}

impl Default for ScreenLayout {
    fn default() -> Self {
        Self {
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            header_font: &FONT_6X10,
            header_line_height: 12,
            body_font: &FONT_7X13,
            body_line_height: 15,
        }
    }
}

impl ScreenLayout {
    fn font(&self, row: usize) -> &'static MonoFont<'static> {
        if row == 0 {
            self.header_font
        } else {
            self.body_font
        }
    }

    fn line_height(&self, row: usize) -> u32 {
        if row == 0 {
            self.header_line_height
        } else {
            self.body_line_height
        }
    }

    /// Top edge of each row that fits entirely on the screen.
    pub fn row_offsets(&self) -> Vec<u32> {
        let mut offsets = Vec::new();
        let mut y = 0;
        let mut row = 0;
        while y + self.font(row).character_size.height <= self.height {
            offsets.push(y);
            y += self.line_height(row);
            row += 1;
        }
        offsets
    }

    /// Character columns of each visible row.
    pub fn columns(&self) -> Vec<usize> {
        (0..self.row_offsets().len())
            .map(|row| {
                let char_width = self.font(row).character_size.width;
                (self.width.saturating_sub(2) / char_width) as usize
            })
            .collect()
    }
}

/// Monochrome framebuffer, one bit per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    bits: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width * height).div_ceil(8) as usize;
        Self {
            width,
            height,
            bits: vec![0; len],
        }
    }

    fn index(&self, x: u32, y: u32) -> (usize, u8) {
        let i = y * self.width + x;
        ((i / 8) as usize, 1 << (i % 8))
    }

    pub fn is_on(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let (byte, mask) = self.index(x, y);
        self.bits[byte] & mask != 0
    }

    fn set(&mut self, x: u32, y: u32, on: bool) {
        let (byte, mask) = self.index(x, y);
        if on {
            self.bits[byte] |= mask;
        } else {
            self.bits[byte] &= !mask;
        }
    }

    pub fn lit_pixels(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Every lit pixel, for copying onto a hardware buffer.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel<BinaryColor>> + '_ {
        (0..self.height)
            .flat_map(move |y| (0..self.width).map(move |x| (x, y)))
            .filter(move |(x, y)| self.is_on(*x, *y))
            .map(|(x, y)| Pixel(Point::new(x as i32, y as i32), BinaryColor::On))
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Frame {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.width && y < self.height {
                self.set(x, y, color.is_on());
            }
        }
        Ok(())
    }
}

/// Draw `rows` top to bottom; rows past the bottom edge are dropped.
pub fn render(layout: &ScreenLayout, rows: &[String]) -> Frame {
    let mut frame = Frame::new(layout.width, layout.height);
    for (row, (text, y)) in rows.iter().zip(layout.row_offsets()).enumerate() {
        let style = MonoTextStyle::new(layout.font(row), BinaryColor::On);
        let origin = Point::new(MARGIN_X, y as i32);
        // drawing into a Frame cannot fail
        let _ = Text::with_baseline(text, origin, style, Baseline::Top).draw(&mut frame);
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_layout_fits_header_and_three_rows() {
        let layout = ScreenLayout::default();
        assert_eq!(layout.row_offsets(), vec![0, 12, 27, 42]);
        assert_eq!(layout.columns(), vec![21, 18, 18, 18]);
    }

    #[test]
    fn test_render_is_deterministic() {
        let layout = ScreenLayout::default();
        let a = render(&layout, &rows(&["12:00 4/9°C", "5m 26 Town"]));
        let b = render(&layout, &rows(&["12:00 4/9°C", "5m 26 Town"]));
        let c = render(&layout, &rows(&["12:01 4/9°C", "5m 26 Town"]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.lit_pixels() > 0);
        assert_eq!(a.pixels().count(), a.lit_pixels());
    }

    #[test]
    fn test_rows_below_screen_are_dropped() {
        let layout = ScreenLayout::default();
        let visible = rows(&["h", "1", "2", "3"]);
        let mut all = visible.clone();
        all.extend(rows(&["4", "5", "6"]));
        assert_eq!(render(&layout, &visible), render(&layout, &all));
    }

    #[test]
    fn test_empty_frame() {
        let frame = render(&ScreenLayout::default(), &[]);
        assert_eq!(frame.lit_pixels(), 0);
        assert_eq!(frame.size(), Size::new(128, 64));
        assert!(!frame.is_on(500, 500));
    }
}
