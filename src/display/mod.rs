//! The OLED display: scrolling rows rendered to a 1-bit frame and pushed
//! to a sink by a single background task.

pub mod frame;
pub mod scroller;
pub mod sink;

// Re-export commonly used items
pub use frame::{render, Frame, ScreenLayout};
pub use scroller::{scroll_line, Scroller};
pub use sink::{DisplaySink, TextFileSink};

#[cfg(feature = "oled")]
pub use sink::Ssd1306Sink;

use crate::error::Result;
use futures_util::stream::BoxStream;
use std::time::Duration;
use tokio::time;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

/// What gets written to a sink on one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    /// Visible rows after scrolling
    pub rows: Vec<String>,
    pub frame: Frame,
}

pub struct Display<S> {
    sink: S,
    layout: ScreenLayout,
    scroller: Scroller,
    last_frame: Option<Frame>,
}

impl<S: DisplaySink> Display<S> {
    pub fn new(sink: S) -> Self {
        Self::with_layout(sink, ScreenLayout::default())
    }

    pub fn with_layout(sink: S, layout: ScreenLayout) -> Self {
        Self {
            sink,
            layout,
            scroller: Scroller::new(),
            last_frame: None,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.sink.init()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn update(&mut self, lines: Vec<String>) {
        if self.scroller.update(lines) {
            info!("Display lines updated: {:?}", self.scroller.lines());
        }
    }

    /// Render the next scroll position and show it. Returns whether the
    /// sink was written; an unchanged frame is not.
    pub fn tick(&mut self) -> bool {
        let rows = self.scroller.rows(&self.layout.columns());
        let frame = render(&self.layout, &rows);
        self.scroller.advance();

        if self.last_frame.as_ref() == Some(&frame) {
            return false;
        }

        let screen = Screen { rows, frame };
        if let Err(err) = self.sink.show(&screen) {
            warn!("Failed to display, retrying: {}", err);
            if let Err(err) = self.sink.init() {
                warn!("Display re-init failed: {}", err);
            }
            if let Err(err) = self.sink.show(&screen) {
                error!("Still failing: {}", err);
                return false;
            }
        }

        self.last_frame = Some(screen.frame);
        true
    }
}

/// Drive the display: take new lines from `feed` and advance the scroll
/// every `tick`. Ends when the feed does.
pub async fn run_display_loop<S: DisplaySink>(
    mut display: Display<S>,
    mut feed: BoxStream<'static, Vec<String>>,
    tick: Duration,
) {
    if let Err(err) = display.init() {
        error!("Display init failed, will retry on first write: {}", err);
    }

    let mut ticker = time::interval(tick);
    loop {
        tokio::select! {
            lines = feed.next() => match lines {
                Some(lines) => display.update(lines),
                None => {
                    info!("Display feed ended");
                    break;
                }
            },
            _ = ticker.tick() => {
                display.tick();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BusboxError;
    use futures_util::stream;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Counts {
        inits: usize,
        shows: usize,
        failures_left: usize,
    }

    #[derive(Clone, Default)]
    struct CountingSink(Arc<Mutex<Counts>>);

    impl CountingSink {
        fn failing(times: usize) -> Self {
            let sink = Self::default();
            sink.0.lock().unwrap().failures_left = times;
            sink
        }

        fn counts(&self) -> (usize, usize) {
            let counts = self.0.lock().unwrap();
            (counts.inits, counts.shows)
        }
    }

    impl DisplaySink for CountingSink {
        fn init(&mut self) -> Result<()> {
            self.0.lock().unwrap().inits += 1;
            Ok(())
        }

        fn show(&mut self, _screen: &Screen) -> Result<()> {
            let mut counts = self.0.lock().unwrap();
            if counts.failures_left > 0 {
                counts.failures_left -= 1;
                return Err(BusboxError::display_error("i2c write failed"));
            }
            counts.shows += 1;
            Ok(())
        }
    }

    fn lines(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unchanged_frame_is_not_rewritten() {
        let sink = CountingSink::default();
        let mut display = Display::new(sink.clone());
        display.update(lines(&["12:00", "5m 26 Town"]));

        assert!(display.tick());
        assert!(!display.tick());
        assert!(!display.tick());
        assert_eq!(sink.counts(), (0, 1));

        display.update(lines(&["12:01", "5m 26 Town"]));
        assert!(display.tick());
        assert_eq!(sink.counts(), (0, 2));
    }

    #[test]
    fn test_scrolling_rows_are_redrawn() {
        let sink = CountingSink::default();
        let mut display = Display::new(sink.clone());
        display.update(lines(&["12:00", "5m 26 Reading Station via Town Centre"]));
        for _ in 0..5 {
            assert!(display.tick());
        }
        assert_eq!(sink.counts(), (0, 5));
    }

    #[derive(Clone, Default)]
    struct RowSink(Arc<Mutex<Vec<Vec<String>>>>);

    impl DisplaySink for RowSink {
        fn init(&mut self) -> Result<()> {
            Ok(())
        }

        fn show(&mut self, screen: &Screen) -> Result<()> {
            self.0.lock().unwrap().push(screen.rows.clone());
            Ok(())
        }
    }

    #[test]
    fn test_train_lines_reach_the_panel() {
        let sink = RowSink::default();
        let mut display = Display::new(sink.clone());
        display.update(lines(&[
            "12:00 4/9°C",
            "5m 26 Town",
            "9m 17 Tilehurst",
            "14m 33 Calcot",
            "12:01->12:28 27m",
        ]));

        for _ in 0..scroller::PAGE_TICKS * 2 {
            display.tick();
        }

        let shown = sink.0.lock().unwrap();
        assert!(shown.iter().all(|rows| rows[0] == "12:00 4/9°C"));
        assert!(shown.iter().any(|rows| rows.iter().any(|row| row.contains("->"))));
        assert!(shown.iter().any(|rows| rows.iter().any(|row| row == "14m 33 Calcot")));
    }

    #[test]
    fn test_write_failure_reinits_and_retries_once() {
        let sink = CountingSink::failing(1);
        let mut display = Display::new(sink.clone());
        display.update(lines(&["12:00"]));
        assert!(display.tick());
        assert_eq!(sink.counts(), (1, 1));
    }

    #[test]
    fn test_second_failure_skips_the_update() {
        let sink = CountingSink::failing(2);
        let mut display = Display::new(sink.clone());
        display.update(lines(&["12:00"]));
        assert!(!display.tick());
        assert_eq!(sink.counts(), (1, 0));

        // the frame was never shown, so the next tick writes it
        assert!(display.tick());
        assert_eq!(sink.counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_display_loop_writes_emulator_file() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("busbox-oled-{}-{}.txt", std::process::id(), nanos));

        let feed = Box::pin(
            stream::iter(vec![lines(&["12:00 4/9°C", "5m 26 Town"])]).chain(stream::pending()),
        );
        let display = Display::new(TextFileSink::new(&path));
        let _ = time::timeout(
            Duration::from_millis(200),
            run_display_loop(display, feed, Duration::from_millis(10)),
        )
        .await;

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "12:00 4/9°C\n5m 26 Town");
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_display_loop_ends_with_feed() {
        let feed = Box::pin(stream::iter(vec![lines(&["a"])]));
        let display = Display::new(CountingSink::default());
        time::timeout(
            Duration::from_secs(2),
            run_display_loop(display, feed, Duration::from_millis(10)),
        )
        .await
        .unwrap();
    }
}
