//! Horizontal marquee for lines wider than the screen.

/// Separator shown between the end of a scrolled text and its restart.
const LOOP_GAP: &str = ". ";

/// Ticks each page of body rows stays up when the lines overflow the panel.
pub const PAGE_TICKS: usize = 20;

/// Text for one row at scroll position `counter`, at most `cols` wide.
///
/// Text that fits is returned as is. Otherwise the first two words (the due
/// time and the line number) stay put and the rest runs as a marquee. When
/// even those two words do not fit, the whole text runs.
pub fn scroll_line(text: &str, counter: usize, cols: usize) -> String {
    if text.chars().count() <= cols {
        return text.to_string();
    }

    let words = text.split_whitespace().collect::<Vec<_>>();
    if words.len() > 2 {
        let fixed = format!("{} {} ", words[0], words[1]);
        let fixed_len = fixed.chars().count();
        if fixed_len < cols {
            let rest = words[2..].join(" ");
            return fixed + &marquee(&rest, counter, cols - fixed_len);
        }
    }
    marquee(text, counter, cols)
}

/// `width` characters of `text + ". "`, starting `counter` characters in
/// and wrapping around.
fn marquee(text: &str, counter: usize, width: usize) -> String {
    let looped = text.chars().chain(LOOP_GAP.chars()).collect::<Vec<_>>();
    let start = counter % looped.len();
    looped
        .iter()
        .cycle()
        .skip(start)
        .take(width)
        .collect()
}

/// Current lines plus the tick counter driving the marquee.
#[derive(Debug, Clone, Default)]
pub struct Scroller {
    lines: Vec<String>,
    counter: usize,
}

impl Scroller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the lines. The marquee restarts only if they changed.
    pub fn update(&mut self, lines: Vec<String>) -> bool {
        if self.lines == lines {
            return false;
        }
        self.lines = lines;
        self.counter = 0;
        true
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn advance(&mut self) {
        self.counter = self.counter.wrapping_add(1);
    }

    /// Index of the body page on screen. Body lines beyond the panel are
    /// paged every [`PAGE_TICKS`] ticks.
    pub fn page(&self, body_rows: usize) -> usize {
        let body = self.lines.len().saturating_sub(1);
        if body_rows == 0 || body <= body_rows {
            return 0;
        }
        let pages = body.div_ceil(body_rows);
        (self.counter / PAGE_TICKS) % pages
    }

    /// One row per entry of `columns`, each cut to its width. The first
    /// line is the header and never moves; the rest show a page at a time.
    pub fn rows(&self, columns: &[usize]) -> Vec<String> {
        let Some((header, body)) = self.lines.split_first() else {
            return Vec::new();
        };
        let Some((header_cols, body_cols)) = columns.split_first() else {
            return Vec::new();
        };

        let start = self.page(body_cols.len()) * body_cols.len();
        std::iter::once(scroll_line(header, self.counter, *header_cols))
            .chain(
                body.iter()
                    .skip(start)
                    .zip(body_cols)
                    .map(|(line, cols)| scroll_line(line, self.counter, *cols)),
            )
            .collect()
    }
}
