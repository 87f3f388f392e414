//! Screen: virtual terminal surface for the assistant console.
//!
//! A single-pass consumer of raw terminal bytes. Parsing is driven by the
//! `vte` state machine; every recognized control function edits a flat row
//! buffer whose tail forms the visible screen. Sequences the emulator does
//! not understand are skipped, never raised, so an unfamiliar program can
//! only degrade rendering, not crash it.

use std::collections::VecDeque;

use unicode_width::UnicodeWidthChar;
use vte::{Params, Parser, Perform};

use crate::grid::{Cell, Row};
use crate::input;
use crate::style::{CellStyle, Color, Modifier, SharedStyle, StyleCache};

/// Retained-lines bound when none is configured.
pub const DEFAULT_MAX_LINES: usize = 4000;
/// Floor applied to caller-configured retained-lines bounds.
pub const MIN_MAX_LINES: usize = 300;

/// Console theme colors reported for OSC color queries.
const DEFAULT_FG: (u8, u8, u8) = (0xeb, 0xf1, 0xff);
const DEFAULT_BG: (u8, u8, u8) = (0x09, 0x0f, 0x18);
const DEFAULT_CURSOR: (u8, u8, u8) = (0x8c, 0xc8, 0xff);

/// Cell size estimate used for pixel-size reports (13px font, 1.34 line height).
const CELL_PIXEL_WIDTH: usize = 8;
const CELL_PIXEL_HEIGHT: usize = 17;

#[derive(Debug, Clone)]
struct SavedCursor {
    row: usize,
    col: usize,
    attrs: CellStyle,
}

/// Snapshot taken when entering the alternate screen.
#[derive(Debug, Clone)]
struct AltScreen {
    rows: VecDeque<Row>,
    cursor_row: usize,
    cursor_col: usize,
    attrs: CellStyle,
    saved_cursor: Option<SavedCursor>,
    scroll_top: usize,
    scroll_bottom: usize,
}

/// Virtual character-grid terminal.
pub struct Screen {
    rows: VecDeque<Row>,
    max_lines: usize,
    visible_rows: usize,
    cols: usize,
    /// Absolute row index into `rows`.
    cursor_row: usize,
    cursor_col: usize,
    /// Scroll region bounds, relative to the visible screen.
    scroll_top: usize,
    scroll_bottom: usize,
    styles: StyleCache,
    attrs: CellStyle,
    current: SharedStyle,
    saved_cursor: Option<SavedCursor>,
    alt_screen: Option<Box<AltScreen>>,
    pub cursor_visible: bool,
    pub bracketed_paste: bool,
    pub focus_tracking: bool,
    /// Synthesized query answers destined for the byte-stream producer.
    responses: Vec<Vec<u8>>,
    parser: Parser,
}

impl Screen {
    pub fn new(visible_rows: usize, cols: usize) -> Self {
        Self::with_max_lines(visible_rows, cols, DEFAULT_MAX_LINES)
    }

    pub fn with_max_lines(visible_rows: usize, cols: usize, max_lines: usize) -> Self {
        let styles = StyleCache::new();
        let current = styles.default_style();
        Self {
            rows: VecDeque::new(),
            max_lines: max_lines.max(MIN_MAX_LINES),
            visible_rows: visible_rows.max(1),
            cols: cols.max(1),
            cursor_row: 0,
            cursor_col: 0,
            scroll_top: 0,
            scroll_bottom: visible_rows.max(1) - 1,
            styles,
            attrs: CellStyle::default(),
            current,
            saved_cursor: None,
            alt_screen: None,
            cursor_visible: true,
            bracketed_paste: false,
            focus_tracking: false,
            responses: Vec::new(),
            parser: Parser::new(),
        }
    }

    // ===== Accessors =====

    pub fn visible_rows(&self) -> usize {
        self.visible_rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Absolute cursor position (row indexes the full retained buffer).
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    pub fn line_count(&self) -> usize {
        self.rows.len()
    }

    pub fn scroll_region(&self) -> (usize, usize) {
        (self.scroll_top, self.scroll_bottom)
    }

    pub fn is_alt_screen(&self) -> bool {
        self.alt_screen.is_some()
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Number of distinct styles interned so far.
    pub fn style_count(&self) -> usize {
        self.styles.len()
    }

    pub(crate) fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn line_text(&self, index: usize) -> Option<String> {
        self.rows.get(index).map(Row::text)
    }

    /// Full retained contents as plain-text lines.
    pub fn contents(&self) -> Vec<String> {
        self.rows.iter().map(Row::text).collect()
    }

    /// Index of the first visible row.
    pub fn screen_base(&self) -> usize {
        self.rows.len().saturating_sub(self.visible_rows)
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.cells.get(col))
    }

    // ===== Byte intake =====

    /// Feed raw terminal bytes through the parser. The parser persists
    /// across calls, so escape sequences may straddle chunk boundaries.
    pub fn process(&mut self, data: &[u8]) {
        let mut parser = std::mem::replace(&mut self.parser, Parser::new());
        for byte in data {
            parser.advance(self, *byte);
        }
        self.parser = parser;
    }

    pub fn process_str(&mut self, data: &str) {
        self.process(data.as_bytes());
    }

    /// Drain pending answers to query sequences (and focus reports).
    pub fn drain_responses(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.responses)
    }

    // ===== Host-side operations =====

    pub fn resize(&mut self, visible_rows: usize, cols: usize) {
        self.visible_rows = visible_rows.max(1);
        self.cols = cols.max(1);
        self.scroll_top = 0;
        self.scroll_bottom = self.visible_rows - 1;
        self.cursor_col = self.cursor_col.min(self.cols - 1);
        if !self.rows.is_empty() {
            self.cursor_row = self.cursor_row.min(self.rows.len() - 1);
        }
    }

    /// Reset the surface, keeping dimensions and the retained-lines bound.
    pub fn clear(&mut self) {
        let visible_rows = self.visible_rows;
        let cols = self.cols;
        let max_lines = self.max_lines;
        *self = Screen::with_max_lines(visible_rows, cols, max_lines);
    }

    /// Report a focus change back to the stream when focus tracking is on.
    pub fn focus_changed(&mut self, focused: bool) {
        if let Some(report) = input::encode_focus(focused, self.focus_tracking) {
            self.responses.push(report);
        }
    }

    /// Encode pasted text, honoring bracketed-paste mode.
    pub fn paste(&self, text: &str) -> Vec<u8> {
        input::encode_paste(text, self.bracketed_paste)
    }

    // ===== Internal editing =====

    fn blank_style(&self) -> SharedStyle {
        self.styles.default_style()
    }

    fn set_attrs(&mut self, attrs: CellStyle) {
        self.attrs = attrs;
        self.current = self.styles.intern(attrs);
    }

    fn ensure_row(&mut self, index: usize) {
        while self.rows.len() <= index {
            self.rows.push_back(Row::default());
        }
        self.trim_excess();
    }

    /// Enforce the retained-lines bound, shifting cursor bookkeeping so
    /// relative addressing stays correct.
    fn trim_excess(&mut self) {
        if self.rows.len() <= self.max_lines {
            return;
        }
        let excess = self.rows.len() - self.max_lines;
        for _ in 0..excess {
            self.rows.pop_front();
        }
        self.cursor_row = self.cursor_row.saturating_sub(excess);
        if let Some(saved) = &mut self.saved_cursor {
            saved.row = saved.row.saturating_sub(excess);
        }
    }

    fn region_is_full_screen(&self) -> bool {
        self.scroll_top == 0 && self.scroll_bottom == self.visible_rows - 1
    }

    fn linefeed(&mut self) {
        let base = self.screen_base();
        let bottom = base + self.scroll_bottom;
        if self.cursor_row == bottom && self.rows.len() > bottom {
            if self.region_is_full_screen() {
                self.rows.push_back(Row::default());
                self.cursor_row += 1;
                self.trim_excess();
            } else {
                self.scroll_region_up(1);
            }
        } else {
            self.cursor_row += 1;
            self.ensure_row(self.cursor_row);
        }
    }

    fn carriage_return(&mut self) {
        self.cursor_col = 0;
    }

    fn tab_forward(&mut self) {
        let next = (self.cursor_col / 8 + 1) * 8;
        self.cursor_col = next.min(self.cols - 1);
    }

    fn put_char(&mut self, c: char) {
        let width = c.width().unwrap_or(1);
        if width == 0 {
            return;
        }
        if self.cursor_col + width > self.cols {
            self.cursor_col = 0;
            self.linefeed();
        }
        self.ensure_row(self.cursor_row);
        let blank = self.blank_style();
        let cell = Cell::new(c, self.current.clone());
        let row = &mut self.rows[self.cursor_row];
        row.put(self.cursor_col, cell, &blank);
        if width == 2 && self.cursor_col + 1 < self.cols {
            row.put(self.cursor_col + 1, Cell::spacer(self.current.clone()), &blank);
        }
        self.cursor_col = (self.cursor_col + width).min(self.cols);
    }

    fn scroll_region_up(&mut self, n: usize) {
        let base = self.screen_base();
        let top = base + self.scroll_top;
        let bottom = base + self.scroll_bottom;
        for _ in 0..n {
            if top < self.rows.len() {
                self.rows.remove(top);
                let insert_at = bottom.min(self.rows.len());
                self.rows.insert(insert_at, Row::default());
            }
        }
    }

    fn scroll_region_down(&mut self, n: usize) {
        let base = self.screen_base();
        let top = base + self.scroll_top;
        let bottom = base + self.scroll_bottom;
        for _ in 0..n {
            if bottom < self.rows.len() {
                self.rows.remove(bottom);
            }
            if top <= self.rows.len() {
                self.rows.insert(top, Row::default());
            }
        }
    }

    fn erase_in_display(&mut self, mode: u16) {
        let base = self.screen_base();
        match mode {
            0 => {
                self.ensure_row(self.cursor_row);
                self.rows[self.cursor_row].erase_from(self.cursor_col);
                for index in (self.cursor_row + 1)..self.rows.len() {
                    self.rows[index] = Row::default();
                }
            }
            1 => {
                let blank = self.blank_style();
                for index in base..self.cursor_row.min(self.rows.len()) {
                    self.rows[index] = Row::default();
                }
                self.ensure_row(self.cursor_row);
                self.rows[self.cursor_row].erase_to(self.cursor_col, &blank);
            }
            2 | 3 => {
                for index in base..self.rows.len() {
                    self.rows[index] = Row::default();
                }
            }
            _ => {}
        }
    }

    fn erase_in_line(&mut self, mode: u16) {
        self.ensure_row(self.cursor_row);
        let blank = self.blank_style();
        let row = &mut self.rows[self.cursor_row];
        match mode {
            0 => row.erase_from(self.cursor_col),
            1 => row.erase_to(self.cursor_col, &blank),
            2 => *row = Row::default(),
            _ => {}
        }
    }

    fn save_cursor(&mut self) {
        self.saved_cursor = Some(SavedCursor {
            row: self.cursor_row,
            col: self.cursor_col,
            attrs: self.attrs,
        });
    }

    fn restore_cursor(&mut self) {
        if let Some(saved) = self.saved_cursor.clone() {
            self.cursor_row = saved.row.min(self.rows.len().saturating_sub(1));
            self.cursor_col = saved.col.min(self.cols - 1);
            self.set_attrs(saved.attrs);
        }
    }

    fn enter_alt_screen(&mut self) {
        if self.alt_screen.is_some() {
            return;
        }
        self.alt_screen = Some(Box::new(AltScreen {
            rows: std::mem::take(&mut self.rows),
            cursor_row: self.cursor_row,
            cursor_col: self.cursor_col,
            attrs: self.attrs,
            saved_cursor: self.saved_cursor.take(),
            scroll_top: self.scroll_top,
            scroll_bottom: self.scroll_bottom,
        }));
        self.cursor_row = 0;
        self.cursor_col = 0;
        self.scroll_top = 0;
        self.scroll_bottom = self.visible_rows - 1;
    }

    fn exit_alt_screen(&mut self) {
        if let Some(saved) = self.alt_screen.take() {
            self.rows = saved.rows;
            self.cursor_row = saved.cursor_row.min(self.rows.len().saturating_sub(1));
            self.cursor_col = saved.cursor_col.min(self.cols - 1);
            self.set_attrs(saved.attrs);
            self.saved_cursor = saved.saved_cursor;
            self.scroll_top = saved.scroll_top.min(self.visible_rows - 1);
            self.scroll_bottom = saved.scroll_bottom.min(self.visible_rows - 1);
        }
    }

    // ===== SGR =====

    fn apply_sgr(&mut self, params: &Params) {
        let raw: Vec<&[u16]> = params.iter().collect();
        if raw.is_empty() {
            self.set_attrs(CellStyle::default());
            return;
        }

        let mut attrs = self.attrs;
        let mut i = 0;
        while i < raw.len() {
            let param = raw[i];
            match param[0] {
                0 => attrs = CellStyle::default(),
                1 => attrs = attrs.add_modifier(Modifier::BOLD),
                2 => attrs = attrs.add_modifier(Modifier::DIM),
                3 => attrs = attrs.add_modifier(Modifier::ITALIC),
                4 => attrs = attrs.add_modifier(Modifier::UNDERLINED),
                7 => attrs = attrs.add_modifier(Modifier::REVERSED),
                22 => attrs = attrs.remove_modifier(Modifier::BOLD | Modifier::DIM),
                23 => attrs = attrs.remove_modifier(Modifier::ITALIC),
                24 => attrs = attrs.remove_modifier(Modifier::UNDERLINED),
                27 => attrs = attrs.remove_modifier(Modifier::REVERSED),
                30 => attrs = attrs.fg(Color::Black),
                31 => attrs = attrs.fg(Color::Red),
                32 => attrs = attrs.fg(Color::Green),
                33 => attrs = attrs.fg(Color::Yellow),
                34 => attrs = attrs.fg(Color::Blue),
                35 => attrs = attrs.fg(Color::Magenta),
                36 => attrs = attrs.fg(Color::Cyan),
                37 => attrs = attrs.fg(Color::Gray),
                38 => {
                    if let Some((color, consumed)) = Self::extended_color(param, &raw, i) {
                        attrs = attrs.fg(color);
                        i += consumed;
                    }
                }
                39 => attrs.foreground = None,
                40 => attrs = attrs.bg(Color::Black),
                41 => attrs = attrs.bg(Color::Red),
                42 => attrs = attrs.bg(Color::Green),
                43 => attrs = attrs.bg(Color::Yellow),
                44 => attrs = attrs.bg(Color::Blue),
                45 => attrs = attrs.bg(Color::Magenta),
                46 => attrs = attrs.bg(Color::Cyan),
                47 => attrs = attrs.bg(Color::Gray),
                48 => {
                    if let Some((color, consumed)) = Self::extended_color(param, &raw, i) {
                        attrs = attrs.bg(color);
                        i += consumed;
                    }
                }
                49 => attrs.background = None,
                90 => attrs = attrs.fg(Color::DarkGray),
                91 => attrs = attrs.fg(Color::LightRed),
                92 => attrs = attrs.fg(Color::LightGreen),
                93 => attrs = attrs.fg(Color::LightYellow),
                94 => attrs = attrs.fg(Color::LightBlue),
                95 => attrs = attrs.fg(Color::LightMagenta),
                96 => attrs = attrs.fg(Color::LightCyan),
                97 => attrs = attrs.fg(Color::Indexed(15)),
                100 => attrs = attrs.bg(Color::DarkGray),
                101 => attrs = attrs.bg(Color::LightRed),
                102 => attrs = attrs.bg(Color::LightGreen),
                103 => attrs = attrs.bg(Color::LightYellow),
                104 => attrs = attrs.bg(Color::LightBlue),
                105 => attrs = attrs.bg(Color::LightMagenta),
                106 => attrs = attrs.bg(Color::LightCyan),
                107 => attrs = attrs.bg(Color::Indexed(15)),
                _ => {}
            }
            i += 1;
        }
        self.set_attrs(attrs);
    }

    /// Parse extended color parameters in either colon-subparameter form
    /// (`38:5:n`, `38:2:r:g:b`) or semicolon form (`38;5;n`, `38;2;r;g;b`).
    /// Returns the color and how many extra top-level params were consumed.
    fn extended_color(param: &[u16], raw: &[&[u16]], i: usize) -> Option<(Color, usize)> {
        if param.len() >= 3 && param[1] == 5 {
            return Some((Color::Indexed(param[2] as u8), 0));
        }
        if param.len() >= 5 && param[1] == 2 {
            let (r, g, b) = if param.len() >= 6 {
                (param[3], param[4], param[5])
            } else {
                (param[2], param[3], param[4])
            };
            return Some((Color::Rgb(r as u8, g as u8, b as u8), 0));
        }
        if i + 2 < raw.len() && raw[i + 1][0] == 5 {
            return Some((Color::Indexed(raw[i + 2][0] as u8), 2));
        }
        if i + 4 < raw.len() && raw[i + 1][0] == 2 {
            return Some((
                Color::Rgb(
                    raw[i + 2][0] as u8,
                    raw[i + 3][0] as u8,
                    raw[i + 4][0] as u8,
                ),
                4,
            ));
        }
        None
    }

    // ===== Mode handling =====

    fn set_private_mode(&mut self, param: u16, enable: bool) {
        match param {
            25 => self.cursor_visible = enable,
            1004 => self.focus_tracking = enable,
            2004 => self.bracketed_paste = enable,
            47 | 1047 | 1049 => {
                if enable {
                    self.enter_alt_screen();
                } else {
                    self.exit_alt_screen();
                }
            }
            _ => {}
        }
    }

    fn respond_osc_color(&mut self, code: usize) {
        let (r, g, b) = match code {
            10 => DEFAULT_FG,
            11 => DEFAULT_BG,
            12 => DEFAULT_CURSOR,
            _ => return,
        };
        let response = format!(
            "\x1b]{};rgb:{:04x}/{:04x}/{:04x}\x1b\\",
            code,
            (r as u16) * 257,
            (g as u16) * 257,
            (b as u16) * 257
        );
        self.responses.push(response.into_bytes());
    }
}

impl Perform for Screen {
    fn print(&mut self, c: char) {
        self.put_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x08 => self.cursor_col = self.cursor_col.saturating_sub(1),
            0x09 => self.tab_forward(),
            0x0A..=0x0C => {
                self.linefeed();
                self.carriage_return();
            }
            0x0D => self.carriage_return(),
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        // Only the query form (`?`) of the dynamic-color OSCs is answered;
        // everything else (titles, hyperlinks) is consumed silently.
        if params.len() < 2 || params[1] != b"?" {
            return;
        }
        if let Ok(code) = std::str::from_utf8(params[0]) {
            if let Ok(code) = code.parse::<usize>() {
                self.respond_osc_color(code);
            }
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        let params_vec: Vec<u16> = params.iter().map(|p| p[0]).collect();
        let base = self.screen_base();
        let n = params_vec.first().copied().unwrap_or(1).max(1) as usize;

        match action {
            // Cursor movement, clamped to the visible screen
            'A' => self.cursor_row = self.cursor_row.saturating_sub(n).max(base),
            'B' => {
                let target = (self.cursor_row + n).min(base + self.visible_rows - 1);
                self.cursor_row = target;
                self.ensure_row(target);
            }
            'C' => self.cursor_col = (self.cursor_col + n).min(self.cols - 1),
            'D' => self.cursor_col = self.cursor_col.saturating_sub(n),
            'E' => {
                let target = (self.cursor_row + n).min(base + self.visible_rows - 1);
                self.cursor_row = target;
                self.cursor_col = 0;
                self.ensure_row(target);
            }
            'F' => {
                self.cursor_row = self.cursor_row.saturating_sub(n).max(base);
                self.cursor_col = 0;
            }
            'G' | '`' => self.cursor_col = (n - 1).min(self.cols - 1),
            'H' | 'f' => {
                let row = n;
                let col = params_vec.get(1).copied().unwrap_or(1).max(1) as usize;
                let target = base + (row - 1).min(self.visible_rows - 1);
                self.cursor_row = target;
                self.cursor_col = (col - 1).min(self.cols - 1);
                self.ensure_row(target);
            }
            'd' => {
                let target = base + (n - 1).min(self.visible_rows - 1);
                self.cursor_row = target;
                self.ensure_row(target);
            }
            'J' => self.erase_in_display(params_vec.first().copied().unwrap_or(0)),
            'K' => self.erase_in_line(params_vec.first().copied().unwrap_or(0)),
            '@' => {
                self.ensure_row(self.cursor_row);
                let blank = self.blank_style();
                let col = self.cursor_col;
                let cols = self.cols;
                self.rows[self.cursor_row].insert_blanks(col, n, cols, &blank);
            }
            'P' => {
                self.ensure_row(self.cursor_row);
                let col = self.cursor_col;
                self.rows[self.cursor_row].delete(col, n);
            }
            'X' => {
                self.ensure_row(self.cursor_row);
                let blank = self.blank_style();
                let col = self.cursor_col;
                self.rows[self.cursor_row].erase(col, n, &blank);
            }
            'L' => {
                let bottom = base + self.scroll_bottom;
                for _ in 0..n {
                    if bottom < self.rows.len() {
                        self.rows.remove(bottom);
                    }
                    if self.cursor_row <= self.rows.len() {
                        self.rows.insert(self.cursor_row, Row::default());
                    }
                }
            }
            'M' => {
                let bottom = base + self.scroll_bottom;
                for _ in 0..n {
                    if self.cursor_row < self.rows.len() {
                        self.rows.remove(self.cursor_row);
                        let insert_at = bottom.min(self.rows.len());
                        self.rows.insert(insert_at, Row::default());
                    }
                }
            }
            'S' => self.scroll_region_up(n),
            'T' => self.scroll_region_down(n),
            'r' => {
                let top = params_vec.first().copied().unwrap_or(1).max(1) as usize - 1;
                let bottom = params_vec
                    .get(1)
                    .copied()
                    .unwrap_or(self.visible_rows as u16)
                    .max(1) as usize
                    - 1;
                if top < bottom && bottom < self.visible_rows {
                    self.scroll_top = top;
                    self.scroll_bottom = bottom;
                }
                self.cursor_row = self.screen_base();
                self.cursor_col = 0;
            }
            'm' if intermediates.is_empty() => self.apply_sgr(params),
            'n' => match params_vec.first().copied().unwrap_or(0) {
                5 => self.responses.push(b"\x1b[0n".to_vec()),
                6 => {
                    let row = self.cursor_row.saturating_sub(base) + 1;
                    let col = self.cursor_col + 1;
                    self.responses
                        .push(format!("\x1b[{};{}R", row, col).into_bytes());
                }
                _ => {}
            },
            't' => match params_vec.first().copied().unwrap_or(0) {
                18 => self.responses.push(
                    format!("\x1b[8;{};{}t", self.visible_rows, self.cols).into_bytes(),
                ),
                14 => self.responses.push(
                    format!(
                        "\x1b[4;{};{}t",
                        self.visible_rows * CELL_PIXEL_HEIGHT,
                        self.cols * CELL_PIXEL_WIDTH
                    )
                    .into_bytes(),
                ),
                _ => {}
            },
            's' => self.save_cursor(),
            'u' => self.restore_cursor(),
            'h' | 'l' if intermediates == [b'?'] => {
                let enable = action == 'h';
                for &param in &params_vec {
                    self.set_private_mode(param, enable);
                }
            }
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        match (intermediates, byte) {
            ([], b'7') => self.save_cursor(),
            ([], b'8') => self.restore_cursor(),
            ([], b'D') => self.linefeed(),
            ([], b'E') => {
                self.linefeed();
                self.cursor_col = 0;
            }
            ([], b'M') => {
                let top = self.screen_base() + self.scroll_top;
                if self.cursor_row == top {
                    self.scroll_region_down(1);
                } else {
                    self.cursor_row = self.cursor_row.saturating_sub(1);
                }
            }
            ([], b'c') => self.clear(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_lands_at_cursor() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"Hello, World!");
        assert_eq!(screen.line_text(0).unwrap(), "Hello, World!");
        assert_eq!(screen.cursor(), (0, 13));
    }

    #[test]
    fn newline_and_carriage_return() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"one\r\ntwo");
        assert_eq!(screen.line_text(0).unwrap(), "one");
        assert_eq!(screen.line_text(1).unwrap(), "two");
    }

    #[test]
    fn auto_wrap_at_column_limit() {
        let mut screen = Screen::new(24, 4);
        screen.process(b"abcdef");
        assert_eq!(screen.line_text(0).unwrap(), "abcd");
        assert_eq!(screen.line_text(1).unwrap(), "ef");
    }

    #[test]
    fn cursor_addressing_grows_rows() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"top\x1b[3;5Hdeep");
        assert_eq!(screen.line_text(2).unwrap(), "    deep");
    }

    #[test]
    fn erase_line_modes() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"abcdef\x1b[3G\x1b[0K");
        assert_eq!(screen.line_text(0).unwrap(), "ab");

        let mut screen = Screen::new(24, 80);
        screen.process(b"abcdef\x1b[3G\x1b[1K");
        assert_eq!(screen.line_text(0).unwrap(), "   def");
    }

    #[test]
    fn erase_display_clears_visible_rows() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"one\ntwo\nthree\x1b[2J");
        assert!(screen.contents().iter().all(|line| line.is_empty()));
        assert_eq!(screen.line_count(), 3);
    }

    #[test]
    fn scrollback_bound_caps_rows_and_clamps_cursor() {
        let mut screen = Screen::with_max_lines(24, 80, 300);
        for i in 0..400 {
            screen.process_str(&format!("line {}\n", i));
        }
        assert_eq!(screen.line_count(), 300);
        let (row, _) = screen.cursor();
        assert!(row < screen.line_count());
        // Oldest rows were trimmed from the front
        assert!(screen.line_text(0).unwrap().starts_with("line 1"));
    }

    #[test]
    fn sgr_round_trip_produces_distinct_styles() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"\x1b[1;31mX\x1b[0mY");
        let x = screen.get_cell(0, 0).unwrap();
        let y = screen.get_cell(0, 1).unwrap();
        assert_eq!(x.ch, 'X');
        assert_eq!(x.style.foreground, Some(Color::Red));
        assert!(x.style.modifiers.contains(Modifier::BOLD));
        assert_eq!(y.ch, 'Y');
        assert!(y.style.is_default());
    }

    #[test]
    fn sgr_256_and_truecolor() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"\x1b[38;5;196ma\x1b[48;2;1;2;3mb");
        assert_eq!(
            screen.get_cell(0, 0).unwrap().style.foreground,
            Some(Color::Indexed(196))
        );
        assert_eq!(
            screen.get_cell(0, 1).unwrap().style.background,
            Some(Color::Rgb(1, 2, 3))
        );
    }

    #[test]
    fn repeated_styles_share_cache_entries() {
        let mut screen = Screen::new(24, 80);
        for _ in 0..50 {
            screen.process(b"\x1b[31mr\x1b[0m");
        }
        // default + red only
        assert_eq!(screen.style_count(), 2);
    }

    #[test]
    fn alternate_screen_restores_buffer_and_cursor() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"main content\x1b[2;3H");
        let cursor_before = screen.cursor();
        let contents_before = screen.contents();

        screen.process(b"\x1b[?1049h");
        assert!(screen.is_alt_screen());
        screen.process(b"alt stuff\x1b[5;1Hmore");
        screen.process(b"\x1b[?1049l");

        assert!(!screen.is_alt_screen());
        assert_eq!(screen.cursor(), cursor_before);
        assert_eq!(screen.contents(), contents_before);
    }

    #[test]
    fn cursor_visibility_and_paste_modes() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"\x1b[?25l\x1b[?2004h");
        assert!(!screen.cursor_visible);
        assert!(screen.bracketed_paste);
        screen.process(b"\x1b[?25h\x1b[?2004l");
        assert!(screen.cursor_visible);
        assert!(!screen.bracketed_paste);
    }

    #[test]
    fn cursor_position_report() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"hi\x1b[6n");
        let responses = screen.drain_responses();
        assert_eq!(responses, vec![b"\x1b[1;3R".to_vec()]);
    }

    #[test]
    fn text_area_size_report() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"\x1b[18t");
        assert_eq!(screen.drain_responses(), vec![b"\x1b[8;24;80t".to_vec()]);
    }

    #[test]
    fn osc_color_query_is_answered() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"\x1b]10;?\x07");
        let responses = screen.drain_responses();
        assert_eq!(responses.len(), 1);
        let text = String::from_utf8(responses[0].clone()).unwrap();
        assert!(text.starts_with("\x1b]10;rgb:"));
    }

    #[test]
    fn osc_set_title_is_ignored() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"\x1b]0;some title\x07after");
        assert!(screen.drain_responses().is_empty());
        assert_eq!(screen.line_text(0).unwrap(), "after");
    }

    #[test]
    fn focus_reports_only_when_tracking() {
        let mut screen = Screen::new(24, 80);
        screen.focus_changed(true);
        assert!(screen.drain_responses().is_empty());
        screen.process(b"\x1b[?1004h");
        screen.focus_changed(true);
        screen.focus_changed(false);
        assert_eq!(
            screen.drain_responses(),
            vec![b"\x1b[I".to_vec(), b"\x1b[O".to_vec()]
        );
    }

    #[test]
    fn scroll_region_rotates_inside_bounds() {
        let mut screen = Screen::new(4, 80);
        screen.process(b"a\r\nb\r\nc\r\nd");
        // Region covers rows 2-3 (1-based); LF at region bottom rotates them
        screen.process(b"\x1b[2;3r");
        screen.process(b"\x1b[3;1H\ne");
        assert_eq!(screen.line_text(0).unwrap(), "a");
        assert_eq!(screen.line_text(1).unwrap(), "c");
        assert_eq!(screen.line_text(2).unwrap(), "e");
        assert_eq!(screen.line_text(3).unwrap(), "d");
    }

    #[test]
    fn split_escape_sequence_across_chunks() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"\x1b[3");
        screen.process(b"1mred");
        assert_eq!(
            screen.get_cell(0, 0).unwrap().style.foreground,
            Some(Color::Red)
        );
    }

    #[test]
    fn insert_and_delete_chars() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"abcd\x1b[2G\x1b[2@");
        assert_eq!(screen.line_text(0).unwrap(), "a  bcd");
        screen.process(b"\x1b[2P");
        assert_eq!(screen.line_text(0).unwrap(), "abcd");
    }

    #[test]
    fn wide_characters_occupy_two_cells() {
        let mut screen = Screen::new(24, 80);
        screen.process("日x".as_bytes());
        assert_eq!(screen.get_cell(0, 0).unwrap().ch, '日');
        assert!(screen.get_cell(0, 1).unwrap().wide_spacer);
        assert_eq!(screen.get_cell(0, 2).unwrap().ch, 'x');
    }
}
