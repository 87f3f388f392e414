//! Style-run extraction for host rendering.
//!
//! The host coalesces frames; this module only walks the buffer and merges
//! contiguous equally-styled cells into runs.

use ratatui::style::Style;

use crate::screen::Screen;

/// A contiguous run of equally-styled characters within one row.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledRun {
    pub text: String,
    pub style: Style,
    /// True when this run is the cursor cell.
    pub cursor: bool,
}

/// Walk rows up to the last non-empty row or the cursor row, whichever is
/// further, emitting merged style runs per row. The cursor cell becomes its
/// own run when the cursor is visible.
pub fn styled_rows(screen: &Screen) -> Vec<Vec<StyledRun>> {
    let (cursor_row, cursor_col) = screen.cursor();
    let last_content = (0..screen.line_count())
        .rev()
        .find(|&i| screen.row(i).is_some_and(|r| !r.is_blank()));
    let mut end = last_content.map_or(0, |i| i + 1);
    if screen.cursor_visible {
        end = end.max(cursor_row + 1);
    }
    end = end.min(screen.line_count().max(cursor_row + 1));

    let mut out = Vec::with_capacity(end);
    for row_index in 0..end {
        let mut runs: Vec<StyledRun> = Vec::new();
        let cells = screen.row(row_index).map(|r| r.cells.as_slice()).unwrap_or(&[]);
        let cursor_here = screen.cursor_visible && row_index == cursor_row;
        let row_len = if cursor_here {
            cells.len().max(cursor_col + 1)
        } else {
            cells.len()
        };
        for col in 0..row_len {
            let (ch, style) = match cells.get(col) {
                Some(cell) if cell.wide_spacer => continue,
                Some(cell) => (cell.ch, cell.style.to_ratatui_style()),
                None => (' ', Style::default()),
            };
            let is_cursor = cursor_here && col == cursor_col;
            match runs.last_mut() {
                Some(run) if run.style == style && !run.cursor && !is_cursor => {
                    run.text.push(ch);
                }
                _ => runs.push(StyledRun {
                    text: ch.to_string(),
                    style,
                    cursor: is_cursor,
                }),
            }
        }
        out.push(runs);
    }
    out
}

/// Visible-screen contents as plain text, trailing blanks trimmed.
pub fn viewport_text(screen: &Screen) -> Vec<String> {
    let base = screen.screen_base();
    (base..screen.line_count())
        .filter_map(|i| screen.line_text(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::{Color, Style};

    #[test]
    fn runs_merge_equal_styles() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"ab\x1b[31mcd\x1b[0m");
        screen.process(b"\x1b[?25l"); // keep the cursor out of the runs
        let rows = styled_rows(&screen);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[0][0].text, "ab");
        assert_eq!(rows[0][1].text, "cd");
        assert_eq!(rows[0][1].style, Style::default().fg(Color::Red));
    }

    #[test]
    fn cursor_is_its_own_run() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"abc\x1b[2G");
        let rows = styled_rows(&screen);
        let cursor_runs: Vec<_> = rows[0].iter().filter(|r| r.cursor).collect();
        assert_eq!(cursor_runs.len(), 1);
        assert_eq!(cursor_runs[0].text, "b");
    }

    #[test]
    fn walk_extends_to_cursor_row() {
        let mut screen = Screen::new(24, 80);
        screen.process(b"x\x1b[5;1H");
        let rows = styled_rows(&screen);
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn viewport_text_covers_visible_tail() {
        let mut screen = Screen::new(2, 80);
        screen.process(b"one\ntwo\nthree");
        let lines = viewport_text(&screen);
        assert_eq!(lines, vec!["two".to_string(), "three".to_string()]);
    }
}
