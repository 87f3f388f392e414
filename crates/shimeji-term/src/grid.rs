//! Row and cell storage for the screen buffer.

use crate::style::SharedStyle;

/// One character cell.
#[derive(Debug, Clone)]
pub struct Cell {
    pub ch: char,
    pub style: SharedStyle,
    /// Spacer occupying the second column of a double-width character.
    pub wide_spacer: bool,
}

impl Cell {
    pub fn blank(style: SharedStyle) -> Self {
        Self {
            ch: ' ',
            style,
            wide_spacer: false,
        }
    }

    pub fn new(ch: char, style: SharedStyle) -> Self {
        Self {
            ch,
            style,
            wide_spacer: false,
        }
    }

    pub fn spacer(style: SharedStyle) -> Self {
        Self {
            ch: ' ',
            style,
            wide_spacer: true,
        }
    }
}

/// One screen row, grown on demand with blank padding.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.ch == ' ')
    }

    /// Row contents as text with trailing blanks trimmed.
    pub fn text(&self) -> String {
        let line: String = self
            .cells
            .iter()
            .filter(|c| !c.wide_spacer)
            .map(|c| c.ch)
            .collect();
        line.trim_end().to_string()
    }

    /// Extend with blank cells so that `col` is addressable.
    pub fn pad_to(&mut self, col: usize, blank: &SharedStyle) {
        while self.cells.len() <= col {
            self.cells.push(Cell::blank(blank.clone()));
        }
    }

    pub fn put(&mut self, col: usize, cell: Cell, blank: &SharedStyle) {
        self.pad_to(col, blank);
        self.cells[col] = cell;
    }

    /// Insert `n` blank cells at `col`, shifting the rest right, bounded by `cols`.
    pub fn insert_blanks(&mut self, col: usize, n: usize, cols: usize, blank: &SharedStyle) {
        self.pad_to(col, blank);
        for _ in 0..n {
            self.cells.insert(col, Cell::blank(blank.clone()));
        }
        self.cells.truncate(cols);
    }

    /// Delete `n` cells at `col`, shifting the rest left.
    pub fn delete(&mut self, col: usize, n: usize) {
        if col < self.cells.len() {
            let end = (col + n).min(self.cells.len());
            self.cells.drain(col..end);
        }
    }

    /// Overwrite `n` cells starting at `col` with blanks.
    pub fn erase(&mut self, col: usize, n: usize, blank: &SharedStyle) {
        self.pad_to(col.saturating_add(n).saturating_sub(1), blank);
        for cell in self.cells.iter_mut().skip(col).take(n) {
            *cell = Cell::blank(blank.clone());
        }
    }

    /// Truncate at `col`, erasing to the end of the line.
    pub fn erase_from(&mut self, col: usize) {
        self.cells.truncate(col);
    }

    /// Blank out everything up to and including `col`.
    pub fn erase_to(&mut self, col: usize, blank: &SharedStyle) {
        self.pad_to(col, blank);
        for cell in self.cells.iter_mut().take(col + 1) {
            *cell = Cell::blank(blank.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StyleCache;

    fn blank() -> SharedStyle {
        StyleCache::new().default_style()
    }

    #[test]
    fn pad_grows_with_blanks() {
        let mut row = Row::default();
        row.pad_to(4, &blank());
        assert_eq!(row.cells.len(), 5);
        assert!(row.is_blank());
    }

    #[test]
    fn put_then_text_trims_trailing() {
        let b = blank();
        let mut row = Row::default();
        row.put(2, Cell::new('x', b.clone()), &b);
        row.pad_to(10, &b);
        assert_eq!(row.text(), "  x");
    }

    #[test]
    fn insert_blanks_shifts_right_and_clips() {
        let b = blank();
        let mut row = Row::default();
        for (i, ch) in "abcd".chars().enumerate() {
            row.put(i, Cell::new(ch, b.clone()), &b);
        }
        row.insert_blanks(1, 2, 4, &b);
        assert_eq!(row.text(), "a  b");
    }

    #[test]
    fn delete_shifts_left() {
        let b = blank();
        let mut row = Row::default();
        for (i, ch) in "abcd".chars().enumerate() {
            row.put(i, Cell::new(ch, b.clone()), &b);
        }
        row.delete(1, 2);
        assert_eq!(row.text(), "ad");
    }
}
