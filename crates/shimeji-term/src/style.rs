//! Cell styling with interned style handles.
//!
//! Heavy coloring produces the same handful of styles over and over. Styles
//! are interned in a [`StyleCache`] keyed by their attribute fingerprint so
//! every cell carrying the same attributes shares one allocation.

use std::collections::HashMap;
use std::sync::Arc;

pub use ratatui::style::{Color, Modifier, Style};

/// Graphic attributes for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CellStyle {
    /// Foreground color; `None` means the terminal's native color.
    pub foreground: Option<Color>,
    /// Background color; `None` means the terminal's native color.
    pub background: Option<Color>,
    pub modifiers: Modifier,
}

impl CellStyle {
    pub fn fg(mut self, color: Color) -> Self {
        self.foreground = Some(color);
        self
    }

    pub fn bg(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    pub fn add_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.insert(modifier);
        self
    }

    pub fn remove_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.remove(modifier);
        self
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_ratatui_style(&self) -> Style {
        let mut style = Style::default();
        if let Some(fg) = self.foreground {
            style = style.fg(fg);
        }
        if let Some(bg) = self.background {
            style = style.bg(bg);
        }
        style.add_modifier(self.modifiers)
    }
}

/// Shared, immutable handle to an interned style.
pub type SharedStyle = Arc<CellStyle>;

/// Interning cache for cell styles.
#[derive(Debug, Clone)]
pub struct StyleCache {
    entries: HashMap<CellStyle, SharedStyle>,
    default: SharedStyle,
}

impl Default for StyleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleCache {
    pub fn new() -> Self {
        let default: SharedStyle = Arc::new(CellStyle::default());
        let mut entries = HashMap::new();
        entries.insert(*default, Arc::clone(&default));
        Self { entries, default }
    }

    pub fn default_style(&self) -> SharedStyle {
        Arc::clone(&self.default)
    }

    /// Look up or insert the shared handle for `style`.
    pub fn intern(&mut self, style: CellStyle) -> SharedStyle {
        Arc::clone(self.entries.entry(style).or_insert_with(|| Arc::new(style)))
    }

    /// Number of distinct styles seen so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_styles_share_one_entry() {
        let mut cache = StyleCache::new();
        let red = CellStyle::default().fg(Color::Red).add_modifier(Modifier::BOLD);
        let a = cache.intern(red);
        let b = cache.intern(red);
        assert!(Arc::ptr_eq(&a, &b));
        // default + red
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn default_style_is_preinterned() {
        let mut cache = StyleCache::new();
        let d = cache.intern(CellStyle::default());
        assert!(Arc::ptr_eq(&d, &cache.default_style()));
    }

    #[test]
    fn modifier_round_trip() {
        let style = CellStyle::default()
            .add_modifier(Modifier::BOLD | Modifier::ITALIC)
            .remove_modifier(Modifier::BOLD);
        assert!(style.modifiers.contains(Modifier::ITALIC));
        assert!(!style.modifiers.contains(Modifier::BOLD));
    }
}
