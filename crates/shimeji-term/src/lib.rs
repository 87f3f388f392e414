//! shimeji-term: terminal surface emulation for the assistant console.
//!
//! This crate provides:
//! - `Screen`: best-effort ANSI/VT terminal surface with a capped row buffer
//! - `styled_rows` / `viewport_text`: style-run extraction for rendering
//! - `input`: key/paste/focus translation into shell byte sequences
//!
//! # Usage
//!
//! ```rust
//! use shimeji_term::Screen;
//!
//! let mut screen = Screen::new(24, 80);
//! screen.process(b"Hello, \x1b[31mWorld\x1b[0m!\r\n");
//!
//! // Answers to query sequences go back to whatever produced the bytes
//! screen.process(b"\x1b[6n");
//! let responses = screen.drain_responses();
//! assert!(!responses.is_empty());
//! ```

mod grid;
mod render;
mod screen;
mod style;

pub mod input;

pub use grid::{Cell, Row};
pub use render::{styled_rows, viewport_text, StyledRun};
pub use screen::{Screen, DEFAULT_MAX_LINES, MIN_MAX_LINES};
pub use style::{CellStyle, SharedStyle, StyleCache};

// Re-export ratatui types that are used in the public API
pub use ratatui::style::{Color, Modifier, Style};
