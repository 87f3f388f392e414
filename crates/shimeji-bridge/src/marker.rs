//! Synthetic marker generation and shell escaping helpers.
//!
//! Markers are the out-of-band framing layered over the shell's byte stream:
//! a start line delimits where live output begins, and a done line carries
//! the exit code and resulting working directory. The wire format is
//! bit-exact: `__SHIMEJI_START_<seed>__` and `__SHIMEJI_DONE_<seed>__`.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// Marker pair for one command invocation.
#[derive(Debug, Clone)]
pub struct CommandMarkers {
    pub start: String,
    pub done: String,
}

impl CommandMarkers {
    /// Generate a fresh marker pair. The seed combines wall-clock millis with
    /// a random component so two commands issued within the same millisecond
    /// (on any sessions) cannot collide.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let random = Uuid::new_v4().simple().to_string();
        let seed = format!("{}_{}", millis, &random[..12]);
        Self {
            start: format!("__SHIMEJI_START_{}__", seed),
            done: format!("__SHIMEJI_DONE_{}__", seed),
        }
    }
}

/// Escape text for interpolation inside a double-quoted shell string.
pub fn escape_double_quoted(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Wrap text in single quotes, safely embedding any single quotes it holds.
pub fn quote_single(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r#"'"'"'"#))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_carry_the_wire_prefixes() {
        let markers = CommandMarkers::generate();
        assert!(markers.start.starts_with("__SHIMEJI_START_"));
        assert!(markers.start.ends_with("__"));
        assert!(markers.done.starts_with("__SHIMEJI_DONE_"));
        assert!(markers.done.ends_with("__"));
    }

    #[test]
    fn markers_are_unique_within_one_millisecond() {
        let a = CommandMarkers::generate();
        let b = CommandMarkers::generate();
        assert_ne!(a.start, b.start);
        assert_ne!(a.done, b.done);
    }

    #[test]
    fn double_quote_escaping() {
        assert_eq!(
            escape_double_quoted(r#"a "b" $c `d` \e"#),
            r#"a \"b\" \$c \`d\` \\e"#
        );
    }

    #[test]
    fn single_quote_wrapping() {
        assert_eq!(quote_single("plain"), "'plain'");
        assert_eq!(quote_single("it's"), r#"'it'"'"'s'"#);
    }
}
