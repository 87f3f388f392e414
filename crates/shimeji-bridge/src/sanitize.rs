//! Output sanitization: ANSI stripping and shell-noise line classification.
//!
//! The interactive shell echoes submitted lines, prints prompts, and leaks
//! the synthetic framing back into its output. Before anything is surfaced
//! to the caller, every candidate line runs through an ordered list of named
//! drop predicates; each predicate is unit-tested on its own.

use once_cell::sync::Lazy;
use regex::Regex;

static EXIT_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^__shimeji_exit=").expect("exit-variable pattern"));

static PROMPT_EXIT_VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^:\s]+:[^#$\n]*[#$]\s*__shimeji_exit=").expect("prompt-exit pattern")
});

static ECHOED_MARKER_PRINTF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^printf\s+["'].*SHIMEJI_(START|DONE)_"#).expect("echoed-printf pattern")
});

static CD_WARNING_ECHO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)^cd\s+["'][^"']*["']\s*>/dev/null\s+2>&1\s+\|\|\s+echo\s+"Warning: could not cd into"#,
    )
    .expect("cd-warning pattern")
});

static PROMPT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^:\s]+:[^#$\n]*[#$]\s*$").expect("prompt pattern"));

/// Strip ANSI escape sequences and bare carriage returns.
///
/// Handles CSI sequences, OSC sequences terminated by either BEL or
/// ESC-backslash, and `\r`. Implemented as an explicit state machine so a
/// malformed sequence falls back to passing the bytes through.
pub fn strip_ansi(raw: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Normal,
        Escape,
        Csi,
        Osc,
        OscEscape,
    }

    let mut out = String::with_capacity(raw.len());
    let mut held = String::new();
    let mut state = State::Normal;

    for c in raw.chars() {
        match state {
            State::Normal => {
                if c == '\u{1b}' {
                    held.clear();
                    held.push(c);
                    state = State::Escape;
                } else if c != '\r' {
                    out.push(c);
                }
            }
            State::Escape => {
                held.push(c);
                match c {
                    '[' => state = State::Csi,
                    ']' => state = State::Osc,
                    _ => {
                        // Not a sequence this stripper recognizes
                        out.push_str(&held);
                        held.clear();
                        state = State::Normal;
                    }
                }
            }
            State::Csi => {
                held.push(c);
                if c.is_ascii_alphabetic() {
                    held.clear();
                    state = State::Normal;
                } else if !matches!(c, '0'..='9' | ';' | '?') {
                    out.push_str(&held);
                    held.clear();
                    state = State::Normal;
                }
            }
            State::Osc => {
                held.push(c);
                if c == '\u{7}' {
                    held.clear();
                    state = State::Normal;
                } else if c == '\u{1b}' {
                    state = State::OscEscape;
                }
            }
            State::OscEscape => {
                held.push(c);
                if c == '\\' {
                    held.clear();
                    state = State::Normal;
                } else {
                    state = State::Osc;
                }
            }
        }
    }
    // An unterminated sequence at end of input passes through untouched
    out.push_str(&held);
    out
}

/// Markers and command text needed to classify one command's output lines.
#[derive(Debug, Clone, Default)]
pub struct NoiseFilter {
    pub start_marker: String,
    pub done_marker: String,
    pub command_trimmed: String,
}

impl NoiseFilter {
    /// Ordered drop decision for one candidate output line.
    pub fn should_drop(&self, raw_line: &str) -> bool {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            return false;
        }
        if !self.start_marker.is_empty() && trimmed.contains(&self.start_marker) {
            return true;
        }
        if !self.done_marker.is_empty() && trimmed.contains(&self.done_marker) {
            return true;
        }
        if is_exit_variable_line(trimmed) {
            return true;
        }
        if is_echoed_marker_printf(trimmed) {
            return true;
        }
        if is_cd_warning_echo(trimmed) {
            return true;
        }
        if self.is_echoed_command(trimmed) {
            return true;
        }
        is_prompt_line(trimmed)
    }

    /// Exact or prompt-suffixed echo of the submitted command.
    pub fn is_echoed_command(&self, trimmed: &str) -> bool {
        if self.command_trimmed.is_empty() {
            return false;
        }
        trimmed == self.command_trimmed
            || trimmed.ends_with(&format!("$ {}", self.command_trimmed))
            || trimmed.ends_with(&format!("# {}", self.command_trimmed))
    }
}

/// Echo of the exit-capture assignment, with or without a prompt prefix.
pub fn is_exit_variable_line(trimmed: &str) -> bool {
    EXIT_VARIABLE.is_match(trimmed) || PROMPT_EXIT_VARIABLE.is_match(trimmed)
}

/// Echo of the `printf` that injects a marker.
pub fn is_echoed_marker_printf(trimmed: &str) -> bool {
    ECHOED_MARKER_PRINTF.is_match(trimmed)
}

/// Echo of the cd-fallback line from the working-directory prefix.
pub fn is_cd_warning_echo(trimmed: &str) -> bool {
    CD_WARNING_ECHO.is_match(trimmed)
}

/// A line shaped like a shell prompt (`user@host:path$`).
pub fn is_prompt_line(trimmed: &str) -> bool {
    PROMPT_LINE.is_match(trimmed)
}

/// Drop noise lines and trim blank lines from both ends of the result.
pub fn sanitize_output(raw: &str, filter: &NoiseFilter) -> String {
    let text = raw.replace('\r', "");
    if text.is_empty() {
        return String::new();
    }
    let mut cleaned: Vec<&str> = text
        .split('\n')
        .filter(|line| !filter.should_drop(line))
        .collect();
    while cleaned.first().is_some_and(|l| l.trim().is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.trim().is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}
