//! Compatibility rewriter for interactive agent CLIs.
//!
//! `codex` and `claude` are interactive REPLs; invoked bare inside the
//! bridge they would hang the session forever. Invocations are intercepted
//! by base name and either passed through (terminating forms), rejected
//! with actionable guidance, or rewritten into the tool's single-shot form.
//! The allow-lists live in a configuration table so adding a tool is data,
//! not code.

use std::path::Path;

use crate::marker::quote_single;

/// Per-tool rewriting profile.
#[derive(Debug, Clone, Copy)]
pub struct ToolProfile {
    /// Case-insensitive executable base name this profile intercepts.
    pub base_name: &'static str,
    /// First arguments that are known-safe, terminating subcommands.
    pub safe_subcommands: &'static [&'static str],
    /// Help/version flags that terminate on their own.
    pub help_flags: &'static [&'static str],
    /// Flags anywhere in the tail that already make the call single-shot.
    pub oneshot_flags: &'static [&'static str],
    /// Guidance for a bare invocation with no arguments.
    pub no_args_guidance: &'static str,
    /// Guidance for an unrecognized leading flag.
    pub flags_guidance: &'static str,
    /// Prefix of the non-interactive invocation the tail is rewritten into.
    pub exec_prefix: &'static str,
}

pub static TOOL_PROFILES: &[ToolProfile] = &[
    ToolProfile {
        base_name: "codex",
        safe_subcommands: &[
            "exec",
            "e",
            "review",
            "login",
            "logout",
            "mcp",
            "mcp-server",
            "app-server",
            "completion",
            "sandbox",
            "debug",
            "apply",
            "a",
            "resume",
            "fork",
            "cloud",
            "features",
            "help",
        ],
        help_flags: &["--help", "-h", "--version", "-V"],
        oneshot_flags: &[],
        no_args_guidance: "codex is interactive. In Shimeji terminal, use: codex exec \"<prompt>\"",
        flags_guidance:
            "Interactive codex flags are not supported in chat mode. Use: codex exec \"<prompt>\"",
        exec_prefix: "codex exec",
    },
    ToolProfile {
        base_name: "claude",
        safe_subcommands: &[
            "auth",
            "doctor",
            "install",
            "mcp",
            "plugin",
            "setup-token",
            "update",
            "upgrade",
            "help",
        ],
        help_flags: &["--help", "-h", "--version", "-v"],
        oneshot_flags: &["-p", "--print"],
        no_args_guidance: "claude is interactive. In Shimeji terminal, use: claude -p \"<prompt>\"",
        flags_guidance:
            "Interactive claude flags are not supported in chat mode. Use: claude -p \"<prompt>\"",
        exec_prefix: "claude -p",
    },
];

/// Outcome of the compatibility pre-pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompatResolution {
    /// Run the command unchanged.
    PassThrough,
    /// Run this rewritten command instead.
    Rewritten(String),
    /// Do not execute; surface the guidance verbatim.
    Rejected(String),
}

/// Decide what to do with a (already trimmed, LF-normalized) command line.
/// Multi-line input is never rewritten.
pub fn resolve(command: &str) -> CompatResolution {
    if command.is_empty() || command.contains('\n') {
        return CompatResolution::PassThrough;
    }

    let (executable, tail) = match command.split_once(|c: char| c.is_whitespace()) {
        Some((head, rest)) => (head, rest.trim()),
        None => (command, ""),
    };

    let base = Path::new(executable)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if base.is_empty() {
        return CompatResolution::PassThrough;
    }

    let Some(profile) = TOOL_PROFILES.iter().find(|p| p.base_name == base) else {
        return CompatResolution::PassThrough;
    };

    if tail.is_empty() {
        return CompatResolution::Rejected(profile.no_args_guidance.to_string());
    }

    let first_arg = tail.split_whitespace().next().unwrap_or_default();
    if profile.help_flags.contains(&first_arg) {
        return CompatResolution::PassThrough;
    }
    if tail
        .split_whitespace()
        .any(|token| profile.oneshot_flags.contains(&token))
    {
        return CompatResolution::PassThrough;
    }
    let first_lower = first_arg.to_lowercase();
    if profile.safe_subcommands.contains(&first_lower.as_str()) {
        return CompatResolution::PassThrough;
    }
    if first_lower.starts_with('-') {
        return CompatResolution::Rejected(profile.flags_guidance.to_string());
    }

    CompatResolution::Rewritten(format!("{} {}", profile.exec_prefix, quote_single(tail)))
}
