//! Error taxonomy for the bridge.
//!
//! Every failure carries a stable, distinguishable reason string so the host
//! can branch on "busy" vs "session gone" vs "write failed" instead of
//! pattern-matching free text. The `TERMINAL_*` tags are part of the wire
//! contract with shell-based hosts.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Empty or whitespace-only command; rejected before any process work.
    #[error("Empty command.")]
    EmptyCommand,

    /// Actionable guidance for a disallowed interactive-CLI invocation.
    /// Shown verbatim to the user.
    #[error("{0}")]
    Guidance(String),

    /// The session already has a command in flight. Nothing is queued.
    #[error("TERMINAL_BUSY")]
    Busy,

    /// Process-level failure (spawn error and friends).
    #[error("TERMINAL_ERROR:{0}")]
    Process(String),

    /// Writing the command script to the shell's stdin failed.
    #[error("TERMINAL_WRITE_ERROR:{0}")]
    WriteFailed(String),

    /// The session was explicitly closed while a command was pending.
    #[error("TERMINAL_SESSION_CLOSED")]
    SessionClosed,

    /// The session was torn down because the requested shell variant changed.
    #[error("TERMINAL_SESSION_REPLACED")]
    SessionReplaced,

    /// The shell process exited unexpectedly; payload is `<code>[:<signal>]`.
    #[error("TERMINAL_SESSION_EXIT:{0}")]
    SessionExit(String),

    #[error("TERMINAL_AUTOCOMPLETE_TIMEOUT")]
    CompletionTimeout,

    #[error("TERMINAL_AUTOCOMPLETE_ERROR:{0}")]
    CompletionFailed(String),

    /// The completion probe exited non-zero without producing candidates.
    #[error("TERMINAL_AUTOCOMPLETE_EXIT:{0}")]
    CompletionExit(i32),
}

impl BridgeError {
    /// True for errors caused by the submitted input rather than the session.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::EmptyCommand | Self::Guidance(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_are_stable() {
        assert_eq!(BridgeError::Busy.to_string(), "TERMINAL_BUSY");
        assert_eq!(
            BridgeError::SessionExit("1:9".into()).to_string(),
            "TERMINAL_SESSION_EXIT:1:9"
        );
        assert_eq!(
            BridgeError::WriteFailed("broken pipe".into()).to_string(),
            "TERMINAL_WRITE_ERROR:broken pipe"
        );
    }

    #[test]
    fn guidance_surfaces_verbatim() {
        let err = BridgeError::Guidance("use: codex exec \"<prompt>\"".into());
        assert_eq!(err.to_string(), "use: codex exec \"<prompt>\"");
        assert!(err.is_user_error());
        assert!(!BridgeError::Busy.is_user_error());
    }
}
