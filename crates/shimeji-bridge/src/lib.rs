//! shimeji-bridge: embedded terminal bridge.
//!
//! Multiplexes one persistent interactive shell per logical session and
//! exposes a request/response command-execution contract over the shell's
//! free-running byte stream:
//!
//! - `marker`: synthetic framing injected into shell output
//! - `sanitize`: ANSI stripping and shell-noise line classification
//! - `compat`: rewriting of interactive agent-CLI invocations
//! - `session`: session lifecycle and the two-phase stream parser
//! - `complete`: one-shot autocompletion probes
//!
//! The terminal surface renderer lives in the companion `shimeji-term`
//! crate, re-exported here for hosts that run fully interactive panes.

pub mod compat;
pub mod complete;
pub mod error;
pub mod marker;
pub mod sanitize;
pub mod session;

pub use compat::{resolve as resolve_compatibility, CompatResolution, ToolProfile};
pub use complete::{Completion, MAX_CANDIDATES, PROBE_TIMEOUT};
pub use error::BridgeError;
pub use marker::CommandMarkers;
pub use session::{
    BridgeEvent, CommandOutcome, SessionRegistry, SessionSettings, StreamSource,
    DEFAULT_SHELL_VARIANT,
};

pub use shimeji_term;
