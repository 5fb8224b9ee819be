// ── Core error types ──
//
// Domain errors from liftdeck-core. Callers of the dispatcher only ever
// see `NotConnected`, `FloorOutOfRange` and `CommandFailed`; transport
// failures stay inside the connection manager and parse failures inside
// the ingestor. The `From<liftdeck_api::Error>` impl translates wire-level
// errors into domain variants.

use thiserror::Error;

use crate::command::CommandKind;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    /// A command was attempted while the link is not usable.
    #[error("Not connected to the elevator controller")]
    NotConnected,

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Malformed fleet snapshot: {reason}")]
    MalformedSnapshot { reason: String },

    // ── Command errors ───────────────────────────────────────────────
    /// Accepted for sending, then failed on the wire or at the endpoint.
    #[error("Failed to {command}: {reason}")]
    CommandFailed { command: CommandKind, reason: String },

    #[error("Floor {floor} is outside the building ({lowest}..={highest})")]
    FloorOutOfRange {
        floor: i32,
        lowest: i32,
        highest: i32,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wrap a wire-level failure of `command`.
    pub(crate) fn command_failed(command: CommandKind, err: &liftdeck_api::Error) -> Self {
        Self::CommandFailed {
            command,
            reason: err.to_string(),
        }
    }

    /// Whether a UI should show this to the operator.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::CommandFailed { .. } | Self::FloorOutOfRange { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<liftdeck_api::Error> for CoreError {
    fn from(err: liftdeck_api::Error) -> Self {
        match err {
            liftdeck_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            liftdeck_api::Error::Tls(message) => CoreError::Config { message },
            other => CoreError::Transport {
                reason: other.to_string(),
            },
        }
    }
}
