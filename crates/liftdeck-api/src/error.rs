use thiserror::Error;

/// Top-level error type for the `liftdeck-api` crate.
///
/// Covers every failure mode of the two wire surfaces: the STOMP link
/// over WebSocket and the HTTP mode-control endpoints.
/// `liftdeck-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Control endpoints ───────────────────────────────────────────
    /// A control endpoint answered with a non-success status.
    #[error("Control request rejected (HTTP {status}): {message}")]
    Control { status: u16, message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the peer.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── STOMP ───────────────────────────────────────────────────────
    /// The broker sent an `ERROR` frame.
    #[error("STOMP error from broker: {message}")]
    Stomp { message: String },

    /// The broker answered `CONNECT` with something other than `CONNECTED`.
    #[error("STOMP handshake failed: {0}")]
    Handshake(String),

    /// A frame could not be decoded.
    #[error("Malformed STOMP frame: {0}")]
    Frame(String),

    /// A publish was attempted while no STOMP session is live.
    #[error("STOMP link is down")]
    LinkDown,
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } | Self::LinkDown => true,
            Self::Control { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status code, if the error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Control { status, .. } => Some(*status),
            _ => None,
        }
    }
}
