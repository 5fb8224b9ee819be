// ── Runtime connection configuration ──
//
// These types describe *how* to reach an elevator controller and what the
// building looks like. They never touch disk: `liftdeck-config` (or an
// embedding application) builds a `ControllerConfig` and hands it in.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use liftdeck_api::{HeartBeat, TlsMode, TransportConfig};
use liftdeck_api::control::DEFAULT_CONTROL_PREFIX;
use url::Url;

use crate::error::CoreError;

pub const DEFAULT_WEBSOCKET_PATH: &str = "/ws/websocket";
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

// ── Floors ──────────────────────────────────────────────────────────

/// Inclusive range of serviceable floors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorRange {
    lowest: i32,
    highest: i32,
}

impl FloorRange {
    pub fn new(lowest: i32, highest: i32) -> Result<Self, CoreError> {
        if lowest > highest {
            return Err(CoreError::Config {
                message: format!("lowest floor {lowest} is above highest floor {highest}"),
            });
        }
        Ok(Self { lowest, highest })
    }

    pub fn lowest(self) -> i32 {
        self.lowest
    }

    pub fn highest(self) -> i32 {
        self.highest
    }

    pub fn contains(self, floor: i32) -> bool {
        (self.lowest..=self.highest).contains(&floor)
    }
}

impl Default for FloorRange {
    fn default() -> Self {
        Self {
            lowest: 0,
            highest: 10,
        }
    }
}

impl fmt::Display for FloorRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.lowest, self.highest)
    }
}

// ── Destinations ────────────────────────────────────────────────────

/// Pub/sub destinations on the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    /// Fleet snapshots are broadcast here.
    pub fleet_topic: String,
    /// Hall calls are published here.
    pub call: String,
    /// Car calls are published here.
    pub goto: String,
}

impl Default for Destinations {
    fn default() -> Self {
        Self {
            fleet_topic: "/topic/elevators".into(),
            call: "/app/elevator/call".into(),
            goto: "/app/elevator/goto".into(),
        }
    }
}

// ── TLS ─────────────────────────────────────────────────────────────

/// TLS verification strategy for the control endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Bundled webpki roots.
    #[default]
    SystemDefaults,
    /// Also trust a CA certificate from this PEM file.
    CustomCa(PathBuf),
}

// ── ControllerConfig ────────────────────────────────────────────────

/// Configuration for one elevator controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Base URL of the controller (e.g. `http://localhost:8080`).
    pub url: Url,
    /// Path of the STOMP-over-WebSocket endpoint, relative to `url`.
    pub websocket_path: String,
    pub destinations: Destinations,
    /// Path prefix of the HTTP mode-control endpoints.
    pub control_prefix: String,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    pub heart_beat: HeartBeat,
    pub floors: FloorRange,
    pub tls: TlsVerification,
    /// HTTP request deadline for control calls. `None` leaves failure
    /// detection to the transport.
    pub timeout: Option<Duration>,
}

impl ControllerConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            websocket_path: DEFAULT_WEBSOCKET_PATH.into(),
            destinations: Destinations::default(),
            control_prefix: DEFAULT_CONTROL_PREFIX.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            heart_beat: HeartBeat::default(),
            floors: FloorRange::default(),
            tls: TlsVerification::default(),
            timeout: None,
        }
    }

    /// The STOMP endpoint: `http` becomes `ws`, `https` becomes `wss`.
    pub fn websocket_url(&self) -> Result<Url, CoreError> {
        let scheme = match self.url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(CoreError::Config {
                    message: format!("unsupported URL scheme '{other}'"),
                });
            }
        };

        let mut ws = self.url.clone();
        ws.set_scheme(scheme).map_err(|()| CoreError::Config {
            message: format!("cannot derive {scheme} URL from {}", self.url),
        })?;
        ws.set_path(&self.websocket_path);
        ws.set_query(None);
        ws.set_fragment(None);
        Ok(ws)
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            },
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(url: &str) -> ControllerConfig {
        ControllerConfig::new(url.parse().unwrap())
    }

    #[test]
    fn defaults() {
        let cfg = config("http://localhost:8080");
        assert_eq!(cfg.destinations.fleet_topic, "/topic/elevators");
        assert_eq!(cfg.destinations.call, "/app/elevator/call");
        assert_eq!(cfg.destinations.goto, "/app/elevator/goto");
        assert_eq!(cfg.control_prefix, "/api/elevator");
        assert_eq!(cfg.reconnect_delay, Duration::from_millis(5000));
        assert_eq!(cfg.floors, FloorRange::new(0, 10).unwrap());
        assert_eq!(cfg.timeout, None);
        assert_eq!(cfg.transport().timeout, None);
    }

    #[test]
    fn websocket_url_follows_scheme() {
        assert_eq!(
            config("http://localhost:8080").websocket_url().unwrap().as_str(),
            "ws://localhost:8080/ws/websocket"
        );
        assert_eq!(
            config("https://lifts.example.com/").websocket_url().unwrap().as_str(),
            "wss://lifts.example.com/ws/websocket"
        );
        assert_eq!(
            config("ws://127.0.0.1:9000").websocket_url().unwrap().as_str(),
            "ws://127.0.0.1:9000/ws/websocket"
        );
    }

    #[test]
    fn websocket_url_rejects_other_schemes() {
        assert!(matches!(
            config("ftp://example.com").websocket_url(),
            Err(CoreError::Config { .. })
        ));
    }

    #[test]
    fn floor_range_bounds() {
        let floors = FloorRange::default();
        assert!(floors.contains(0));
        assert!(floors.contains(10));
        assert!(!floors.contains(-1));
        assert!(!floors.contains(11));
        assert_eq!(floors.to_string(), "0..=10");
    }

    #[test]
    fn inverted_floor_range_is_rejected() {
        assert!(FloorRange::new(5, 2).is_err());
        assert!(FloorRange::new(3, 3).is_ok());
    }

    #[test]
    fn transport_carries_tls_choice() {
        let mut cfg = config("https://lifts.example.com");
        cfg.tls = TlsVerification::CustomCa("/etc/lifts/ca.pem".into());
        cfg.timeout = Some(Duration::from_secs(5));
        let transport = cfg.transport();
        assert_eq!(transport.tls, TlsMode::CustomCa("/etc/lifts/ca.pem".into()));
        assert_eq!(transport.timeout, Some(Duration::from_secs(5)));
    }
}
