//! Configuration for liftdeck hosts.
//!
//! A TOML file in the platform config directory, overridden by
//! `LIFTDECK_`-prefixed environment variables, translated into a
//! `liftdeck_core::ControllerConfig`. Nested keys use a double underscore
//! (`LIFTDECK_FLOORS__HIGHEST=20`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use liftdeck_api::HeartBeat;
use liftdeck_core::config::{DEFAULT_RECONNECT_DELAY, DEFAULT_WEBSOCKET_PATH};
use liftdeck_core::{ControllerConfig, Destinations, FloorRange, TlsVerification};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Controller base URL (e.g. "http://localhost:8080").
    pub controller: String,

    #[serde(default = "default_websocket_path")]
    pub websocket_path: String,

    #[serde(default = "default_control_prefix")]
    pub control_prefix: String,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Deadline for control calls in seconds. Unset means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Extra CA certificate for the control endpoints.
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub destinations: DestinationsSection,

    #[serde(default)]
    pub floors: FloorsSection,

    #[serde(default)]
    pub heart_beat: HeartBeatSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller: "http://localhost:8080".into(),
            websocket_path: default_websocket_path(),
            control_prefix: default_control_prefix(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            timeout: None,
            ca_cert: None,
            destinations: DestinationsSection::default(),
            floors: FloorsSection::default(),
            heart_beat: HeartBeatSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DestinationsSection {
    pub fleet_topic: String,
    pub call: String,
    pub goto: String,
}

impl Default for DestinationsSection {
    fn default() -> Self {
        let d = Destinations::default();
        Self {
            fleet_topic: d.fleet_topic,
            call: d.call,
            goto: d.goto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FloorsSection {
    pub lowest: i32,
    pub highest: i32,
}

impl Default for FloorsSection {
    fn default() -> Self {
        let f = FloorRange::default();
        Self {
            lowest: f.lowest(),
            highest: f.highest(),
        }
    }
}

/// STOMP heart-beat in milliseconds; 0 disables a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeartBeatSection {
    pub outgoing_ms: u64,
    pub incoming_ms: u64,
}

impl Default for HeartBeatSection {
    fn default() -> Self {
        Self {
            outgoing_ms: 10_000,
            incoming_ms: 10_000,
        }
    }
}

fn default_websocket_path() -> String {
    DEFAULT_WEBSOCKET_PATH.into()
}
fn default_control_prefix() -> String {
    liftdeck_api::control::DEFAULT_CONTROL_PREFIX.into()
}
fn default_reconnect_delay_ms() -> u64 {
    u64::try_from(DEFAULT_RECONNECT_DELAY.as_millis()).unwrap_or(5000)
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "liftdeck", "liftdeck").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("liftdeck");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` + environment. A missing file is not an
/// error; defaults and environment still apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LIFTDECK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Validate `cfg` and build the runtime `ControllerConfig`.
pub fn to_controller_config(cfg: &Config) -> Result<ControllerConfig, ConfigError> {
    let url: url::Url = cfg
        .controller
        .parse()
        .map_err(|_| ConfigError::invalid("controller", format!("invalid URL: {}", cfg.controller)))?;

    if cfg.reconnect_delay_ms == 0 {
        return Err(ConfigError::invalid(
            "reconnect_delay_ms",
            "must be greater than zero",
        ));
    }
    if cfg.timeout == Some(0) {
        return Err(ConfigError::invalid("timeout", "must be greater than zero"));
    }

    for (field, path) in [
        ("websocket_path", &cfg.websocket_path),
        ("control_prefix", &cfg.control_prefix),
        ("destinations.fleet_topic", &cfg.destinations.fleet_topic),
        ("destinations.call", &cfg.destinations.call),
        ("destinations.goto", &cfg.destinations.goto),
    ] {
        if !path.starts_with('/') {
            return Err(ConfigError::invalid(
                field,
                format!("'{path}' must start with '/'"),
            ));
        }
    }

    let floors = FloorRange::new(cfg.floors.lowest, cfg.floors.highest)
        .map_err(|e| ConfigError::invalid("floors", e.to_string()))?;

    let tls = cfg
        .ca_cert
        .as_ref()
        .map_or(TlsVerification::SystemDefaults, |path| {
            TlsVerification::CustomCa(path.clone())
        });

    let mut config = ControllerConfig::new(url);
    config.websocket_path.clone_from(&cfg.websocket_path);
    config.control_prefix.clone_from(&cfg.control_prefix);
    config.destinations = Destinations {
        fleet_topic: cfg.destinations.fleet_topic.clone(),
        call: cfg.destinations.call.clone(),
        goto: cfg.destinations.goto.clone(),
    };
    config.reconnect_delay = Duration::from_millis(cfg.reconnect_delay_ms);
    config.heart_beat = HeartBeat {
        outgoing: Duration::from_millis(cfg.heart_beat.outgoing_ms),
        incoming: Duration::from_millis(cfg.heart_beat.incoming_ms),
    };
    config.floors = floors;
    config.tls = tls;
    config.timeout = cfg.timeout.map(Duration::from_secs);

    config
        .websocket_url()
        .map_err(|e| ConfigError::invalid("controller", e.to_string()))?;
    Ok(config)
}
