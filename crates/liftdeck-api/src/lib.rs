// liftdeck-api: STOMP link and HTTP control client for a remote elevator controller

pub mod control;
pub mod error;
pub mod stomp;
pub mod transport;
pub mod websocket;

pub use control::ControlClient;
pub use error::Error;
pub use stomp::{Frame, FrameCommand, HeartBeat};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{
    Inbound, LinkConfig, LinkEvent, LinkState, Publisher, PublishRequest,
    ReconnectConfig, StompLink,
};
