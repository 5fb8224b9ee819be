//! STOMP 1.2 frame codec.
//!
//! Frames travel as WebSocket text messages. A message may carry a single
//! frame, several frames, or only EOLs (heart-beats). Header values are
//! escaped per STOMP 1.2 on every frame except `CONNECT`, `STOMP` and
//! `CONNECTED`.

use std::fmt;
use std::time::Duration;

use crate::error::Error;

// ── FrameCommand ─────────────────────────────────────────────────────

/// Every command a STOMP 1.2 frame can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCommand {
    // Client frames
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    // Server frames
    Connected,
    Message,
    Receipt,
    Error,
}

impl FrameCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Connected => "CONNECTED",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    fn parse(raw: &str) -> Result<Self, Error> {
        let command = match raw {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "ACK" => Self::Ack,
            "NACK" => Self::Nack,
            "BEGIN" => Self::Begin,
            "COMMIT" => Self::Commit,
            "ABORT" => Self::Abort,
            "DISCONNECT" => Self::Disconnect,
            "CONNECTED" => Self::Connected,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            other => return Err(Error::Frame(format!("unknown command '{other}'"))),
        };
        Ok(command)
    }

    /// Handshake frames carry raw header values.
    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for FrameCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── HeartBeat ────────────────────────────────────────────────────────

/// The two halves of a `heart-beat` header.
///
/// `outgoing` is how often the sender can emit heart-beats, `incoming`
/// how often it wants to receive them. Zero disables that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeat {
    pub outgoing: Duration,
    pub incoming: Duration,
}

impl HeartBeat {
    pub const DISABLED: Self = Self {
        outgoing: Duration::ZERO,
        incoming: Duration::ZERO,
    };

    pub fn header_value(self) -> String {
        format!(
            "{},{}",
            self.outgoing.as_millis(),
            self.incoming.as_millis()
        )
    }

    /// Parse a `cx,cy` header value (milliseconds).
    pub fn parse(value: &str) -> Option<Self> {
        let (out, inc) = value.split_once(',')?;
        Some(Self {
            outgoing: Duration::from_millis(out.trim().parse().ok()?),
            incoming: Duration::from_millis(inc.trim().parse().ok()?),
        })
    }

    /// Interval at which this side must send heart-beats, given the
    /// peer's advertised values. `None` when either side opts out.
    pub fn outgoing_interval(self, peer: Self) -> Option<Duration> {
        if self.outgoing.is_zero() || peer.incoming.is_zero() {
            None
        } else {
            Some(self.outgoing.max(peer.incoming))
        }
    }
}

impl Default for HeartBeat {
    fn default() -> Self {
        Self {
            outgoing: Duration::from_secs(10),
            incoming: Duration::from_secs(10),
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────────

/// A single STOMP frame.
///
/// Headers keep wire order; on repeated names the first one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: FrameCommand,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: FrameCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    // ── Client frame constructors ────────────────────────────────────

    pub fn connect(host: &str, heart_beat: HeartBeat) -> Self {
        Self::new(FrameCommand::Connect)
            .header("accept-version", "1.2,1.1,1.0")
            .header("host", host)
            .header("heart-beat", heart_beat.header_value())
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(FrameCommand::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    /// A `SEND` frame carrying a JSON body.
    pub fn send_json(destination: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(FrameCommand::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .header("content-length", body.len().to_string())
            .with_body(body)
    }

    pub fn disconnect() -> Self {
        Self::new(FrameCommand::Disconnect)
    }

    // ── Wire format ──────────────────────────────────────────────────

    /// Serialize to the text form sent over the WebSocket.
    pub fn encode(&self) -> String {
        let escapes = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escapes {
                out.push_str(&escape(name));
                out.push(':');
                out.push_str(&escape(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

// ── Decoding ─────────────────────────────────────────────────────────

/// One unit of inbound traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Frame(Frame),
    HeartBeat,
}

/// Decode every frame (and heart-beat) contained in one text message.
pub fn decode(text: &str) -> Result<Vec<Decoded>, Error> {
    let mut out = Vec::new();
    let mut rest = text;

    loop {
        let trimmed = rest.trim_start_matches(['\r', '\n']);
        if trimmed.len() != rest.len() {
            out.push(Decoded::HeartBeat);
        }
        rest = trimmed;
        if rest.is_empty() {
            break;
        }
        let (frame, remaining) = decode_frame(rest)?;
        out.push(Decoded::Frame(frame));
        rest = remaining;
    }

    Ok(out)
}

fn decode_frame(input: &str) -> Result<(Frame, &str), Error> {
    let (command_line, mut cursor) =
        split_line(input).ok_or_else(|| Error::Frame("missing command line".into()))?;
    let command = FrameCommand::parse(command_line)?;
    let escapes = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let (line, next) =
            split_line(cursor).ok_or_else(|| Error::Frame("unterminated header block".into()))?;
        cursor = next;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Frame(format!("header without ':' in {command} frame")))?;
        if escapes {
            headers.push((unescape(name)?, unescape(value)?));
        } else {
            headers.push((name.to_owned(), value.to_owned()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| Error::Frame(format!("invalid content-length '{v}'")))
        })
        .transpose()?;

    let (body, remaining) = match content_length {
        Some(len) => {
            let body = cursor
                .get(..len)
                .ok_or_else(|| Error::Frame("body shorter than content-length".into()))?;
            let after = cursor
                .get(len..)
                .and_then(|tail| tail.strip_prefix('\0'))
                .ok_or_else(|| Error::Frame("missing NUL after body".into()))?;
            (body, after)
        }
        None => {
            let end = cursor
                .find('\0')
                .ok_or_else(|| Error::Frame("missing NUL terminator".into()))?;
            let (body, tail) = cursor.split_at(end);
            (body, tail.get(1..).unwrap_or_default())
        }
    };

    let frame = Frame {
        command,
        headers,
        body: body.to_owned(),
    };
    Ok((frame, remaining))
}

/// Split off one line, tolerating `\r\n` endings.
fn split_line(input: &str) -> Option<(&str, &str)> {
    let (line, rest) = input.split_once('\n')?;
    Some((line.strip_suffix('\r').unwrap_or(line), rest))
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(raw: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            Some(other) => {
                return Err(Error::Frame(format!("invalid header escape '\\{other}'")));
            }
            None => return Err(Error::Frame("dangling '\\' in header".into())),
        }
    }
    Ok(out)
}

// ── Tests ────────────────────────────────────────────────────────────
