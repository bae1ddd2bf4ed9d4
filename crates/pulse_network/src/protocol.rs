//! Session protocols and the cell that holds the active one.
//!
//! A session always has exactly one active [`Protocol`]. The tick thread is
//! the only writer (through message handlers); connection readers load it
//! once per frame to pick a decoder. [`ProtocolCell`] is a single atomic byte,
//! so a reader sees either the old or the new protocol, never anything else.

use crate::error::NetworkError;
use crate::messaging::{Frame, HandshakeMessage, LoginStartMessage, Message};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// The protocol a session is currently speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Protocol {
    /// Initial protocol of every connection
    Handshake = 0,
    /// Entered when the handshake requests `LOGIN`
    Login = 1,
}

impl Protocol {
    pub fn name(self) -> &'static str {
        match self {
            Protocol::Handshake => "HANDSHAKE",
            Protocol::Login => "LOGIN",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Protocol::Login,
            _ => Protocol::Handshake,
        }
    }

    /// Decodes one inbound line under this protocol.
    ///
    /// Only frame kinds that belong to the protocol are accepted; anything
    /// else is [`NetworkError::UnexpectedMessage`].
    pub fn decode(self, line: &str) -> Result<Box<dyn Message>, NetworkError> {
        let frame: Frame = serde_json::from_str(line)?;

        match (self, frame.kind.as_str()) {
            (Protocol::Handshake, "handshake") => {
                let message: HandshakeMessage = serde_json::from_value(frame.data)?;
                Ok(Box::new(message))
            }
            (Protocol::Login, "login_start") => {
                let message: LoginStartMessage = serde_json::from_value(frame.data)?;
                Ok(Box::new(message))
            }
            (protocol, kind) => Err(NetworkError::UnexpectedMessage {
                protocol,
                kind: kind.to_string(),
            }),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lock-free holder of a session's active protocol.
#[derive(Debug)]
pub struct ProtocolCell {
    current: AtomicU8,
}

impl ProtocolCell {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            current: AtomicU8::new(protocol as u8),
        }
    }

    pub fn load(&self) -> Protocol {
        Protocol::from_u8(self.current.load(Ordering::Acquire))
    }

    /// Replaces the active protocol, returning the previous one.
    pub fn replace(&self, protocol: Protocol) -> Protocol {
        Protocol::from_u8(self.current.swap(protocol as u8, Ordering::AcqRel))
    }

    /// Moves from `from` to `to` only if `from` is still active.
    ///
    /// Returns the protocol that was active when the call was made.
    pub fn transition(&self, from: Protocol, to: Protocol) -> Result<Protocol, Protocol> {
        self.current
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(Protocol::from_u8)
            .map_err(Protocol::from_u8)
    }
}

impl Default for ProtocolCell {
    fn default() -> Self {
        Self::new(Protocol::Handshake)
    }
}
