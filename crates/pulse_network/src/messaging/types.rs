//! Message type definitions for client-server communication.
//!
//! Inbound lines are [`Frame`]s: a `type` tag naming the message and a `data`
//! payload. The session's active [`Protocol`](crate::protocol::Protocol)
//! decides which tags are accepted and which concrete message they become.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// A decoded inbound message.
///
/// Handlers are looked up by the concrete type behind a `dyn Message`, so any
/// `Debug + Send + Sync + 'static` type can be routed through the dispatcher.
///
/// Call these methods on a `&dyn Message`, never on a `Box<dyn Message>`:
/// the blanket implementation would otherwise resolve to the box itself.
pub trait Message: Any + Send + Sync + fmt::Debug {
    /// Type name used in logs.
    fn message_name(&self) -> &'static str;

    /// Returns this message as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T> Message for T
where
    T: Any + Send + Sync + fmt::Debug,
{
    fn message_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Raw envelope of a single inbound line.
///
/// ```json
/// { "type": "handshake", "data": { "protocol_version": 5, "next_state": "login" } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Message kind, validated against the active protocol
    #[serde(rename = "type")]
    pub kind: String,

    /// Message payload
    #[serde(default)]
    pub data: serde_json::Value,
}

/// The protocol a client asks to continue with after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    Status,
    Login,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Status => write!(f, "STATUS"),
            HandshakeState::Login => write!(f, "LOGIN"),
        }
    }
}

/// First message of every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeMessage {
    /// Client protocol revision
    #[serde(default)]
    pub protocol_version: i32,

    /// Host name the client used to connect
    #[serde(default)]
    pub server_address: String,

    /// Port the client used to connect
    #[serde(default)]
    pub server_port: u16,

    /// Protocol the client wants next
    pub next_state: HandshakeState,
}

impl HandshakeMessage {
    /// Creates a handshake requesting `next_state` with empty connection details.
    pub fn new(next_state: HandshakeState) -> Self {
        Self {
            protocol_version: 0,
            server_address: String::new(),
            server_port: 0,
            next_state,
        }
    }
}

/// Opens the login sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginStartMessage {
    /// Player name
    pub name: String,
}

impl LoginStartMessage {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_message_keeps_concrete_type() {
        let boxed: Box<dyn Message> = Box::new(LoginStartMessage::new("Notch"));
        let message: &dyn Message = boxed.as_ref();

        assert!(message.as_any().is::<LoginStartMessage>());
        assert!(message.message_name().ends_with("LoginStartMessage"));
    }

    #[test]
    fn test_handshake_payload() {
        let json = serde_json::json!({
            "protocol_version": 5,
            "server_address": "localhost",
            "server_port": 25565,
            "next_state": "login"
        });

        let handshake: HandshakeMessage = serde_json::from_value(json).unwrap();
        assert_eq!(handshake.next_state, HandshakeState::Login);
        assert_eq!(handshake.server_port, 25565);
    }

    #[test]
    fn test_frame_without_data() {
        let frame: Frame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(frame.kind, "ping");
        assert!(frame.data.is_null());
    }
}
