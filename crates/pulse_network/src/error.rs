//! Error types for the network core.
//!
//! Startup failures (bad configuration, bind errors) are fatal and surface to
//! the owning process. Everything that can go wrong while ticking is contained
//! by the tick engine and only reported through logs and [`NetworkEvents`].
//!
//! [`NetworkEvents`]: crate::events::NetworkEvents

use crate::channel::Channel;
use crate::protocol::Protocol;
use std::net::SocketAddr;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Errors produced by the network core.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listening endpoint could not be created
    #[error("Bind failed on {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Socket level failure on an accepted connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A bounded channel queue rejected a message
    #[error("Channel {0} is full")]
    ChannelFull(Channel),

    /// A frame could not be decoded into a message
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The connection produced an invalid line
    #[error("Frame error: {0}")]
    Frame(#[from] LinesCodecError),

    /// A frame kind that the session's active protocol does not accept
    #[error("Message '{kind}' is not valid in the {protocol} protocol")]
    UnexpectedMessage { protocol: Protocol, kind: String },

    /// A message handler failed
    #[error("Handler execution error: {0}")]
    Handler(String),

    /// `start` was called on a network that is already listening
    #[error("Network is already started")]
    AlreadyStarted,
}
