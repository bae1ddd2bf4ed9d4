//! # Pulse Network - Tick-Synchronized Message Dispatch
//!
//! The network core of the Pulse game server. It accepts client connections,
//! decodes their frames according to each session's active protocol, and
//! hands the resulting messages to handlers on a fixed-rate tick.
//!
//! ## Threading Model
//!
//! Two kinds of tasks touch the same state:
//!
//! * **Connection readers** - one per session, decode frames and offer them to
//!   a channel queue
//! * **The tick** - a single task that drains the queues, runs handlers, and
//!   requests the next read for sessions that are not in auto-read mode
//!
//! Handlers only ever run on the tick. Queues are lock-free and the active
//! protocol of a session is a single atomic, so readers never block the tick.
//!
//! ## Message Flow
//!
//! 1. A client sends a newline-terminated `{"type", "data"}` JSON frame
//! 2. The reader decodes it with the session's active [`Protocol`]
//! 3. The message is queued on [`Channel::Network`]
//! 4. The next tick drains the queue in arrival order and dispatches each
//!    message by its concrete type
//! 5. The tick asks every manual-read session whose last frame has been
//!    dispatched for one more frame
//!
//! A manual-read reader parks before every frame and a read request only
//! wakes a parked reader; nothing is kept for later. Together with the
//! dispatched check this means a frame is never decoded before the handler
//! of the previous frame from the same session has run, so a handshake that
//! switches the session to [`Protocol::Login`] is in effect for the next frame.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pulse_network::{Network, NetworkConfig, NetworkEvents};
//!
//! # async fn example() -> Result<(), pulse_network::NetworkError> {
//! let network = Network::new(NetworkConfig::default(), NetworkEvents::default());
//! network.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Startup failures are returned as [`NetworkError`]. Failures while ticking
//! never stop the tick: they are logged and published as [`NetworkEvent`]s.

pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod messaging;
pub mod protocol;
pub mod server;

pub use channel::{Channel, ChannelMessage, ChannelQueueMap};
pub use config::{NetworkConfig, DEFAULT_TICKS_PER_SECOND};
pub use connection::{Session, SessionId, SessionRegistry};
pub use error::NetworkError;
pub use events::{NetworkEvent, NetworkEvents};
pub use messaging::{
    Dispatch, Frame, HandlerResult, HandshakeMessage, HandshakeState, LoginStartMessage, Message,
    MessageDispatcher,
};
pub use protocol::{Protocol, ProtocolCell};
pub use server::{Network, NetworkServer, TickReport};
