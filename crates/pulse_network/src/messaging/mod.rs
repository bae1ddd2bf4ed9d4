//! Inbound message types and their dispatch.

pub mod dispatcher;
pub mod types;

pub use dispatcher::{Dispatch, HandlerResult, MessageDispatcher};
pub use types::{Frame, HandshakeMessage, HandshakeState, LoginStartMessage, Message};
