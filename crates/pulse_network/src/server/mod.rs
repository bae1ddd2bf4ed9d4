//! The network server: connection acceptor, built-in handlers, and the tick
//! engine that ties them together.

pub mod acceptor;
pub mod handlers;
pub mod network;
mod ticker;

pub use acceptor::NetworkServer;
pub use handlers::register_protocol_handlers;
pub use network::{Network, TickReport};
