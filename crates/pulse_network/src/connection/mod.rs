//! Connection management for client sessions.
//!
//! This module holds the per-connection [`Session`] state, the registry the
//! acceptor keeps live sessions in, and the read loop that turns inbound
//! lines into channel messages.

pub(crate) mod reader;
pub mod registry;
pub mod session;

pub use registry::SessionRegistry;
pub use session::{Session, SessionId};
