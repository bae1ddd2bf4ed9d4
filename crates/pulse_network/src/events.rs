//! Status events published by the network core.
//!
//! Every event is written to the log and broadcast to subscribers, so tests
//! and embedding code can observe startup, shutdown, and protocol switches
//! without scraping log output.

use crate::connection::SessionId;
use crate::protocol::Protocol;
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Something that happened in the network core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The listening endpoint is bound
    Started { address: SocketAddr },
    /// The network stopped and released all sessions
    Stopped,
    /// A connection was accepted
    SessionOpened { session: SessionId, remote_addr: SocketAddr },
    /// A connection ended
    SessionClosed { session: SessionId },
    /// A session's active protocol was replaced
    ProtocolSwitched { session: SessionId, from: Protocol, to: Protocol },
    /// A handshake asked for the status protocol, which is not served
    StatusRequested { session: SessionId },
    /// A login-start message was handled
    LoginStarted { session: SessionId, name: String },
    /// A handler failed or panicked; the message was discarded
    HandlerFailed { session: SessionId, message: String, error: String },
}

/// Log-and-broadcast sink for [`NetworkEvent`]s.
#[derive(Debug, Clone)]
pub struct NetworkEvents {
    sender: broadcast::Sender<NetworkEvent>,
}

impl NetworkEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.sender.subscribe()
    }

    /// Logs `event` and hands it to current subscribers. Never blocks.
    pub fn publish(&self, event: NetworkEvent) {
        match &event {
            NetworkEvent::Started { address } => info!("Listening on {}", address),
            NetworkEvent::Stopped => info!("Network stopped"),
            NetworkEvent::SessionOpened { session, remote_addr } => {
                debug!("Session {} opened from {}", session, remote_addr)
            }
            NetworkEvent::SessionClosed { session } => debug!("Session {} closed", session),
            NetworkEvent::ProtocolSwitched { session, to, .. } => {
                info!("Protocol is now {} state for session {}", to, session)
            }
            NetworkEvent::StatusRequested { session } => {
                info!("Session {} requested STATUS, which is not served yet", session)
            }
            NetworkEvent::LoginStarted { session, name } => {
                info!("Handling LoginStart for '{}' on session {}", name, session)
            }
            NetworkEvent::HandlerFailed { session, message, error } => {
                error!("Handler for {} failed on session {}: {}", message, session, error)
            }
        }

        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}

impl Default for NetworkEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let events = NetworkEvents::default();
        events.publish(NetworkEvent::Stopped);
    }

    #[test]
    fn test_subscribers_receive_in_order() {
        let events = NetworkEvents::default();
        let mut receiver = events.subscribe();
        let session = SessionId::new();

        events.publish(NetworkEvent::StatusRequested { session });
        events.publish(NetworkEvent::Stopped);

        assert_eq!(receiver.try_recv().unwrap(), NetworkEvent::StatusRequested { session });
        assert_eq!(receiver.try_recv().unwrap(), NetworkEvent::Stopped);
        assert!(receiver.try_recv().is_err());
    }
}
