//! Server-side state of one client connection.

use crate::protocol::{Protocol, ProtocolCell};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use tokio::sync::{watch, Notify};
use uuid::Uuid;

/// Unique identifier of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new random session ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One client connection.
///
/// The connection acceptor creates sessions and owns them through the
/// [`SessionRegistry`](super::SessionRegistry); the tick only borrows them.
/// All state here is safe to read from reader tasks while the tick mutates it.
///
/// # Reads
///
/// In auto-read mode the connection reader pulls frames as fast as they
/// arrive. Otherwise it parks before each frame until
/// [`request_read`](Session::request_read) releases it. The tick only
/// requests a read once the previous frame has been dispatched, and a request
/// made while the reader is not parked is discarded, so every frame is
/// decoded under the protocol left behind by the handler of the frame before.
pub struct Session {
    id: SessionId,
    remote_addr: SocketAddr,
    connected_at: SystemTime,
    protocol: ProtocolCell,
    open: AtomicBool,
    auto_read: AtomicBool,
    awaiting_dispatch: AtomicBool,
    read_requests: Notify,
    closed: watch::Sender<bool>,
}

impl Session {
    /// Creates an open session in the [`Protocol::Handshake`] protocol.
    pub fn new(remote_addr: SocketAddr, auto_read: bool) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: SessionId::new(),
            remote_addr,
            connected_at: SystemTime::now(),
            protocol: ProtocolCell::new(Protocol::Handshake),
            open: AtomicBool::new(true),
            auto_read: AtomicBool::new(auto_read),
            awaiting_dispatch: AtomicBool::new(false),
            read_requests: Notify::new(),
            closed,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn connected_at(&self) -> SystemTime {
        self.connected_at
    }

    /// The protocol frames from this session are currently decoded with.
    pub fn protocol(&self) -> Protocol {
        self.protocol.load()
    }

    /// Replaces the active protocol, returning the previous one.
    pub fn set_protocol(&self, protocol: Protocol) -> Protocol {
        self.protocol.replace(protocol)
    }

    /// Switches protocol only when `from` is the active one.
    ///
    /// On failure the actual active protocol is returned.
    pub fn switch_protocol(&self, from: Protocol, to: Protocol) -> Result<(), Protocol> {
        self.protocol.transition(from, to).map(|_| ())
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn is_auto_read(&self) -> bool {
        self.auto_read.load(Ordering::Acquire)
    }

    /// Toggles auto-read. Turning it on also releases a reader that is
    /// currently parked.
    pub fn set_auto_read(&self, auto_read: bool) {
        self.auto_read.store(auto_read, Ordering::Release);
        if auto_read {
            self.read_requests.notify_waiters();
        }
    }

    /// Whether the last frame read from this session is still queued.
    pub fn is_awaiting_dispatch(&self) -> bool {
        self.awaiting_dispatch.load(Ordering::Acquire)
    }

    /// Called by the reader right before it offers a frame.
    pub(crate) fn frame_offered(&self) {
        self.awaiting_dispatch.store(true, Ordering::Release);
    }

    /// Called once the frame has left the queue, whether it was handled or not.
    pub(crate) fn frame_dispatched(&self) {
        self.awaiting_dispatch.store(false, Ordering::Release);
    }

    /// Releases a parked reader for exactly one frame.
    ///
    /// Returns `false` without waking anything while a frame from this
    /// session is still awaiting dispatch. A request made while the reader is
    /// busy is not kept; the next tick asks again.
    pub fn request_read(&self) -> bool {
        if self.is_awaiting_dispatch() {
            return false;
        }
        self.read_requests.notify_waiters();
        true
    }

    /// Resolves on the first read request made after this call.
    pub async fn read_requested(&self) {
        self.read_requests.notified().await;
    }

    /// Marks the session closed and stops its reader. Idempotent.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.closed.send_replace(true);
        }
    }

    /// Resolves once [`close`](Session::close) has been called.
    pub async fn closed(&self) {
        let mut receiver = self.closed.subscribe();
        let _ = receiver.wait_for(|closed| *closed).await;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("connected_at", &self.connected_at)
            .field("protocol", &self.protocol())
            .field("open", &self.is_open())
            .field("auto_read", &self.is_auto_read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{timeout, Duration};

    fn session(auto_read: bool) -> Session {
        Session::new("127.0.0.1:40000".parse().unwrap(), auto_read)
    }

    #[test]
    fn test_new_session_starts_in_handshake() {
        let session = session(false);
        assert_eq!(session.protocol(), Protocol::Handshake);
        assert!(session.is_open());
        assert!(!session.is_auto_read());
    }

    #[test]
    fn test_switch_protocol_checks_current_state() {
        let session = session(false);

        assert_eq!(session.switch_protocol(Protocol::Handshake, Protocol::Login), Ok(()));
        assert_eq!(session.protocol(), Protocol::Login);
        assert_eq!(
            session.switch_protocol(Protocol::Handshake, Protocol::Login),
            Err(Protocol::Login)
        );
    }

    #[tokio::test]
    async fn test_read_request_is_not_kept_for_later() {
        let session = session(false);

        // Nobody is parked; the request is discarded
        assert!(session.request_read());
        assert!(timeout(Duration::from_millis(20), session.read_requested()).await.is_err());
    }

    #[tokio::test]
    async fn test_read_request_releases_parked_reader() {
        let session = Arc::new(session(false));

        let parked = {
            let session = session.clone();
            tokio::spawn(async move { session.read_requested().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(session.request_read());
        assert!(timeout(Duration::from_millis(200), parked).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_read_request_while_frame_awaits_dispatch() {
        let session = Arc::new(session(false));
        session.frame_offered();
        assert!(session.is_awaiting_dispatch());

        let parked = {
            let session = session.clone();
            tokio::spawn(async move { session.read_requested().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!session.request_read());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!parked.is_finished());

        session.frame_dispatched();
        assert!(session.request_read());
        assert!(timeout(Duration::from_millis(200), parked).await.is_ok());
    }

    #[test]
    fn test_connected_at_is_set_on_creation() {
        let before = SystemTime::now();
        let session = session(false);
        assert!(session.connected_at() >= before);
        assert!(format!("{:?}", session).contains("connected_at"));
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let session = Arc::new(session(true));

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.closed().await })
        };

        session.close();
        session.close();
        assert!(!session.is_open());
        assert!(timeout(Duration::from_millis(200), waiter).await.is_ok());

        // Late subscribers see the closed state immediately
        assert!(timeout(Duration::from_millis(50), session.closed()).await.is_ok());
    }
}
