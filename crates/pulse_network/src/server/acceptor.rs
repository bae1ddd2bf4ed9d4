//! TCP connection acceptor.
//!
//! Binds the listening socket, turns every accepted connection into a
//! [`Session`], and runs one reader task per session. The acceptor owns the
//! sessions through the shared [`SessionRegistry`]; the tick only reads it.

use crate::channel::ChannelQueueMap;
use crate::config::NetworkConfig;
use crate::connection::reader::read_frames;
use crate::connection::{Session, SessionRegistry};
use crate::error::NetworkError;
use crate::events::{NetworkEvent, NetworkEvents};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// A bound listener and its accept loop.
pub struct NetworkServer {
    local_addr: SocketAddr,
    sessions: Arc<SessionRegistry>,
    shutdown_sender: broadcast::Sender<()>,
    accept_task: JoinHandle<()>,
}

impl NetworkServer {
    /// Binds `config.bind_address` and starts accepting connections.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(
        config: &NetworkConfig,
        sessions: Arc<SessionRegistry>,
        queues: Arc<ChannelQueueMap>,
        events: NetworkEvents,
    ) -> Result<Self, NetworkError> {
        let listener = bind_listener(config)?;
        let local_addr = listener.local_addr()?;
        let (shutdown_sender, _) = broadcast::channel(1);

        let accept_loop = AcceptLoop {
            listener,
            sessions: sessions.clone(),
            queues,
            events,
            shutdown: shutdown_sender.subscribe(),
            max_connections: config.max_connections,
            auto_read: config.auto_read,
            max_frame_length: config.max_frame_length,
        };
        let accept_task = tokio::spawn(accept_loop.run());

        Ok(Self {
            local_addr,
            sessions,
            shutdown_sender,
            accept_task,
        })
    }

    /// The address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting, closes every session, and releases the listener.
    pub async fn shutdown(self) {
        let _ = self.shutdown_sender.send(());
        if let Err(e) = self.accept_task.await {
            error!("Accept loop ended abnormally: {}", e);
        }

        let closed = self.sessions.close_all();
        debug!("Closed {} session(s) on shutdown", closed);
    }
}

fn bind_listener(config: &NetworkConfig) -> Result<TcpListener, NetworkError> {
    let address = config.bind_address;
    let bind_error = |source: std::io::Error| NetworkError::Bind { address, source };

    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_error)?;
    if let Err(e) = socket.set_reuse_address(true) {
        warn!("Failed to set SO_REUSEADDR: {}", e);
    }
    socket.bind(&address.into()).map_err(bind_error)?;
    socket.listen(config.listen_backlog).map_err(bind_error)?;
    socket.set_nonblocking(true).map_err(bind_error)?;

    let std_listener: StdTcpListener = socket.into();
    TcpListener::from_std(std_listener).map_err(bind_error)
}

struct AcceptLoop {
    listener: TcpListener,
    sessions: Arc<SessionRegistry>,
    queues: Arc<ChannelQueueMap>,
    events: NetworkEvents,
    shutdown: broadcast::Receiver<()>,
    max_connections: usize,
    auto_read: bool,
    max_frame_length: usize,
}

impl AcceptLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.accept(stream, addr),
                    Err(e) => {
                        // Usually transient (e.g. out of file descriptors)
                        warn!("Failed to accept connection: {}", e);
                    }
                },
                _ = self.shutdown.recv() => {
                    debug!("Accept loop received shutdown signal");
                    break;
                }
            }
        }
    }

    fn accept(&self, stream: TcpStream, addr: SocketAddr) {
        if self.sessions.len() >= self.max_connections {
            warn!(
                "Rejecting connection from {}: limit of {} sessions reached",
                addr, self.max_connections
            );
            return;
        }

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let session = Arc::new(Session::new(addr, self.auto_read));
        self.sessions.insert(session.clone());
        self.events.publish(NetworkEvent::SessionOpened {
            session: session.id(),
            remote_addr: addr,
        });

        let sessions = self.sessions.clone();
        let queues = self.queues.clone();
        let events = self.events.clone();
        let max_frame_length = self.max_frame_length;

        tokio::spawn(async move {
            if let Err(e) = read_frames(stream, session.clone(), queues, max_frame_length).await {
                warn!("Connection error on session {}: {}", session.id(), e);
            }

            session.close();
            sessions.remove(session.id());
            events.publish(NetworkEvent::SessionClosed { session: session.id() });
        });
    }
}
