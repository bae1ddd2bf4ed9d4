//! The tick engine.
//!
//! [`Network`] is owned by a single task. Each [`tick`](Network::tick) runs
//! two phases in order:
//!
//! 1. drain the network channel and dispatch every message to its handler,
//! 2. ask every open session that is not in auto-read mode, and has nothing
//!    left in the queue, for one more frame.
//!
//! Handlers therefore always run on the tick thread, which is what makes the
//! lock-free protocol swap safe.

use crate::channel::{Channel, ChannelMessage, ChannelQueueMap};
use crate::config::NetworkConfig;
use crate::connection::SessionRegistry;
use crate::error::NetworkError;
use crate::events::{NetworkEvent, NetworkEvents};
use crate::messaging::{Dispatch, MessageDispatcher};
use crate::server::acceptor::NetworkServer;
use crate::server::handlers::register_protocol_handlers;
use std::any::Any;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick index passed to [`Network::tick`]
    pub tick: u64,
    /// Messages a handler processed successfully
    pub handled: usize,
    /// Messages without a registered handler
    pub ignored: usize,
    /// Messages whose handler returned an error or panicked
    pub failed: usize,
    /// Sessions that were asked for another frame
    pub reads_requested: usize,
}

impl TickReport {
    /// Total number of messages taken off the queue.
    pub fn drained(&self) -> usize {
        self.handled + self.ignored + self.failed
    }
}

/// The network subsystem: queues, dispatcher, sessions, and the acceptor.
pub struct Network {
    config: NetworkConfig,
    queues: Arc<ChannelQueueMap>,
    dispatcher: MessageDispatcher,
    sessions: Arc<SessionRegistry>,
    events: NetworkEvents,
    server: Option<NetworkServer>,
}

impl Network {
    /// Creates a stopped network with the handshake and login handlers
    /// registered.
    pub fn new(config: NetworkConfig, events: NetworkEvents) -> Self {
        let mut dispatcher = MessageDispatcher::new();
        register_protocol_handlers(&mut dispatcher, &events);

        Self {
            queues: Arc::new(ChannelQueueMap::new(config.queue_capacity)),
            config,
            dispatcher,
            sessions: Arc::new(SessionRegistry::new()),
            events,
            server: None,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Producer handle for the channel queues.
    pub fn queues(&self) -> Arc<ChannelQueueMap> {
        self.queues.clone()
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    pub fn events(&self) -> &NetworkEvents {
        &self.events
    }

    /// Registers additional handlers before the network starts ticking.
    pub fn dispatcher_mut(&mut self) -> &mut MessageDispatcher {
        &mut self.dispatcher
    }

    /// Address of the listening socket while started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(NetworkServer::local_addr)
    }

    pub fn is_started(&self) -> bool {
        self.server.is_some()
    }

    /// Queues a message for the next tick. Safe to call from any thread.
    pub fn offer(&self, channel: Channel, message: ChannelMessage) -> Result<(), NetworkError> {
        self.queues.offer(channel, message)
    }

    /// Validates the configuration, binds the listener, and starts accepting.
    pub fn start(&mut self) -> Result<SocketAddr, NetworkError> {
        if self.server.is_some() {
            return Err(NetworkError::AlreadyStarted);
        }

        info!("Starting network");
        self.config.validate()?;

        let server = NetworkServer::bind(
            &self.config,
            self.sessions.clone(),
            self.queues.clone(),
            self.events.clone(),
        )?;
        let address = server.local_addr();
        self.server = Some(server);

        self.events.publish(NetworkEvent::Started { address });
        Ok(address)
    }

    /// Runs one tick. Never fails: handler errors and panics are logged,
    /// reported, and the tick moves on to the next message.
    pub fn tick(&self, tick: u64) -> TickReport {
        let mut report = TickReport {
            tick,
            ..Default::default()
        };

        for message in self.queues.drain(Channel::Network) {
            self.dispatch(&message, &mut report);
        }

        for session in self.sessions.snapshot() {
            if !session.is_open() {
                continue;
            }
            if !session.is_auto_read() && session.request_read() {
                report.reads_requested += 1;
            }
        }

        if report.drained() > 0 {
            debug!(
                "Tick {}: {} handled, {} ignored, {} failed",
                tick, report.handled, report.ignored, report.failed
            );
        } else {
            trace!("Tick {}: idle", tick);
        }

        report
    }

    fn dispatch(&self, message: &ChannelMessage, report: &mut TickReport) {
        let session = message.session();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.dispatcher.dispatch(session, message.message())
        }));
        session.frame_dispatched();

        let error = match outcome {
            Ok(Ok(Dispatch::Handled)) => {
                report.handled += 1;
                return;
            }
            Ok(Ok(Dispatch::Ignored)) => {
                report.ignored += 1;
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("handler panicked: {}", panic_message(panic.as_ref())),
        };

        report.failed += 1;
        self.events.publish(NetworkEvent::HandlerFailed {
            session: session.id(),
            message: message.message().message_name().to_string(),
            error,
        });
    }

    /// Stops accepting, closes every session, and releases the listener.
    /// Does nothing when the network is not started.
    pub async fn stop(&mut self) {
        let Some(server) = self.server.take() else {
            return;
        };

        info!("Stopping network");
        server.shutdown().await;
        self.events.publish(NetworkEvent::Stopped);
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("config", &self.config)
            .field("queues", &self.queues)
            .field("dispatcher", &self.dispatcher)
            .field("sessions", &self.sessions.len())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Session;
    use crate::messaging::{HandshakeMessage, HandshakeState, LoginStartMessage, Message};
    use crate::protocol::Protocol;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast;

    #[derive(Debug)]
    struct Explode;

    #[derive(Debug)]
    struct Unknown;

    fn network() -> Network {
        Network::new(NetworkConfig::default(), NetworkEvents::default())
    }

    fn session() -> Arc<Session> {
        Arc::new(Session::new("127.0.0.1:40000".parse().unwrap(), false))
    }

    fn offer<M: Message>(network: &Network, session: &Arc<Session>, message: M) {
        network
            .offer(
                Channel::Network,
                ChannelMessage::new(Channel::Network, session.clone(), Box::new(message)),
            )
            .unwrap();
    }

    fn drain_events(receiver: &mut broadcast::Receiver<NetworkEvent>) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_handshake_then_login_in_one_tick() {
        let network = network();
        let mut receiver = network.events().subscribe();
        let session = session();

        offer(&network, &session, HandshakeMessage::new(HandshakeState::Login));
        offer(&network, &session, LoginStartMessage::new("Notch"));

        let report = network.tick(1);

        assert_eq!(report.handled, 2);
        assert_eq!(session.protocol(), Protocol::Login);
        assert_eq!(
            drain_events(&mut receiver),
            vec![
                NetworkEvent::ProtocolSwitched {
                    session: session.id(),
                    from: Protocol::Handshake,
                    to: Protocol::Login,
                },
                NetworkEvent::LoginStarted {
                    session: session.id(),
                    name: "Notch".to_string(),
                },
            ]
        );
        assert!(network.queues().is_empty(Channel::Network));
    }

    #[test]
    fn test_status_handshake_keeps_protocol() {
        let network = network();
        let session = session();

        offer(&network, &session, HandshakeMessage::new(HandshakeState::Status));
        let report = network.tick(1);

        assert_eq!(report.handled, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(session.protocol(), Protocol::Handshake);
    }

    #[test]
    fn test_unhandled_messages_are_ignored() {
        let network = network();
        let session = session();

        offer(&network, &session, Unknown);
        let report = network.tick(1);

        assert_eq!(report.ignored, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(session.protocol(), Protocol::Handshake);
        assert!(network.queues().is_empty(Channel::Network));
    }

    #[test]
    fn test_empty_tick() {
        let network = network();
        let report = network.tick(7);

        assert_eq!(report.tick, 7);
        assert_eq!(report.drained(), 0);
        assert_eq!(report.reads_requested, 0);
    }

    #[test]
    fn test_failing_handlers_do_not_stop_the_tick() {
        let mut network = network();
        let mut receiver = network.events().subscribe();
        let after = Arc::new(AtomicUsize::new(0));

        network.dispatcher_mut().register("explode", |_, _: &Explode| {
            panic!("exploded")
        });
        network.dispatcher_mut().register("unknown", |_, _: &Unknown| {
            Err(NetworkError::Handler("refused".to_string()))
        });
        {
            let after = after.clone();
            network.dispatcher_mut().register("login_start", move |_, _: &LoginStartMessage| {
                after.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let session = session();
        offer(&network, &session, Explode);
        offer(&network, &session, Unknown);
        offer(&network, &session, LoginStartMessage::new("after"));

        let report = network.tick(1);

        assert_eq!(report.failed, 2);
        assert_eq!(report.handled, 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);

        let failures: Vec<String> = drain_events(&mut receiver)
            .into_iter()
            .filter_map(|event| match event {
                NetworkEvent::HandlerFailed { error, .. } => Some(error),
                _ => None,
            })
            .collect();
        assert_eq!(failures.len(), 2);
        assert!(failures[0].contains("exploded"));
        assert!(failures[1].contains("refused"));

        // Failed messages are gone, the next tick is clean
        assert_eq!(network.tick(2).drained(), 0);
    }

    #[tokio::test]
    async fn test_reads_requested_for_manual_read_sessions_only() {
        let network = network();
        let sessions = network.sessions();

        let manual = session();
        let automatic = Arc::new(Session::new("127.0.0.1:40001".parse().unwrap(), true));
        let closed = session();
        closed.close();
        let pending = session();
        pending.frame_offered();

        sessions.insert(manual.clone());
        sessions.insert(automatic.clone());
        sessions.insert(closed.clone());
        sessions.insert(pending.clone());

        let parked = {
            let manual = manual.clone();
            tokio::spawn(async move { manual.read_requested().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let report = network.tick(1);
        assert_eq!(report.reads_requested, 1);
        assert!(tokio::time::timeout(std::time::Duration::from_millis(200), parked)
            .await
            .is_ok());
    }

    #[test]
    fn test_dispatch_releases_pending_session() {
        let network = network();
        let session = session();
        network.sessions().insert(session.clone());

        session.frame_offered();
        offer(&network, &session, HandshakeMessage::new(HandshakeState::Login));

        let report = network.tick(1);

        // Handled first, then asked for the next frame in the same tick
        assert_eq!(report.handled, 1);
        assert!(!session.is_awaiting_dispatch());
        assert_eq!(report.reads_requested, 1);
        assert_eq!(session.protocol(), Protocol::Login);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let config = NetworkConfig {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let mut network = Network::new(config, NetworkEvents::default());
        let mut receiver = network.events().subscribe();

        let address = network.start().unwrap();
        assert_ne!(address.port(), 0);
        assert_eq!(network.local_addr(), Some(address));
        assert!(matches!(network.start(), Err(NetworkError::AlreadyStarted)));

        network.stop().await;
        network.stop().await;
        assert!(!network.is_started());

        assert_eq!(
            drain_events(&mut receiver),
            vec![NetworkEvent::Started { address }, NetworkEvent::Stopped]
        );
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let config = NetworkConfig {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            ticks_per_second: 0,
            ..Default::default()
        };
        let mut network = Network::new(config, NetworkEvents::default());

        assert!(matches!(network.start(), Err(NetworkError::Config(_))));
        assert!(!network.is_started());
    }
}
