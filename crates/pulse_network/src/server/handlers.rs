//! Built-in handlers for the handshake and login protocols.
//!
//! These run on the tick thread and are the only code that switches a
//! session's protocol.

use crate::connection::Session;
use crate::events::{NetworkEvent, NetworkEvents};
use crate::messaging::{HandlerResult, HandshakeMessage, HandshakeState, LoginStartMessage, MessageDispatcher};
use crate::protocol::Protocol;
use std::sync::Arc;
use tracing::{info, warn};

/// Registers the handshake and login-start handlers on `dispatcher`.
pub fn register_protocol_handlers(dispatcher: &mut MessageDispatcher, events: &NetworkEvents) {
    let handshake_events = events.clone();
    dispatcher.register("handshake", move |session, message: &HandshakeMessage| {
        handle_handshake(&handshake_events, session, message)
    });

    let login_events = events.clone();
    dispatcher.register("login_start", move |session, message: &LoginStartMessage| {
        handle_login_start(&login_events, session, message)
    });
}

/// Moves the session to the protocol the handshake asks for.
pub fn handle_handshake(
    events: &NetworkEvents,
    session: &Arc<Session>,
    message: &HandshakeMessage,
) -> HandlerResult {
    let current = session.protocol();
    if current != Protocol::Handshake {
        warn!(
            "Ignoring handshake from session {} in {} state",
            session.id(),
            current
        );
        return Ok(());
    }

    match message.next_state {
        HandshakeState::Status => {
            // The status protocol is not served; the session stays in HANDSHAKE
            events.publish(NetworkEvent::StatusRequested { session: session.id() });
        }
        HandshakeState::Login => {
            info!("Handshake is LOGIN state, switching protocol");
            match session.switch_protocol(Protocol::Handshake, Protocol::Login) {
                Ok(()) => events.publish(NetworkEvent::ProtocolSwitched {
                    session: session.id(),
                    from: Protocol::Handshake,
                    to: Protocol::Login,
                }),
                Err(actual) => warn!(
                    "Session {} left HANDSHAKE before the switch (now {})",
                    session.id(),
                    actual
                ),
            }
        }
    }

    Ok(())
}

/// Acknowledges the start of a login.
pub fn handle_login_start(
    events: &NetworkEvents,
    session: &Arc<Session>,
    message: &LoginStartMessage,
) -> HandlerResult {
    let current = session.protocol();
    if current != Protocol::Login {
        warn!(
            "Ignoring login start from session {} in {} state",
            session.id(),
            current
        );
        return Ok(());
    }

    events.publish(NetworkEvent::LoginStarted {
        session: session.id(),
        name: message.name.clone(),
    });
    Ok(())
}
