//! Type-keyed message dispatch.
//!
//! Handlers are registered once per concrete message type and looked up by
//! the [`TypeId`] of the message being dispatched. Dispatch is synchronous and
//! runs on the tick thread.

use super::Message;
use crate::connection::Session;
use crate::error::NetworkError;
use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Result type returned by message handlers.
pub type HandlerResult = Result<(), NetworkError>;

/// Outcome of a single [`MessageDispatcher::dispatch`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler ran and succeeded
    Handled,
    /// No handler is registered for the message type
    Ignored,
}

/// Type-erased message handler.
trait MessageHandler: Send + Sync {
    fn handle(&self, session: &Arc<Session>, message: &dyn Message) -> HandlerResult;

    fn handler_name(&self) -> &str;
}

/// Bridges a handler for a concrete message type to [`MessageHandler`].
struct TypedMessageHandler<T, F> {
    handler: F,
    name: String,
    _phantom: PhantomData<fn(&T)>,
}

impl<T, F> MessageHandler for TypedMessageHandler<T, F>
where
    T: Message,
    F: Fn(&Arc<Session>, &T) -> HandlerResult + Send + Sync,
{
    fn handle(&self, session: &Arc<Session>, message: &dyn Message) -> HandlerResult {
        match message.as_any().downcast_ref::<T>() {
            Some(message) => (self.handler)(session, message),
            None => Err(NetworkError::Handler(format!(
                "handler '{}' received {}",
                self.name,
                message.message_name()
            ))),
        }
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

/// Registry from message type to handler.
#[derive(Default)]
pub struct MessageDispatcher {
    handlers: HashMap<TypeId, Box<dyn MessageHandler>>,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for messages of type `T`.
    ///
    /// A type has at most one handler; registering again replaces the old
    /// one and returns `true`.
    pub fn register<T, F>(&mut self, name: &str, handler: F) -> bool
    where
        T: Message,
        F: Fn(&Arc<Session>, &T) -> HandlerResult + Send + Sync + 'static,
    {
        let typed = TypedMessageHandler {
            handler,
            name: name.to_string(),
            _phantom: PhantomData::<fn(&T)>,
        };

        match self.handlers.insert(TypeId::of::<T>(), Box::new(typed)) {
            Some(previous) => {
                warn!(
                    "Handler '{}' replaced '{}' for {}",
                    name,
                    previous.handler_name(),
                    std::any::type_name::<T>()
                );
                true
            }
            None => {
                debug!("Registered handler '{}' for {}", name, std::any::type_name::<T>());
                false
            }
        }
    }

    /// Runs the handler registered for the runtime type of `message`.
    ///
    /// Messages without a handler are ignored; that is not an error.
    pub fn dispatch(&self, session: &Arc<Session>, message: &dyn Message) -> Result<Dispatch, NetworkError> {
        let Some(handler) = self.handlers.get(&message.as_any().type_id()) else {
            trace!("No handler for {}, ignoring", message.message_name());
            return Ok(Dispatch::Ignored);
        };

        handler.handle(session, message)?;
        Ok(Dispatch::Handled)
    }

    pub fn is_registered<T: Message>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<T>())
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.values().map(|handler| handler.handler_name()))
            .finish()
    }
}
