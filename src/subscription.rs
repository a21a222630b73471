use crate::error::Result;
use crate::protocol::InboundMessage;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use uuid::Uuid;

/// Event handler stored in the hub
pub type Handler = Arc<dyn Fn(InboundMessage) -> BoxFuture<'static, Result<()>> + Send + Sync>;

type HandlerMap = HashMap<String, Vec<(Uuid, Handler)>>;

/// Registry of named event handlers
///
/// Each event name maps to handlers in registration order. The hub only
/// stores them; running and isolating them is up to the caller.
#[derive(Clone, Default)]
pub struct EventHub {
    handlers: Arc<Mutex<HandlerMap>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `name`
    pub fn subscribe<F, Fut>(&self, name: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        let id = Uuid::new_v4();
        let handler: Handler =
            Arc::new(move |message| -> BoxFuture<'static, Result<()>> { Box::pin(handler(message)) });

        self.handlers
            .lock()
            .unwrap()
            .entry(name.clone())
            .or_default()
            .push((id, handler));

        Subscription {
            hub: Arc::downgrade(&self.handlers),
            name,
            id,
        }
    }

    /// Snapshot of the handlers registered for `name`
    pub fn handlers(&self, name: &str) -> Vec<Handler> {
        self.handlers
            .lock()
            .unwrap()
            .get(name)
            .map(|entries| entries.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of handlers registered for `name`
    pub fn count(&self, name: &str) -> usize {
        self.handlers.lock().unwrap().get(name).map_or(0, Vec::len)
    }
}

/// Handle returned by [`EventHub::subscribe`]
///
/// Dropping it keeps the handler registered; call [`Subscription::unsubscribe`]
/// to remove it.
#[derive(Debug)]
pub struct Subscription {
    hub: Weak<Mutex<HandlerMap>>,
    name: String,
    id: Uuid,
}

impl Subscription {
    /// Event name this subscription listens to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove the handler; returns false if it was already gone
    pub fn unsubscribe(self) -> bool {
        let Some(handlers) = self.hub.upgrade() else {
            return false;
        };
        let mut handlers = handlers.lock().unwrap();
        let Some(entries) = handlers.get_mut(&self.name) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != self.id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            handlers.remove(&self.name);
        }
        removed
    }
}
