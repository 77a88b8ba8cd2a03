// ABOUTME: Ordered registry of event handlers invoked for every accepted event
// ABOUTME: First failing handler stops the cycle for that event; the registry stays usable

use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::event::MessageEvent;

/// Consumer of accepted inbound events.
///
/// Handlers communicate results through side effects only (printing,
/// sending replies, flipping a [`ReplySignal`](crate::reply::ReplySignal)).
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &MessageEvent) -> Result<()>;
}

/// Adapter turning a synchronous closure into an [`EventHandler`]
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&MessageEvent) -> Result<()> + Send + Sync,
{
    async fn handle(&self, event: &MessageEvent) -> Result<()> {
        (self.0)(event)
    }
}

/// Wrap a closure as a shareable handler
pub fn handler_fn<F>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(&MessageEvent) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Opaque registration handle returned by [`HandlerRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Details of a handler that returned an error during dispatch
#[derive(Debug)]
pub struct HandlerFailure {
    /// Position of the failing handler in registration order, which is also
    /// the number of handlers that completed before it
    pub index: usize,
    pub error: anyhow::Error,
}

#[derive(Default)]
struct Entries {
    next_id: u64,
    handlers: Vec<(HandlerId, Arc<dyn EventHandler>)>,
}

/// Handlers in registration order
#[derive(Default)]
pub struct HandlerRegistry {
    entries: RwLock<Entries>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn EventHandler>) -> HandlerId {
        let mut entries = self.write();
        let id = HandlerId(entries.next_id);
        entries.next_id += 1;
        entries.handlers.push((id, handler));
        id
    }

    /// Remove a handler. Returns `false` if the id was not registered.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut entries = self.write();
        let before = entries.handlers.len();
        entries.handlers.retain(|(existing, _)| *existing != id);
        entries.handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.read().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every handler in order with the same event.
    ///
    /// Returns the number of handlers that ran, or the first failure. The
    /// handler list is snapshotted before the first call so handlers may
    /// register or unregister others without deadlocking.
    pub async fn dispatch(&self, event: &MessageEvent) -> Result<usize, HandlerFailure> {
        let snapshot: Vec<Arc<dyn EventHandler>> = self
            .read()
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for (index, handler) in snapshot.iter().enumerate() {
            if let Err(error) = handler.handle(event).await {
                return Err(HandlerFailure { index, error });
            }
        }
        Ok(snapshot.len())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Entries> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
