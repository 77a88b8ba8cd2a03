// ABOUTME: Filters, deduplicates and fans out Socket Mode envelopes to registered handlers
// ABOUTME: Produces exactly one acknowledgement per identified envelope, accepted or not

use std::sync::{Arc, Mutex};

use crate::dedup::{OrderedFixedSizeSet, DEFAULT_CAPACITY};
use crate::event::{Acknowledgement, SocketModeEnvelope};
use crate::handler::{EventHandler, HandlerId, HandlerRegistry};

/// Why an envelope was not handed to handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Envelope carried no Events API payload
    NoPayload,
    /// Payload was a control callback rather than an event
    NotEventCallback,
    /// Event was produced by this app
    SelfEcho,
    /// Event predates this dispatcher
    Stale,
    /// Event key was already dispatched
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every registered handler ran
    Dispatched { handlers: usize },
    /// Handler at `index` failed; later handlers were skipped for this event
    HandlerFailed { index: usize },
    Skipped(SkipReason),
}

impl DispatchOutcome {
    /// Whether the event passed the acceptance filter
    pub fn accepted(&self) -> bool {
        !matches!(self, Self::Skipped(_))
    }
}

/// Result of processing one envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Acknowledgement to send back, present whenever the envelope had an id
    pub ack: Option<Acknowledgement>,
    pub outcome: DispatchOutcome,
}

/// Turns the raw envelope feed into filtered, at-most-once handler calls.
///
/// An event is dispatched only when its payload is an `event_callback`, it
/// didn't come from `own_app_id`, its `event_time` is strictly after
/// `start_time`, and its `{event_id}_{event_time}` key hasn't been seen.
pub struct EventDispatcher {
    own_app_id: Option<String>,
    start_time: i64,
    seen: Mutex<OrderedFixedSizeSet>,
    handlers: HandlerRegistry,
}

impl EventDispatcher {
    /// Create a dispatcher with an explicit start time (Unix seconds)
    pub fn new(own_app_id: Option<String>, start_time: i64, dedup_capacity: usize) -> Self {
        Self {
            own_app_id: own_app_id.filter(|id| !id.is_empty()),
            start_time,
            seen: Mutex::new(OrderedFixedSizeSet::new(dedup_capacity)),
            handlers: HandlerRegistry::new(),
        }
    }

    /// Create a dispatcher whose start time is the current wall clock
    pub fn starting_now(own_app_id: Option<String>) -> Self {
        Self::new(own_app_id, chrono::Utc::now().timestamp(), DEFAULT_CAPACITY)
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn own_app_id(&self) -> Option<&str> {
        self.own_app_id.as_deref()
    }

    pub fn register(&self, handler: Arc<dyn EventHandler>) -> HandlerId {
        self.handlers.register(handler)
    }

    pub fn unregister(&self, id: HandlerId) -> bool {
        self.handlers.unregister(id)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Number of event keys currently remembered
    pub fn seen_count(&self) -> usize {
        self.lock_seen().len()
    }

    /// Filter, deduplicate and dispatch one envelope.
    ///
    /// Never fails: handler errors are logged and reported in the outcome,
    /// and the acknowledgement is returned either way.
    pub async fn process(&self, envelope: &SocketModeEnvelope) -> DispatchReport {
        let ack = envelope.acknowledgement();
        let outcome = self.filter_and_dispatch(envelope).await;

        if let DispatchOutcome::Skipped(reason) = outcome {
            tracing::debug!(
                envelope_id = envelope.envelope_id.as_deref().unwrap_or("-"),
                envelope_type = %envelope.envelope_type,
                ?reason,
                "Skipping envelope"
            );
        }

        DispatchReport { ack, outcome }
    }

    async fn filter_and_dispatch(&self, envelope: &SocketModeEnvelope) -> DispatchOutcome {
        let Some(callback) = envelope.payload.as_ref() else {
            return DispatchOutcome::Skipped(SkipReason::NoPayload);
        };

        if !callback.is_event_callback() {
            return DispatchOutcome::Skipped(SkipReason::NotEventCallback);
        }

        if self.is_self_echo(callback.event.app_id()) {
            return DispatchOutcome::Skipped(SkipReason::SelfEcho);
        }

        if callback.event_time <= self.start_time {
            return DispatchOutcome::Skipped(SkipReason::Stale);
        }

        // Check and mark under one lock so concurrent deliveries of the same
        // key can't both pass
        let key = callback.dedup_key();
        let is_new = self.lock_seen().insert_if_absent(key.as_str());
        if !is_new {
            return DispatchOutcome::Skipped(SkipReason::Duplicate);
        }

        match self.handlers.dispatch(&callback.event).await {
            Ok(handlers) => DispatchOutcome::Dispatched { handlers },
            Err(failure) => {
                tracing::error!(
                    event_key = %key,
                    handler_index = failure.index,
                    error = ?failure.error,
                    "Event handler failed"
                );
                DispatchOutcome::HandlerFailed {
                    index: failure.index,
                }
            }
        }
    }

    /// An unset own app id never matches
    fn is_self_echo(&self, event_app_id: Option<&str>) -> bool {
        match (self.own_app_id.as_deref(), event_app_id) {
            (Some(own), Some(origin)) => own == origin,
            _ => false,
        }
    }

    fn lock_seen(&self) -> std::sync::MutexGuard<'_, OrderedFixedSizeSet> {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
