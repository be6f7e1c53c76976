//! Event/Trace Bus port (C7, §4.7).
//!
//! In-process typed pub/sub: per-session ordering, handler isolation (a
//! throwing handler never affects the pipeline or other handlers), and
//! at-least-one delivery per handler per event. The concrete in-process
//! implementation lives in `infrastructure` (per the distilled spec's own
//! §9 design note: "message-passing channel per session" over shared-lock
//! callback registries).

use async_trait::async_trait;
use quorum_domain::council::TraceEvent;

/// A subscriber callback. Implementations MUST NOT panic; the bus only
/// guards against it defensively (§4.7 handler isolation), it does not
/// catch unwinds across arbitrary trait objects.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &TraceEvent);
}

impl<F: Fn(&TraceEvent) + Send + Sync> EventHandler for F {
    fn handle(&self, event: &TraceEvent) {
        self(event)
    }
}

/// Publish side used by the Council Pipeline (C6) to emit events, and
/// subscribe side used by callers of `RunCouncil` (§6.1).
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Emit one event for a session; delivered synchronously, in emission
    /// order, to every handler subscribed for its type (or to all types).
    async fn publish(&self, event: TraceEvent);

    /// Register a handler for one event type. Returns a subscription id
    /// usable with `unsubscribe`.
    fn subscribe(&self, event_type: Option<quorum_domain::council::EventType>, handler: std::sync::Arc<dyn EventHandler>) -> u64;

    fn unsubscribe(&self, subscription_id: u64);
}

/// Append-only trace store keyed by session id (§4.7, §4.8 `GetTraces`).
#[async_trait]
pub trait TraceStore: Send + Sync {
    async fn append(&self, event: TraceEvent);

    async fn get_traces(&self, session_id: &str) -> Vec<TraceEvent>;
}
