//! In-process event bus (C7, §4.7, §9): a `Mutex`-guarded handler registry
//! delivering each published event synchronously, in emission order, to
//! every matching subscriber. A subscriber's `handle` is called under the
//! lock but outside any `.await`, so a slow or panicking handler never
//! blocks or poisons publication to the others in the same call.

use async_trait::async_trait;
use quorum_application::ports::event_bus::{EventBus, EventHandler, TraceStore};
use quorum_domain::council::{EventType, TraceEvent};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

struct Subscription {
    id: u64,
    event_type: Option<EventType>,
    handler: Arc<dyn EventHandler>,
}

/// Publish/subscribe plus append-only trace storage, combined because the
/// pipeline (C6) always wants both: `publish` both notifies live
/// subscribers and records the event for later `GetTraces` reads.
pub struct InProcessEventBus {
    subscriptions: Mutex<Vec<Subscription>>,
    next_subscription_id: AtomicU64,
    traces: Mutex<HashMap<String, Vec<TraceEvent>>>,
}

impl InProcessEventBus {
    pub fn new() -> Self {
        Self { subscriptions: Mutex::new(Vec::new()), next_subscription_id: AtomicU64::new(1), traces: Mutex::new(HashMap::new()) }
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InProcessEventBus {
    async fn publish(&self, event: TraceEvent) {
        let subs = self.subscriptions.lock().expect("subscriptions lock poisoned");
        for sub in subs.iter() {
            if sub.event_type.is_some_and(|t| t != event.event_type) {
                continue;
            }
            // Isolate handler panics (§4.7): one bad subscriber must not
            // take down publication to the others or the pipeline itself.
            let handler = sub.handler.clone();
            let _ = catch_unwind(AssertUnwindSafe(|| handler.handle(&event)));
        }
        drop(subs);

        self.traces.lock().expect("traces lock poisoned").entry(event.session_id.clone()).or_default().push(event);
    }

    fn subscribe(&self, event_type: Option<EventType>, handler: Arc<dyn EventHandler>) -> u64 {
        let id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.lock().expect("subscriptions lock poisoned").push(Subscription { id, event_type, handler });
        id
    }

    fn unsubscribe(&self, subscription_id: u64) {
        self.subscriptions.lock().expect("subscriptions lock poisoned").retain(|s| s.id != subscription_id);
    }
}

#[async_trait]
impl TraceStore for InProcessEventBus {
    async fn append(&self, event: TraceEvent) {
        self.traces.lock().expect("traces lock poisoned").entry(event.session_id.clone()).or_default().push(event);
    }

    async fn get_traces(&self, session_id: &str) -> Vec<TraceEvent> {
        self.traces.lock().expect("traces lock poisoned").get(session_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn event(id: u64, session: &str, ty: EventType) -> TraceEvent {
        TraceEvent::new(id, session, ty, id)
    }

    #[tokio::test]
    async fn publish_records_trace_and_notifies_matching_subscriber() {
        let bus = InProcessEventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        bus.subscribe(Some(EventType::SessionStart), Arc::new(move |_e: &TraceEvent| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));

        bus.publish(event(1, "s1", EventType::SessionStart)).await;
        bus.publish(event(2, "s1", EventType::StageStart)).await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(TraceStore::get_traces(&bus, "s1").await.len(), 2);
    }

    #[tokio::test]
    async fn subscribe_with_no_event_type_filter_receives_everything() {
        let bus = InProcessEventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.subscribe(None, Arc::new(move |_e: &TraceEvent| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        bus.publish(event(1, "s1", EventType::SessionStart)).await;
        bus.publish(event(2, "s1", EventType::StageStart)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = InProcessEventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let id = bus.subscribe(None, Arc::new(move |_e: &TraceEvent| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        bus.unsubscribe(id);
        bus.publish(event(1, "s1", EventType::SessionStart)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn a_panicking_handler_does_not_stop_other_handlers() {
        let bus = InProcessEventBus::new();
        bus.subscribe(None, Arc::new(|_e: &TraceEvent| panic!("boom")));
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        bus.subscribe(None, Arc::new(move |_e: &TraceEvent| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));
        bus.publish(event(1, "s1", EventType::SessionStart)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn traces_are_isolated_per_session() {
        let bus = InProcessEventBus::new();
        bus.publish(event(1, "s1", EventType::SessionStart)).await;
        bus.publish(event(1, "s2", EventType::SessionStart)).await;
        assert_eq!(TraceStore::get_traces(&bus, "s1").await.len(), 1);
        assert_eq!(TraceStore::get_traces(&bus, "s2").await.len(), 1);
        assert_eq!(TraceStore::get_traces(&bus, "s3").await.len(), 0);
    }
}
