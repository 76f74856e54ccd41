//! Fan-out of inbound frames to caller-registered handlers.
//!
//! The router knows nothing about connection state: registrations made
//! before any connection exists stay valid across every reconnect.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::Value;

use super::frame::Frame;
use crate::types::EventType;

type HandlerFn = dyn Fn(&Value) + Send + Sync + 'static;

/// Opaque token identifying one handler registration.
///
/// Returned by [`EventRouter::on`]; pass it back to [`EventRouter::off`] to
/// remove the registration. Ids are monotonically increasing, which is also
/// what fixes dispatch order for handlers of the same event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration {
    id: HandlerId,
    callback: Arc<HandlerFn>,
}

/// Maps frame type tags to the ordered set of registered callbacks.
#[derive(Default)]
pub struct EventRouter {
    handlers: DashMap<EventType, Vec<Registration>>,
    next_id: AtomicU64,
}

impl EventRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for frames of the given type.
    ///
    /// Handlers for the same type run in registration order. A handler may
    /// be registered for any tag, including ones the SDK does not recognize
    /// ([`EventType::Other`]).
    pub fn on<F>(&self, event: EventType, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.entry(event).or_default().push(Registration {
            id,
            callback: Arc::new(handler),
        });
        id
    }

    /// Remove a previously registered handler.
    ///
    /// Returns `false` when no registration with that id exists for the
    /// event type, which makes repeated removal a no-op.
    pub fn off(&self, event: &EventType, id: HandlerId) -> bool {
        let removed = match self.handlers.get_mut(event) {
            Some(mut registrations) => {
                let before = registrations.len();
                registrations.retain(|r| r.id != id);
                before != registrations.len()
            }
            None => false,
        };
        self.handlers.remove_if(event, |_, v| v.is_empty());
        removed
    }

    /// Dispatch a frame to every handler registered for its type tag, in
    /// registration order. Returns the number of handlers invoked.
    ///
    /// A panic in one handler is caught and logged; it never prevents the
    /// remaining handlers for this frame, or any later dispatch, from
    /// running.
    pub fn dispatch(&self, frame: &Frame) -> usize {
        // Clone the callbacks out before invoking so a handler that calls
        // on()/off() on this router does not deadlock against the map shard.
        let callbacks: Vec<Arc<HandlerFn>> = match self.handlers.get(&frame.event) {
            Some(registrations) => registrations
                .iter()
                .map(|r| Arc::clone(&r.callback))
                .collect(),
            None => return 0,
        };

        for callback in &callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&frame.data))).is_err() {
                tracing::error!(event = %frame.event, "live event handler panicked");
            }
        }

        callbacks.len()
    }

    /// Number of handlers currently registered for an event type.
    #[must_use]
    pub fn handler_count(&self, event: &EventType) -> usize {
        self.handlers.get(event).map_or(0, |r| r.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    fn frame(tag: &str, data: Value) -> Frame {
        Frame::builder()
            .event(EventType::from_tag(tag))
            .data(data)
            .build()
    }

    #[test]
    fn dispatch_runs_handlers_in_registration_order() {
        let router = EventRouter::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for marker in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            router.on(EventType::CommentAdded, move |_| {
                order.lock().unwrap().push(marker);
            });
        }

        let invoked = router.dispatch(&frame("comment_added", json!({ "id": 7 })));

        assert_eq!(invoked, 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn handler_receives_frame_payload() {
        let router = EventRouter::new();
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = Arc::clone(&seen);
        router.on(EventType::CommentAdded, move |data| {
            *seen_clone.lock().unwrap() = Some(data.clone());
        });

        router.dispatch(&frame("comment_added", json!({ "id": 7 })));

        assert_eq!(seen.lock().unwrap().clone(), Some(json!({ "id": 7 })));
    }

    #[test]
    fn panicking_handler_does_not_block_siblings() {
        let router = EventRouter::new();
        let hits = Arc::new(AtomicU64::new(0));

        router.on(EventType::AssetUpdated, |_| panic!("handler bug"));
        let hits_clone = Arc::clone(&hits);
        router.on(EventType::AssetUpdated, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        router.dispatch(&frame("asset_updated", Value::Null));
        // A second dispatch must be unaffected by the earlier panic.
        router.dispatch(&frame("asset_updated", Value::Null));

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn off_removes_only_the_matching_registration() {
        let router = EventRouter::new();
        let hits = Arc::new(AtomicU64::new(0));

        let hits_a = Arc::clone(&hits);
        let id_a = router.on(EventType::VersionAdded, move |_| {
            hits_a.fetch_add(1, Ordering::SeqCst);
        });
        let hits_b = Arc::clone(&hits);
        router.on(EventType::VersionAdded, move |_| {
            hits_b.fetch_add(10, Ordering::SeqCst);
        });

        assert!(router.off(&EventType::VersionAdded, id_a));
        assert!(!router.off(&EventType::VersionAdded, id_a), "second off is a no-op");

        router.dispatch(&frame("version_added", Value::Null));
        assert_eq!(hits.load(Ordering::SeqCst), 10);
        assert_eq!(router.handler_count(&EventType::VersionAdded), 1);
    }

    #[test]
    fn dispatch_without_handlers_is_silent() {
        let router = EventRouter::new();
        assert_eq!(router.dispatch(&frame("notification.new", Value::Null)), 0);
    }

    #[test]
    fn unrecognized_tag_reaches_exact_handler() {
        let router = EventRouter::new();
        let hits = Arc::new(AtomicU64::new(0));

        let hits_clone = Arc::clone(&hits);
        router.on(EventType::from_tag("share_link_created"), move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        let invoked = router.dispatch(&frame("share_link_created", json!({})));
        assert_eq!(invoked, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_may_mutate_registrations_during_dispatch() {
        let router = Arc::new(EventRouter::new());

        let router_clone = Arc::clone(&router);
        router.on(EventType::AssetUpdated, move |_| {
            router_clone.on(EventType::CommentAdded, |_| {});
        });

        router.dispatch(&frame("asset_updated", Value::Null));
        assert_eq!(router.handler_count(&EventType::CommentAdded), 1);
    }
}
