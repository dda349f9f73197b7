//! Synchronous in-process event dispatch.

use std::sync::Arc;
use std::sync::RwLock;

use async_trait::async_trait;

use super::payload::CacheEvent;

/// Handler for cache mutation events.
///
/// Implementations must not let internal failures escape: the trait method
/// is infallible so that audit problems can never abort the cache operation
/// that triggered them.
#[async_trait]
pub trait CacheEventHandler: Send + Sync {
    /// Handle one event. Runs in the publisher's call path.
    async fn on_event(&self, event: &CacheEvent);
}

/// Publishes cache events to registered handlers, in registration order.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn CacheEventHandler>>>,
}

impl EventBus {
    /// Bus with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler.
    pub fn subscribe(&self, handler: Arc<dyn CacheEventHandler>) {
        if let Ok(mut handlers) = self.handlers.write() {
            handlers.push(handler);
        }
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().map_or(0, |h| h.len())
    }

    /// Deliver `event` to every handler, awaiting each in turn.
    pub async fn publish(&self, event: &CacheEvent) {
        let handlers: Vec<Arc<dyn CacheEventHandler>> = match self.handlers.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                tracing::warn!("event handler list poisoned, delivering anyway");
                poisoned.into_inner().clone()
            }
        };

        for handler in handlers {
            handler.on_event(event).await;
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::caller::CallContext;
    use crate::events::{ClearEvent, Operation};
    use crate::tags::TagSet;

    struct Counter {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl CacheEventHandler for Counter {
        async fn on_event(&self, event: &CacheEvent) {
            assert_eq!(event.operation(), Operation::Clear);
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn clear_event() -> CacheEvent {
        CacheEvent::Clear(ClearEvent {
            tags: TagSet::new(),
            timestamp: Utc::now(),
            caller: CallContext::default(),
        })
    }

    #[tokio::test]
    async fn test_publish_reaches_all_handlers() {
        let bus = EventBus::new();
        let first = Arc::new(Counter {
            seen: AtomicUsize::new(0),
        });
        let second = Arc::new(Counter {
            seen: AtomicUsize::new(0),
        });
        bus.subscribe(first.clone());
        bus.subscribe(second.clone());

        bus.publish(&clear_event()).await;
        bus.publish(&clear_event()).await;

        assert_eq!(first.seen.load(Ordering::SeqCst), 2);
        assert_eq!(second.seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_publish_with_no_handlers() {
        let bus = EventBus::new();
        bus.publish(&clear_event()).await;
        assert_eq!(bus.handler_count(), 0);
    }
}
