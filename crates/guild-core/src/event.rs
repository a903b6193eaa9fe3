//! Event system for the guild workspace.
//!
//! Adapters publish type-erased events under a dotted name. The same event may
//! be published under several names, for example a group message goes out as
//! `message.group` and then as `message`:
//!
//! ```rust,ignore
//! use guild_core::{BoxedEvent, EventBus};
//!
//! let bus = EventBus::new(256);
//! let mut stream = bus.subscribe();
//!
//! bus.emit("message.group", BoxedEvent::new(event.clone()));
//! bus.emit("message", BoxedEvent::new(event));
//!
//! while let Some(emitted) = stream.recv().await {
//!     if emitted.name() == "message" {
//!         let msg = emitted.event.downcast_ref::<MessageEvent>();
//!     }
//! }
//! ```

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{trace, warn};

// ============================================================================
// Core Event Trait
// ============================================================================

/// The base trait for all events published on the [`EventBus`].
pub trait Event: Any + Debug + Send + Sync {
    /// Returns the most specific name of this event (e.g. `message.group`).
    fn event_name(&self) -> &'static str;

    /// Returns the platform/adapter name (e.g. `qqguild`).
    fn platform(&self) -> &'static str;

    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the account id this event belongs to, if any.
    fn bot_id(&self) -> Option<&str> {
        None
    }
}

/// A cheaply clonable, type-erased event.
#[derive(Debug, Clone)]
pub struct BoxedEvent(Arc<dyn Event>);

impl BoxedEvent {
    /// Wraps a concrete event.
    pub fn new<E: Event>(event: E) -> Self {
        Self(Arc::new(event))
    }

    /// Returns the wrapped event's name.
    pub fn event_name(&self) -> &'static str {
        self.0.event_name()
    }

    /// Returns the wrapped event's platform.
    pub fn platform(&self) -> &'static str {
        self.0.platform()
    }

    /// Returns the account id of the wrapped event.
    pub fn bot_id(&self) -> Option<&str> {
        self.0.bot_id()
    }

    /// Returns true if the wrapped event is a `T`.
    pub fn is<T: Event>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// Attempts to view the wrapped event as a `T`.
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// An event together with the name it was published under.
#[derive(Debug, Clone)]
pub struct Emitted {
    name: Arc<str>,
    /// The published event.
    pub event: BoxedEvent,
}

impl Emitted {
    /// Returns the name this event was published under.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Broadcast bus connecting adapters to framework subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Emitted>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a bus that buffers up to `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event under `name`.
    ///
    /// Returns the number of subscribers that will see it. Publishing with no
    /// subscribers is not an error.
    pub fn emit(&self, name: impl Into<Arc<str>>, event: BoxedEvent) -> usize {
        let name = name.into();
        trace!(event = %name, "Emitting event");
        self.tx.send(Emitted { name, event }).unwrap_or(0)
    }

    /// Subscribes to every event published after this call.
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            rx: self.tx.subscribe(),
        }
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A subscription to an [`EventBus`].
pub struct EventStream {
    rx: broadcast::Receiver<Emitted>,
}

impl EventStream {
    /// Waits for the next event. Returns `None` once the bus is gone.
    ///
    /// A slow subscriber that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<Emitted> {
        loop {
            match self.rx.recv().await {
                Ok(emitted) => return Some(emitted),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Ping(u32);

    impl Event for Ping {
        fn event_name(&self) -> &'static str {
            "ping"
        }

        fn platform(&self) -> &'static str {
            "test"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_downcast() {
        let event = BoxedEvent::new(Ping(7));
        assert!(event.is::<Ping>());
        assert_eq!(event.downcast_ref::<Ping>().map(|p| p.0), Some(7));
        assert_eq!(event.event_name(), "ping");
    }

    #[tokio::test]
    async fn test_emit_order_and_names() {
        let bus = EventBus::new(8);
        let mut stream = bus.subscribe();

        bus.emit("ping.child", BoxedEvent::new(Ping(1)));
        bus.emit("ping", BoxedEvent::new(Ping(1)));

        assert_eq!(stream.recv().await.unwrap().name(), "ping.child");
        assert_eq!(stream.recv().await.unwrap().name(), "ping");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(8);
        assert_eq!(bus.emit("ping", BoxedEvent::new(Ping(0))), 0);
    }
}
