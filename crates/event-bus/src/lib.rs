use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use chatrelay_core_types::{ChannelEvent, EventKind};

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + fmt::Debug + 'static {}

/// Event whose variants belong to a closed set of kinds that handlers can filter on.
pub trait KindedEvent: Event {
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

impl KindedEvent for ChannelEvent {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        ChannelEvent::kind(self)
    }
}

/// Simple in-memory broadcast fan-out for async consumers.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    /// Sends to every live receiver and returns how many there were. Having
    /// no receivers is not an error.
    pub fn emit(&self, event: E) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Handle returned by [`NotificationHub::subscribe`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Subscription<E: KindedEvent> {
    id: SubscriptionId,
    filter: Option<E::Kind>,
    handler: Handler<E>,
}

/// Publish/subscribe hub. Handlers run synchronously inside `publish`, in
/// subscription order; async consumers use [`NotificationHub::watch`].
pub struct NotificationHub<E>
where
    E: KindedEvent,
{
    next_id: AtomicU64,
    subscriptions: RwLock<Vec<Subscription<E>>>,
    bus: Arc<InMemoryBus<E>>,
}

impl<E> NotificationHub<E>
where
    E: KindedEvent,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            subscriptions: RwLock::new(Vec::new()),
            bus: InMemoryBus::new(capacity),
        })
    }

    /// Register `handler` for events of one kind.
    pub fn subscribe<F>(&self, kind: E::Kind, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.insert(Some(kind), Arc::new(handler))
    }

    /// Register `handler` for every event.
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.insert(None, Arc::new(handler))
    }

    /// Returns `false` when the handle was unknown or already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write();
        let before = subs.len();
        subs.retain(|sub| sub.id != id);
        before != subs.len()
    }

    pub fn publish(&self, event: E) {
        let kind = event.kind();
        // Handlers are cloned out so they may (un)subscribe without deadlocking.
        let handlers: Vec<Handler<E>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|sub| sub.filter.map_or(true, |filter| filter == kind))
            .map(|sub| Arc::clone(&sub.handler))
            .collect();
        for handler in &handlers {
            handler(&event);
        }
        let receivers = self.bus.emit(event);
        trace!(?kind, handlers = handlers.len(), receivers, "event published");
    }

    pub fn watch(&self) -> broadcast::Receiver<E> {
        self.bus.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    fn insert(&self, filter: Option<E::Kind>, handler: Handler<E>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Subscription {
            id,
            filter,
            handler,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_core_types::{ChannelId, EventPayload};
    use parking_lot::Mutex;

    fn event(payload: EventPayload) -> ChannelEvent {
        ChannelEvent::new(ChannelId::parse("doubao").unwrap(), payload)
    }

    #[test]
    fn handlers_only_see_their_kind() {
        let hub = NotificationHub::<ChannelEvent>::new(8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hub.subscribe(EventKind::Error, move |ev| sink.lock().push(ev.kind()));

        hub.publish(event(EventPayload::Connected));
        hub.publish(event(EventPayload::Error {
            error: "boom".into(),
        }));

        assert_eq!(*seen.lock(), vec![EventKind::Error]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let hub = NotificationHub::<ChannelEvent>::new(8);
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let id = hub.subscribe_all(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        hub.publish(event(EventPayload::Connected));
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        hub.publish(event(EventPayload::Disconnected));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn handler_may_unsubscribe_itself() {
        let hub = NotificationHub::<ChannelEvent>::new(8);
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let hub_ref = Arc::clone(&hub);
        let slot_ref = Arc::clone(&slot);
        let id = hub.subscribe_all(move |_| {
            if let Some(id) = slot_ref.lock().take() {
                hub_ref.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        hub.publish(event(EventPayload::Connected));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn watchers_receive_published_events() {
        let hub = NotificationHub::<ChannelEvent>::new(8);
        let mut rx = hub.watch();
        hub.publish(event(EventPayload::Authenticated));
        let received = rx.recv().await.expect("event delivered");
        assert_eq!(received.kind(), EventKind::Authenticated);
    }
}
