//! Sink Module
//!
//! Consumers of fetched assets and the bindings that decide, at delivery
//! time, whether a consumer still wants a result.
//!
//! A sink is re-bound every time it requests an identifier. Each binding
//! bumps the sink's generation; a fetch only delivers to waiters whose
//! ticket carries the current generation, so a recycled sink never shows
//! a stale image.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

// == Sink Id ==
/// Stable handle identifying a sink across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(u64);

impl SinkId {
    /// Allocates a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// == Sink Trait ==
/// Receives decoded assets.
pub trait Sink<A>: Send + Sync {
    fn id(&self) -> SinkId;

    fn deliver(&self, asset: Arc<A>);

    /// A single-use sink's binding is dropped once the request it was
    /// bound for ends, delivered or not. Reusable sinks stay bound until
    /// re-bound or released.
    fn is_single_use(&self) -> bool {
        false
    }
}

// == Ticket ==
/// Proof of one binding of a sink to an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    sink: SinkId,
    generation: u64,
}

impl Ticket {
    pub fn sink(&self) -> SinkId {
        self.sink
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct Binding {
    identifier: String,
    generation: u64,
}

// == Sink Bindings ==
/// Current identifier and generation of every known sink.
#[derive(Debug, Default)]
pub struct SinkBindings {
    bindings: Mutex<HashMap<SinkId, Binding>>,
}

impl SinkBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `sink` to `identifier`, invalidating all earlier tickets.
    pub fn bind(&self, sink: SinkId, identifier: &str) -> Ticket {
        let mut bindings = self.lock();
        let binding = bindings.entry(sink).or_insert_with(|| Binding {
            identifier: String::new(),
            generation: 0,
        });
        binding.generation += 1;
        binding.identifier = identifier.to_string();

        Ticket {
            sink,
            generation: binding.generation,
        }
    }

    /// True if no newer binding (or release) happened since `ticket`.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.lock()
            .get(&ticket.sink)
            .is_some_and(|b| b.generation == ticket.generation)
    }

    /// Identifier a sink is currently bound to.
    pub fn current_identifier(&self, sink: SinkId) -> Option<String> {
        self.lock().get(&sink).map(|b| b.identifier.clone())
    }

    /// Drops the binding `ticket` was issued for, unless the sink has been
    /// re-bound since.
    pub fn release_ticket(&self, ticket: &Ticket) -> bool {
        let mut bindings = self.lock();
        match bindings.get(&ticket.sink) {
            Some(b) if b.generation == ticket.generation => {
                bindings.remove(&ticket.sink);
                true
            }
            _ => false,
        }
    }

    /// Forgets a sink; pending fetches will skip it.
    pub fn release(&self, sink: SinkId) -> bool {
        self.lock().remove(&sink).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SinkId, Binding>> {
        self.bindings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// == Channel Sink ==
/// Sink forwarding every delivery into an unbounded channel, e.g. a UI
/// event loop that repaints one item slot.
#[derive(Debug)]
pub struct ChannelSink<A> {
    id: SinkId,
    tx: mpsc::UnboundedSender<Arc<A>>,
}

impl<A> ChannelSink<A> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Arc<A>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: SinkId::next(),
                tx,
            },
            rx,
        )
    }
}

impl<A: Send + Sync> Sink<A> for ChannelSink<A> {
    fn id(&self) -> SinkId {
        self.id
    }

    fn deliver(&self, asset: Arc<A>) {
        // Receiver gone means the consumer went away.
        let _ = self.tx.send(asset);
    }
}

// == Oneshot Sink ==
/// Sink that accepts a single delivery. The receiver errors if the fetch
/// ends without delivering (the sink is dropped with its task).
#[derive(Debug)]
pub struct OneshotSink<A> {
    id: SinkId,
    tx: Mutex<Option<oneshot::Sender<Arc<A>>>>,
}

impl<A> OneshotSink<A> {
    pub fn new() -> (Self, oneshot::Receiver<Arc<A>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                id: SinkId::next(),
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl<A: Send + Sync> Sink<A> for OneshotSink<A> {
    fn id(&self) -> SinkId {
        self.id
    }

    fn deliver(&self, asset: Arc<A>) {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(asset);
        }
    }

    fn is_single_use(&self) -> bool {
        true
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_ids_are_unique() {
        assert_ne!(SinkId::next(), SinkId::next());
    }

    #[test]
    fn test_rebinding_invalidates_old_ticket() {
        let bindings = SinkBindings::new();
        let sink = SinkId::next();

        let first = bindings.bind(sink, "https://example.com/1.png");
        assert!(bindings.is_current(&first));

        let second = bindings.bind(sink, "https://example.com/2.png");
        assert!(!bindings.is_current(&first));
        assert!(bindings.is_current(&second));
        assert_eq!(
            bindings.current_identifier(sink).as_deref(),
            Some("https://example.com/2.png")
        );
    }

    #[test]
    fn test_release_invalidates_ticket() {
        let bindings = SinkBindings::new();
        let sink = SinkId::next();
        let ticket = bindings.bind(sink, "id");

        assert!(bindings.release(sink));
        assert!(!bindings.is_current(&ticket));
        assert!(bindings.is_empty());
        assert!(!bindings.release(sink));
    }

    #[test]
    fn test_release_ticket_ignores_stale_ticket() {
        let bindings = SinkBindings::new();
        let sink = SinkId::next();
        let old = bindings.bind(sink, "a");
        let new = bindings.bind(sink, "b");

        assert!(!bindings.release_ticket(&old));
        assert!(bindings.is_current(&new));
        assert!(bindings.release_ticket(&new));
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_only_oneshot_sinks_are_single_use() {
        let (oneshot, _rx) = OneshotSink::<u8>::new();
        let (channel, _rx) = ChannelSink::<u8>::new();
        assert!(oneshot.is_single_use());
        assert!(!channel.is_single_use());
    }

    #[test]
    fn test_tickets_of_different_sinks_are_independent() {
        let bindings = SinkBindings::new();
        let a = bindings.bind(SinkId::next(), "x");
        let b = bindings.bind(SinkId::next(), "x");

        assert!(bindings.is_current(&a));
        assert!(bindings.is_current(&b));
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn test_oneshot_sink_delivers_once() {
        let (sink, mut rx) = OneshotSink::new();
        sink.deliver(Arc::new(1u8));
        sink.deliver(Arc::new(2u8));

        assert_eq!(*rx.try_recv().unwrap(), 1);
    }

    #[test]
    fn test_channel_sink_forwards_every_delivery() {
        let (sink, mut rx) = ChannelSink::new();
        sink.deliver(Arc::new("a"));
        sink.deliver(Arc::new("b"));

        assert_eq!(*rx.try_recv().unwrap(), "a");
        assert_eq!(*rx.try_recv().unwrap(), "b");
    }
}
