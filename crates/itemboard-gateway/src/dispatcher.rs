use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;

use itemboard_types::events::GatewayEvent;

const BROADCAST_CAPACITY: usize = 1024;

/// Fan-out hub for gateway events. Every connected client receives every
/// event; there is no per-client routing, ordering across publishers, or
/// persistence.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Number of live WebSocket connections
    connected: AtomicUsize,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_capacity(BROADCAST_CAPACITY)
    }

    /// Receivers that fall more than `capacity` events behind skip ahead.
    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connected: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients. Returns how many
    /// receivers it was queued for; zero when nobody is listening.
    pub fn broadcast(&self, event: GatewayEvent) -> usize {
        self.inner.broadcast_tx.send(event).unwrap_or(0)
    }

    pub fn client_connected(&self) -> usize {
        self.inner.connected.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn client_disconnected(&self) -> usize {
        let prev = self
            .inner
            .connected
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        prev.saturating_sub(1)
    }

    pub fn connected_clients(&self) -> usize {
        self.inner.connected.load(Ordering::Relaxed)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
