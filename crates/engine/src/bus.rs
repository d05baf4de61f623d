use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use common::{EngineEvent, Error, Result};

/// Bounded multi-producer, single-consumer queue carrying `EngineEvent`.
///
/// Producers (connectors, the dispatcher itself when re-enqueueing a handler's
/// output) hold a `BusHandle` and await capacity rather than drop — per spec
/// §4.1/§5, drop-oldest is not permitted and producers must block on a full
/// bus. `depth()` backs the bus-depth telemetry gauge.
pub struct Bus {
    rx: mpsc::Receiver<EngineEvent>,
    depth: Arc<AtomicI64>,
}

/// Cloneable producer handle. Every connector and the dispatcher's own
/// re-enqueue path hold one of these; none hold the receiver.
#[derive(Clone)]
pub struct BusHandle {
    tx: mpsc::Sender<EngineEvent>,
    depth: Arc<AtomicI64>,
}

impl Bus {
    pub fn new(capacity: usize) -> (Self, BusHandle) {
        let (tx, rx) = mpsc::channel(capacity);
        let depth = Arc::new(AtomicI64::new(0));
        let bus = Bus {
            rx,
            depth: depth.clone(),
        };
        let handle = BusHandle { tx, depth };
        (bus, handle)
    }

    /// Pop the next event, blocking until one arrives or every handle is dropped.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        let event = self.rx.recv().await;
        if event.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        event
    }
}

impl BusHandle {
    /// Enqueue an event, awaiting capacity if the bus is full. Only returns an
    /// error once the dispatcher has shut down and the receiver is gone.
    pub async fn enqueue(&self, event: EngineEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| {
            warn!("bus receiver dropped, event discarded");
            Error::Internal("bus closed".to_string())
        })?;
        self.depth.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Current queue depth, used to drive the bus-depth metrics gauge.
    pub fn depth(&self) -> i64 {
        self.depth.load(Ordering::Relaxed).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{EngineEvent, SignalEvent};
    use chrono::Utc;

    fn signal() -> EngineEvent {
        EngineEvent::Signal(SignalEvent {
            timestamp: Utc::now(),
            symbol: "BTC/USD".to_string(),
            direction: common::Direction::Long,
            strength: None,
        })
    }

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let (mut bus, handle) = Bus::new(10);
        for _ in 0..3 {
            handle.enqueue(signal()).await.unwrap();
        }
        assert_eq!(handle.depth(), 3);
        for _ in 0..3 {
            bus.recv().await.unwrap();
        }
        assert_eq!(handle.depth(), 0);
    }

    #[tokio::test]
    async fn enqueue_awaits_capacity_instead_of_dropping() {
        let (mut bus, handle) = Bus::new(1);
        handle.enqueue(signal()).await.unwrap();

        let handle2 = handle.clone();
        let blocked = tokio::spawn(async move { handle2.enqueue(signal()).await });

        // Give the blocked task a chance to actually attempt the send; it
        // must not complete until the bus has capacity again.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        bus.recv().await.unwrap();
        blocked.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn recv_returns_none_once_every_handle_is_dropped() {
        let (mut bus, handle) = Bus::new(1);
        drop(handle);
        assert!(bus.recv().await.is_none());
    }
}
