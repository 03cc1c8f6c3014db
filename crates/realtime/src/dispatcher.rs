//! Event dispatch: a bounded FIFO between the decode path and listener
//! execution, drained by a single task.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use ec_deltas::{Event, EventKind};
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::{EventListener, ListenerRegistry};

/// Producer side of the dispatch queue.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::Sender<Event>,
}

impl EventQueue {
    /// Enqueue an event, waiting while the queue is full. Returns false
    /// once the dispatcher has exited.
    pub async fn push(&self, event: Event) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Events currently waiting.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to the running dispatch loop.
pub struct Dispatcher {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl Dispatcher {
    /// Spawn the dispatch loop with a queue of `capacity` events.
    pub fn spawn(registry: Arc<ListenerRegistry>, capacity: usize) -> (EventQueue, Self) {
        let (tx, mut rx) = mpsc::channel::<Event>(capacity.max(1));
        let stop = CancellationToken::new();
        let loop_stop = stop.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    event = rx.recv() => match event {
                        Some(event) => deliver(&registry, &event).await,
                        None => break,
                    },
                    _ = loop_stop.cancelled() => break,
                }
            }
            tracing::debug!("dispatcher stopped");
        });

        (EventQueue { tx }, Self { stop, handle })
    }

    /// Stop and wait for the queue to drain.
    pub async fn shutdown(self) {
        self.stop.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "dispatcher task failed");
        }
    }
}

/// Run every listener for `event`, isolating failures.
///
/// A failed listener produces an `error` event delivered inline to the
/// `error` listeners. Failures of `error` listeners are only logged.
pub async fn deliver(registry: &ListenerRegistry, event: &Event) {
    for listener in registry.listeners_for(event.kind) {
        let Some(failure) = call(listener.as_ref(), event).await else {
            continue;
        };
        tracing::warn!(kind = %event.kind, error = %failure, "listener failed");

        if event.kind == EventKind::Error {
            continue;
        }
        let report = Event::with_reason(
            EventKind::Error,
            format!("{} listener failed: {failure}", event.kind),
        );
        for handler in registry.listeners_for(EventKind::Error) {
            if let Some(e) = call(handler.as_ref(), &report).await {
                tracing::warn!(error = %e, "error listener failed");
            }
        }
    }
}

/// Invoke one listener; `Some(description)` on error or panic.
async fn call(listener: &dyn EventListener, event: &Event) -> Option<String> {
    match AssertUnwindSafe(listener.on_event(event)).catch_unwind().await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("{e:#}")),
        Err(_panic) => Some("listener panicked".into()),
    }
}
