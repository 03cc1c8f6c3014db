//! Listener registry: maps event kinds to application callbacks.
//!
//! Each kind has an ordered list of explicit listeners and at most one
//! default handler. The default only runs when no explicit listener is
//! registered for that kind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ec_deltas::{Event, EventKind};
use parking_lot::RwLock;

/// Implement this trait to receive events from the dispatcher.
///
/// # Example
///
/// ```rust,no_run
/// use ec_realtime::{Event, EventListener};
///
/// struct PrintText;
///
/// #[async_trait::async_trait]
/// impl EventListener for PrintText {
///     async fn on_event(&self, event: &Event) -> anyhow::Result<()> {
///         if let Some(msg) = event.message() {
///             tracing::info!(thread = %msg.thread_id, "{}", msg.text);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait EventListener: Send + Sync + 'static {
    /// Handle one event. Errors and panics are caught by the dispatcher.
    async fn on_event(&self, event: &Event) -> anyhow::Result<()>;
}

/// Adapter for synchronous closures.
pub struct FnListener<F>(F);

#[async_trait::async_trait]
impl<F> EventListener for FnListener<F>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        (self.0)(event)
    }
}

/// Wrap a closure as a listener.
pub fn listener_fn<F>(f: F) -> FnListener<F>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    FnListener(f)
}

/// Handle returned by [`ListenerRegistry::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ListenerRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct ListenerRegistry {
    explicit: RwLock<HashMap<EventKind, Vec<(ListenerId, Arc<dyn EventListener>)>>>,
    defaults: RwLock<HashMap<EventKind, Arc<dyn EventListener>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with [`LoggingListener`] as the default for every kind.
    pub fn with_logging_defaults() -> Self {
        let reg = Self::new();
        let logger: Arc<dyn EventListener> = Arc::new(LoggingListener);
        for kind in EventKind::ALL {
            reg.set_default(kind, logger.clone());
        }
        reg
    }

    /// Append a listener for `kind`. Listeners run in registration order.
    pub fn register<L: EventListener>(&self, kind: EventKind, listener: L) -> ListenerId {
        self.register_boxed(kind, Arc::new(listener))
    }

    /// Register a pre-wrapped listener, e.g. one shared across kinds.
    pub fn register_boxed(&self, kind: EventKind, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.explicit
            .write()
            .entry(kind)
            .or_default()
            .push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered for `kind`.
    pub fn unregister(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut explicit = self.explicit.write();
        let Some(list) = explicit.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(lid, _)| *lid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            explicit.remove(&kind);
        }
        removed
    }

    /// Install the fallback handler for `kind`, replacing any previous one.
    pub fn set_default(&self, kind: EventKind, listener: Arc<dyn EventListener>) {
        self.defaults.write().insert(kind, listener);
    }

    pub fn clear_default(&self, kind: EventKind) {
        self.defaults.write().remove(&kind);
    }

    /// Listeners to run for `kind`, in order: the explicit ones if any,
    /// otherwise the default alone.
    ///
    /// Returns a snapshot so callbacks may (un)register while running.
    pub fn listeners_for(&self, kind: EventKind) -> Vec<Arc<dyn EventListener>> {
        if let Some(list) = self.explicit.read().get(&kind) {
            if !list.is_empty() {
                return list.iter().map(|(_, l)| l.clone()).collect();
            }
        }
        self.defaults.read().get(&kind).cloned().into_iter().collect()
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.explicit.read().contains_key(&kind) || self.defaults.read().contains_key(&kind)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging default
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Logs a one-line summary of each event at `info`.
pub struct LoggingListener;

#[async_trait::async_trait]
impl EventListener for LoggingListener {
    async fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        tracing::info!(kind = %event.kind, "{}", summarize(event));
        Ok(())
    }
}

fn summarize(event: &Event) -> String {
    if let Some(msg) = event.message() {
        return format!(
            "{} from {} in {}: {} chars, {} attachment(s)",
            msg.id,
            msg.sender_id,
            msg.thread_id,
            msg.text.chars().count(),
            msg.attachments.len()
        );
    }
    if let Some(meta) = event.metadata() {
        return format!("by {} in {}", meta.actor_id, meta.thread_id);
    }
    if let Some(reason) = event.reason() {
        return reason.to_string();
    }
    event.kind.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(log: Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl EventListener {
        listener_fn(move |_| {
            log.lock().unwrap().push(tag);
            Ok(())
        })
    }

    async fn run(reg: &ListenerRegistry, kind: EventKind) {
        let event = Event::lifecycle(kind);
        for l in reg.listeners_for(kind) {
            l.on_event(&event).await.unwrap();
        }
    }

    #[tokio::test]
    async fn explicit_listeners_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let reg = ListenerRegistry::new();
        reg.register(EventKind::Listening, recorder(log.clone(), "a"));
        reg.register(EventKind::Listening, recorder(log.clone(), "b"));
        run(&reg, EventKind::Listening).await;
        assert_eq!(*log.lock().unwrap(), ["a", "b"]);
    }

    #[tokio::test]
    async fn explicit_listener_short_circuits_default() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let reg = ListenerRegistry::new();
        reg.set_default(EventKind::Reconnect, Arc::new(recorder(log.clone(), "default")));

        run(&reg, EventKind::Reconnect).await;
        assert_eq!(*log.lock().unwrap(), ["default"]);

        log.lock().unwrap().clear();
        let id = reg.register(EventKind::Reconnect, recorder(log.clone(), "explicit"));
        run(&reg, EventKind::Reconnect).await;
        assert_eq!(*log.lock().unwrap(), ["explicit"]);

        log.lock().unwrap().clear();
        assert!(reg.unregister(EventKind::Reconnect, id));
        run(&reg, EventKind::Reconnect).await;
        assert_eq!(*log.lock().unwrap(), ["default"]);
    }

    #[test]
    fn unregister_unknown_is_false() {
        let reg = ListenerRegistry::new();
        let id = reg.register(EventKind::Typing, listener_fn(|_| Ok(())));
        assert!(!reg.unregister(EventKind::Presence, id));
        assert!(reg.unregister(EventKind::Typing, id));
        assert!(!reg.unregister(EventKind::Typing, id));
        assert!(!reg.has_listeners(EventKind::Typing));
    }

    #[test]
    fn logging_defaults_cover_every_kind() {
        let reg = ListenerRegistry::with_logging_defaults();
        for kind in EventKind::ALL {
            assert_eq!(reg.listeners_for(kind).len(), 1, "{kind}");
        }
    }

    #[test]
    fn summary_prefers_reason() {
        let e = Event::with_reason(EventKind::Disconnect, "stream ended");
        assert_eq!(summarize(&e), "stream ended");
        assert_eq!(summarize(&Event::lifecycle(EventKind::Listening)), "listening");
    }
}
