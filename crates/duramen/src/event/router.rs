//! In-process event routing

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

/// Routes incoming events to actively-waiting steps
///
/// The router keeps a one-shot listener per `(instance, event type)` key.
/// Delivery consumes the listener; an event with no live listener is the
/// caller's signal to park the payload in storage instead, which is what
/// makes events sent before the workflow starts waiting survive.
#[derive(Default)]
pub struct EventRouter {
    listeners: DashMap<(String, String), oneshot::Sender<serde_json::Value>>,
}

impl EventRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a one-shot listener and return its receiving end
    ///
    /// A stale listener for the same key is replaced; step execution within
    /// one instance is serial, so two live waits for the same key cannot
    /// coexist.
    pub fn subscribe(
        &self,
        instance_id: &str,
        event_type: &str,
    ) -> oneshot::Receiver<serde_json::Value> {
        let (tx, rx) = oneshot::channel();
        self.listeners
            .insert((instance_id.to_string(), event_type.to_string()), tx);
        rx
    }

    /// Remove the listener for a key, if any
    pub fn unsubscribe(&self, instance_id: &str, event_type: &str) {
        self.listeners
            .remove(&(instance_id.to_string(), event_type.to_string()));
    }

    /// Hand a payload to the waiting step, if one is live
    ///
    /// Returns `true` when a listener consumed the payload. `false` means no
    /// listener existed (or its receiver was already dropped) and the payload
    /// must be parked in storage.
    pub fn deliver(&self, instance_id: &str, event_type: &str, payload: serde_json::Value) -> bool {
        let key = (instance_id.to_string(), event_type.to_string());

        match self.listeners.remove(&key) {
            Some((_, tx)) => {
                let delivered = tx.send(payload).is_ok();
                debug!(instance_id, event_type, delivered, "routed event to listener");
                delivered
            }
            None => false,
        }
    }

    /// Number of live listeners (for tests)
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
