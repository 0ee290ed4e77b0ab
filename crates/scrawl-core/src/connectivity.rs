//! Connectivity component.
//!
//! Holds the process-wide [`Connectivity`] value. The host's network observer
//! calls [`ConnectivityMonitor::set`]; consumers read the current value or
//! subscribe to transitions. Handles are cheap clones of one shared channel.

use std::sync::Arc;

use tokio::sync::watch;

use crate::state::Connectivity;

#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<Connectivity>>,
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn current(&self) -> Connectivity {
        *self.sender.borrow()
    }

    /// Record the observed state. Subscribers are only notified on an actual
    /// transition; returns whether one happened.
    pub fn set(&self, state: Connectivity) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            tracing::info!("Connectivity changed: {}", state);
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.sender.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(Connectivity::Online)
    }
}
