//! Container lifecycle notifications

use crate::container::ContainerId;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerEvent {
    ChildCreated {
        parent: ContainerId,
        child: ContainerId,
    },
    /// Fired exactly once per container
    Disposed { container: ContainerId },
}

pub type Listener = Arc<dyn Fn(&ContainerEvent) + Send + Sync>;

/// Subscribers of one container
#[derive(Default)]
pub(crate) struct EventHub {
    listeners: RwLock<Vec<Listener>>,
}

impl EventHub {
    pub fn subscribe(&self, listener: Listener) {
        self.listeners.write().push(listener);
    }

    pub fn publish(&self, event: &ContainerEvent) {
        // Snapshot so listeners may subscribe or create children re-entrantly.
        let listeners: Vec<Listener> = self.listeners.read().clone();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }
}
