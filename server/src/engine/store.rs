use std::sync::RwLock;

use tokio::sync::broadcast;

use super::commands::StatePatch;
use super::state::ClientState;

/// Patches buffered per subscriber before a slow one starts lagging.
pub const PATCH_CHANNEL_CAPACITY: usize = 256;

/// Holds one client's state. Changes only arrive through [`Store::commit`],
/// which applies patches in order and then notifies subscribers.
pub struct Store {
    state: RwLock<ClientState>,
    notifier: broadcast::Sender<StatePatch>,
}

impl Store {
    pub fn new(initial: ClientState) -> Self {
        let (notifier, _) = broadcast::channel(PATCH_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(initial),
            notifier,
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> ClientState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Read part of the state without cloning all of it.
    pub fn read<R>(&self, f: impl FnOnce(&ClientState) -> R) -> R {
        let state = self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&state)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatePatch> {
        self.notifier.subscribe()
    }

    /// The current state plus a receiver for every patch committed after it.
    /// No patch is both in the snapshot and delivered to the receiver.
    pub fn subscribe_with_snapshot(&self) -> (ClientState, broadcast::Receiver<StatePatch>) {
        let state = self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (state.clone(), self.notifier.subscribe())
    }

    /// Apply `patches` atomically with respect to readers, then publish them.
    /// Publishing happens before the lock is released so a concurrent
    /// [`Store::subscribe_with_snapshot`] sees each patch exactly once.
    pub fn commit(&self, patches: &[StatePatch]) {
        if patches.is_empty() {
            return;
        }
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for patch in patches {
            state.apply(patch);
        }
        for patch in patches {
            // No subscribers is fine.
            let _ = self.notifier.send(patch.clone());
        }
    }
}
