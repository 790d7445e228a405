//! Change notifications.

use crate::element::ElementId;
use std::fmt;

/// Where a store mutation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOrigin {
    /// A local edit through `apply_local_change`.
    Local,
    /// A reconciled remote update.
    Remote,
    /// Undo or redo.
    History,
    /// The whole scene was replaced.
    Reset,
}

/// Delivered to every listener after a store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneChange {
    pub origin: ChangeOrigin,
    /// Ids whose stored copy changed. Empty for [`ChangeOrigin::Reset`].
    pub changed: Vec<ElementId>,
    pub scene_version: u64,
}

/// Handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&SceneChange)>;

/// Ordered listener list. Delivery is synchronous, in subscription order.
#[derive(Default)]
pub struct Observers {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl Observers {
    pub fn subscribe(&mut self, listener: impl FnMut(&SceneChange) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    pub fn notify(&mut self, change: &SceneChange) {
        for (_, listener) in &mut self.listeners {
            listener(change);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
