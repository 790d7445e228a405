//! The mutation handle passed to `Scene::apply_local_change`.

use crate::element::{Element, ElementId};
use crate::history::Snapshot;
use crate::order;
use crate::store::{ElementStore, StoreError};
use crate::version::VersionClock;
use std::collections::{BTreeMap, BTreeSet};

/// Records every element touched during one local change.
///
/// The first touch of an element saves its original copy. When the change
/// finishes, each element whose content differs from its original gets
/// exactly one version bump, however many times it was mutated.
pub struct LocalChange<'a> {
    store: &'a mut ElementStore,
    selection: &'a mut BTreeSet<ElementId>,
    selection_before: BTreeSet<ElementId>,
    /// `None` marks an element inserted by this change.
    originals: BTreeMap<ElementId, Option<Element>>,
}

/// Outcome of a finished local change.
pub(crate) struct Finished {
    pub prev: Snapshot,
    pub next: Snapshot,
    pub changed: Vec<ElementId>,
}

impl<'a> LocalChange<'a> {
    pub(crate) fn new(store: &'a mut ElementStore, selection: &'a mut BTreeSet<ElementId>) -> Self {
        let selection_before = selection.clone();
        Self {
            store,
            selection,
            selection_before,
            originals: BTreeMap::new(),
        }
    }

    fn touch(&mut self, id: &ElementId) {
        if !self.originals.contains_key(id) {
            let original = self.store.get(id).cloned();
            self.originals.insert(id.clone(), original);
        }
    }

    /// Add a new element on top of the scene.
    pub fn insert(&mut self, mut element: Element) -> Result<ElementId, StoreError> {
        let id = element.id.clone();
        if self.store.contains(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        element.index = Some(order::key_above(self.store.elements()));
        self.store.insert(element)?;
        self.originals.entry(id.clone()).or_insert(None);
        Ok(id)
    }

    /// Edit an element in place. Returns `None` for unknown ids.
    ///
    /// The id and versioning fields are owned by the scene; changes the
    /// closure makes to them are discarded. Setting `index` moves the element
    /// once the change finishes.
    pub fn mutate<R>(&mut self, id: &ElementId, f: impl FnOnce(&mut Element) -> R) -> Option<R> {
        if !self.store.contains(id) {
            return None;
        }
        self.touch(id);
        let element = self.store.get_mut(id)?;
        let result = f(element);
        element.id = id.clone();
        Some(result)
    }

    /// Tombstone an element and drop it from the selection.
    pub fn delete(&mut self, id: &ElementId) -> bool {
        self.selection.remove(id);
        self.mutate(id, |el| el.is_deleted = true).is_some()
    }

    /// Bring a tombstoned element back.
    pub fn restore(&mut self, id: &ElementId) -> bool {
        self.mutate(id, |el| el.is_deleted = false).is_some()
    }

    /// Move an element to the top of the z-order.
    pub fn move_to_front(&mut self, id: &ElementId) -> bool {
        let Some(pos) = self.store.position(id) else {
            return false;
        };
        if pos + 1 < self.store.len() {
            let key = order::key_above(self.store.elements().iter().filter(|el| &el.id != id));
            self.set_index(id, key);
        }
        true
    }

    /// Move an element to the bottom of the z-order.
    pub fn move_to_back(&mut self, id: &ElementId) -> bool {
        let Some(pos) = self.store.position(id) else {
            return false;
        };
        if pos > 0 {
            let key = order::key_below(self.store.elements().iter().filter(|el| &el.id != id));
            self.set_index(id, key);
        }
        true
    }

    fn set_index(&mut self, id: &ElementId, key: String) {
        self.mutate(id, |el| el.index = Some(key));
        self.store.sort();
    }

    /// Replace the selection.
    pub fn select(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        *self.selection = ids.into_iter().filter(|id| self.store.contains(id)).collect();
    }

    pub fn selection(&self) -> &BTreeSet<ElementId> {
        self.selection
    }

    pub fn get(&self, id: &ElementId) -> Option<&Element> {
        self.store.get(id)
    }

    pub fn elements(&self) -> &[Element] {
        self.store.elements()
    }

    /// Stamp touched elements and build the history snapshots.
    pub(crate) fn finish(self, clock: &mut VersionClock) -> Finished {
        let mut prev = Snapshot {
            selection: self.selection_before,
            ..Snapshot::default()
        };
        let mut next = Snapshot {
            selection: self.selection.clone(),
            ..Snapshot::default()
        };
        let mut changed = Vec::new();

        for (id, original) in self.originals {
            let Some(current) = self.store.get_mut(&id) else {
                continue;
            };
            match original {
                None => clock.stamp_created(current),
                Some(original) => {
                    current.version = original.version;
                    current.version_nonce = original.version_nonce;
                    current.updated = original.updated;
                    if current.content_eq(&original) {
                        continue;
                    }
                    clock.bump(current);
                    prev.elements.insert(id.clone(), original);
                }
            }
            next.elements.insert(id.clone(), current.clone());
            changed.push(id);
        }
        self.store.sort();

        Finished { prev, next, changed }
    }
}
