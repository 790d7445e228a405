//! Undo/redo history built from element diffs.
//!
//! Each local change is diffed against the state it replaced and recorded
//! according to its [`CaptureDirective`]. Entries hold field-level patches,
//! never whole scene snapshots, so undoing one user's change does not revert
//! concurrent remote edits to other fields or elements.
//!
//! Undo and redo are applied as fresh local mutations: every touched element
//! gets a version bump so the reverted state wins on other peers.

pub mod patch;

pub use patch::{ElementPatch, PatchError};

use crate::element::{Element, ElementId};
use crate::store::ElementStore;
use crate::version::VersionClock;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Default number of entries kept on each stack.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// How a local change is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureDirective {
    /// Seal the open checkpoint and record this change as its own entry.
    #[default]
    Immediately,
    /// Coalesce into the open checkpoint (dragging, typing, resizing).
    Eventually,
    /// Do not record.
    Never,
}

/// Patches per element id.
pub type Delta = BTreeMap<ElementId, ElementPatch>;

/// State of the touched elements before or after a change.
///
/// Only elements the change touched need to be present. An id present in
/// `next` but absent from `prev` is an addition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub elements: BTreeMap<ElementId, Element>,
    pub selection: BTreeSet<ElementId>,
}

impl Snapshot {
    pub fn new(elements: impl IntoIterator<Item = Element>, selection: BTreeSet<ElementId>) -> Self {
        Self {
            elements: elements.into_iter().map(|el| (el.id.clone(), el)).collect(),
            selection,
        }
    }
}

/// One undoable step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryEntry {
    pub forward: Delta,
    pub inverse: Delta,
    pub selection_before: BTreeSet<ElementId>,
    pub selection_after: BTreeSet<ElementId>,
}

impl HistoryEntry {
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.inverse.is_empty()
    }

    /// Fold a later change into this entry: oldest inverse, newest forward.
    fn absorb(&mut self, later: HistoryEntry) {
        for (id, inverse) in later.inverse {
            let existing = self.inverse.entry(id).or_default();
            for (key, value) in inverse.iter() {
                if !existing.contains_key(key) {
                    existing.insert(key.clone(), value.clone());
                }
            }
        }
        for (id, forward) in later.forward {
            self.forward.entry(id).or_default().overlay(&forward);
        }
        self.selection_after = later.selection_after;
        self.prune();
    }

    /// Drop keys the merged change no longer alters.
    fn prune(&mut self) {
        let ids: Vec<ElementId> = self.forward.keys().cloned().collect();
        for id in ids {
            let (Some(forward), Some(inverse)) = (self.forward.get_mut(&id), self.inverse.get_mut(&id)) else {
                continue;
            };
            let unchanged: Vec<String> = forward
                .iter()
                .filter(|(key, value)| inverse.get(key) == Some(*value))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &unchanged {
                forward.remove(key);
                inverse.remove(key);
            }
            if forward.is_empty() && inverse.is_empty() {
                self.forward.remove(&id);
                self.inverse.remove(&id);
            }
        }
    }
}

/// What an undo or redo did to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Applied {
    /// Selection to restore.
    pub selection: BTreeSet<ElementId>,
    /// Elements that received a new version.
    pub changed: Vec<ElementId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

/// Bounded undo and redo stacks.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    /// The top undo entry still accepts `Eventually` changes.
    open: bool,
    max_depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            open: false,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Whether an `Eventually` checkpoint is still accepting changes.
    pub fn is_open(&self) -> bool {
        self.open && !self.undo_stack.is_empty()
    }

    /// Seal the open checkpoint.
    pub fn flush(&mut self) {
        self.open = false;
    }

    /// Drop both stacks.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.open = false;
    }

    /// Record the difference between two snapshots of the touched elements.
    pub fn record_change(&mut self, prev: &Snapshot, next: &Snapshot, directive: CaptureDirective) {
        if directive == CaptureDirective::Never {
            return;
        }
        if directive == CaptureDirective::Immediately {
            self.open = false;
        }

        let entry = diff_snapshots(prev, next);
        if entry.is_empty() {
            log::trace!("history: nothing to record");
            return;
        }
        self.redo_stack.clear();

        match directive {
            CaptureDirective::Eventually if self.is_open() => {
                if let Some(top) = self.undo_stack.back_mut() {
                    top.absorb(entry);
                    if top.is_empty() {
                        self.undo_stack.pop_back();
                        self.open = false;
                    }
                }
                log::trace!("history: merged into open checkpoint");
            }
            CaptureDirective::Eventually => {
                push_bounded(&mut self.undo_stack, entry, self.max_depth);
                self.open = true;
                log::debug!("history: opened checkpoint ({} entries)", self.undo_stack.len());
            }
            _ => {
                push_bounded(&mut self.undo_stack, entry, self.max_depth);
                log::debug!("history: recorded entry ({} entries)", self.undo_stack.len());
            }
        }
    }

    /// Revert the most recent entry. Returns `None` when there is nothing to
    /// undo, leaving the store untouched.
    pub fn undo(&mut self, store: &mut ElementStore, clock: &mut VersionClock) -> Option<Applied> {
        self.replay(Direction::Undo, store, clock)
    }

    /// Re-apply the most recently undone entry.
    pub fn redo(&mut self, store: &mut ElementStore, clock: &mut VersionClock) -> Option<Applied> {
        self.replay(Direction::Redo, store, clock)
    }

    fn replay(&mut self, direction: Direction, store: &mut ElementStore, clock: &mut VersionClock) -> Option<Applied> {
        self.open = false;
        loop {
            let entry = match direction {
                Direction::Undo => self.undo_stack.pop_back()?,
                Direction::Redo => self.redo_stack.pop_back()?,
            };
            let delta = match direction {
                Direction::Undo => &entry.inverse,
                Direction::Redo => &entry.forward,
            };

            let Some((changed, observed)) = apply_delta(delta, store, clock) else {
                log::debug!("history: {direction:?} entry has no visible effect, skipping");
                continue;
            };

            let applied_selection = match direction {
                Direction::Undo => entry.selection_before.clone(),
                Direction::Redo => entry.selection_after.clone(),
            };
            let counterpart = match direction {
                Direction::Undo => HistoryEntry {
                    forward: overlay_delta(entry.forward, &observed),
                    ..entry
                },
                Direction::Redo => HistoryEntry {
                    inverse: overlay_delta(entry.inverse, &observed),
                    ..entry
                },
            };
            match direction {
                Direction::Undo => push_bounded(&mut self.redo_stack, counterpart, self.max_depth),
                Direction::Redo => push_bounded(&mut self.undo_stack, counterpart, self.max_depth),
            }

            log::debug!("history: {direction:?} touched {} elements", changed.len());
            return Some(Applied {
                selection: applied_selection,
                changed,
            });
        }
    }
}

fn push_bounded(stack: &mut VecDeque<HistoryEntry>, entry: HistoryEntry, max_depth: usize) {
    stack.push_back(entry);
    while stack.len() > max_depth {
        stack.pop_front();
    }
}

fn overlay_delta(mut delta: Delta, observed: &Delta) -> Delta {
    for (id, patch) in observed {
        delta.entry(id.clone()).or_default().overlay(patch);
    }
    delta
}

/// Diff the touched elements. Elements whose stamps match are skipped.
fn diff_snapshots(prev: &Snapshot, next: &Snapshot) -> HistoryEntry {
    let mut entry = HistoryEntry {
        selection_before: prev.selection.clone(),
        selection_after: next.selection.clone(),
        ..HistoryEntry::default()
    };

    let ids: BTreeSet<&ElementId> = prev.elements.keys().chain(next.elements.keys()).collect();
    for id in ids {
        let patches = match (prev.elements.get(id), next.elements.get(id)) {
            (Some(before), Some(after)) => {
                if before.stamp() == after.stamp() {
                    continue;
                }
                ElementPatch::diff(before, after)
            }
            (None, Some(added)) => ElementPatch::full(added).map(|full| Some((full, ElementPatch::tombstone()))),
            (Some(removed), None) => ElementPatch::full(removed).map(|full| Some((ElementPatch::tombstone(), full))),
            (None, None) => continue,
        };
        match patches {
            Ok(Some((forward, inverse))) => {
                entry.forward.insert(id.clone(), forward);
                entry.inverse.insert(id.clone(), inverse);
            }
            Ok(None) => {}
            Err(err) => log::warn!("history: cannot diff {id}: {err}"),
        }
    }
    entry
}

/// Apply a delta to the store as local mutations.
///
/// Returns the ids that changed and the values they held before, or `None`
/// if the delta would not change any element.
fn apply_delta(delta: &Delta, store: &mut ElementStore, clock: &mut VersionClock) -> Option<(Vec<ElementId>, Delta)> {
    let mut updates: Vec<Element> = Vec::new();
    let mut observed = Delta::new();

    for (id, patch) in delta {
        let result = match store.get(id) {
            Some(current) => patch.apply(current).and_then(|mut next| {
                if next.content_eq(current) {
                    return Ok(None);
                }
                let before = ElementPatch::capture(current, patch.keys())?;
                next.version = current.version;
                next.version_nonce = current.version_nonce;
                next.updated = current.updated;
                clock.bump(&mut next);
                Ok(Some((next, before)))
            }),
            None => patch.build(id).map(|mut next| {
                clock.stamp_created(&mut next);
                Some((next, ElementPatch::tombstone()))
            }),
        };
        match result {
            Ok(Some((next, before))) => {
                observed.insert(id.clone(), before);
                updates.push(next);
            }
            Ok(None) => {}
            Err(err) => log::warn!("history: skipping patch for {id}: {err}"),
        }
    }

    if updates.is_empty() {
        return None;
    }
    let changed = updates.iter().map(|el| el.id.clone()).collect();
    for next in updates {
        store.upsert(next);
    }
    store.sort();
    Some((changed, observed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::ElementKind;

    fn el(id: &str, x: f64) -> Element {
        let mut el = Element::with_id(id, ElementKind::Ellipse, x, 0.0, 10.0, 10.0);
        el.version_nonce = 1;
        el.index = Some(id.to_uppercase());
        el
    }

    fn moved(prev: &Element, x: f64) -> Element {
        let mut next = prev.clone();
        next.x = x;
        next.version += 1;
        next.version_nonce += 1;
        next
    }

    fn snap(elements: &[&Element]) -> Snapshot {
        Snapshot::new(elements.iter().map(|el| (*el).clone()), BTreeSet::new())
    }

    #[test]
    fn test_immediately_records_separate_entries() {
        let mut history = History::default();
        let a0 = el("a", 0.0);
        let a1 = moved(&a0, 10.0);
        let a2 = moved(&a1, 20.0);
        history.record_change(&snap(&[&a0]), &snap(&[&a1]), CaptureDirective::Immediately);
        history.record_change(&snap(&[&a1]), &snap(&[&a2]), CaptureDirective::Immediately);
        assert_eq!(history.undo_len(), 2);
        assert!(!history.is_open());
    }

    #[test]
    fn test_eventually_coalesces_into_one_entry() {
        let mut history = History::default();
        let mut current = el("a", 0.0);
        for step in 1..=10 {
            let next = moved(&current, f64::from(step) * 5.0);
            history.record_change(&snap(&[&current]), &snap(&[&next]), CaptureDirective::Eventually);
            current = next;
        }
        assert_eq!(history.undo_len(), 1);

        let top = history.undo_stack.back().unwrap();
        let id = ElementId::from("a");
        assert_eq!(top.inverse[&id].get("x"), Some(&serde_json::json!(0.0)));
        assert_eq!(top.forward[&id].get("x"), Some(&serde_json::json!(50.0)));
    }

    #[test]
    fn test_immediately_seals_open_checkpoint() {
        let mut history = History::default();
        let a0 = el("a", 0.0);
        let a1 = moved(&a0, 1.0);
        let a2 = moved(&a1, 2.0);
        let a3 = moved(&a2, 3.0);
        history.record_change(&snap(&[&a0]), &snap(&[&a1]), CaptureDirective::Eventually);
        history.record_change(&snap(&[&a1]), &snap(&[&a2]), CaptureDirective::Immediately);
        history.record_change(&snap(&[&a2]), &snap(&[&a3]), CaptureDirective::Eventually);
        assert_eq!(history.undo_len(), 3);
    }

    #[test]
    fn test_merge_back_to_start_prunes_entry() {
        let mut history = History::default();
        let a0 = el("a", 0.0);
        let a1 = moved(&a0, 5.0);
        let a2 = moved(&a1, 0.0);
        history.record_change(&snap(&[&a0]), &snap(&[&a1]), CaptureDirective::Eventually);
        history.record_change(&snap(&[&a1]), &snap(&[&a2]), CaptureDirective::Eventually);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_never_and_version_only_changes_record_nothing() {
        let mut history = History::default();
        let a0 = el("a", 0.0);
        let a1 = moved(&a0, 5.0);
        history.record_change(&snap(&[&a0]), &snap(&[&a1]), CaptureDirective::Never);

        let mut bumped = a0.clone();
        bumped.version += 1;
        history.record_change(&snap(&[&a0]), &snap(&[&bumped]), CaptureDirective::Immediately);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_addition_inverse_is_tombstone() {
        let mut history = History::default();
        let a = el("a", 0.0);
        history.record_change(&snap(&[]), &snap(&[&a]), CaptureDirective::Immediately);
        let entry = history.undo_stack.back().unwrap();
        let id = ElementId::from("a");
        assert_eq!(entry.inverse[&id], ElementPatch::tombstone());
        assert!(entry.forward[&id].is_full());
    }

    #[test]
    fn test_undo_redo_bumps_versions() {
        let mut clock = VersionClock::seeded(5);
        let a0 = el("a", 0.0);
        let a1 = moved(&a0, 30.0);
        let mut store = ElementStore::from_elements(vec![a1.clone()]).unwrap();
        let mut history = History::default();
        history.record_change(&snap(&[&a0]), &snap(&[&a1]), CaptureDirective::Immediately);

        let applied = history.undo(&mut store, &mut clock).unwrap();
        assert_eq!(applied.changed, vec![ElementId::from("a")]);
        let undone = store.get(&"a".into()).unwrap().clone();
        assert!(undone.content_eq(&a0));
        assert_eq!(undone.version, a1.version + 1);
        assert!(history.can_redo());

        history.redo(&mut store, &mut clock).unwrap();
        let redone = store.get(&"a".into()).unwrap();
        assert!(redone.content_eq(&a1));
        assert_eq!(redone.version, a1.version + 2);
        assert!(!history.can_redo());
        assert!(history.can_undo());
    }

    #[test]
    fn test_undo_restores_z_order() {
        let mut clock = VersionClock::seeded(5);
        let a0 = el("a", 0.0);
        let b = el("b", 0.0);
        let mut a1 = moved(&a0, 0.0);
        a1.index = Some("C".to_string());
        let mut store = ElementStore::from_elements(vec![b.clone(), a1.clone()]).unwrap();
        let mut history = History::default();
        history.record_change(&snap(&[&a0]), &snap(&[&a1]), CaptureDirective::Immediately);
        assert_eq!(history.undo_len(), 1);

        history.undo(&mut store, &mut clock).unwrap();
        let ids: Vec<&str> = store.elements().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.get(&"a".into()).unwrap().index.as_deref(), Some("A"));

        history.redo(&mut store, &mut clock).unwrap();
        let ids: Vec<&str> = store.elements().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_underflow_leaves_store_unchanged() {
        let mut clock = VersionClock::seeded(5);
        let mut store = ElementStore::from_elements(vec![el("a", 0.0)]).unwrap();
        let before = store.clone();
        let mut history = History::default();
        assert!(history.undo(&mut store, &mut clock).is_none());
        assert!(history.redo(&mut store, &mut clock).is_none());
        assert_eq!(store, before);
    }

    #[test]
    fn test_undo_skips_entries_without_effect() {
        let mut clock = VersionClock::seeded(5);
        let a0 = el("a", 0.0);
        let a1 = moved(&a0, 10.0);
        let b0 = el("b", 0.0);
        let b1 = moved(&b0, 10.0);
        let mut history = History::default();
        history.record_change(&snap(&[&a0]), &snap(&[&a1]), CaptureDirective::Immediately);
        history.record_change(&snap(&[&b0]), &snap(&[&b1]), CaptureDirective::Immediately);

        // A remote peer already moved `b` back.
        let mut b_remote = moved(&b1, 0.0);
        b_remote.version += 5;
        let mut store = ElementStore::from_elements(vec![a1, b_remote.clone()]).unwrap();

        let applied = history.undo(&mut store, &mut clock).unwrap();
        assert_eq!(applied.changed, vec![ElementId::from("a")]);
        assert_eq!(store.get(&"b".into()), Some(&b_remote));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_new_entry_clears_redo() {
        let mut clock = VersionClock::seeded(5);
        let a0 = el("a", 0.0);
        let a1 = moved(&a0, 10.0);
        let mut store = ElementStore::from_elements(vec![a1.clone()]).unwrap();
        let mut history = History::default();
        history.record_change(&snap(&[&a0]), &snap(&[&a1]), CaptureDirective::Immediately);
        history.undo(&mut store, &mut clock).unwrap();
        assert!(history.can_redo());

        let current = store.get(&"a".into()).unwrap().clone();
        let next = moved(&current, 99.0);
        history.record_change(&snap(&[&current]), &snap(&[&next]), CaptureDirective::Immediately);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::new(3);
        let mut current = el("a", 0.0);
        for step in 1..=5 {
            let next = moved(&current, f64::from(step));
            history.record_change(&snap(&[&current]), &snap(&[&next]), CaptureDirective::Immediately);
            current = next;
        }
        assert_eq!(history.undo_len(), 3);
        let oldest = history.undo_stack.front().unwrap();
        assert_eq!(oldest.inverse[&ElementId::from("a")].get("x"), Some(&serde_json::json!(2.0)));
    }

    #[test]
    fn test_redo_recreates_missing_element_from_full_patch() {
        let mut clock = VersionClock::seeded(9);
        let a = el("a", 4.0);
        let mut history = History::default();
        history.record_change(&snap(&[]), &snap(&[&a]), CaptureDirective::Immediately);

        // Undoing an addition the store never saw has nothing to revert.
        let mut store = ElementStore::new();
        assert!(history.undo(&mut store, &mut clock).is_none());

        let mut store = ElementStore::from_elements(vec![a.clone()]).unwrap();
        history.record_change(&snap(&[]), &snap(&[&a]), CaptureDirective::Immediately);
        history.undo(&mut store, &mut clock).unwrap();
        assert!(store.get(&"a".into()).unwrap().is_deleted);

        let mut empty = ElementStore::new();
        history.redo(&mut empty, &mut clock).unwrap();
        let rebuilt = empty.get(&"a".into()).unwrap();
        assert!(rebuilt.is_visible());
        assert!((rebuilt.x - 4.0).abs() < f64::EPSILON);
        assert_eq!(rebuilt.version, 1);
    }
}
