//! The scene façade: the one place elements are read and written.
//!
//! A [`Scene`] owns its element store, history, version clock, selection and
//! observers. Scenes share nothing, so several documents can live side by
//! side in one process.

mod change;
pub mod observers;

pub use change::LocalChange;
pub use observers::{ChangeOrigin, Listener, Observers, SceneChange, SubscriptionId};

use crate::config::SceneConfig;
use crate::element::{Element, ElementId};
use crate::history::{Applied, CaptureDirective, History};
use crate::reconcile::{ReconcileOptions, ReconcileStats, reconcile_with};
use crate::store::{ElementStore, StoreError};
use crate::version::VersionClock;
use kurbo::Rect;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug)]
pub struct Scene {
    store: ElementStore,
    history: History,
    clock: VersionClock,
    selection: BTreeSet<ElementId>,
    observers: Observers,
    /// Element under an in-progress gesture; protected from remote updates.
    editing: Option<ElementId>,
    config: SceneConfig,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    pub fn with_config(config: SceneConfig) -> Self {
        let clock = match config.rng_seed {
            Some(seed) => VersionClock::seeded(seed),
            None => VersionClock::new(),
        };
        Self {
            store: ElementStore::new(),
            history: History::new(config.max_history_depth),
            clock,
            selection: BTreeSet::new(),
            observers: Observers::default(),
            editing: None,
            config,
        }
    }

    /// Load a persisted element list. Versioning fields are kept verbatim.
    pub fn from_elements(elements: Vec<Element>, config: SceneConfig) -> Result<Self, StoreError> {
        let mut scene = Self::with_config(config);
        scene.store = ElementStore::from_elements(elements)?;
        Ok(scene)
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    // --- reads ---

    /// All elements in z-order, tombstones included.
    pub fn elements(&self) -> &[Element] {
        self.store.elements()
    }

    pub fn visible_elements(&self) -> impl Iterator<Item = &Element> {
        self.store.visible()
    }

    pub fn get(&self, id: &ElementId) -> Option<&Element> {
        self.store.get(id)
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    pub fn selection(&self) -> &BTreeSet<ElementId> {
        &self.selection
    }

    pub fn scene_version(&self) -> u64 {
        self.store.scene_version()
    }

    /// Union of the bounds of every visible element.
    pub fn bounds(&self) -> Option<Rect> {
        self.store.visible().map(Element::bounds).reduce(|acc, r| acc.union(r))
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn editing(&self) -> Option<&ElementId> {
        self.editing.as_ref()
    }

    // --- writes ---

    /// Run a local edit.
    ///
    /// Every element the closure touches is stamped once, the diff is
    /// recorded according to `directive`, and observers hear about it once.
    pub fn apply_local_change<R>(
        &mut self,
        directive: CaptureDirective,
        f: impl FnOnce(&mut LocalChange<'_>) -> R,
    ) -> R {
        let mut change = LocalChange::new(&mut self.store, &mut self.selection);
        let result = f(&mut change);
        let finished = change.finish(&mut self.clock);

        self.history.record_change(&finished.prev, &finished.next, directive);
        if !finished.changed.is_empty() {
            log::debug!("local change touched {} elements ({directive:?})", finished.changed.len());
            self.notify(ChangeOrigin::Local, finished.changed);
        }
        result
    }

    /// Merge elements received from a peer. History is not touched.
    pub fn apply_remote_update(&mut self, remote: &[Element]) -> ReconcileStats {
        let options = ReconcileOptions {
            protected: self.editing.iter().cloned().collect::<HashSet<_>>(),
        };
        let result = reconcile_with(self.store.elements(), remote, &options);
        if !result.stats.changed() {
            return result.stats;
        }

        self.store = ElementStore::from_reconciled(result.elements);
        let store = &self.store;
        self.selection
            .retain(|id| store.get(id).is_some_and(Element::is_visible));
        self.notify(ChangeOrigin::Remote, result.changed);
        result.stats
    }

    /// Undo the latest local entry. Returns `false` when there is nothing
    /// to undo.
    pub fn undo(&mut self) -> bool {
        let applied = self.history.undo(&mut self.store, &mut self.clock);
        self.finish_replay(applied)
    }

    pub fn redo(&mut self) -> bool {
        let applied = self.history.redo(&mut self.store, &mut self.clock);
        self.finish_replay(applied)
    }

    fn finish_replay(&mut self, applied: Option<Applied>) -> bool {
        let Some(applied) = applied else {
            return false;
        };
        let store = &self.store;
        self.selection = applied
            .selection
            .into_iter()
            .filter(|id| store.get(id).is_some_and(Element::is_visible))
            .collect();
        self.notify(ChangeOrigin::History, applied.changed);
        true
    }

    /// Seal the open `Eventually` checkpoint, e.g. on pointer up.
    pub fn flush(&mut self) {
        self.history.flush();
    }

    /// Replace the whole scene, clearing history and selection.
    pub fn replace_all(&mut self, elements: Vec<Element>) -> Result<(), StoreError> {
        self.store = ElementStore::from_elements(elements)?;
        self.history.clear();
        self.selection.clear();
        self.editing = None;
        log::info!("scene reset with {} elements", self.store.len());
        self.notify(ChangeOrigin::Reset, Vec::new());
        Ok(())
    }

    /// Mark the element under an in-progress gesture. Remote copies of it are
    /// ignored until the mark is cleared.
    pub fn set_editing(&mut self, id: Option<ElementId>) {
        self.editing = id;
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&SceneChange) + 'static) -> SubscriptionId {
        self.observers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn notify(&mut self, origin: ChangeOrigin, changed: Vec<ElementId>) {
        let change = SceneChange {
            origin,
            changed,
            scene_version: self.store.scene_version(),
        };
        self.observers.notify(&change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Corners, ElementKind};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn scene() -> Scene {
        Scene::with_config(SceneConfig::seeded(11))
    }

    fn rect(id: &str) -> Element {
        Element::with_id(id, ElementKind::Rectangle(Corners::default()), 0.0, 0.0, 100.0, 50.0)
    }

    fn add(scene: &mut Scene, id: &str) -> ElementId {
        scene.apply_local_change(CaptureDirective::Immediately, |c| c.insert(rect(id)).unwrap())
    }

    #[test]
    fn test_insert_stamps_version_one() {
        let mut scene = scene();
        let id = add(&mut scene, "a");
        let el = scene.get(&id).unwrap();
        assert_eq!(el.version, 1);
        assert!(el.updated > 0);
        assert!(scene.can_undo());
    }

    #[test]
    fn test_each_touched_element_bumped_once() {
        let mut scene = scene();
        add(&mut scene, "a");
        add(&mut scene, "b");
        let a: ElementId = "a".into();
        let b: ElementId = "b".into();

        scene.apply_local_change(CaptureDirective::Immediately, |c| {
            for _ in 0..5 {
                c.mutate(&a, |el| el.x += 1.0);
            }
            c.mutate(&b, |el| el.y += 1.0);
        });
        assert_eq!(scene.get(&a).unwrap().version, 2);
        assert_eq!(scene.get(&b).unwrap().version, 2);
    }

    #[test]
    fn test_noop_mutation_keeps_version() {
        let mut scene = scene();
        let id = add(&mut scene, "a");
        let before = scene.get(&id).unwrap().clone();
        let undo_len = scene.history().undo_len();
        scene.apply_local_change(CaptureDirective::Immediately, |c| {
            c.mutate(&id, |el| {
                el.x += 5.0;
                el.x -= 5.0;
                el.version = 999;
            });
        });
        assert_eq!(scene.get(&id), Some(&before));
        assert_eq!(scene.history().undo_len(), undo_len);
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut scene = scene();
        let id = add(&mut scene, "a");
        scene.apply_local_change(CaptureDirective::Immediately, |c| {
            c.mutate(&id, |el| el.x = 40.0);
        });
        let after = scene.get(&id).unwrap().clone();

        assert!(scene.undo());
        assert!((scene.get(&id).unwrap().x - 0.0).abs() < f64::EPSILON);
        assert!(scene.get(&id).unwrap().version > after.version);

        assert!(scene.redo());
        let redone = scene.get(&id).unwrap();
        assert!(redone.content_eq(&after));
        assert!(redone.version > after.version);
    }

    #[test]
    fn test_undo_of_insert_tombstones() {
        let mut scene = scene();
        let id = add(&mut scene, "a");
        assert!(scene.undo());
        assert!(scene.get(&id).unwrap().is_deleted);
        assert_eq!(scene.visible_elements().count(), 0);
        assert!(!scene.undo());
    }

    #[test]
    fn test_remote_update_bypasses_history() {
        let mut scene = scene();
        let mut remote = rect("r");
        remote.version = 3;
        let stats = scene.apply_remote_update(&[remote]);
        assert_eq!(stats.inserted, 1);
        assert!(!scene.can_undo());
        assert_eq!(scene.elements().len(), 1);
    }

    #[test]
    fn test_remote_update_skips_element_being_edited() {
        let mut scene = scene();
        let id = add(&mut scene, "a");
        scene.set_editing(Some(id.clone()));

        let mut remote = scene.get(&id).unwrap().clone();
        remote.version = 50;
        remote.x = 999.0;
        scene.apply_remote_update(&[remote.clone()]);
        assert!((scene.get(&id).unwrap().x - 0.0).abs() < f64::EPSILON);

        scene.set_editing(None);
        scene.apply_remote_update(&[remote]);
        assert!((scene.get(&id).unwrap().x - 999.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_remote_delete_prunes_selection() {
        let mut scene = scene();
        let id = add(&mut scene, "a");
        scene.apply_local_change(CaptureDirective::Never, |c| c.select([id.clone()]));
        assert!(scene.selection().contains(&id));

        let mut remote = scene.get(&id).unwrap().clone();
        remote.version += 1;
        remote.is_deleted = true;
        scene.apply_remote_update(&[remote]);
        assert!(scene.selection().is_empty());
    }

    #[test]
    fn test_undo_restores_selection() {
        let mut scene = scene();
        let a = add(&mut scene, "a");
        scene.apply_local_change(CaptureDirective::Immediately, |c| {
            c.select([a.clone()]);
            c.mutate(&a, |el| el.width = 10.0);
        });
        scene.apply_local_change(CaptureDirective::Immediately, |c| {
            c.select([]);
            c.mutate(&a, |el| el.width = 20.0);
        });
        assert!(scene.selection().is_empty());
        assert!(scene.undo());
        assert_eq!(scene.selection(), &BTreeSet::from([a]));
    }

    #[test]
    fn test_observers_fire_once_per_change() {
        let mut scene = scene();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let sub = scene.subscribe(move |change| sink.borrow_mut().push(change.clone()));

        let id = add(&mut scene, "a");
        scene.apply_local_change(CaptureDirective::Never, |c| c.select([id.clone()]));
        scene.undo();

        {
            let seen = seen.borrow();
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[0].origin, ChangeOrigin::Local);
            assert_eq!(seen[0].changed, vec![id.clone()]);
            assert_eq!(seen[1].origin, ChangeOrigin::History);
            assert_eq!(seen[1].scene_version, scene.scene_version());
        }

        assert!(scene.unsubscribe(sub));
        add(&mut scene, "b");
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_replace_all_resets_history() {
        let mut scene = scene();
        add(&mut scene, "a");
        scene.replace_all(vec![rect("x"), rect("y")]).unwrap();
        assert!(!scene.can_undo());
        assert_eq!(scene.elements().len(), 2);

        let err = scene.replace_all(vec![rect("x"), rect("x")]).unwrap_err();
        assert_eq!(err, StoreError::DuplicateId("x".into()));
    }

    #[test]
    fn test_move_to_front_bumps_version() {
        let mut scene = scene();
        let a = add(&mut scene, "a");
        add(&mut scene, "b");
        scene.apply_local_change(CaptureDirective::Immediately, |c| c.move_to_front(&a));
        let ids: Vec<&str> = scene.elements().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(scene.get(&a).unwrap().version, 2);

        // Already on top: nothing to record.
        let undo_len = scene.history().undo_len();
        scene.apply_local_change(CaptureDirective::Immediately, |c| c.move_to_front(&a));
        assert_eq!(scene.get(&a).unwrap().version, 2);
        assert_eq!(scene.history().undo_len(), undo_len);
    }

    #[test]
    fn test_reorder_is_its_own_undo_step() {
        let mut scene = scene();
        let a = add(&mut scene, "a");
        let b = add(&mut scene, "b");
        scene.apply_local_change(CaptureDirective::Immediately, |c| c.move_to_back(&b));
        assert_eq!(scene.history().undo_len(), 3);

        assert!(scene.undo());
        let ids: Vec<&str> = scene.elements().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(scene.get(&b).is_some_and(Element::is_visible));
        assert!(scene.get(&a).is_some_and(Element::is_visible));

        assert!(scene.redo());
        let ids: Vec<&str> = scene.elements().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_bounds_cover_visible_elements() {
        let mut scene = scene();
        assert!(scene.bounds().is_none());
        let a = add(&mut scene, "a");
        let b = add(&mut scene, "b");
        scene.apply_local_change(CaptureDirective::Immediately, |c| {
            c.mutate(&b, |el| el.translate(200.0, 100.0));
        });
        let bounds = scene.bounds().unwrap();
        assert!((bounds.x1 - 300.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 150.0).abs() < f64::EPSILON);

        scene.apply_local_change(CaptureDirective::Immediately, |c| c.delete(&b));
        assert_eq!(scene.bounds(), Some(scene.get(&a).unwrap().bounds()));
    }
}
