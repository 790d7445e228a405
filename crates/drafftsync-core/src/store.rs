//! Canonical ordered element storage.

use crate::element::{Element, ElementId};
use crate::order;
use crate::version;
use std::collections::HashMap;
use thiserror::Error;

/// Store invariant violations. These are programmer errors, not remote-data
/// problems: the reconciler never produces them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate element id: {0}")]
    DuplicateId(ElementId),
}

/// Ordered elements (z-order, back to front) with an id index.
///
/// Exactly one element per id; tombstoned elements are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementStore {
    elements: Vec<Element>,
    index: HashMap<ElementId, usize>,
}

impl ElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a locally supplied list. Duplicate ids are rejected.
    ///
    /// Missing or out-of-order z-order keys are rewritten so the list order
    /// is kept; the rewrite is not a versioned change.
    pub fn from_elements(mut elements: Vec<Element>) -> Result<Self, StoreError> {
        let mut index = HashMap::with_capacity(elements.len());
        for (pos, el) in elements.iter().enumerate() {
            if index.insert(el.id.clone(), pos).is_some() {
                return Err(StoreError::DuplicateId(el.id.clone()));
            }
        }
        let fixed = order::fix_indices(&mut elements);
        if fixed > 0 {
            log::debug!("assigned z-order keys to {fixed} of {} elements", elements.len());
        }
        Ok(Self { elements, index })
    }

    /// Build a store from reconciler output, which is unique and sorted by
    /// construction.
    pub(crate) fn from_reconciled(elements: Vec<Element>) -> Self {
        let index: HashMap<ElementId, usize> = elements
            .iter()
            .enumerate()
            .map(|(pos, el)| (el.id.clone(), pos))
            .collect();
        debug_assert_eq!(index.len(), elements.len(), "reconciled scene contains duplicate ids");
        debug_assert!(order::is_sorted(&elements), "reconciled scene is out of order");
        Self { elements, index }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, id: &ElementId) -> Option<&Element> {
        self.index.get(id).map(|&pos| &self.elements[pos])
    }

    pub(crate) fn get_mut(&mut self, id: &ElementId) -> Option<&mut Element> {
        self.index.get(id).map(|&pos| &mut self.elements[pos])
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.index.contains_key(id)
    }

    /// Position of an element in z-order.
    pub fn position(&self, id: &ElementId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// All elements, tombstones included, in z-order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Non-deleted elements in z-order.
    pub fn visible(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|el| el.is_visible())
    }

    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }

    pub fn scene_version(&self) -> u64 {
        version::scene_version(&self.elements)
    }

    /// Append an element. The caller gives it a key above the current top.
    pub fn insert(&mut self, element: Element) -> Result<(), StoreError> {
        if self.index.contains_key(&element.id) {
            return Err(StoreError::DuplicateId(element.id));
        }
        self.index.insert(element.id.clone(), self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    /// Replace the element with the same id in place, returning the old copy.
    /// Unknown ids are appended and return `None`. Call [`Self::sort`] once
    /// the batch is done if any key changed.
    pub fn upsert(&mut self, element: Element) -> Option<Element> {
        match self.index.get(&element.id) {
            Some(&pos) => Some(std::mem::replace(&mut self.elements[pos], element)),
            None => {
                self.index.insert(element.id.clone(), self.elements.len());
                self.elements.push(element);
                None
            }
        }
    }

    /// Restore `(index, id)` order after z-order keys changed.
    pub(crate) fn sort(&mut self) {
        if order::is_sorted(&self.elements) {
            return;
        }
        self.elements.sort_by(order::compare);
        for (pos, el) in self.elements.iter().enumerate() {
            self.index.insert(el.id.clone(), pos);
        }
    }
}
