//! Merge a remote element list into the local one.
//!
//! For every id the result holds whichever copy wins under
//! [`version::wins`](crate::version::wins). The merged list is then put in
//! `(index, id)` order (see [`crate::order`]): a remote element lands next
//! to the elements it followed on the sending peer, and a winning reorder
//! moves the element locally too.
//!
//! Both the winner and the order depend only on element contents, so
//! delivering the same remote lists twice or in a different order yields the
//! same scene.

use crate::element::{Element, ElementId};
use crate::order;
use crate::version;
use std::collections::{HashMap, HashSet};

/// Knobs for [`reconcile_with`].
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Ids the local user is editing right now. Remote copies of these are
    /// discarded whatever their version; the local edit re-broadcasts with a
    /// higher version once the gesture ends.
    pub protected: HashSet<ElementId>,
}

/// Counters describing what a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Remote elements unknown locally.
    pub inserted: usize,
    /// Local elements replaced by a winning remote copy.
    pub replaced: usize,
    /// Remote copies that lost to the local one.
    pub kept_local: usize,
    /// Remote copies identical in version to the local one.
    pub unchanged: usize,
}

impl ReconcileStats {
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.replaced > 0
    }
}

/// Result of [`reconcile_with`].
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub elements: Vec<Element>,
    pub stats: ReconcileStats,
    /// Ids whose stored copy changed, in remote order.
    pub changed: Vec<ElementId>,
}

/// Merge `remote` into `local` with default options.
pub fn reconcile(local: &[Element], remote: &[Element]) -> Vec<Element> {
    reconcile_with(local, remote, &ReconcileOptions::default()).elements
}

/// Where a remote element id was settled.
enum Slot {
    /// Replacement for the local element at this position.
    Local(usize),
    /// Index into the new elements.
    Insert(usize),
}

pub fn reconcile_with(local: &[Element], remote: &[Element], options: &ReconcileOptions) -> Reconciliation {
    let local_index: HashMap<&ElementId, usize> =
        local.iter().enumerate().map(|(pos, el)| (&el.id, pos)).collect();

    let mut stats = ReconcileStats::default();
    let mut changed = Vec::new();
    // Winning remote copies of local elements, by local position.
    let mut replacements: HashMap<usize, &Element> = HashMap::new();
    // Remote-only elements, in remote order.
    let mut inserts: Vec<&Element> = Vec::new();
    let mut seen: HashMap<&ElementId, Slot> = HashMap::new();

    for r in remote {
        match seen.get(&r.id) {
            Some(Slot::Local(pos)) => {
                // Duplicate id inside one remote list: same rule again.
                let pos = *pos;
                let current = replacements.get(&pos).copied().unwrap_or(&local[pos]);
                if !options.protected.contains(&r.id) && version::wins(r, current) {
                    if !replacements.contains_key(&pos) {
                        stats.replaced += 1;
                        changed.push(r.id.clone());
                    }
                    replacements.insert(pos, r);
                }
                continue;
            }
            Some(Slot::Insert(i)) => {
                let i = *i;
                if version::wins(r, inserts[i]) {
                    inserts[i] = r;
                }
                continue;
            }
            None => {}
        }

        match local_index.get(&r.id) {
            Some(&pos) => {
                let l = &local[pos];
                if options.protected.contains(&r.id) {
                    log::trace!("reconcile: {} is being edited locally, keeping local copy", r.id);
                    stats.kept_local += 1;
                } else {
                    match version::compare(r, l) {
                        std::cmp::Ordering::Greater => {
                            log::trace!(
                                "reconcile: {} remote {:?} beats local {:?}",
                                r.id,
                                r.stamp(),
                                l.stamp()
                            );
                            replacements.insert(pos, r);
                            stats.replaced += 1;
                            changed.push(r.id.clone());
                        }
                        std::cmp::Ordering::Equal => stats.unchanged += 1,
                        std::cmp::Ordering::Less => stats.kept_local += 1,
                    }
                }
                seen.insert(&r.id, Slot::Local(pos));
            }
            None => {
                seen.insert(&r.id, Slot::Insert(inserts.len()));
                inserts.push(r);
                stats.inserted += 1;
                changed.push(r.id.clone());
            }
        }
    }

    let mut elements: Vec<Element> = local
        .iter()
        .enumerate()
        .map(|(pos, l)| replacements.get(&pos).copied().unwrap_or(l).clone())
        .chain(inserts.into_iter().cloned())
        .collect();
    // A sorted local scene plus a few arrivals is nearly sorted already.
    elements.sort_by(order::compare);

    log::debug!(
        "reconciled {} remote elements: {} inserted, {} replaced, {} kept local, {} unchanged",
        remote.len(),
        stats.inserted,
        stats.replaced,
        stats.kept_local,
        stats.unchanged
    );

    Reconciliation {
        elements,
        stats,
        changed,
    }
}
