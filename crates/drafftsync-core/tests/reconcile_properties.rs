//! Property tests for reconciliation.
//!
//! 1. The merged scene, order included, does not depend on delivery order
//! 2. Re-delivering the same update changes nothing
//! 3. The highest `(version, versionNonce)` copy of every id survives
//! 4. Equal versions are settled by nonce alone
//! 5. The merged scene is in order-key order

use std::collections::{BTreeMap, HashSet};

use drafftsync_core::{Element, ElementId, ElementKind, order, reconcile};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

const KEY_DIGITS: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Element contents derive from the stamp, so equal stamps mean equal
/// elements, as they do between real peers.
fn element(id: u8, version: u32, nonce: u32) -> Element {
    let mut el = Element::with_id(
        format!("e{id}"),
        ElementKind::Ellipse,
        f64::from(version * 10 + nonce),
        f64::from(nonce),
        10.0,
        10.0,
    );
    el.version = version;
    el.version_nonce = nonce;
    el.is_deleted = (version + nonce) % 3 == 0;
    // Single-digit keys collide often, which exercises the id tie-break.
    let digit = (version * 7 + nonce * 3 + u32::from(id)) % 61 + 1;
    el.index = Some(KEY_DIGITS[digit as usize..=digit as usize].to_string());
    el
}

fn element_strategy() -> impl Strategy<Value = Element> {
    (0u8..8, 1u32..6, 0u32..4).prop_map(|(id, v, n)| element(id, v, n))
}

/// A remote snapshot. May repeat ids.
fn remote_strategy() -> impl Strategy<Value = Vec<Element>> {
    prop::collection::vec(element_strategy(), 0..10)
}

/// A local scene: unique ids, stored in scene order.
fn local_strategy() -> impl Strategy<Value = Vec<Element>> {
    remote_strategy().prop_map(|elements| {
        let mut seen = HashSet::new();
        let mut local: Vec<Element> = elements.into_iter().filter(|el| seen.insert(el.id.clone())).collect();
        local.sort_by(order::compare);
        local
    })
}

fn by_id(elements: &[Element]) -> BTreeMap<ElementId, Element> {
    elements.iter().map(|el| (el.id.clone(), el.clone())).collect()
}

fn best_stamp(id: &ElementId, lists: &[&[Element]]) -> Option<(u32, u32)> {
    lists
        .iter()
        .flat_map(|list| list.iter())
        .filter(|el| &el.id == id)
        .map(Element::stamp)
        .max()
}

// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn delivery_order_does_not_change_the_scene(
        local in local_strategy(),
        r1 in remote_strategy(),
        r2 in remote_strategy(),
    ) {
        let one_then_two = reconcile(&reconcile(&local, &r1), &r2);
        let two_then_one = reconcile(&reconcile(&local, &r2), &r1);
        prop_assert_eq!(one_then_two, two_then_one);
    }

    #[test]
    fn redelivery_is_a_no_op(local in local_strategy(), remote in remote_strategy()) {
        let once = reconcile(&local, &remote);
        let twice = reconcile(&once, &remote);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn highest_stamp_survives(local in local_strategy(), remote in remote_strategy()) {
        let merged = reconcile(&local, &remote);

        let ids: HashSet<&ElementId> = merged.iter().map(|el| &el.id).collect();
        prop_assert_eq!(ids.len(), merged.len(), "duplicate ids in merged scene");

        let expected: HashSet<&ElementId> = local.iter().chain(remote.iter()).map(|el| &el.id).collect();
        prop_assert_eq!(&ids, &expected);

        for el in &merged {
            prop_assert_eq!(Some(el.stamp()), best_stamp(&el.id, &[&local, &remote]));
        }
    }

    #[test]
    fn equal_versions_settle_on_nonce(version in 1u32..100, a in 0u32..1000, b in 0u32..1000) {
        prop_assume!(a != b);
        let mut first = element(0, 1, 0);
        first.version = version;
        first.version_nonce = a;
        let mut second = first.clone();
        second.version_nonce = b;
        second.x += 1.0;

        let winner = if a > b { &first } else { &second };
        prop_assert_eq!(&reconcile(&[first.clone()], &[second.clone()])[0], winner);
        prop_assert_eq!(&reconcile(&[second.clone()], &[first.clone()])[0], winner);
    }

    #[test]
    fn merged_scene_is_in_key_order(local in local_strategy(), remote in remote_strategy()) {
        let merged = reconcile(&local, &remote);
        prop_assert!(order::is_sorted(&merged));
        let merged_by_id = by_id(&merged);

        // Local elements no remote copy displaced keep their relative order.
        let untouched: Vec<&ElementId> = local
            .iter()
            .filter(|el| merged_by_id.get(&el.id) == Some(el))
            .map(|el| &el.id)
            .collect();
        let kept: Vec<&ElementId> = merged.iter().map(|el| &el.id).filter(|id| untouched.contains(id)).collect();
        prop_assert_eq!(kept, untouched);
    }
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[test]
fn higher_version_wins_regardless_of_nonce() {
    let mut local = Element::with_id("a", ElementKind::Ellipse, 0.0, 0.0, 1.0, 1.0);
    local.version = 1;
    local.version_nonce = 5;
    let mut remote = local.clone();
    remote.version = 2;
    remote.version_nonce = 1;
    remote.x = 10.0;

    assert_eq!(reconcile(&[local], &[remote.clone()]), vec![remote]);
}

#[test]
fn concurrent_inserts_converge_on_one_order() {
    let mut a = Element::with_id("a", ElementKind::Ellipse, 0.0, 0.0, 1.0, 1.0);
    a.index = Some("V".into());
    let mut x = Element::with_id("x", ElementKind::Ellipse, 0.0, 0.0, 1.0, 1.0);
    x.index = Some("l".into());
    let mut y = x.clone();
    y.id = "y".into();

    let base = vec![a.clone()];
    let from_x = vec![a.clone(), x];
    let from_y = vec![a, y];
    let one = reconcile(&reconcile(&base, &from_x), &from_y);
    let two = reconcile(&reconcile(&base, &from_y), &from_x);
    assert_eq!(one, two);
}

#[test]
fn equal_version_keeps_higher_local_nonce() {
    let mut local = Element::with_id("a", ElementKind::Ellipse, 0.0, 0.0, 1.0, 1.0);
    local.version = 3;
    local.version_nonce = 9;
    let mut remote = local.clone();
    remote.version_nonce = 2;
    remote.x = 10.0;

    assert_eq!(reconcile(&[local.clone()], &[remote]), vec![local]);
}
