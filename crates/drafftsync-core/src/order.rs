//! Z-order keys.
//!
//! Every element carries an `index`: a base-62 fraction (`"V"` reads as
//! 0.V) that sorts lexicographically. Scenes are ordered by `(index, id)`, so
//! any two peers holding the same elements hold them in the same order, and
//! moving an element is an ordinary versioned field change.
//!
//! Keys never end in `'0'`, which leaves room to generate a key below any
//! existing one.

use crate::element::Element;
use std::cmp::Ordering;

const DIGITS: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn digit_value(c: u8) -> Option<usize> {
    DIGITS.iter().position(|&d| d == c)
}

/// Whether `key` is a well-formed order key.
pub fn is_valid(key: &str) -> bool {
    !key.is_empty() && !key.ends_with('0') && key.bytes().all(|c| digit_value(c).is_some())
}

/// Scene order: by index, then by id. Elements without an index sort first.
pub fn compare(a: &Element, b: &Element) -> Ordering {
    let key_a = a.index.as_deref().unwrap_or("");
    let key_b = b.index.as_deref().unwrap_or("");
    key_a.cmp(key_b).then_with(|| a.id.cmp(&b.id))
}

pub fn is_sorted(elements: &[Element]) -> bool {
    elements.windows(2).all(|pair| compare(&pair[0], &pair[1]) != Ordering::Greater)
}

/// A key strictly between `lower` and `upper`; `None` bounds are open.
///
/// Returns `None` when a bound is malformed or `lower >= upper`.
pub fn key_between(lower: Option<&str>, upper: Option<&str>) -> Option<String> {
    if lower.is_some_and(|k| !is_valid(k)) || upper.is_some_and(|k| !is_valid(k)) {
        return None;
    }
    if let (Some(lower), Some(upper)) = (lower, upper) {
        if lower >= upper {
            return None;
        }
    }
    let key = midpoint(lower.unwrap_or("").as_bytes(), upper.map(str::as_bytes));
    Some(key.into_iter().map(char::from).collect())
}

/// A key above every valid key in `elements`.
pub fn key_above<'a>(elements: impl IntoIterator<Item = &'a Element>) -> String {
    let top = elements
        .into_iter()
        .filter_map(|el| el.index.as_deref())
        .filter(|k| is_valid(k))
        .max();
    midpoint(top.unwrap_or("").as_bytes(), None)
        .into_iter()
        .map(char::from)
        .collect()
}

/// A key below every valid key in `elements`.
pub fn key_below<'a>(elements: impl IntoIterator<Item = &'a Element>) -> String {
    let bottom = elements
        .into_iter()
        .filter_map(|el| el.index.as_deref())
        .filter(|k| is_valid(k))
        .min();
    midpoint(b"", bottom.map(str::as_bytes))
        .into_iter()
        .map(char::from)
        .collect()
}

/// Digits strictly between `a` and `b`. `a` may be empty (zero), `None` for
/// `b` means one. Requires `a < b` and well-formed inputs.
fn midpoint(a: &[u8], b: Option<&[u8]>) -> Vec<u8> {
    if let Some(b) = b {
        // Strip the common prefix, reading missing digits of `a` as zero.
        let mut n = 0;
        while n < b.len() && a.get(n).copied().unwrap_or(DIGITS[0]) == b[n] {
            n += 1;
        }
        if n > 0 {
            let mut out = b[..n].to_vec();
            out.extend(midpoint(a.get(n..).unwrap_or(&[]), Some(&b[n..])));
            return out;
        }
    }

    let digit_a = a.first().and_then(|&c| digit_value(c)).unwrap_or(0);
    let digit_b = b
        .and_then(|b| b.first())
        .and_then(|&c| digit_value(c))
        .unwrap_or(DIGITS.len());

    if digit_b - digit_a > 1 {
        return vec![DIGITS[(digit_a + digit_b + 1) / 2]];
    }
    match b {
        Some(b) if b.len() > 1 => vec![b[0]],
        _ => {
            let mut out = vec![DIGITS[digit_a]];
            out.extend(midpoint(a.get(1..).unwrap_or(&[]), None));
            out
        }
    }
}

/// Give every element a valid index, strictly increasing in slice order.
///
/// Elements that already fit are left alone. Returns how many were rewritten.
/// The result depends only on the input sequence, so peers loading the same
/// document agree on the keys.
pub fn fix_indices(elements: &mut [Element]) -> usize {
    let mut lower: Option<String> = None;
    let mut fixed = 0;

    for pos in 0..elements.len() {
        let fits = |key: &str| is_valid(key) && lower.as_deref().is_none_or(|low| key > low);
        if elements[pos].index.as_deref().is_some_and(fits) {
            lower = elements[pos].index.clone();
            continue;
        }

        let upper = elements[pos + 1..]
            .iter()
            .filter_map(|el| el.index.as_deref())
            .find(|key| fits(*key));
        let key = key_between(lower.as_deref(), upper).or_else(|| key_between(lower.as_deref(), None));
        if let Some(key) = key {
            elements[pos].index = Some(key.clone());
            lower = Some(key);
            fixed += 1;
        }
    }
    fixed
}
