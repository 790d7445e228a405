//! Per-element logical versioning.
//!
//! Two candidate states of the same element are ordered by
//! `(version, versionNonce)`. No peer identity or wall-clock time takes part,
//! so every peer picks the same winner for the same pair of candidates.

use crate::element::Element;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Nonces are drawn from `0..NONCE_BOUND` (31 bits).
pub const NONCE_BOUND: u32 = 1 << 31;

/// Total order over candidate states of one element.
///
/// `Equal` means the two states are the same version (an echo of our own
/// broadcast, or a relayed duplicate).
pub fn compare(a: &Element, b: &Element) -> Ordering {
    a.stamp().cmp(&b.stamp())
}

/// Whether `candidate` replaces `current` in a merge.
pub fn wins(candidate: &Element, current: &Element) -> bool {
    compare(candidate, current) == Ordering::Greater
}

/// Cheap change detector over a whole scene: the wrapping sum of versions.
pub fn scene_version<'a>(elements: impl IntoIterator<Item = &'a Element>) -> u64 {
    elements
        .into_iter()
        .fold(0u64, |acc, el| acc.wrapping_add(u64::from(el.version)))
}

/// Stamps versions, nonces and timestamps onto mutated elements.
///
/// Each scene owns one clock. Tests seed it to make nonces reproducible.
pub struct VersionClock {
    rng: StdRng,
    last_updated: u64,
}

impl VersionClock {
    /// A clock seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            last_updated: 0,
        }
    }

    /// A deterministic clock for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            last_updated: 0,
        }
    }

    /// Draw a fresh 31-bit nonce.
    pub fn next_nonce(&mut self) -> u32 {
        self.rng.random_range(0..NONCE_BOUND)
    }

    /// Local millisecond timestamp, never going backwards for this clock.
    pub fn now(&mut self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last_updated = self.last_updated.max(wall);
        self.last_updated
    }

    /// Record a mutation: `version + 1`, fresh nonce, new timestamp.
    pub fn bump(&mut self, element: &mut Element) {
        element.version = element.version.saturating_add(1);
        element.version_nonce = self.next_nonce();
        element.updated = self.now();
    }

    /// Stamp an element entering the scene for the first time.
    ///
    /// Creation keeps the element's version (1 for fresh elements) and only
    /// draws the nonce and timestamp.
    pub fn stamp_created(&mut self, element: &mut Element) {
        element.version = element.version.max(1);
        element.version_nonce = self.next_nonce();
        element.updated = self.now();
    }
}

impl Default for VersionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VersionClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionClock")
            .field("last_updated", &self.last_updated)
            .finish_non_exhaustive()
    }
}
