//! Broadcast bookkeeping between a local scene and its peers.
//!
//! The manager decides what to send: incremental `scene_update` messages
//! carry only elements whose version advanced since they were last sent or
//! received, and a periodic `scene_init` carries everything so that peers
//! that missed an update still converge. Delivery is somebody else's job;
//! queued messages are drained with [`CollaborationManager::take_outgoing`].

use crate::config::CollaborationConfig;
use crate::element::ElementId;
use crate::reconcile::ReconcileStats;
use crate::scene::Scene;
use crate::sync::{SyncError, SyncMessage};
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug)]
pub struct CollaborationManager {
    config: CollaborationConfig,
    /// Whether collaboration is currently enabled.
    enabled: bool,
    /// Last version sent or received per element.
    broadcasted: HashMap<ElementId, u32>,
    /// Scene version at the last broadcast.
    last_scene_version: Option<u64>,
    last_full_sync: Option<Instant>,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
}

impl Default for CollaborationManager {
    fn default() -> Self {
        Self::new(CollaborationConfig::default())
    }
}

impl CollaborationManager {
    pub fn new(config: CollaborationConfig) -> Self {
        Self {
            config,
            enabled: false,
            broadcasted: HashMap::new(),
            last_scene_version: None,
            last_full_sync: None,
            outgoing: Vec::new(),
        }
    }

    pub fn config(&self) -> &CollaborationConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Stop broadcasting and forget what peers were told.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.broadcasted.clear();
        self.last_scene_version = None;
        self.last_full_sync = None;
        self.outgoing.clear();
    }

    /// Last version sent or received for an element.
    pub fn broadcasted_version(&self, id: &ElementId) -> Option<u32> {
        self.broadcasted.get(id).copied()
    }

    /// Queue a `scene_update` with the elements that changed since the last
    /// broadcast. Returns how many elements were queued.
    pub fn queue_changes(&mut self, scene: &Scene) -> usize {
        if !self.enabled {
            return 0;
        }
        let scene_version = scene.scene_version();
        if self.last_scene_version == Some(scene_version) {
            return 0;
        }

        let elements: Vec<_> = scene
            .elements()
            .iter()
            .filter(|el| self.broadcasted.get(&el.id).is_none_or(|&sent| el.version > sent))
            .cloned()
            .collect();
        self.last_scene_version = Some(scene_version);
        if elements.is_empty() {
            return 0;
        }

        let count = elements.len();
        self.queue(SyncMessage::SceneUpdate { elements });
        log::debug!("queued scene_update with {count} elements");
        count
    }

    /// Queue a `scene_init` with every element.
    pub fn queue_full_sync(&mut self, scene: &Scene) {
        self.queue_full_sync_at(scene, Instant::now());
    }

    fn queue_full_sync_at(&mut self, scene: &Scene, now: Instant) {
        if !self.enabled {
            return;
        }
        self.last_scene_version = Some(scene.scene_version());
        self.last_full_sync = Some(now);
        self.queue(SyncMessage::SceneInit {
            elements: scene.elements().to_vec(),
        });
        log::debug!("queued scene_init with {} elements", scene.elements().len());
    }

    pub fn full_sync_due(&self) -> bool {
        self.full_sync_due_at(Instant::now())
    }

    pub fn full_sync_due_at(&self, now: Instant) -> bool {
        self.enabled
            && self
                .last_full_sync
                .is_none_or(|last| now.saturating_duration_since(last) >= self.config.full_sync_interval())
    }

    /// Periodic driver: a full sync when one is due, otherwise the changes.
    pub fn tick(&mut self, scene: &Scene, now: Instant) {
        if self.full_sync_due_at(now) {
            self.queue_full_sync_at(scene, now);
        } else {
            self.queue_changes(scene);
        }
    }

    /// Apply a message from a peer to `scene`.
    pub fn receive(&mut self, scene: &mut Scene, json: &str) -> Result<ReconcileStats, SyncError> {
        let message = SyncMessage::decode(json)?;
        let elements = message.into_elements();
        let stats = scene.apply_remote_update(&elements);

        // Elements we now hold at the received version need not be echoed.
        for remote in &elements {
            if let Some(local) = scene.get(&remote.id) {
                if local.stamp() == remote.stamp() {
                    let sent = self.broadcasted.entry(remote.id.clone()).or_default();
                    *sent = (*sent).max(local.version);
                }
            }
        }
        // `last_scene_version` stays put: local edits made before this
        // message still need to go out.
        log::debug!("received {} elements: {stats:?}", elements.len());
        Ok(stats)
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    fn queue(&mut self, message: SyncMessage) {
        for el in message.elements() {
            self.broadcasted.insert(el.id.clone(), el.version);
        }
        match message.encode() {
            Ok(json) => self.outgoing.push(json),
            Err(err) => log::warn!("failed to encode sync message: {err}"),
        }
    }
}
