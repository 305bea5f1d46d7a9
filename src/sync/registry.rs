use std::collections::BTreeMap;

use super::{SyncDescriptor, Topic};

/// Active syncs keyed by topic. Owned by the sync worker.
#[derive(Debug, Default)]
pub struct Registry {
    syncs: BTreeMap<Topic, SyncDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites, returning the replaced descriptor.
    pub fn create(&mut self, sync: SyncDescriptor) -> Option<SyncDescriptor> {
        self.syncs.insert(sync.topic().clone(), sync)
    }

    /// Replaces an existing descriptor. Unknown topics are left alone.
    pub fn modify(&mut self, sync: SyncDescriptor) -> bool {
        match self.syncs.get_mut(sync.topic().as_str()) {
            Some(slot) => {
                *slot = sync;
                true
            }
            None => false,
        }
    }

    pub fn destroy(&mut self, topic: &str) -> Option<SyncDescriptor> {
        self.syncs.remove(topic)
    }

    pub fn get(&self, topic: &str) -> Option<&SyncDescriptor> {
        self.syncs.get(topic)
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.syncs.contains_key(topic)
    }

    /// Descriptors whose message depends on `entity_id`.
    pub fn watching<'a>(&'a self, entity_id: &'a str) -> impl Iterator<Item = &'a SyncDescriptor> {
        self.syncs.values().filter(move |sync| sync.watches(entity_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncDescriptor> {
        self.syncs.values()
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.syncs.keys()
    }

    pub fn len(&self) -> usize {
        self.syncs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syncs.is_empty()
    }

    pub fn clear(&mut self) {
        self.syncs.clear();
    }
}
