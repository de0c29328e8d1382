use std::collections::HashMap;

use bytes::Bytes;

/// In-memory data set: plain string keys plus hashes of fields.
///
/// The store itself is not synchronised; it is shared as
/// `Arc<tokio::sync::Mutex<KeyValueStore>>` and every command runs with that lock held.
#[derive(Debug, Default, PartialEq)]
pub struct KeyValueStore {
    strings: HashMap<Bytes, Bytes>,
    hashes: HashMap<Bytes, HashMap<Bytes, Bytes>>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: Bytes, value: Bytes) {
        self.strings.insert(key, value);
    }

    pub fn get(&self, key: &[u8]) -> Option<&Bytes> {
        self.strings.get(key)
    }

    pub fn hset(&mut self, key: Bytes, field: Bytes, value: Bytes) {
        self.hashes.entry(key).or_default().insert(field, value);
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> Option<&Bytes> {
        self.hashes.get(key).and_then(|fields| fields.get(field))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Bytes> {
        self.strings.keys()
    }

    pub fn len(&self) -> usize {
        self.strings.len() + self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
