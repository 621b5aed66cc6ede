//! Open-chained hash table with power-of-two bucket counts.
//!
//! Buckets are small owned vectors. An entry always lives in bucket
//! `hash(key) & mask`; [`HashTable::resize`] doubles the bucket array in place
//! and relinks every entry, so callers keep the same handle across growth.

use bytes::Bytes;
use std::fmt;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Smallest bucket array a table is created with
pub const MIN_CAPACITY: usize = 4;

/// 64-bit FNV-1a over the key bytes
#[inline]
pub fn hash(key: &[u8]) -> u64 {
    key.iter().fold(FNV_OFFSET, |h, &b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
}

#[derive(Clone)]
struct Entry<V> {
    key: Bytes,
    hash: u64,
    value: V,
}

#[derive(Clone)]
pub struct HashTable<V> {
    buckets: Vec<Vec<Entry<V>>>,
    mask: usize,
    len: usize,
}

impl<V> HashTable<V> {
    pub fn new() -> Self {
        Self::with_capacity(MIN_CAPACITY)
    }

    /// Create an empty table with at least `capacity` buckets
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        let mut buckets = Vec::with_capacity(capacity);
        buckets.resize_with(capacity, Vec::new);
        Self {
            buckets,
            mask: capacity - 1,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        hash as usize & self.mask
    }

    /// Insert or overwrite. An existing key keeps its position in the chain
    /// and the previous value is returned.
    pub fn insert(&mut self, key: impl Into<Bytes>, value: V) -> Option<V> {
        let key = key.into();
        let hash = hash(&key);
        let idx = self.bucket_of(hash);

        if let Some(entry) = self.buckets[idx]
            .iter_mut()
            .find(|e| e.hash == hash && e.key == key)
        {
            return Some(std::mem::replace(&mut entry.value, value));
        }

        self.buckets[idx].push(Entry { key, hash, value });
        self.len += 1;

        if self.len > self.capacity() {
            self.resize();
        }
        None
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let hash = hash(key);
        self.buckets[self.bucket_of(hash)]
            .iter()
            .find(|e| e.hash == hash && e.key == key)
            .map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        let hash = hash(key);
        let idx = self.bucket_of(hash);
        self.buckets[idx]
            .iter_mut()
            .find(|e| e.hash == hash && e.key == key)
            .map(|e| &mut e.value)
    }

    /// Mutable access to `key`, inserting `default()` first when it is missing
    pub fn get_or_insert_with(&mut self, key: &[u8], default: impl FnOnce() -> V) -> &mut V {
        let hash = hash(key);
        let idx = self.bucket_of(hash);
        if let Some(pos) = self.buckets[idx]
            .iter()
            .position(|e| e.hash == hash && e.key == key)
        {
            return &mut self.buckets[idx][pos].value;
        }

        if self.len + 1 > self.capacity() {
            self.resize();
        }
        let idx = self.bucket_of(hash);
        let bucket = &mut self.buckets[idx];
        bucket.push(Entry {
            key: Bytes::copy_from_slice(key),
            hash,
            value: default(),
        });
        self.len += 1;
        let last = bucket.len() - 1;
        &mut bucket[last].value
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Remove a key, returning its value. A missing key is `None`, not an error.
    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Like [`HashTable::remove`], also handing back the stored key
    pub fn remove_entry(&mut self, key: &[u8]) -> Option<(Bytes, V)> {
        let hash = hash(key);
        let idx = self.bucket_of(hash);
        let bucket = &mut self.buckets[idx];
        let pos = bucket.iter().position(|e| e.hash == hash && e.key == key)?;
        self.len -= 1;
        let entry = bucket.remove(pos);
        Some((entry.key, entry.value))
    }

    /// Double the bucket array and relink every entry
    pub fn resize(&mut self) {
        let new_capacity = self.capacity() * 2;
        let mut buckets: Vec<Vec<Entry<V>>> = Vec::with_capacity(new_capacity);
        buckets.resize_with(new_capacity, Vec::new);
        let mask = new_capacity - 1;

        for entry in self.buckets.drain(..).flatten() {
            buckets[entry.hash as usize & mask].push(entry);
        }

        self.buckets = buckets;
        self.mask = mask;
    }

    /// Drop every entry, keeping the current bucket array
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &V)> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.iter().map(|e| (&e.key, &e.value)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Bytes> {
        self.iter().map(|(k, _)| k)
    }
}

impl<V> Default for HashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for HashTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (String::from_utf8_lossy(k), v)))
            .finish()
    }
}
