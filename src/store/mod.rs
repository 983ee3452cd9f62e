//! Bucketed in-memory storage engine
//!
//! A [`Store`] owns a fixed set of [`Bucket`]s plus a consistent-hash router
//! mapping every key to exactly one of them. Each bucket carries two
//! independent namespaces under a single reader/writer lock: byte values
//! (gap-free `Vec<u8>`, zero-filled on extension) and u32 counters.
//!
//! Operations take fully decoded values; nothing here touches the network,
//! so no bucket lock is ever held across socket I/O.

use crate::common::{Error, HashRing, Result, ShardRouter};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A capacity-bounded read: the returned prefix, plus whether the stored
/// value was longer than the requested capacity and got cut to fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clamped {
    pub data: Vec<u8>,
    pub truncated: bool,
}

#[derive(Default)]
struct Maps {
    bytes: HashMap<String, Vec<u8>>,
    uints: HashMap<String, u32>,
}

/// One lockable partition of the key space.
///
/// Readers run concurrently with each other; anything that can mutate either
/// namespace takes the bucket exclusively.
#[derive(Default)]
pub struct Bucket {
    inner: RwLock<Maps>,
}

impl Bucket {
    fn read(&self) -> Result<RwLockReadGuard<'_, Maps>> {
        self.inner
            .read()
            .map_err(|_| Error::Internal("bucket lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Maps>> {
        self.inner
            .write()
            .map_err(|_| Error::Internal("bucket lock poisoned".into()))
    }

    pub fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let maps = self.read()?;
        maps.bytes
            .get(key)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Read at most `capacity` bytes from the front of the value.
    pub fn get_bytes_into(&self, key: &str, capacity: u32) -> Result<Clamped> {
        let maps = self.read()?;
        let data = maps
            .bytes
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
        let n = data.len().min(capacity as usize);
        Ok(Clamped {
            data: data[..n].to_vec(),
            truncated: n < data.len(),
        })
    }

    /// Read `value[start..=end]`, clamped to the value's length. A start at
    /// or past the end yields an empty result, not an error.
    pub fn get_bytes_range(&self, key: &str, start: u32, end: u32) -> Result<Vec<u8>> {
        let maps = self.read()?;
        let data = maps
            .bytes
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
        Ok(slice_range(data, start, end, None).to_vec())
    }

    /// As [`get_bytes_range`](Bucket::get_bytes_range), additionally clamped
    /// to `capacity` bytes.
    pub fn get_bytes_range_into(
        &self,
        key: &str,
        start: u32,
        end: u32,
        capacity: u32,
    ) -> Result<Clamped> {
        let maps = self.read()?;
        let data = maps
            .bytes
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
        let natural = slice_range(data, start, end, None);
        let bounded = slice_range(data, start, end, Some(capacity));
        Ok(Clamped {
            truncated: bounded.len() < natural.len(),
            data: bounded.to_vec(),
        })
    }

    pub fn set_bytes(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.write()?.bytes.insert(key.to_string(), data);
        Ok(())
    }

    /// Write `data` at `start`, splicing into any existing value.
    ///
    /// An absent key becomes `start` zero bytes followed by `data`. A write
    /// that fits overwrites in place; one that runs past the end overwrites
    /// the overlapping prefix and appends the rest; one that starts past the
    /// end zero-fills the gap first. Values never contain holes.
    pub fn set_bytes_range(&self, key: &str, start: u32, data: &[u8]) -> Result<()> {
        let mut maps = self.write()?;
        let start = start as usize;
        match maps.bytes.get_mut(key) {
            None => {
                let mut value = vec![0u8; start + data.len()];
                value[start..].copy_from_slice(data);
                maps.bytes.insert(key.to_string(), value);
            }
            Some(value) => {
                let stop = start + data.len();
                if stop <= value.len() {
                    value[start..stop].copy_from_slice(data);
                } else if start < value.len() {
                    let overlap = value.len() - start;
                    value[start..].copy_from_slice(&data[..overlap]);
                    value.extend_from_slice(&data[overlap..]);
                } else {
                    value.resize(start, 0);
                    value.extend_from_slice(data);
                }
            }
        }
        Ok(())
    }

    pub fn del_bytes(&self, key: &str) -> Result<()> {
        self.write()?
            .bytes
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Shrink the value to `size` bytes. A size at or past the current
    /// length is an acknowledged no-op; truncation never zero-fills.
    pub fn truncate_bytes(&self, key: &str, size: u32) -> Result<()> {
        let mut maps = self.write()?;
        let value = maps
            .bytes
            .get_mut(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
        if (size as usize) < value.len() {
            value.truncate(size as usize);
        }
        Ok(())
    }

    pub fn set_uint(&self, key: &str, value: u32) -> Result<()> {
        self.write()?.uints.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get_uint(&self, key: &str) -> Result<u32> {
        let maps = self.read()?;
        maps.uints
            .get(key)
            .copied()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Monotonic high-water mark: create if absent, otherwise replace only
    /// when `value` is strictly greater than the stored value.
    pub fn set_uint_if_max(&self, key: &str, value: u32) -> Result<()> {
        let mut maps = self.write()?;
        let current = maps.uints.entry(key.to_string()).or_insert(value);
        if value > *current {
            *current = value;
        }
        Ok(())
    }

    pub fn del_uint(&self, key: &str) -> Result<()> {
        self.write()?
            .uints
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }
}

/// Inclusive-end range selection, clamped to the data and optionally to a
/// destination capacity.
fn slice_range(data: &[u8], start: u32, end: u32, capacity: Option<u32>) -> &[u8] {
    let len = data.len();
    let start = start as usize;
    if start >= len {
        return &[];
    }
    let mut stop = (end as usize).saturating_add(1).min(len);
    if let Some(capacity) = capacity {
        stop = stop.min(start.saturating_add(capacity as usize));
    }
    if stop <= start {
        return &[];
    }
    &data[start..stop]
}

/// Fixed collection of buckets plus the router mapping keys to them.
///
/// The bucket set and the router's shard set are the same names for the
/// lifetime of the store; every key resolves to exactly one bucket.
pub struct Store {
    buckets: HashMap<String, Bucket>,
    router: Box<dyn ShardRouter + Send + Sync>,
}

impl Store {
    /// Create a store with `count + 1` buckets named "0" through "count",
    /// routed by the default consistent-hash ring.
    pub fn new(count: usize) -> Self {
        Self::with_router(count, Box::new(HashRing::with_default_vnodes()))
    }

    /// As [`new`](Store::new) with a caller-supplied routing algorithm.
    pub fn with_router(count: usize, mut router: Box<dyn ShardRouter + Send + Sync>) -> Self {
        let mut buckets = HashMap::new();
        for i in 0..=count {
            let name = i.to_string();
            router.add(&name);
            buckets.insert(name, Bucket::default());
        }
        Self { buckets, router }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Resolve a key to its bucket. The construction invariant makes the
    /// lookup infallible in practice; a mismatch is an internal fault.
    fn bucket(&self, key: &str) -> Result<&Bucket> {
        let name = self
            .router
            .resolve(key)
            .ok_or_else(|| Error::Internal("store has no buckets".into()))?;
        self.buckets
            .get(name)
            .ok_or_else(|| Error::Internal(format!("router resolved unknown bucket: {}", name)))
    }

    pub fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        self.bucket(key)?.get_bytes(key)
    }

    pub fn get_bytes_into(&self, key: &str, capacity: u32) -> Result<Clamped> {
        self.bucket(key)?.get_bytes_into(key, capacity)
    }

    pub fn get_bytes_range(&self, key: &str, start: u32, end: u32) -> Result<Vec<u8>> {
        self.bucket(key)?.get_bytes_range(key, start, end)
    }

    pub fn get_bytes_range_into(
        &self,
        key: &str,
        start: u32,
        end: u32,
        capacity: u32,
    ) -> Result<Clamped> {
        self.bucket(key)?.get_bytes_range_into(key, start, end, capacity)
    }

    pub fn set_bytes(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.bucket(key)?.set_bytes(key, data)
    }

    pub fn set_bytes_range(&self, key: &str, start: u32, data: &[u8]) -> Result<()> {
        self.bucket(key)?.set_bytes_range(key, start, data)
    }

    pub fn del_bytes(&self, key: &str) -> Result<()> {
        self.bucket(key)?.del_bytes(key)
    }

    pub fn truncate_bytes(&self, key: &str, size: u32) -> Result<()> {
        self.bucket(key)?.truncate_bytes(key, size)
    }

    pub fn set_uint(&self, key: &str, value: u32) -> Result<()> {
        self.bucket(key)?.set_uint(key, value)
    }

    pub fn get_uint(&self, key: &str) -> Result<u32> {
        self.bucket(key)?.get_uint(key)
    }

    pub fn set_uint_if_max(&self, key: &str, value: u32) -> Result<()> {
        self.bucket(key)?.set_uint_if_max(key, value)
    }

    pub fn del_uint(&self, key: &str) -> Result<()> {
        self.bucket(key)?.del_uint(key)
    }
}
