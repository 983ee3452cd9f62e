//! Consistent-hash routing
//!
//! The same primitive serves two shard sets: bucket names inside one store,
//! and server addresses across a ring. Keys and shard names are arbitrary
//! strings; placement points come from BLAKE3 truncated to a little-endian
//! u64, the ring is an ordered map walked clockwise.

use std::collections::BTreeMap;

/// Virtual points placed on the ring per shard
pub const DEFAULT_VNODES: usize = 100;

/// Key-to-shard resolution.
///
/// Implementations must be stable (same key, same shard set, same answer)
/// and should remap only a small fraction of keys when a shard is added.
pub trait ShardRouter {
    /// Register a shard name.
    fn add(&mut self, name: &str);

    /// Map a key to a registered shard name, or `None` if no shard exists.
    fn resolve(&self, key: &str) -> Option<&str>;
}

/// Consistent-hash ring with virtual nodes
pub struct HashRing {
    vnodes: usize,
    points: BTreeMap<u64, String>,
}

impl HashRing {
    pub fn new(vnodes: usize) -> Self {
        Self {
            vnodes,
            points: BTreeMap::new(),
        }
    }

    pub fn with_default_vnodes() -> Self {
        Self::new(DEFAULT_VNODES)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::with_default_vnodes()
    }
}

impl ShardRouter for HashRing {
    fn add(&mut self, name: &str) {
        for i in 0..self.vnodes {
            let point = hash_point(&format!("{}#{}", name, i));
            self.points.insert(point, name.to_string());
        }
    }

    fn resolve(&self, key: &str) -> Option<&str> {
        let hash = hash_point(key);
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, name)| name.as_str())
    }
}

fn hash_point(data: &str) -> u64 {
    let hash = blake3::hash(data.as_bytes());
    u64::from_le_bytes(hash.as_bytes()[0..8].try_into().unwrap())
}
