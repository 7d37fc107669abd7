//! # Chunk and Tile Caches
//!
//! Both caches are owned by a single thread and take `&mut self`.
//!
//! - [`LruCache`]: bounded map evicting the least recently inserted or
//!   touched entry. Backs the consumer's ready set and the worker's
//!   private generation cache.
//! - [`TileCache`]: flat tile lookup filled a whole render chunk at a time
//!   and emptied a whole chunk at a time.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use tessera_core::{ChunkCoord, TileKind, TilePos};
use tessera_procedural::RenderChunk;

/// Cache counters snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that did not.
    pub misses: u64,
    /// Entries dropped for capacity.
    pub evictions: u64,
    /// Current entry count.
    pub entries: usize,
}

impl CacheStats {
    /// Hits over lookups, or 0 with no lookups.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded least-recently-used map.
#[derive(Debug)]
pub struct LruCache<K, V> {
    entries: HashMap<K, V>,
    order: VecDeque<K>,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Copy + Eq + Hash, V> LruCache<K, V> {
    /// Creates a cache holding at most `capacity` entries (at least 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Looks up `key`, marking it most recently used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.entries.contains_key(key) {
            self.hits += 1;
            self.touch(key);
            self.entries.get(key)
        } else {
            self.misses += 1;
            None
        }
    }

    /// Looks up `key` without touching recency or counters.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Whether `key` is cached.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or replaces `key` as most recently used.
    ///
    /// Returns the entries evicted to stay within capacity. The inserted
    /// key is never among them.
    pub fn insert(&mut self, key: K, value: V) -> Vec<(K, V)> {
        if self.entries.insert(key, value).is_some() {
            self.remove_from_order(&key);
        }
        self.order.push_back(key);
        self.enforce_capacity()
    }

    /// Removes `key`.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.entries.remove(key)?;
        self.remove_from_order(key);
        Some(removed)
    }

    /// Marks `key` most recently used. Returns whether it was cached.
    pub fn touch(&mut self, key: &K) -> bool {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(entry) = self.order.remove(pos) {
                self.order.push_back(entry);
            }
            return true;
        }
        false
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    /// Entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum entry count.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            entries: self.entries.len(),
        }
    }

    fn remove_from_order(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }

    fn enforce_capacity(&mut self) -> Vec<(K, V)> {
        let mut victims = Vec::new();
        while self.order.len() > self.capacity {
            let Some(old) = self.order.pop_front() else { break };
            if let Some(value) = self.entries.remove(&old) {
                self.evictions += 1;
                victims.push((old, value));
            }
        }
        victims
    }
}

/// Per-tile lookup over materialized render chunks.
#[derive(Debug)]
pub struct TileCache {
    chunk_size: u32,
    tiles: HashMap<TilePos, TileKind>,
    /// Materialized chunks, oldest first.
    chunks: VecDeque<ChunkCoord>,
    limit: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl TileCache {
    /// Creates a cache for chunks of `chunk_size` holding about `limit` tiles.
    #[must_use]
    pub fn new(chunk_size: u32, limit: usize) -> Self {
        Self {
            chunk_size,
            tiles: HashMap::new(),
            chunks: VecDeque::new(),
            limit,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Looks up a tile.
    pub fn get(&mut self, pos: TilePos) -> Option<TileKind> {
        let found = self.tiles.get(&pos).copied();
        if found.is_some() {
            self.hits += 1;
            tracing::trace!(x = pos.x, y = pos.y, "tile cache hit");
        } else {
            self.misses += 1;
        }
        found
    }

    /// Whether the tiles of `coord` are materialized.
    #[must_use]
    pub fn contains_chunk(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains(&coord)
    }

    /// Materializes every tile of `chunk`.
    ///
    /// Older chunks are dropped whole while the tile count exceeds the
    /// limit. The chunk just inserted always stays.
    pub fn insert_chunk(&mut self, chunk: &RenderChunk) {
        if self.contains_chunk(chunk.coord) {
            return;
        }
        self.tiles.extend(chunk.tiles().map(|t| (t.pos(), t.kind)));
        self.chunks.push_back(chunk.coord);
        while self.tiles.len() > self.limit && self.chunks.len() > 1 {
            if let Some(old) = self.chunks.front().copied() {
                self.remove_chunk(old);
                self.evictions += 1;
            }
        }
    }

    /// Drops every tile of `coord`.
    pub fn remove_chunk(&mut self, coord: ChunkCoord) {
        let Some(pos) = self.chunks.iter().position(|c| *c == coord) else {
            return;
        };
        self.chunks.remove(pos);
        let origin = coord.origin(self.chunk_size);
        let size = i64::from(self.chunk_size);
        for y in origin.y..origin.y + size {
            for x in origin.x..origin.x + size {
                self.tiles.remove(&TilePos::new(x, y));
            }
        }
    }

    /// Cached tile count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether no tiles are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Materialized chunk count.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Counter snapshot. `entries` counts tiles.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            entries: self.tiles.len(),
        }
    }
}
