//! # World Manager
//!
//! The consumer-side read path. Owns the ready set, the tile cache and the
//! loading set; only the consumer thread touches them.
//!
//! A render chunk coordinate is always in exactly one state:
//!
//! ```text
//! not requested ──request sent──▶ loading ──response──▶ ready
//!       ▲                            │                    │
//!       └──────── failure / unload ──┴──── unload / LRU ──┘
//! ```
//!
//! [`WorldManager::get_tile`] never blocks: it answers from the caches or
//! returns a loading placeholder and queues a request.
//!
//! A loading entry older than `request_timeout_ms` is requested again, so a
//! response lost on a full queue never pins a chunk in `loading`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tessera_core::{ChunkCoord, Priority, Tile, TilePos, WorldConfig};
use tessera_procedural::{DualChunkMapper, Pipeline, RenderChunk};

use crate::bus::MessageBus;
use crate::cache::{LruCache, TileCache};
use crate::error::WorldResult;
use crate::messages::{ChunkResponse, Payload, StatusUpdate};
use crate::scheduler::ChunkScheduler;
use crate::worker::{GenerationWorker, WorkerConfig};

/// Anything that can report the viewer's world tile position.
pub trait Camera {
    /// World tile under the cursor.
    fn cursor_position(&self) -> (i64, i64);
}

impl Camera for (i64, i64) {
    fn cursor_position(&self) -> (i64, i64) {
        *self
    }
}

/// State of the render chunk holding a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Render chunk x.
    pub chunk_x: i64,
    /// Render chunk y.
    pub chunk_y: i64,
    /// Render chunk size in tiles.
    pub chunk_size: u32,
    /// Ready to read.
    pub loaded: bool,
    /// Requested, no response yet.
    pub loading: bool,
    /// Tiles held when loaded.
    pub tile_count: usize,
}

/// Snapshot of manager, worker and bus counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldStatistics {
    /// Ready render chunks.
    pub loaded_render_chunks: usize,
    /// Requests awaiting a response.
    pub loading_chunks: usize,
    /// Chunks tracked as ready or loading.
    pub requested_chunks: usize,
    /// Requests sent since start.
    pub chunks_requested: u64,
    /// Successful responses applied.
    pub chunks_received: u64,
    /// Failed responses applied.
    pub chunks_failed: u64,
    /// Responses discarded because the chunk was no longer wanted.
    pub responses_discarded: u64,
    /// Chunks dropped from the ready set for capacity.
    pub chunks_evicted: u64,
    /// Cached tiles.
    pub tile_cache_size: usize,
    /// Tile cache hits.
    pub cache_hits: u64,
    /// Tile cache misses.
    pub cache_misses: u64,
    /// Hits over lookups.
    pub cache_hit_ratio: f64,
    /// Render chunk size in tiles.
    pub render_chunk_size: u32,
    /// Pipeline output chunk size in tiles.
    pub generation_chunk_size: u32,
    /// Chunks generated by the worker.
    pub worker_chunks_generated: u64,
    /// Entries in the worker cache.
    pub worker_cache_size: usize,
    /// Mean worker generation time.
    pub worker_avg_generation_time: Duration,
    /// Messages accepted by the bus.
    pub messages_sent: u64,
    /// Messages dropped on full queues.
    pub messages_dropped: u64,
}

/// An outstanding request.
#[derive(Clone, Copy, Debug)]
struct PendingRequest {
    ticket: u64,
    issued: Instant,
}

/// Streams render chunks around a camera and serves tile reads.
pub struct WorldManager {
    config: WorldConfig,
    mapper: DualChunkMapper,
    generation_chunk_size: u32,
    bus: Arc<MessageBus>,
    worker: GenerationWorker,
    scheduler: ChunkScheduler,
    ready: LruCache<ChunkCoord, Arc<RenderChunk>>,
    tiles: TileCache,
    /// Chunk to its outstanding request.
    loading: HashMap<ChunkCoord, PendingRequest>,
    request_timeout: Duration,
    last_update: Option<Instant>,
    last_worker_status: Option<StatusUpdate>,
    chunks_requested: u64,
    chunks_received: u64,
    chunks_failed: u64,
    responses_discarded: u64,
    chunks_evicted: u64,
    shut_down: bool,
}

impl WorldManager {
    /// Validates `config`, builds the pipeline and starts the worker.
    ///
    /// # Errors
    ///
    /// Fails on invalid config, an unbuildable pipeline or a worker that
    /// cannot be spawned.
    pub fn new(config: WorldConfig) -> WorldResult<Self> {
        config.validate()?;
        let pipeline = Pipeline::from_config(&config)?;
        let generation_chunk_size = pipeline.final_chunk_size();
        let mapper = DualChunkMapper::new(config.render_chunk_size);
        let bus = Arc::new(MessageBus::from_config(&config));

        let mut worker = GenerationWorker::new(
            Arc::clone(&bus),
            pipeline,
            mapper,
            WorkerConfig::from_config(&config),
        );
        worker.start()?;

        tracing::info!(
            seed = config.seed,
            base_chunk_size = config.chunk_size,
            generation_chunk_size,
            render_chunk_size = config.render_chunk_size,
            "world manager created"
        );

        Ok(Self {
            mapper,
            generation_chunk_size,
            bus,
            worker,
            scheduler: ChunkScheduler::from_config(&config),
            ready: LruCache::new(config.chunk_cache_limit),
            tiles: TileCache::new(config.render_chunk_size, config.tile_cache_limit),
            loading: HashMap::new(),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            last_update: None,
            last_worker_status: None,
            chunks_requested: 0,
            chunks_received: 0,
            chunks_failed: 0,
            responses_discarded: 0,
            chunks_evicted: 0,
            shut_down: false,
            config,
        })
    }

    /// The config the world was built with.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Render chunk size in tiles.
    #[must_use]
    pub const fn render_chunk_size(&self) -> u32 {
        self.config.render_chunk_size
    }

    /// Pipeline output chunk size in tiles.
    #[must_use]
    pub const fn generation_chunk_size(&self) -> u32 {
        self.generation_chunk_size
    }

    /// Latest status report from the worker.
    #[must_use]
    pub const fn last_worker_status(&self) -> Option<StatusUpdate> {
        self.last_worker_status
    }

    /// Whether render chunk `coord` is ready.
    #[must_use]
    pub fn is_chunk_ready(&self, coord: ChunkCoord) -> bool {
        self.ready.contains(&coord)
    }

    /// Whether render chunk `coord` has a request outstanding.
    #[must_use]
    pub fn is_chunk_loading(&self, coord: ChunkCoord) -> bool {
        self.loading.contains_key(&coord)
    }

    /// Applies responses, then (at most once per update interval) requests
    /// chunks around the camera and unloads distant ones.
    ///
    /// `screen_w` and `screen_h` are the visible area in tiles. Visible
    /// chunks inside the unload radius are requested as well.
    pub fn update_chunks(&mut self, camera: &impl Camera, screen_w: u32, screen_h: u32) {
        self.process_worker_messages();

        let interval = Duration::from_millis(self.config.update_interval_ms);
        if self.last_update.is_some_and(|last| last.elapsed() < interval) {
            return;
        }
        self.last_update = Some(Instant::now());

        let (x, y) = camera.cursor_position();
        let center = self.mapper.world_to_render_chunk(x, y);
        let delta = self.scheduler.update_for_position(center);

        let mut unload: HashSet<ChunkCoord> = delta.unload.into_iter().collect();
        unload.extend(
            self.ready
                .keys()
                .chain(self.loading.keys())
                .copied()
                .filter(|c| self.scheduler.is_beyond_unload(*c)),
        );
        if !unload.is_empty() {
            for coord in &unload {
                self.unload_chunk(*coord);
            }
            tracing::debug!(count = unload.len(), center = %center, "unloaded chunks");
        }

        let half_w = i64::from(screen_w / 2);
        let half_h = i64::from(screen_h / 2);
        let visible = self.mapper.render_chunks_for_area(
            TilePos::new(x - half_w, y - half_h),
            TilePos::new(x + half_w, y + half_h),
        );

        let mut wanted = delta.load;
        wanted.extend(self.scheduler.current_chunks());
        let mut visible: Vec<ChunkCoord> = visible
            .into_iter()
            .filter(|c| !self.scheduler.is_beyond_unload(*c))
            .collect();
        visible.sort_by(|a, b| a.distance(center).total_cmp(&b.distance(center)));
        wanted.extend(visible);

        let mut seen = HashSet::with_capacity(wanted.len());
        for coord in wanted {
            if !seen.insert(coord) || self.is_pending(coord) {
                continue;
            }
            if self.ready.touch(&coord) {
                continue;
            }
            let priority = self.scheduler.priority_tier(coord);
            self.request(coord, priority);
        }
    }

    /// Reads a tile. Never blocks.
    ///
    /// Returns a loading placeholder and queues a request when the tile's
    /// chunk is not ready.
    pub fn get_tile(&mut self, x: i64, y: i64) -> Tile {
        if let Some(kind) = self.tiles.get(TilePos::new(x, y)) {
            return Tile::new(x, y, kind);
        }

        let coord = self.mapper.world_to_render_chunk(x, y);
        if let Some(chunk) = self.ready.get(&coord).cloned() {
            self.tiles.insert_chunk(&chunk);
            if let Some(kind) = chunk.tile_kind(x, y) {
                return Tile::new(x, y, kind);
            }
        } else if !self.is_pending(coord) {
            self.request(coord, Priority::Normal);
        }
        Tile::loading(x, y)
    }

    /// State of the render chunk holding tile `(x, y)`.
    #[must_use]
    pub fn get_chunk_info(&self, x: i64, y: i64) -> ChunkInfo {
        let coord = self.mapper.world_to_render_chunk(x, y);
        ChunkInfo {
            chunk_x: coord.x,
            chunk_y: coord.y,
            chunk_size: self.config.render_chunk_size,
            loaded: self.ready.contains(&coord),
            loading: self.loading.contains_key(&coord),
            tile_count: self.ready.peek(&coord).map_or(0, |c| c.tile_count()),
        }
    }

    /// Counter snapshot.
    #[must_use]
    pub fn get_statistics(&self) -> WorldStatistics {
        let tiles = self.tiles.stats();
        let worker = self.worker.stats();
        let bus = self.bus.stats();
        WorldStatistics {
            loaded_render_chunks: self.ready.len(),
            loading_chunks: self.loading.len(),
            requested_chunks: self.ready.len() + self.loading.len(),
            chunks_requested: self.chunks_requested,
            chunks_received: self.chunks_received,
            chunks_failed: self.chunks_failed,
            responses_discarded: self.responses_discarded,
            chunks_evicted: self.chunks_evicted,
            tile_cache_size: tiles.entries,
            cache_hits: tiles.hits,
            cache_misses: tiles.misses,
            cache_hit_ratio: tiles.hit_ratio(),
            render_chunk_size: self.config.render_chunk_size,
            generation_chunk_size: self.generation_chunk_size,
            worker_chunks_generated: worker.chunks_generated.load(Ordering::Relaxed),
            worker_cache_size: worker.cache_size.load(Ordering::Relaxed),
            worker_avg_generation_time: worker.avg_generation_time(),
            messages_sent: bus.messages_sent,
            messages_dropped: bus.messages_dropped,
        }
    }

    /// Applies up to `max_responses_per_tick` worker messages.
    ///
    /// Returns how many chunk responses changed a chunk's state.
    pub fn process_worker_messages(&mut self) -> usize {
        let mut applied = 0;
        for message in self.bus.receive_from_worker(self.config.max_responses_per_tick) {
            match message.payload {
                Payload::ChunkResponse(response) => {
                    if self.apply_response(response) {
                        applied += 1;
                    }
                }
                Payload::StatusUpdate(status) => {
                    tracing::debug!(?status, "worker status received");
                    self.last_worker_status = Some(status);
                }
                other => {
                    tracing::warn!(kind = %other.kind(), "unexpected message on consumer queue, ignored");
                }
            }
        }
        applied
    }

    /// Stops the worker. Later calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        let timeout = Duration::from_millis(self.config.shutdown_timeout_ms);
        let joined = self.worker.stop(timeout);
        tracing::info!(
            joined,
            chunks_received = self.chunks_received,
            "world manager shut down"
        );
    }

    /// Loading and not yet timed out.
    fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.loading
            .get(&coord)
            .is_some_and(|pending| pending.issued.elapsed() < self.request_timeout)
    }

    fn request(&mut self, coord: ChunkCoord, priority: Priority) {
        let Some(ticket) = self.bus.request_chunk(coord, priority) else {
            return;
        };
        let pending = PendingRequest {
            ticket,
            issued: Instant::now(),
        };
        if let Some(old) = self.loading.insert(coord, pending) {
            tracing::debug!(coord = %coord, old_ticket = old.ticket, ticket, "chunk request timed out, sent again");
        }
        self.chunks_requested += 1;
    }

    fn apply_response(&mut self, response: ChunkResponse) -> bool {
        let coord = response.coord;
        if self.loading.get(&coord).map(|p| p.ticket) != Some(response.ticket) {
            self.responses_discarded += 1;
            tracing::debug!(coord = %coord, "stale chunk response discarded");
            return false;
        }
        self.loading.remove(&coord);

        match response.result {
            Ok(chunk) => {
                for (evicted, _) in self.ready.insert(coord, chunk) {
                    self.tiles.remove_chunk(evicted);
                    self.chunks_evicted += 1;
                }
                self.chunks_received += 1;
            }
            Err(reason) => {
                self.chunks_failed += 1;
                tracing::warn!(coord = %coord, error = %reason, "chunk generation failed, will retry");
            }
        }
        true
    }

    fn unload_chunk(&mut self, coord: ChunkCoord) {
        self.ready.remove(&coord);
        self.tiles.remove_chunk(coord);
        if let Some(pending) = self.loading.remove(&coord) {
            self.bus.cancel_chunk(coord, pending.ticket);
        }
    }
}

impl Drop for WorldManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{LayerSpec, TileKind};

    fn pump_until(manager: &mut WorldManager, done: impl Fn(&WorldManager) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(20);
        while !done(manager) {
            assert!(Instant::now() < deadline, "timed out waiting for the worker");
            manager.process_worker_messages();
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_get_tile_loading_then_ready() {
        let mut manager = WorldManager::new(WorldConfig::testing()).unwrap();
        let tile = manager.get_tile(5, 5);
        assert_eq!(tile.kind, TileKind::Loading);
        assert!(manager.get_chunk_info(5, 5).loading);

        pump_until(&mut manager, |m| m.is_chunk_ready(ChunkCoord::new(0, 0)));
        let tile = manager.get_tile(5, 5);
        assert!(matches!(tile.kind, TileKind::Land | TileKind::Water));
        assert_eq!(manager.get_tile(5, 5), tile);

        let info = manager.get_chunk_info(5, 5);
        assert!(info.loaded && !info.loading);
        assert_eq!(info.tile_count, 16 * 16);
    }

    #[test]
    fn test_repeated_reads_send_one_request() {
        let mut manager = WorldManager::new(WorldConfig::testing()).unwrap();
        for _ in 0..50 {
            manager.get_tile(-3, -3);
            manager.get_tile(-10, -1);
        }
        assert_eq!(manager.get_statistics().chunks_requested, 1);
    }

    #[test]
    fn test_failed_chunk_returns_to_not_requested() {
        let mut config = WorldConfig::testing();
        config.layers = vec![LayerSpec::new("regional")];
        let mut manager = WorldManager::new(config).unwrap();

        manager.get_tile(0, 0);
        pump_until(&mut manager, |m| m.get_statistics().chunks_failed == 1);
        assert!(!manager.is_chunk_loading(ChunkCoord::new(0, 0)));
        assert!(!manager.is_chunk_ready(ChunkCoord::new(0, 0)));

        // A later read retries.
        assert_eq!(manager.get_tile(0, 0).kind, TileKind::Loading);
        assert_eq!(manager.get_statistics().chunks_requested, 2);
    }

    #[test]
    fn test_stale_response_discarded() {
        let mut manager = WorldManager::new(WorldConfig::testing()).unwrap();
        let coord = ChunkCoord::new(40, 40);
        manager.request(coord, Priority::Normal);
        manager.unload_chunk(coord);

        let chunk = manager.mapper.generate(manager.worker.pipeline(), coord).unwrap();
        let applied = manager.apply_response(ChunkResponse {
            coord,
            ticket: 1,
            result: Ok(Arc::new(chunk)),
            generation_time: Duration::ZERO,
        });
        assert!(!applied);
        assert!(!manager.is_chunk_ready(coord));
        assert_eq!(manager.get_statistics().responses_discarded, 1);
    }

    #[test]
    fn test_timed_out_request_sent_again() {
        let mut config = WorldConfig::testing();
        config.request_timeout_ms = 1;
        let mut manager = WorldManager::new(config).unwrap();
        let coord = ChunkCoord::new(40, 40);

        manager.request(coord, Priority::Normal);
        let first = manager.loading[&coord].ticket;
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(manager.get_tile(640, 640).kind, TileKind::Loading);
        assert_eq!(manager.get_statistics().chunks_requested, 2);
        let second = manager.loading[&coord].ticket;
        assert!(second > first);

        // The first request's reply arrives late and is ignored.
        let chunk = manager.mapper.generate(manager.worker.pipeline(), coord).unwrap();
        let applied = manager.apply_response(ChunkResponse {
            coord,
            ticket: first,
            result: Ok(Arc::new(chunk)),
            generation_time: Duration::ZERO,
        });
        assert!(!applied);
        assert!(manager.is_chunk_loading(coord));
    }

    #[test]
    fn test_ready_set_bounded_and_tiles_evicted() {
        let mut config = WorldConfig::testing();
        config.chunk_cache_limit = 2;
        let mut manager = WorldManager::new(config).unwrap();

        for x in 0..4 {
            let coord = ChunkCoord::new(x, 0);
            manager.get_tile(x * 16, 0);
            pump_until(&mut manager, |m| !m.is_chunk_loading(coord));
            manager.get_tile(x * 16, 0);
            assert!(manager.get_statistics().loaded_render_chunks <= 2);
        }
        let stats = manager.get_statistics();
        assert_eq!(stats.loaded_render_chunks, 2);
        assert_eq!(stats.chunks_evicted, 2);
        assert!(stats.tile_cache_size <= 2 * 16 * 16);
        assert!(!manager.is_chunk_ready(ChunkCoord::new(0, 0)));
    }

    #[test]
    fn test_update_chunks_requests_load_area() {
        let mut manager = WorldManager::new(WorldConfig::testing()).unwrap();
        manager.update_chunks(&(0i64, 0i64), 0, 0);
        let stats = manager.get_statistics();
        assert_eq!(stats.chunks_requested, 9);
        assert_eq!(stats.requested_chunks, 9);
    }

    #[test]
    fn test_shutdown_idempotent() {
        let mut manager = WorldManager::new(WorldConfig::testing()).unwrap();
        manager.shutdown();
        manager.shutdown();
        assert!(!manager.worker.is_alive());
    }

    #[test]
    fn test_camera_for_tuple() {
        assert_eq!((3i64, -4i64).cursor_position(), (3, -4));
    }
}
