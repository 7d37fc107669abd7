//! # Generation Worker
//!
//! The single background thread that turns chunk requests into render
//! chunks.
//!
//! ```text
//!   Idle ──ChunkRequest──▶ Generating ──▶ Idle
//!   Idle ──Shutdown──────▶ Stopped
//! ```
//!
//! The worker blocks on the bus with a timeout so it notices a cleared
//! running flag even when no work arrives. A failing or panicking chunk
//! produces a failed response; the loop keeps serving.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tessera_core::{ChunkCoord, WorldConfig};
use tessera_procedural::{DualChunkMapper, Pipeline, RenderChunk};

use crate::bus::MessageBus;
use crate::cache::LruCache;
use crate::error::{WorldError, WorldResult};
use crate::messages::{ChunkRequest, ChunkResponse, Payload, StatusUpdate};

/// How long the worker blocks on its queue before rechecking the flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Thread name.
pub const WORKER_THREAD_NAME: &str = "tessera-gen-worker";

/// Worker tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Entries in the private chunk cache.
    pub cache_limit: usize,
    /// Emit a status update every N processed requests. 0 disables status
    /// updates.
    pub status_interval: u64,
    /// Most cancel marks held at once.
    pub max_cancelled: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_config(&WorldConfig::default())
    }
}

impl WorkerConfig {
    /// Worker settings from a world config.
    #[must_use]
    pub fn from_config(config: &WorldConfig) -> Self {
        Self {
            cache_limit: config.worker_cache_limit,
            status_interval: config.status_interval,
            max_cancelled: config.queue_capacity,
        }
    }
}

/// Worker counters, shared with the owning thread.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Chunks run through the pipeline successfully.
    pub chunks_generated: AtomicU64,
    /// Requests taken off the queue.
    pub requests_processed: AtomicU64,
    /// Requests dropped because they were cancelled.
    pub requests_cancelled: AtomicU64,
    /// Requests whose generation failed or panicked.
    pub generation_failures: AtomicU64,
    /// Entries in the worker cache.
    pub cache_size: AtomicUsize,
    /// Requests currently being generated (0 or 1).
    pub active_requests: AtomicUsize,
    /// Total generation time in microseconds.
    pub total_generation_time_us: AtomicU64,
}

impl WorkerStats {
    /// Total time spent generating.
    #[must_use]
    pub fn total_generation_time(&self) -> Duration {
        Duration::from_micros(self.total_generation_time_us.load(Ordering::Relaxed))
    }

    /// Mean time per generated chunk.
    #[must_use]
    pub fn avg_generation_time(&self) -> Duration {
        let generated = self.chunks_generated.load(Ordering::Relaxed);
        if generated == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_generation_time_us.load(Ordering::Relaxed) / generated)
    }
}

/// Owns the worker thread.
pub struct GenerationWorker {
    bus: Arc<MessageBus>,
    pipeline: Arc<Pipeline>,
    mapper: DualChunkMapper,
    config: WorkerConfig,
    running: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
    handle: Option<JoinHandle<()>>,
}

impl GenerationWorker {
    /// Creates a stopped worker.
    #[must_use]
    pub fn new(bus: Arc<MessageBus>, pipeline: Pipeline, mapper: DualChunkMapper, config: WorkerConfig) -> Self {
        Self {
            bus,
            pipeline: Arc::new(pipeline),
            mapper,
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(WorkerStats::default()),
            handle: None,
        }
    }

    /// Spawns the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorkerAlreadyRunning`] if the thread is alive
    /// and [`WorldError::WorkerSpawn`] if the OS refuses a new thread.
    pub fn start(&mut self) -> WorldResult<()> {
        if self.is_alive() {
            return Err(WorldError::WorkerAlreadyRunning);
        }
        if let Some(old) = self.handle.take() {
            join_worker(old);
        }

        self.running.store(true, Ordering::Release);
        let state = WorkerLoop {
            bus: Arc::clone(&self.bus),
            pipeline: Arc::clone(&self.pipeline),
            mapper: self.mapper,
            cache: LruCache::new(self.config.cache_limit),
            cancelled: HashMap::new(),
            config: self.config,
            running: Arc::clone(&self.running),
            stats: Arc::clone(&self.stats),
        };

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_owned())
            .spawn(move || state.run())
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                WorldError::WorkerSpawn(e.to_string())
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Whether the worker thread is still running.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Sends shutdown at top priority and waits up to `timeout` for the
    /// thread to exit.
    ///
    /// Returns `true` if the thread was joined. On timeout a warning is
    /// logged and the thread is left to finish on its own.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        self.bus.send_shutdown();

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }

        if handle.is_finished() {
            join_worker(handle);
            true
        } else {
            self.running.store(false, Ordering::Release);
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                "generation worker did not stop in time"
            );
            false
        }
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// The pipeline the worker runs.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl Drop for GenerationWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.running.store(false, Ordering::Release);
            self.bus.send_shutdown();
        }
    }
}

/// State moved into the worker thread.
struct WorkerLoop {
    bus: Arc<MessageBus>,
    pipeline: Arc<Pipeline>,
    mapper: DualChunkMapper,
    cache: LruCache<ChunkCoord, Arc<RenderChunk>>,
    /// Request id to the highest cancelled ticket.
    cancelled: HashMap<String, u64>,
    config: WorkerConfig,
    running: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
}

impl WorkerLoop {
    fn run(mut self) {
        tracing::info!(
            layers = ?self.pipeline.layer_names(),
            render_chunk_size = self.mapper.render_chunk_size(),
            "generation worker started"
        );

        while self.running.load(Ordering::Acquire) {
            let Some(message) = self.bus.receive_from_main(POLL_INTERVAL) else {
                continue;
            };
            match message.payload {
                Payload::Shutdown => {
                    self.running.store(false, Ordering::Release);
                }
                Payload::ChunkCancel { request_id, ticket } => self.cancel(request_id, ticket),
                Payload::ChunkRequest(request) => self.handle_request(request),
                other => {
                    tracing::warn!(kind = %other.kind(), "unexpected message on worker queue, ignored");
                }
            }
        }

        tracing::info!(
            chunks_generated = self.stats.chunks_generated.load(Ordering::Relaxed),
            requests_processed = self.stats.requests_processed.load(Ordering::Relaxed),
            "generation worker stopped"
        );
    }

    fn cancel(&mut self, request_id: String, ticket: u64) {
        if self.cancelled.len() >= self.config.max_cancelled && !self.cancelled.contains_key(&request_id) {
            // Marks for requests that already completed are never consumed.
            self.cancelled.clear();
        }
        let mark = self.cancelled.entry(request_id).or_insert(ticket);
        *mark = (*mark).max(ticket);
    }

    /// Consumes the cancel mark for `request`, if it covers it.
    fn take_cancelled(&mut self, request: &ChunkRequest) -> bool {
        match self.cancelled.get(&request.request_id) {
            Some(&ticket) if ticket >= request.ticket => {
                self.cancelled.remove(&request.request_id);
                true
            }
            Some(_) => {
                self.cancelled.remove(&request.request_id);
                false
            }
            None => false,
        }
    }

    fn handle_request(&mut self, request: ChunkRequest) {
        let processed = self.stats.requests_processed.fetch_add(1, Ordering::Relaxed) + 1;
        let cancelled = self.take_cancelled(&request);

        if let Some(chunk) = self.cache.get(&request.coord) {
            let chunk = Arc::clone(chunk);
            tracing::trace!(coord = %request.coord, "worker cache hit");
            self.bus.send_response(ChunkResponse {
                coord: request.coord,
                ticket: request.ticket,
                result: Ok(chunk),
                generation_time: Duration::ZERO,
            });
        } else if cancelled {
            self.stats.requests_cancelled.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(coord = %request.coord, "request cancelled");
        } else {
            let response = self.generate(&request);
            self.bus.send_response(response);
        }

        let interval = self.config.status_interval;
        if interval > 0 && processed % interval == 0 {
            self.send_status();
        }
    }

    fn generate(&mut self, request: &ChunkRequest) -> ChunkResponse {
        self.stats.active_requests.store(1, Ordering::Relaxed);
        let start = Instant::now();
        let pipeline = &self.pipeline;
        let mapper = self.mapper;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| mapper.generate(pipeline, request.coord)));
        let elapsed = start.elapsed();
        self.stats.active_requests.store(0, Ordering::Relaxed);

        let result = match outcome {
            Ok(Ok(chunk)) => {
                let chunk = Arc::new(chunk);
                self.cache.insert(request.coord, Arc::clone(&chunk));
                self.stats.cache_size.store(self.cache.len(), Ordering::Relaxed);
                self.stats.chunks_generated.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .total_generation_time_us
                    .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
                tracing::debug!(
                    coord = %request.coord,
                    ms = elapsed.as_secs_f64() * 1000.0,
                    tiles = chunk.tile_count(),
                    "chunk generated"
                );
                Ok(chunk)
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(panic_message(panic.as_ref())),
        };

        if let Err(reason) = &result {
            self.stats.generation_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(coord = %request.coord, error = %reason, "chunk generation failed");
        }

        ChunkResponse {
            coord: request.coord,
            ticket: request.ticket,
            result,
            generation_time: elapsed,
        }
    }

    fn send_status(&self) {
        let status = StatusUpdate {
            queue_depth: self.bus.to_worker_len(),
            chunks_generated: self.stats.chunks_generated.load(Ordering::Relaxed),
            requests_processed: self.stats.requests_processed.load(Ordering::Relaxed),
            cache_size: self.cache.len(),
        };
        tracing::debug!(?status, "worker status");
        self.bus.send_status(status);
    }
}

/// Joins a finished worker thread. Returns `false` and logs the payload if
/// it panicked outside a generation call.
fn join_worker(handle: JoinHandle<()>) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(reason = %panic_message(payload.as_ref()), "generation worker thread panicked");
            false
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("generation panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("generation panicked: {s}")
    } else {
        "generation panicked".to_owned()
    }
}
