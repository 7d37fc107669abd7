//! # Tessera Streaming
//!
//! Background chunk generation and non-blocking tile reads.
//!
//! ## Threads
//!
//! Exactly two: the consumer that owns the [`WorldManager`] and ticks it
//! once per frame, and one [`GenerationWorker`]. They share nothing but the
//! [`MessageBus`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::WorldConfig;
//! use tessera_streaming::WorldManager;
//!
//! let mut world = WorldManager::new(WorldConfig::default())?;
//! loop {
//!     world.update_chunks(&(player_x, player_y), 800, 600);
//!     let tile = world.get_tile(player_x, player_y);
//!     // draw...
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod bus;
pub mod cache;
pub mod error;
pub mod manager;
pub mod messages;
pub mod scheduler;
pub mod worker;

pub use bus::{BusStats, MessageBus};
pub use cache::{CacheStats, LruCache, TileCache};
pub use error::{WorldError, WorldResult};
pub use manager::{Camera, ChunkInfo, WorldManager, WorldStatistics};
pub use messages::{ChunkRequest, ChunkResponse, Message, MessageKind, Payload, StatusUpdate};
pub use scheduler::{ChunkScheduler, ScheduleDelta};
pub use worker::{GenerationWorker, WorkerConfig, WorkerStats};
