//! # Tessera Core
//!
//! Common types shared by the generation pipeline and the streaming engine.
//!
//! ## Coordinate Spaces
//!
//! - [`TilePos`]: world tile coordinates, unbounded in both axes
//! - [`ChunkCoord`]: chunk grid coordinates at some chunk size
//! - [`ChunkBounds`]: inclusive rectangle of chunk coordinates
//!
//! A chunk coordinate is meaningless without the chunk size it was derived
//! with. Conversions always take the size explicitly.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod coord;
pub mod error;
pub mod priority;
pub mod tile;

pub use config::{LayerSpec, WorldConfig};
pub use coord::{ChunkBounds, ChunkCoord, TilePos};
pub use error::{ConfigError, ConfigResult};
pub use priority::Priority;
pub use tile::{Tile, TileKind};
