//! # Tessera
//!
//! A procedural 2-D tile world, generated in layers on a background
//! thread and streamed around a moving camera.
//!
//! ```text
//! ┌──────────────────┐   ┌────────────────────────┐   ┌──────────────────────┐
//! │   tessera_core   │──▶│   tessera_procedural   │──▶│   tessera_streaming  │
//! │                  │   │                        │   │                      │
//! │ • coordinates    │   │ • seeds & noise        │   │ • message bus        │
//! │ • tiles          │   │ • layers & pipeline    │   │ • scheduler          │
//! │ • world config   │   │ • render chunks        │   │ • worker & manager   │
//! └──────────────────┘   └────────────────────────┘   └──────────────────────┘
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub use tessera_core as core;
pub use tessera_procedural as procedural;
pub use tessera_streaming as streaming;

pub use tessera_core::{ChunkCoord, Tile, TileKind, WorldConfig};
pub use tessera_streaming::{Camera, WorldManager, WorldStatistics};
