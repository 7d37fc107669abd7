//! # Tessera Procedural Generation
//!
//! Deterministic, layered generation of an unbounded 2-D tile world.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: the same seed and layer list always produce the same world
//! 2. **Batch independent**: a chunk never depends on which other chunks were
//!    generated alongside it
//! 3. **Layered**: each [`Layer`] refines the output of the one before it
//!
//! ## Core Components
//!
//! - [`WorldSeed`], [`SimplexNoise`]: seeds, per-cell randomness and noise
//! - [`layers`]: the built-in layer implementations
//! - [`Pipeline`]: an ordered, validated layer list with bounds planning
//! - [`DualChunkMapper`]: aggregation of generation chunks into [`RenderChunk`]s
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::{ChunkCoord, WorldConfig};
//! use tessera_procedural::{DualChunkMapper, Pipeline};
//!
//! let config = WorldConfig::default();
//! let pipeline = Pipeline::from_config(&config)?;
//! let mapper = DualChunkMapper::new(config.render_chunk_size);
//! let chunk = mapper.generate(&pipeline, ChunkCoord::new(0, 0))?;
//! println!("land: {:.0}%", chunk.land_fraction() * 100.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod data;
pub mod dual;
pub mod error;
pub mod layer;
pub mod layers;
pub mod noise;
pub mod pipeline;

pub use data::{ChunkContent, ChunkMeta, GenChunk, GenerationData};
pub use dual::{DualChunkMapper, RenderChunk};
pub use error::{GenerationError, GenerationResult};
pub use layer::{Layer, Produces};
pub use layers::{build_layer, LAYER_NAMES};
pub use noise::{SimplexNoise, WorldSeed};
pub use pipeline::{final_chunk_size, Pipeline};
