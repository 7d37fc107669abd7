//! Generation error types.

use tessera_core::{ChunkCoord, ConfigError};
use thiserror::Error;

/// Errors raised while building or running a generation pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// No layers configured.
    #[error("pipeline has no layers; refusing to generate empty chunks")]
    EmptyPipeline,

    /// Layer name not registered.
    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    /// Layer parameters failed to decode or validate.
    #[error("invalid config for layer `{layer}`: {reason}")]
    InvalidLayerConfig {
        /// Layer name.
        layer: String,
        /// What is wrong.
        reason: String,
    },

    /// A layer needed data an earlier layer should have produced.
    #[error("layer `{layer}` is missing input for chunk {coord}")]
    MissingInput {
        /// Layer name.
        layer: String,
        /// Chunk (or region) that was missing.
        coord: ChunkCoord,
    },

    /// A layer returned without populating its whole output region.
    #[error("layer `{layer}` left chunk {coord} unpopulated")]
    IncompleteLayer {
        /// Layer name.
        layer: String,
        /// First missing chunk.
        coord: ChunkCoord,
    },

    /// Zoom layers cannot evenly subdivide the base chunk size.
    #[error("base chunk size {base} cannot be subdivided by zoom layers {factors:?}")]
    InvalidChunkSize {
        /// Base chunk size in tiles.
        base: u32,
        /// Subdivision factors in pipeline order.
        factors: Vec<u32>,
    },

    /// Invalid world configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for generation.
pub type GenerationResult<T> = Result<T, GenerationError>;
