//! # Generation Pipeline
//!
//! An ordered list of [`Layer`]s run over a rectangle of base chunks.
//!
//! ## Planning
//!
//! Before anything runs, the pipeline walks the layers from last to first
//! and asks each one which input bounds it needs ([`Layer::required_input`]).
//! Running forward, every layer then fills exactly its planned bounds. A
//! chunk's output therefore depends only on the seed, the layer configs
//! and its coordinates, never on what else was requested in the same run.
//!
//! ## Coverage
//!
//! After each layer the pipeline checks that every coordinate of the
//! layer's bounds was populated. Only then is the layer recorded in
//! [`GenerationData::processed_layers`].

use tessera_core::{ChunkBounds, LayerSpec, WorldConfig};

use crate::data::GenerationData;
use crate::error::{GenerationError, GenerationResult};
use crate::layer::{decode_params, Layer, Produces};
use crate::layers::build_layer;
use crate::layers::zoom::ZoomConfig;
use crate::noise::WorldSeed;

/// Chunk size after every zoom layer in `layers` has subdivided `base_size`.
///
/// # Errors
///
/// Returns [`GenerationError::InvalidChunkSize`] if a zoom factor does not
/// divide the current size exactly, and config errors from zoom specs.
pub fn final_chunk_size(base_size: u32, layers: &[LayerSpec]) -> GenerationResult<u32> {
    let mut factors = Vec::new();
    for spec in layers.iter().filter(|s| s.name == "zoom") {
        let config: ZoomConfig = decode_params(spec)?;
        factors.push(config.subdivision_factor);
    }
    let mut size = base_size;
    for &factor in &factors {
        if factor < 2 || size < factor || size % factor != 0 {
            return Err(GenerationError::InvalidChunkSize { base: base_size, factors });
        }
        size /= factor;
    }
    Ok(size)
}

/// Ordered, validated layer list.
pub struct Pipeline {
    seed: WorldSeed,
    base_chunk_size: u32,
    final_chunk_size: u32,
    layers: Vec<Box<dyn Layer>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("seed", &self.seed)
            .field("base_chunk_size", &self.base_chunk_size)
            .field("final_chunk_size", &self.final_chunk_size)
            .field("layers", &self.layer_names())
            .finish()
    }
}

impl Pipeline {
    /// Builds a pipeline from layer specs.
    ///
    /// # Errors
    ///
    /// Fails fast on an empty list, unknown layer names, invalid layer
    /// parameters, or zoom factors that do not divide the chunk size.
    pub fn new(seed: WorldSeed, base_chunk_size: u32, specs: &[LayerSpec]) -> GenerationResult<Self> {
        if specs.is_empty() {
            return Err(GenerationError::EmptyPipeline);
        }
        let final_size = final_chunk_size(base_chunk_size, specs)?;

        let mut layers = Vec::with_capacity(specs.len());
        let mut size = base_chunk_size;
        for spec in specs {
            let layer = build_layer(spec, size)?;
            size /= layer.scale_factor().max(1);
            layers.push(layer);
        }

        tracing::debug!(
            seed = seed.value(),
            base_chunk_size,
            final_chunk_size = final_size,
            layers = ?specs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "pipeline built"
        );

        Ok(Self {
            seed,
            base_chunk_size,
            final_chunk_size: final_size,
            layers,
        })
    }

    /// Builds the pipeline described by a world config.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::new`].
    pub fn from_config(config: &WorldConfig) -> GenerationResult<Self> {
        Self::new(WorldSeed::new(config.seed), config.chunk_size, &config.layers)
    }

    /// World seed.
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// Chunk size the first layer works at.
    #[must_use]
    pub const fn base_chunk_size(&self) -> u32 {
        self.base_chunk_size
    }

    /// Chunk size of the pipeline's output.
    #[must_use]
    pub const fn final_chunk_size(&self) -> u32 {
        self.final_chunk_size
    }

    /// Product of every layer's scale factor.
    #[must_use]
    pub fn total_scale(&self) -> u32 {
        self.layers.iter().map(|l| l.scale_factor().max(1)).product()
    }

    /// Layer names in order.
    #[must_use]
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    /// Per-layer output bounds needed to produce `base_bounds`.
    ///
    /// Index `i` is the bounds layer `i` must fill, in its output scale.
    #[must_use]
    pub fn plan(&self, base_bounds: ChunkBounds) -> Vec<ChunkBounds> {
        let mut plan = vec![base_bounds; self.layers.len()];
        let mut bounds = base_bounds.subdivide(self.total_scale());
        for (i, layer) in self.layers.iter().enumerate().rev() {
            plan[i] = bounds;
            bounds = layer.required_input(bounds);
        }
        plan
    }

    /// Runs every layer over `base_bounds` (base chunk coordinates).
    ///
    /// The output holds chunks at [`Pipeline::final_chunk_size`] covering at
    /// least the tiles of `base_bounds`.
    ///
    /// # Errors
    ///
    /// Propagates layer errors and reports incomplete layers.
    pub fn run(&self, base_bounds: ChunkBounds) -> GenerationResult<GenerationData> {
        let plan = self.plan(base_bounds);
        let mut data = GenerationData::new(self.seed, self.base_chunk_size);

        for (layer, bounds) in self.layers.iter().zip(plan) {
            data = layer.process(data, bounds)?;
            if let Some(coord) = first_missing(&data, layer.produces(), bounds) {
                return Err(GenerationError::IncompleteLayer {
                    layer: layer.name().to_owned(),
                    coord,
                });
            }
            data.processed_layers.push(layer.name().to_owned());
        }
        Ok(data)
    }
}

fn first_missing(data: &GenerationData, produces: Produces, bounds: ChunkBounds) -> Option<tessera_core::ChunkCoord> {
    bounds.iter().find(|coord| match produces {
        Produces::Chunks => !data.chunks.contains_key(coord),
        Produces::Continental => data.continental_for_chunk(*coord).is_none(),
        Produces::Regional => !data.regional.contains_key(coord),
        Produces::Local => !data.local.contains_key(coord),
    })
}
