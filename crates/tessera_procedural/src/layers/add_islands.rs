//! # Add Islands
//!
//! Fills water chunks that are enclosed by land, producing lakes-turned-land
//! and bridging narrow straits. Works at whatever chunk scale it runs on.

use serde::Deserialize;
use tessera_core::{ChunkBounds, LayerSpec, TileKind};

use crate::data::{ChunkContent, GenerationData};
use crate::error::{GenerationError, GenerationResult};
use crate::layer::{check_probability, decode_params, invalid, Layer};
use crate::noise::cell_chance;

const NAME: &str = "add_islands";

/// Configuration of [`AddIslandsLayer`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AddIslandsConfig {
    /// Chance an enclosed water chunk becomes land.
    pub conversion_probability: f64,
    /// Eight neighbors instead of four.
    pub use_moore_neighborhood: bool,
    /// Land neighbors needed when `require_all_neighbors` is off.
    pub min_land_neighbors: u32,
    /// Every neighbor must be land.
    pub require_all_neighbors: bool,
}

impl Default for AddIslandsConfig {
    fn default() -> Self {
        Self {
            conversion_probability: 0.8,
            use_moore_neighborhood: true,
            min_land_neighbors: 8,
            require_all_neighbors: true,
        }
    }
}

/// Enclosed-water filling layer.
pub struct AddIslandsLayer {
    config: AddIslandsConfig,
}

impl AddIslandsLayer {
    /// Creates the layer, validating the config.
    ///
    /// # Errors
    ///
    /// Fails on an invalid probability or an unreachable neighbor count.
    pub fn new(config: AddIslandsConfig) -> GenerationResult<Self> {
        check_probability(NAME, "conversion_probability", config.conversion_probability)?;
        let max = if config.use_moore_neighborhood { 8 } else { 4 };
        if config.min_land_neighbors > max {
            return Err(invalid(
                NAME,
                format!("min_land_neighbors ({}) exceeds neighborhood size ({max})", config.min_land_neighbors),
            ));
        }
        Ok(Self { config })
    }

    /// Creates the layer from a pipeline spec.
    ///
    /// # Errors
    ///
    /// Fails on undecodable or invalid parameters.
    pub fn from_spec(spec: &LayerSpec) -> GenerationResult<Self> {
        Self::new(decode_params(spec)?)
    }
}

impl Layer for AddIslandsLayer {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, mut data: GenerationData, bounds: ChunkBounds) -> GenerationResult<GenerationData> {
        let seed = data.seed.for_stage(NAME).derive(u64::from(data.chunk_size));
        let offsets: &[(i64, i64)] = if self.config.use_moore_neighborhood {
            &[(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)]
        } else {
            &[(0, -1), (-1, 0), (1, 0), (0, 1)]
        };

        let mut converted = Vec::new();
        for coord in bounds.iter() {
            let chunk = data.chunks.get(&coord).ok_or_else(|| GenerationError::MissingInput {
                layer: NAME.to_owned(),
                coord,
            })?;
            if chunk.is_land() {
                continue;
            }
            let land = offsets
                .iter()
                .filter(|(dx, dy)| data.chunks.get(&coord.offset(*dx, *dy)).is_some_and(|c| c.is_land()))
                .count() as u32;
            let enclosed = if self.config.require_all_neighbors {
                land == offsets.len() as u32
            } else {
                land >= self.config.min_land_neighbors
            };
            if enclosed && cell_chance(seed, coord.x, coord.y, 0, self.config.conversion_probability) {
                converted.push(coord);
            }
        }

        for coord in converted {
            if let Some(chunk) = data.chunks.get_mut(&coord) {
                chunk.content = ChunkContent::Uniform(TileKind::Land);
            }
        }
        Ok(data)
    }

    fn required_input(&self, output: ChunkBounds) -> ChunkBounds {
        output.expand(1)
    }
}
