//! # Local Layer
//!
//! Samples an `R x R` grid inside every chunk and roughens its coastline
//! with a few erosion/expansion iterations. Neighbors are only looked up
//! inside the chunk's own grid, so each chunk is self-contained.

use serde::Deserialize;
use tessera_core::{ChunkBounds, ChunkCoord, LayerSpec};

use crate::data::{GenerationData, LocalGrid};
use crate::error::GenerationResult;
use crate::layer::{check_probability, decode_params, invalid, Layer, Produces};
use crate::noise::{cell_chance, SimplexNoise, WorldSeed};

const NAME: &str = "local";

/// Configuration of [`LocalLayer`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Samples per chunk edge.
    pub sampling_resolution: u32,
    /// Noise frequency per tile.
    pub noise_scale: f64,
    /// Coastline iterations.
    pub coastal_detail_iterations: u32,
    /// Chance coastal land turns to water, per iteration.
    pub erosion_probability: f64,
    /// Chance coastal water turns to land, per iteration.
    pub expansion_probability: f64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            sampling_resolution: 8,
            noise_scale: 0.05,
            coastal_detail_iterations: 2,
            erosion_probability: 0.3,
            expansion_probability: 0.2,
        }
    }
}

/// Sub-chunk sampling layer.
pub struct LocalLayer {
    config: LocalConfig,
}

impl LocalLayer {
    /// Creates the layer.
    ///
    /// # Errors
    ///
    /// Fails on a zero resolution or invalid probabilities.
    pub fn new(config: LocalConfig) -> GenerationResult<Self> {
        if config.sampling_resolution == 0 {
            return Err(invalid(NAME, "sampling_resolution must be at least 1"));
        }
        check_probability(NAME, "erosion_probability", config.erosion_probability)?;
        check_probability(NAME, "expansion_probability", config.expansion_probability)?;
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

    fn sample_chunk(&self, noise: &SimplexNoise, seed: WorldSeed, data: &GenerationData, coord: ChunkCoord) -> LocalGrid {
        let res = self.config.sampling_resolution;
        let size = i64::from(data.chunk_size);
        let origin = coord.origin(data.chunk_size);
        let regional_land = data.regional.get(&coord).is_some_and(|s| s.is_land);
        let threshold = if regional_land { 0.3 } else { 0.7 };
        let scale = self.config.noise_scale;

        // World position of every sample, row-major.
        let positions: Vec<(i64, i64)> = (0..i64::from(res))
            .flat_map(|ly| (0..i64::from(res)).map(move |lx| (lx, ly)))
            .map(|(lx, ly)| {
                (
                    origin.x + lx * size / i64::from(res),
                    origin.y + ly * size / i64::from(res),
                )
            })
            .collect();
        let mut cells: Vec<bool> = positions
            .iter()
            .map(|&(x, y)| noise.normalized(x as f64 * scale, y as f64 * scale) > threshold)
            .collect();

        let r = res as i64;
        for iteration in 0..self.config.coastal_detail_iterations {
            let step = u64::from(iteration) + 1;
            let mut next = cells.clone();
            for ly in 0..r {
                for lx in 0..r {
                    let index = (ly * r + lx) as usize;
                    let (mut land_n, mut water_n) = (0, 0);
                    for dy in -1..=1 {
                        for dx in -1..=1 {
                            let (nx, ny) = (lx + dx, ly + dy);
                            if (dx, dy) == (0, 0) || !(0..r).contains(&nx) || !(0..r).contains(&ny) {
                                continue;
                            }
                            if cells[(ny * r + nx) as usize] {
                                land_n += 1;
                            } else {
                                water_n += 1;
                            }
                        }
                    }
                    let (x, y) = positions[index];
                    if cells[index] && water_n > 0 {
                        if cell_chance(seed, x, y, step, self.config.erosion_probability) {
                            next[index] = false;
                        }
                    } else if !cells[index]
                        && land_n > 0
                        && cell_chance(seed, x, y, step, self.config.expansion_probability)
                    {
                        next[index] = true;
                    }
                }
            }
            cells = next;
        }

        LocalGrid { resolution: res, cells }
    }
}

impl Layer for LocalLayer {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, mut data: GenerationData, bounds: ChunkBounds) -> GenerationResult<GenerationData> {
        let seed = data.seed.for_stage(NAME);
        let noise = SimplexNoise::new(seed);
        for coord in bounds.iter() {
            let grid = self.sample_chunk(&noise, seed, &data, coord);
            data.local.insert(coord, grid);
        }
        Ok(data)
    }

    fn produces(&self) -> Produces {
        Produces::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RegionalSample;

    fn with_regional(land: bool) -> GenerationData {
        let mut data = GenerationData::new(WorldSeed::new(21), 16);
        for coord in ChunkBounds::new(-10, -10, 10, 10).iter() {
            data.regional.insert(
                coord,
                RegionalSample {
                    is_land: land,
                    threshold: 0.5,
                },
            );
        }
        data
    }

    fn land_share(data: &GenerationData) -> f64 {
        let (land, total) = data.local.values().fold((0, 0), |(l, t), g| {
            (l + g.cells.iter().filter(|c| **c).count(), t + g.cells.len())
        });
        land as f64 / total as f64
    }

    #[test]
    fn test_grid_shape() {
        let layer = LocalLayer::new(LocalConfig::default()).unwrap();
        let out = layer.process(with_regional(true), ChunkBounds::new(0, 0, 1, 0)).unwrap();
        assert_eq!(out.local.len(), 2);
        assert!(out.local.values().all(|g| g.resolution == 8 && g.cells.len() == 64));
    }

    #[test]
    fn test_regional_bias_shifts_land() {
        let layer = LocalLayer::new(LocalConfig::default()).unwrap();
        let bounds = ChunkBounds::new(-10, -10, 10, 10);
        let land = land_share(&layer.process(with_regional(true), bounds).unwrap());
        let water = land_share(&layer.process(with_regional(false), bounds).unwrap());
        assert!(land > water, "land regions {land} vs water regions {water}");
    }

    #[test]
    fn test_chunk_is_self_contained() {
        let layer = LocalLayer::new(LocalConfig::default()).unwrap();
        let coord = ChunkCoord::new(3, -7);
        let big = layer.process(with_regional(true), ChunkBounds::new(-10, -10, 10, 10)).unwrap();
        let alone = layer.process(with_regional(true), ChunkBounds::single(coord)).unwrap();
        assert_eq!(big.local[&coord], alone.local[&coord]);
    }
}
