//! # Continental Layer
//!
//! Samples noise once per `region_size x region_size` block of chunks and
//! marks the whole region continent or ocean.

use serde::Deserialize;
use tessera_core::{ChunkBounds, LayerSpec};

use crate::data::{ContinentalSample, GenerationData};
use crate::error::GenerationResult;
use crate::layer::{check_probability, decode_params, invalid, Layer, Produces};
use crate::noise::SimplexNoise;

const NAME: &str = "continental";

/// Configuration of [`ContinentalLayer`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContinentalConfig {
    /// Region edge length in chunks.
    pub region_size: u32,
    /// Noise frequency per region.
    pub noise_scale: f64,
    /// Base continent threshold.
    pub continent_threshold: f64,
    /// Target continent share; shifts the threshold.
    pub land_ratio: f64,
}

impl Default for ContinentalConfig {
    fn default() -> Self {
        Self {
            region_size: 4,
            noise_scale: 0.25,
            continent_threshold: 0.5,
            land_ratio: 0.4,
        }
    }
}

/// Region-level continent/ocean layer.
pub struct ContinentalLayer {
    config: ContinentalConfig,
}

impl ContinentalLayer {
    /// Creates the layer.
    ///
    /// # Errors
    ///
    /// Fails on a zero region size or a land ratio outside `[0, 1]`.
    pub fn new(config: ContinentalConfig) -> GenerationResult<Self> {
        if config.region_size == 0 {
            return Err(invalid(NAME, "region_size must be at least 1"));
        }
        check_probability(NAME, "land_ratio", config.land_ratio)?;
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

impl Layer for ContinentalLayer {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, mut data: GenerationData, bounds: ChunkBounds) -> GenerationResult<GenerationData> {
        let noise = SimplexNoise::new(data.seed.for_stage(NAME));
        let threshold = self.config.continent_threshold + (0.5 - self.config.land_ratio);
        let scale = self.config.noise_scale;

        data.region_size = self.config.region_size;
        for region in bounds.coarsen(self.config.region_size).iter() {
            let value = noise.normalized(region.x as f64 * scale, region.y as f64 * scale);
            data.continental.insert(
                region,
                ContinentalSample {
                    is_continent: value > threshold,
                    value,
                },
            );
        }
        Ok(data)
    }

    fn produces(&self) -> Produces {
        Produces::Continental
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::WorldSeed;
    use tessera_core::ChunkCoord;

    #[test]
    fn test_one_sample_per_region() {
        let layer = ContinentalLayer::new(ContinentalConfig::default()).unwrap();
        let data = GenerationData::new(WorldSeed::new(1), 16);
        let out = layer.process(data, ChunkBounds::new(-4, 0, 7, 3)).unwrap();
        assert_eq!(out.continental.len(), 3);
        assert_eq!(out.region_size, 4);
        let a = out.continental_for_chunk(ChunkCoord::new(4, 0)).unwrap();
        let b = out.continental_for_chunk(ChunkCoord::new(7, 3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_land_ratio_extremes() {
        let all_ocean = ContinentalLayer::new(ContinentalConfig {
            land_ratio: 0.0,
            ..ContinentalConfig::default()
        })
        .unwrap();
        let out = all_ocean
            .process(GenerationData::new(WorldSeed::new(9), 16), ChunkBounds::new(-40, -40, 40, 40))
            .unwrap();
        assert!(out.continental.values().all(|s| !s.is_continent));
    }
}
