//! # Regional Layer
//!
//! One land/water sample per chunk, biased toward land inside continents
//! and toward water in oceans. A second, slower noise field wobbles the
//! threshold so coastlines do not follow region edges.

use serde::Deserialize;
use tessera_core::{ChunkBounds, LayerSpec};

use crate::data::{GenerationData, RegionalSample};
use crate::error::{GenerationError, GenerationResult};
use crate::layer::{check_probability, decode_params, Layer, Produces};
use crate::noise::SimplexNoise;

const NAME: &str = "regional";

/// Configuration of [`RegionalLayer`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegionalConfig {
    /// Noise frequency per chunk.
    pub noise_scale: f64,
    /// Weight of the continental designation, `0..=1`.
    pub land_bias_from_continental: f64,
    /// Amplitude of the threshold wobble.
    pub coastal_variation: f64,
}

impl Default for RegionalConfig {
    fn default() -> Self {
        Self {
            noise_scale: 0.15,
            land_bias_from_continental: 0.7,
            coastal_variation: 0.2,
        }
    }
}

/// Per-chunk land/water layer.
pub struct RegionalLayer {
    config: RegionalConfig,
}

impl RegionalLayer {
    /// Creates the layer.
    ///
    /// # Errors
    ///
    /// Fails if the continental bias is outside `[0, 1]`.
    pub fn new(config: RegionalConfig) -> GenerationResult<Self> {
        check_probability(NAME, "land_bias_from_continental", config.land_bias_from_continental)?;
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

    /// Threshold a chunk's noise must exceed to be land.
    #[must_use]
    pub fn threshold(&self, is_continent: bool, wobble: f64) -> f64 {
        let base = if is_continent { 0.3 } else { 0.7 };
        let bias = self.config.land_bias_from_continental;
        base * bias + (1.0 - bias) * 0.5 + (wobble - 0.5) * self.config.coastal_variation
    }
}

impl Layer for RegionalLayer {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, mut data: GenerationData, bounds: ChunkBounds) -> GenerationResult<GenerationData> {
        let seed = data.seed.for_stage(NAME);
        let field = SimplexNoise::new(seed);
        let wobble = SimplexNoise::new(seed.derive(1));
        let scale = self.config.noise_scale;

        for coord in bounds.iter() {
            let continent = data
                .continental_for_chunk(coord)
                .ok_or_else(|| GenerationError::MissingInput {
                    layer: NAME.to_owned(),
                    coord,
                })?
                .is_continent;
            let (x, y) = (coord.x as f64 * scale, coord.y as f64 * scale);
            let threshold = self.threshold(continent, wobble.normalized(x * 0.3, y * 0.3));
            data.regional.insert(
                coord,
                RegionalSample {
                    is_land: field.normalized(x, y) > threshold,
                    threshold,
                },
            );
        }
        Ok(data)
    }

    fn produces(&self) -> Produces {
        Produces::Regional
    }
}
