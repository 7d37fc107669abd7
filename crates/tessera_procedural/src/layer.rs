//! # Layer Contract
//!
//! A layer is one deterministic generation stage. It receives the state
//! built by earlier layers and the bounds it must fill, and returns the
//! updated state.
//!
//! ## Bounds & Scales
//!
//! `bounds` are expressed in the layer's *output* scale. A zoom layer with
//! factor 2 receives child coordinates and reads parents at half of them.
//! [`Layer::required_input`] tells the pipeline which input bounds a layer
//! needs to produce a given output, so the pipeline can plan a run from
//! the last layer backwards.

use serde::de::DeserializeOwned;
use tessera_core::{ChunkBounds, LayerSpec};

use crate::data::GenerationData;
use crate::error::{GenerationError, GenerationResult};

/// Which part of [`GenerationData`] a layer fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Produces {
    /// `data.chunks`
    Chunks,
    /// `data.continental`, one sample per region
    Continental,
    /// `data.regional`
    Regional,
    /// `data.local`
    Local,
}

/// One terrain-generation stage.
pub trait Layer: Send + Sync {
    /// Registered name of the layer.
    fn name(&self) -> &str;

    /// Populates every chunk inside `bounds` (output scale).
    ///
    /// # Errors
    ///
    /// Returns an error if input from an earlier layer is missing.
    fn process(&self, data: GenerationData, bounds: ChunkBounds) -> GenerationResult<GenerationData>;

    /// Input bounds (input scale) needed to produce `output`.
    fn required_input(&self, output: ChunkBounds) -> ChunkBounds {
        output
    }

    /// How many output chunks per input chunk, per axis.
    fn scale_factor(&self) -> u32 {
        1
    }

    /// What this layer populates.
    fn produces(&self) -> Produces {
        Produces::Chunks
    }
}

/// Decodes a layer's parameter table into its typed config.
///
/// # Errors
///
/// Returns [`GenerationError::InvalidLayerConfig`] on a type mismatch.
pub fn decode_params<T: DeserializeOwned>(spec: &LayerSpec) -> GenerationResult<T> {
    toml::Value::Table(spec.params.clone())
        .try_into()
        .map_err(|e| GenerationError::InvalidLayerConfig {
            layer: spec.name.clone(),
            reason: e.to_string(),
        })
}

/// Fails with [`GenerationError::InvalidLayerConfig`] unless `value` is a probability.
pub(crate) fn check_probability(layer: &str, field: &str, value: f64) -> GenerationResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(GenerationError::InvalidLayerConfig {
            layer: layer.to_owned(),
            reason: format!("{field} must be in [0, 1], got {value}"),
        })
    }
}

/// Shorthand for an [`GenerationError::InvalidLayerConfig`] error.
pub(crate) fn invalid(layer: &str, reason: impl Into<String>) -> GenerationError {
    GenerationError::InvalidLayerConfig {
        layer: layer.to_owned(),
        reason: reason.into(),
    }
}
