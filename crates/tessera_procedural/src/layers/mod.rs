//! # Layer Registry
//!
//! Two layer sets ship with the crate:
//!
//! - Subdivision: [`lands_and_seas`] then one or more [`zoom`] layers,
//!   optionally [`add_islands`]. Produces uniform land/water chunks.
//! - Multi-scale: [`continental`], [`regional`], [`local`], [`tiles`].
//!   Produces per-tile land, coastal, water and deep-water kinds.

pub mod add_islands;
pub mod continental;
pub mod lands_and_seas;
pub mod local;
pub mod regional;
pub mod tiles;
pub mod zoom;

use tessera_core::LayerSpec;

use crate::error::{GenerationError, GenerationResult};
use crate::layer::Layer;

pub use add_islands::AddIslandsLayer;
pub use continental::ContinentalLayer;
pub use lands_and_seas::LandsAndSeasLayer;
pub use local::LocalLayer;
pub use regional::RegionalLayer;
pub use tiles::TilesLayer;
pub use zoom::ZoomLayer;

/// Every layer name [`build_layer`] accepts.
pub const LAYER_NAMES: [&str; 7] = [
    "lands_and_seas",
    "zoom",
    "add_islands",
    "continental",
    "regional",
    "local",
    "tiles",
];

/// Builds a layer from its spec.
///
/// `base_chunk_size` is the chunk size the layer will see as input; layers
/// that depend on tile geometry validate against it.
///
/// # Errors
///
/// Returns [`GenerationError::UnknownLayer`] for unregistered names and
/// [`GenerationError::InvalidLayerConfig`] for bad parameters.
pub fn build_layer(spec: &LayerSpec, base_chunk_size: u32) -> GenerationResult<Box<dyn Layer>> {
    let layer: Box<dyn Layer> = match spec.name.as_str() {
        "lands_and_seas" => Box::new(LandsAndSeasLayer::from_spec(spec)?),
        "zoom" => Box::new(ZoomLayer::from_spec(spec)?),
        "add_islands" => Box::new(AddIslandsLayer::from_spec(spec)?),
        "continental" => Box::new(ContinentalLayer::from_spec(spec)?),
        "regional" => Box::new(RegionalLayer::from_spec(spec)?),
        "local" => Box::new(LocalLayer::from_spec(spec)?),
        "tiles" => Box::new(TilesLayer::from_spec(spec, base_chunk_size)?),
        other => return Err(GenerationError::UnknownLayer(other.to_owned())),
    };
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_registered_name_builds() {
        for name in LAYER_NAMES {
            let layer = build_layer(&LayerSpec::new(name), 32).unwrap();
            assert_eq!(layer.name(), name);
        }
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let err = build_layer(&LayerSpec::new("volcanoes"), 32).err();
        assert_eq!(err, Some(GenerationError::UnknownLayer("volcanoes".into())));
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let spec = LayerSpec::new("zoom").with("iterations", "many");
        assert!(matches!(
            build_layer(&spec, 32),
            Err(GenerationError::InvalidLayerConfig { .. })
        ));
    }
}
