//! # World Configuration
//!
//! One [`WorldConfig`] is built at startup and passed by reference to the
//! pipeline, the scheduler and the world manager. There is no global
//! registry.
//!
//! ## File Format
//!
//! ```toml
//! [world]
//! seed = 12345
//! chunk_size = 32
//! render_distance = 3
//! pipeline_layers = ["lands_and_seas", "zoom"]
//!
//! [layers.lands_and_seas]
//! land_ratio = 4
//!
//! [layers.zoom]
//! subdivision_factor = 2
//! ```
//!
//! Every listed layer needs a `[layers.<name>]` table, even an empty one.
//! Unknown `[world]` keys are ignored.

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// One pipeline stage: a layer name plus its raw parameters.
///
/// Parameters stay untyped here; the procedural crate decodes them into
/// the layer's own config struct.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerSpec {
    /// Registered layer name, e.g. `"zoom"`.
    pub name: String,
    /// Layer parameters.
    pub params: toml::Table,
}

impl LayerSpec {
    /// Layer with default parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: toml::Table::new(),
        }
    }

    /// Builder-style parameter override.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.params.insert(key.to_owned(), value.into());
        self
    }
}

/// World generation and streaming configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed.
    pub seed: u64,
    /// Base chunk size in tiles, used by the first pipeline layer.
    pub chunk_size: u32,
    /// Size of the chunks cached and transferred, in tiles.
    pub render_chunk_size: u32,
    /// Ordered pipeline layers.
    #[serde(skip)]
    pub layers: Vec<LayerSpec>,
    /// Load radius around the viewer, in render chunks.
    pub render_distance: u32,
    /// Unload radius, in render chunks. Must exceed `render_distance`.
    pub chunk_unload_distance: u32,
    /// Maximum number of ready render chunks.
    pub chunk_cache_limit: usize,
    /// Maximum number of tiles in the point-lookup cache.
    pub tile_cache_limit: usize,
    /// Capacity of the worker's private chunk cache.
    pub worker_cache_limit: usize,
    /// Capacity of each message queue.
    pub queue_capacity: usize,
    /// Responses applied per `process_worker_messages` call.
    pub max_responses_per_tick: usize,
    /// Minimum interval between scheduler updates.
    pub update_interval_ms: u64,
    /// The worker reports status every this many requests. 0 disables.
    pub status_interval: u64,
    /// How long `shutdown` waits for the worker thread.
    pub shutdown_timeout_ms: u64,
    /// A loading chunk with no response after this long is requested again.
    pub request_timeout_ms: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            chunk_size: 32,
            render_chunk_size: 64,
            layers: vec![LayerSpec::new("lands_and_seas"), LayerSpec::new("zoom")],
            render_distance: 3,
            chunk_unload_distance: 5,
            chunk_cache_limit: 100,
            tile_cache_limit: 50_000,
            worker_cache_limit: 100,
            queue_capacity: 1000,
            max_responses_per_tick: 10,
            update_interval_ms: 50,
            status_interval: 10,
            shutdown_timeout_ms: 5000,
            request_timeout_ms: 5000,
        }
    }
}

impl WorldConfig {
    /// Coarse land/water flip followed by one zoom (the default).
    #[must_use]
    pub fn subdivision() -> Self {
        Self::default()
    }

    /// Continental, regional and local sampling resolved into four tile kinds.
    #[must_use]
    pub fn multi_scale() -> Self {
        Self {
            layers: vec![
                LayerSpec::new("continental"),
                LayerSpec::new("regional"),
                LayerSpec::new("local"),
                LayerSpec::new("tiles"),
            ],
            ..Self::default()
        }
    }

    /// Small radii and caches for tests.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            chunk_size: 16,
            render_chunk_size: 16,
            render_distance: 1,
            chunk_unload_distance: 2,
            chunk_cache_limit: 16,
            tile_cache_limit: 4096,
            worker_cache_limit: 16,
            queue_capacity: 64,
            max_responses_per_tick: 64,
            update_interval_ms: 0,
            shutdown_timeout_ms: 2000,
            request_timeout_ms: 1000,
            ..Self::default()
        }
    }

    /// Replaces the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replaces the layer list.
    #[must_use]
    pub fn with_layers(mut self, layers: Vec<LayerSpec>) -> Self {
        self.layers = layers;
        self
    }

    /// Parses a `[world]` + `[layers.*]` TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML,
    /// [`ConfigError::MissingLayerConfig`] if a listed layer has no table,
    /// and any error from [`WorldConfig::validate`].
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let mut document: toml::Table =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut world = match document.remove("world") {
            Some(toml::Value::Table(table)) => table,
            Some(_) => return Err(ConfigError::Parse("`world` must be a table".into())),
            None => toml::Table::new(),
        };
        let layer_names = match world.remove("pipeline_layers") {
            Some(value) => Some(
                value
                    .try_into::<Vec<String>>()
                    .map_err(|e| ConfigError::Parse(format!("pipeline_layers: {e}")))?,
            ),
            None => None,
        };
        let layer_tables = match document.remove("layers") {
            Some(toml::Value::Table(table)) => table,
            Some(_) => return Err(ConfigError::Parse("`layers` must be a table".into())),
            None => toml::Table::new(),
        };

        let mut config: Self = toml::Value::Table(world)
            .try_into()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.layers = match layer_names {
            Some(names) => names
                .into_iter()
                .map(|name| match layer_tables.get(&name) {
                    Some(toml::Value::Table(params)) => Ok(LayerSpec { params: params.clone(), name }),
                    Some(_) => Err(ConfigError::Parse(format!("`layers.{name}` must be a table"))),
                    None => Err(ConfigError::MissingLayerConfig(name)),
                })
                .collect::<ConfigResult<Vec<_>>>()?,
            None => config
                .layers
                .into_iter()
                .map(|mut spec| {
                    if let Some(toml::Value::Table(params)) = layer_tables.get(&spec.name) {
                        spec.params = params.clone();
                    }
                    spec
                })
                .collect(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.layers.is_empty() {
            return Err(ConfigError::EmptyPipeline);
        }
        if let Some(spec) = self.layers.iter().find(|s| s.name.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "layers",
                reason: format!("layer with empty name: {spec:?}"),
            });
        }
        let positive: [(&'static str, u64); 9] = [
            ("chunk_size", u64::from(self.chunk_size)),
            ("render_chunk_size", u64::from(self.render_chunk_size)),
            ("chunk_cache_limit", self.chunk_cache_limit as u64),
            ("tile_cache_limit", self.tile_cache_limit as u64),
            ("worker_cache_limit", self.worker_cache_limit as u64),
            ("queue_capacity", self.queue_capacity as u64),
            ("max_responses_per_tick", self.max_responses_per_tick as u64),
            ("request_timeout_ms", self.request_timeout_ms),
            ("shutdown_timeout_ms", self.shutdown_timeout_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be at least 1".into(),
                });
            }
        }
        if self.chunk_unload_distance <= self.render_distance {
            return Err(ConfigError::InvalidValue {
                field: "chunk_unload_distance",
                reason: format!(
                    "must exceed render_distance ({} <= {})",
                    self.chunk_unload_distance, self.render_distance
                ),
            });
        }
        Ok(())
    }

    /// Names of the configured layers, in order.
    #[must_use]
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|s| s.name.as_str()).collect()
    }
}
