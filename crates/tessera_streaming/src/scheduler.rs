//! # Chunk Scheduler
//!
//! Decides which render chunks to load and unload as the viewer moves.
//!
//! Loading covers the square of Chebyshev radius `load_radius` around the
//! viewer's chunk, ring by ring outward, each ring sorted closest first.
//! Unloading uses a larger `unload_radius` so chunks at the boundary do not
//! thrash when the viewer steps back and forth.

use std::collections::HashMap;
use std::sync::Arc;

use tessera_core::{ChunkCoord, Priority, WorldConfig};

/// Chunks to load and unload after a move.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScheduleDelta {
    /// Newly required chunks, closest first.
    pub load: Vec<ChunkCoord>,
    /// Chunks no longer within the unload radius.
    pub unload: Vec<ChunkCoord>,
}

impl ScheduleDelta {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.load.is_empty() && self.unload.is_empty()
    }
}

/// Spiral load order around a moving center.
#[derive(Debug)]
pub struct ChunkScheduler {
    load_radius: u32,
    unload_radius: u32,
    center: Option<ChunkCoord>,
    /// Offset patterns per radius.
    spirals: HashMap<u32, Arc<[(i64, i64)]>>,
}

impl ChunkScheduler {
    /// Creates a scheduler.
    ///
    /// `unload_radius` is raised to `load_radius + 1` if it is not larger.
    #[must_use]
    pub fn new(load_radius: u32, unload_radius: u32) -> Self {
        Self {
            load_radius,
            unload_radius: unload_radius.max(load_radius + 1),
            center: None,
            spirals: HashMap::new(),
        }
    }

    /// Creates a scheduler from `render_distance` and `chunk_unload_distance`.
    #[must_use]
    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.render_distance, config.chunk_unload_distance)
    }

    /// Load radius in chunks.
    #[must_use]
    pub const fn load_radius(&self) -> u32 {
        self.load_radius
    }

    /// Unload radius in chunks.
    #[must_use]
    pub const fn unload_radius(&self) -> u32 {
        self.unload_radius
    }

    /// Current center, once one has been set.
    #[must_use]
    pub const fn center(&self) -> Option<ChunkCoord> {
        self.center
    }

    /// Offsets within `radius`, ring by ring, each ring closest first.
    ///
    /// Ties are broken by `(dy, dx)` so the pattern is stable per radius.
    pub fn spiral_offsets(&mut self, radius: u32) -> Arc<[(i64, i64)]> {
        Arc::clone(
            self.spirals
                .entry(radius)
                .or_insert_with(|| build_spiral(radius)),
        )
    }

    /// Chunks within `radius` of `center` in load order.
    pub fn spiral(&mut self, center: ChunkCoord, radius: u32) -> Vec<ChunkCoord> {
        self.spiral_offsets(radius)
            .iter()
            .map(|&(dx, dy)| center.offset(dx, dy))
            .collect()
    }

    /// Every chunk within the load radius of `center`, closest first.
    /// Makes `center` the current center.
    pub fn initial_chunks(&mut self, center: ChunkCoord) -> Vec<ChunkCoord> {
        self.center = Some(center);
        self.spiral(center, self.load_radius)
    }

    /// Chunks within the load radius of the current center.
    pub fn current_chunks(&mut self) -> Vec<ChunkCoord> {
        match self.center {
            Some(center) => self.spiral(center, self.load_radius),
            None => Vec::new(),
        }
    }

    /// Moves the center and returns what to load and unload.
    ///
    /// The first call behaves like [`ChunkScheduler::initial_chunks`].
    /// Moving to the current center is a no-op.
    pub fn update_for_position(&mut self, new_center: ChunkCoord) -> ScheduleDelta {
        let Some(old_center) = self.center else {
            return ScheduleDelta {
                load: self.initial_chunks(new_center),
                unload: Vec::new(),
            };
        };
        if old_center == new_center {
            return ScheduleDelta::default();
        }

        let load_radius = u64::from(self.load_radius);
        let unload_radius = u64::from(self.unload_radius);
        let load = self
            .spiral(new_center, self.load_radius)
            .into_iter()
            .filter(|c| c.ring_distance(old_center) > load_radius)
            .collect();
        let unload = self
            .spiral(old_center, self.load_radius)
            .into_iter()
            .filter(|c| c.ring_distance(new_center) > unload_radius)
            .collect();

        self.center = Some(new_center);
        ScheduleDelta { load, unload }
    }

    /// Whether `chunk` lies beyond the unload radius of the current center.
    #[must_use]
    pub fn is_beyond_unload(&self, chunk: ChunkCoord) -> bool {
        self.center
            .is_some_and(|center| chunk.ring_distance(center) > u64::from(self.unload_radius))
    }

    /// Euclidean distance of `chunk` from the current center.
    #[must_use]
    pub fn priority(&self, chunk: ChunkCoord) -> f64 {
        self.center.map_or(0.0, |center| chunk.distance(center))
    }

    /// Request tier for `chunk` by distance band.
    #[must_use]
    pub fn priority_tier(&self, chunk: ChunkCoord) -> Priority {
        Priority::from_distance(self.priority(chunk))
    }
}

fn build_spiral(radius: u32) -> Arc<[(i64, i64)]> {
    let r = i64::from(radius);
    let mut offsets = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
    for ring in 0..=r {
        let mut ring_offsets: Vec<(i64, i64)> = (-ring..=ring)
            .flat_map(|dy| (-ring..=ring).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx.abs().max(dy.abs()) == ring)
            .collect();
        ring_offsets.sort_by_key(|&(dx, dy)| (dx * dx + dy * dy, dy, dx));
        offsets.extend(ring_offsets);
    }
    offsets.into()
}
