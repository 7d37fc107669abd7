//! # Generation Data
//!
//! State threaded through one pipeline run.
//!
//! Every map is keyed by a plain [`ChunkCoord`]. Per-chunk metadata is a
//! tagged [`ChunkMeta`] instead of an open-ended dictionary, so layers can
//! only attach metadata kinds that exist.

use std::collections::HashMap;

use tessera_core::{ChunkCoord, TileKind};

use crate::noise::WorldSeed;

/// Tile content of one generation chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkContent {
    /// Every tile in the chunk has the same kind.
    Uniform(TileKind),
    /// Row-major `size * size` tile kinds.
    Tiles(Vec<TileKind>),
}

/// How a chunk came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkMeta {
    /// Produced directly by a coarse layer.
    Base,
    /// Child of a subdivided chunk.
    Subdivided {
        /// Parent chunk, one scale up.
        parent: ChunkCoord,
        /// Number of subdivisions applied so far.
        depth: u8,
    },
    /// Resolved per tile from multi-scale samples.
    Classified {
        /// Land and coastal tiles.
        land_tiles: u32,
        /// Tiles with at least one differing neighbor kind.
        coastal_tiles: u32,
    },
}

/// One chunk at the current pipeline scale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenChunk {
    /// Chunk coordinate at its own scale.
    pub coord: ChunkCoord,
    /// Edge length in tiles.
    pub size: u32,
    /// Tile content.
    pub content: ChunkContent,
    /// Origin metadata.
    pub meta: ChunkMeta,
}

impl GenChunk {
    /// Chunk whose tiles all share one kind.
    #[must_use]
    pub const fn uniform(coord: ChunkCoord, size: u32, kind: TileKind, meta: ChunkMeta) -> Self {
        Self {
            coord,
            size,
            content: ChunkContent::Uniform(kind),
            meta,
        }
    }

    /// Kind of the tile at local offset `(lx, ly)`.
    #[must_use]
    pub fn tile_at(&self, lx: u32, ly: u32) -> TileKind {
        match &self.content {
            ChunkContent::Uniform(kind) => *kind,
            ChunkContent::Tiles(tiles) => {
                let index = (ly * self.size + lx) as usize;
                tiles.get(index).copied().unwrap_or(TileKind::Water)
            }
        }
    }

    /// Returns true if the chunk is uniformly land.
    ///
    /// Per-tile chunks are considered land if most tiles are land.
    #[must_use]
    pub fn is_land(&self) -> bool {
        match &self.content {
            ChunkContent::Uniform(kind) => kind.is_land(),
            ChunkContent::Tiles(tiles) => tiles.iter().filter(|k| k.is_land()).count() * 2 > tiles.len(),
        }
    }
}

/// One continental region sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContinentalSample {
    /// True if the region is continent, false if ocean.
    pub is_continent: bool,
    /// Raw noise value in `[0, 1]`.
    pub value: f64,
}

/// One per-chunk regional sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionalSample {
    /// True if the chunk is regionally land.
    pub is_land: bool,
    /// Threshold the sample was compared against.
    pub threshold: f64,
}

/// Sub-chunk land grid of one chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalGrid {
    /// Cells per chunk edge.
    pub resolution: u32,
    /// Row-major land flags.
    pub cells: Vec<bool>,
}

impl LocalGrid {
    /// Land flag of the cell containing local tile offset `(lx, ly)`.
    #[must_use]
    pub fn land_at_tile(&self, lx: u32, ly: u32, chunk_size: u32) -> bool {
        let cx = (u64::from(lx) * u64::from(self.resolution) / u64::from(chunk_size.max(1))) as u32;
        let cy = (u64::from(ly) * u64::from(self.resolution) / u64::from(chunk_size.max(1))) as u32;
        let index = (cy.min(self.resolution - 1) * self.resolution + cx.min(self.resolution - 1)) as usize;
        self.cells.get(index).copied().unwrap_or(false)
    }
}

/// State for one pipeline run.
#[derive(Clone, Debug)]
pub struct GenerationData {
    /// World seed.
    pub seed: WorldSeed,
    /// Chunk size, in tiles, at the current scale.
    pub chunk_size: u32,
    /// Continental samples keyed by region coordinate.
    pub continental: HashMap<ChunkCoord, ContinentalSample>,
    /// Region edge length in chunks, set by the continental layer.
    pub region_size: u32,
    /// Regional samples keyed by chunk coordinate.
    pub regional: HashMap<ChunkCoord, RegionalSample>,
    /// Local grids keyed by chunk coordinate.
    pub local: HashMap<ChunkCoord, LocalGrid>,
    /// Chunks at the current scale.
    pub chunks: HashMap<ChunkCoord, GenChunk>,
    /// Layers applied so far, in order.
    pub processed_layers: Vec<String>,
}

impl GenerationData {
    /// Empty state for a run at the base chunk size.
    #[must_use]
    pub fn new(seed: WorldSeed, chunk_size: u32) -> Self {
        Self {
            seed,
            chunk_size,
            continental: HashMap::new(),
            region_size: 1,
            regional: HashMap::new(),
            local: HashMap::new(),
            chunks: HashMap::new(),
            processed_layers: Vec::new(),
        }
    }

    /// Continental sample of the region containing `chunk`, if any.
    #[must_use]
    pub fn continental_for_chunk(&self, chunk: ChunkCoord) -> Option<&ContinentalSample> {
        self.continental.get(&chunk.parent(self.region_size.max(1)))
    }

    /// Returns true once `layer` has run.
    #[must_use]
    pub fn has_processed(&self, layer: &str) -> bool {
        self.processed_layers.iter().any(|l| l == layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_at_uniform_and_explicit() {
        let coord = ChunkCoord::new(0, 0);
        let uniform = GenChunk::uniform(coord, 4, TileKind::Land, ChunkMeta::Base);
        assert_eq!(uniform.tile_at(3, 3), TileKind::Land);
        assert!(uniform.is_land());

        let mut tiles = vec![TileKind::Water; 4];
        tiles[1] = TileKind::Coastal;
        let explicit = GenChunk {
            coord,
            size: 2,
            content: ChunkContent::Tiles(tiles),
            meta: ChunkMeta::Base,
        };
        assert_eq!(explicit.tile_at(1, 0), TileKind::Coastal);
        assert_eq!(explicit.tile_at(0, 1), TileKind::Water);
        assert!(!explicit.is_land());
    }

    #[test]
    fn test_local_grid_lookup() {
        // 2x2 grid over a 4-tile chunk: each cell covers 2x2 tiles.
        let grid = LocalGrid {
            resolution: 2,
            cells: vec![true, false, false, true],
        };
        assert!(grid.land_at_tile(0, 0, 4));
        assert!(grid.land_at_tile(1, 1, 4));
        assert!(!grid.land_at_tile(2, 0, 4));
        assert!(grid.land_at_tile(3, 3, 4));
    }

    #[test]
    fn test_continental_lookup_uses_region() {
        let mut data = GenerationData::new(WorldSeed::new(1), 16);
        data.region_size = 4;
        data.continental.insert(
            ChunkCoord::new(-1, 0),
            ContinentalSample {
                is_continent: true,
                value: 0.9,
            },
        );
        assert!(data.continental_for_chunk(ChunkCoord::new(-3, 2)).is_some());
        assert!(data.continental_for_chunk(ChunkCoord::new(0, 0)).is_none());
    }
}
