//! # Tiles Layer
//!
//! Resolves every tile to land, coastal, water or deep water.
//!
//! ## Terrain Source
//!
//! Each tile reads the finest scale available for its chunk:
//! local grid, then regional sample, then continental region, then an
//! existing chunk, then water.
//!
//! ## Classification
//!
//! - land with a water tile among its 8 neighbors: coastal
//! - water in an ocean region, in a regionally-water chunk, with no land
//!   within `deep_water_radius` tiles: deep water

use serde::Deserialize;
use tessera_core::{ChunkBounds, ChunkCoord, LayerSpec, TileKind};

use crate::data::{ChunkContent, ChunkMeta, GenChunk, GenerationData};
use crate::error::GenerationResult;
use crate::layer::{decode_params, invalid, Layer};

const NAME: &str = "tiles";

/// Configuration of [`TilesLayer`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TilesConfig {
    /// Land-free radius, in tiles, required for deep water.
    pub deep_water_radius: u32,
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self { deep_water_radius: 2 }
    }
}

/// Per-tile classification layer.
pub struct TilesLayer {
    config: TilesConfig,
    /// Chunks of context needed on every side.
    reach: i64,
}

impl TilesLayer {
    /// Creates the layer for chunks of `chunk_size` tiles.
    ///
    /// # Errors
    ///
    /// Fails on a zero chunk size.
    pub fn new(config: TilesConfig, chunk_size: u32) -> GenerationResult<Self> {
        if chunk_size == 0 {
            return Err(invalid(NAME, "chunk size must be at least 1"));
        }
        let radius = config.deep_water_radius.max(1);
        let reach = i64::from(radius.div_ceil(chunk_size));
        Ok(Self { config, reach })
    }

    /// Creates the layer from a pipeline spec.
    ///
    /// # Errors
    ///
    /// Fails on undecodable or invalid parameters.
    pub fn from_spec(spec: &LayerSpec, chunk_size: u32) -> GenerationResult<Self> {
        Self::new(decode_params(spec)?, chunk_size)
    }
}

/// Land flags over a rectangle of tiles, with a summed-area table.
struct TerrainGrid {
    min_x: i64,
    min_y: i64,
    width: usize,
    land: Vec<bool>,
    /// `(width + 1) * (height + 1)` prefix sums of land tiles.
    sums: Vec<u32>,
}

impl TerrainGrid {
    fn build(data: &GenerationData, area: ChunkBounds) -> Self {
        let size = data.chunk_size;
        let s = size as usize;
        let width = area.width() as usize * s;
        let height = area.height() as usize * s;
        let origin = area.min.origin(size);
        let mut land = vec![false; width * height];

        for coord in area.iter() {
            let base_x = ((coord.x - area.min.x) as usize) * s;
            let base_y = ((coord.y - area.min.y) as usize) * s;
            let uniform = if data.local.contains_key(&coord) {
                None
            } else if let Some(sample) = data.regional.get(&coord) {
                Some(sample.is_land)
            } else if let Some(sample) = data.continental_for_chunk(coord) {
                Some(sample.is_continent)
            } else {
                Some(data.chunks.get(&coord).is_some_and(GenChunk::is_land))
            };
            for ly in 0..size {
                let row = (base_y + ly as usize) * width + base_x;
                for lx in 0..size {
                    land[row + lx as usize] = match (uniform, data.local.get(&coord)) {
                        (Some(flag), _) => flag,
                        (None, Some(grid)) => grid.land_at_tile(lx, ly, size),
                        (None, None) => false,
                    };
                }
            }
        }

        let mut sums = vec![0u32; (width + 1) * (height + 1)];
        for y in 0..height {
            let mut row_sum = 0u32;
            for x in 0..width {
                row_sum += u32::from(land[y * width + x]);
                sums[(y + 1) * (width + 1) + x + 1] = sums[y * (width + 1) + x + 1] + row_sum;
            }
        }

        Self {
            min_x: origin.x,
            min_y: origin.y,
            width,
            land,
            sums,
        }
    }

    fn index(&self, x: i64, y: i64) -> usize {
        (y - self.min_y) as usize * self.width + (x - self.min_x) as usize
    }

    fn is_land(&self, x: i64, y: i64) -> bool {
        self.land[self.index(x, y)]
    }

    /// Land tiles in the square of `radius` around `(x, y)`.
    fn land_within(&self, x: i64, y: i64, radius: i64) -> u32 {
        let x0 = (x - radius - self.min_x) as usize;
        let y0 = (y - radius - self.min_y) as usize;
        let x1 = (x + radius - self.min_x) as usize + 1;
        let y1 = (y + radius - self.min_y) as usize + 1;
        let w = self.width + 1;
        self.sums[y1 * w + x1] + self.sums[y0 * w + x0] - self.sums[y0 * w + x1] - self.sums[y1 * w + x0]
    }
}

impl Layer for TilesLayer {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, mut data: GenerationData, bounds: ChunkBounds) -> GenerationResult<GenerationData> {
        let size = data.chunk_size;
        let grid = TerrainGrid::build(&data, bounds.expand(self.reach));
        let radius = i64::from(self.config.deep_water_radius);

        let mut out: Vec<(ChunkCoord, GenChunk)> = Vec::with_capacity(bounds.area() as usize);
        for coord in bounds.iter() {
            let origin = coord.origin(size);
            let ocean = !data.continental_for_chunk(coord).is_some_and(|s| s.is_continent);
            let regional_water = !data.regional.get(&coord).is_some_and(|s| s.is_land);
            let mut tiles = Vec::with_capacity((size * size) as usize);
            let (mut land_tiles, mut coastal_tiles) = (0u32, 0u32);

            for y in origin.y..origin.y + i64::from(size) {
                for x in origin.x..origin.x + i64::from(size) {
                    let kind = if grid.is_land(x, y) {
                        land_tiles += 1;
                        // Neighbors are all land iff the 3x3 sum is 9.
                        if grid.land_within(x, y, 1) < 9 {
                            coastal_tiles += 1;
                            TileKind::Coastal
                        } else {
                            TileKind::Land
                        }
                    } else if ocean && regional_water && grid.land_within(x, y, radius) == 0 {
                        TileKind::DeepWater
                    } else {
                        TileKind::Water
                    };
                    tiles.push(kind);
                }
            }

            let chunk = GenChunk {
                coord,
                size,
                content: ChunkContent::Tiles(tiles),
                meta: ChunkMeta::Classified {
                    land_tiles,
                    coastal_tiles,
                },
            };
            out.push((coord, chunk));
        }
        data.chunks.extend(out);
        Ok(data)
    }

    fn required_input(&self, output: ChunkBounds) -> ChunkBounds {
        output.expand(self.reach)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ContinentalSample, LocalGrid, RegionalSample};
    use crate::noise::WorldSeed;

    /// 3x3 chunks of 4 tiles; only the centre chunk is regionally land.
    fn regional_island() -> GenerationData {
        let mut data = GenerationData::new(WorldSeed::new(1), 4);
        for coord in ChunkBounds::new(-2, -2, 2, 2).iter() {
            data.regional.insert(
                coord,
                RegionalSample {
                    is_land: coord == ChunkCoord::new(0, 0),
                    threshold: 0.5,
                },
            );
        }
        data
    }

    fn kind_at(data: &GenerationData, x: i64, y: i64) -> TileKind {
        let coord = ChunkCoord::from_tile_pos(x, y, data.chunk_size);
        let origin = coord.origin(data.chunk_size);
        data.chunks[&coord].tile_at((x - origin.x) as u32, (y - origin.y) as u32)
    }

    #[test]
    fn test_coast_and_deep_water() {
        let layer = TilesLayer::new(TilesConfig::default(), 4).unwrap();
        let out = layer.process(regional_island(), ChunkBounds::new(-1, -1, 1, 1)).unwrap();

        // Interior of the 4x4 island is land, its rim coastal.
        assert_eq!(kind_at(&out, 1, 1), TileKind::Land);
        assert_eq!(kind_at(&out, 0, 0), TileKind::Coastal);
        assert_eq!(kind_at(&out, 3, 2), TileKind::Coastal);
        // Right next to the island: plain water. Far away: deep water.
        assert_eq!(kind_at(&out, -1, 0), TileKind::Water);
        assert_eq!(kind_at(&out, -2, 0), TileKind::Water);
        assert_eq!(kind_at(&out, -4, -4), TileKind::DeepWater);
    }

    #[test]
    fn test_continent_blocks_deep_water() {
        let mut data = regional_island();
        data.region_size = 8;
        data.continental.insert(
            ChunkCoord::new(-1, -1),
            ContinentalSample {
                is_continent: true,
                value: 1.0,
            },
        );
        let layer = TilesLayer::new(TilesConfig::default(), 4).unwrap();
        let out = layer.process(data, ChunkBounds::new(-1, -1, 1, 1)).unwrap();
        assert_eq!(kind_at(&out, -4, -4), TileKind::Water);
    }

    #[test]
    fn test_local_grid_wins_over_regional() {
        let mut data = regional_island();
        data.local.insert(
            ChunkCoord::new(0, 0),
            LocalGrid {
                resolution: 1,
                cells: vec![false],
            },
        );
        let layer = TilesLayer::new(TilesConfig::default(), 4).unwrap();
        let out = layer.process(data, ChunkBounds::single(ChunkCoord::new(0, 0))).unwrap();
        assert!(out.chunks[&ChunkCoord::new(0, 0)].tile_at(1, 1).is_water());
    }

    #[test]
    fn test_classified_meta_counts() {
        let layer = TilesLayer::new(TilesConfig::default(), 4).unwrap();
        let out = layer.process(regional_island(), ChunkBounds::single(ChunkCoord::new(0, 0))).unwrap();
        assert_eq!(
            out.chunks[&ChunkCoord::new(0, 0)].meta,
            ChunkMeta::Classified {
                land_tiles: 16,
                coastal_tiles: 12
            }
        );
    }

    #[test]
    fn test_reach_grows_with_radius() {
        let near = TilesLayer::new(TilesConfig { deep_water_radius: 2 }, 16).unwrap();
        let far = TilesLayer::new(TilesConfig { deep_water_radius: 20 }, 16).unwrap();
        let bounds = ChunkBounds::single(ChunkCoord::new(0, 0));
        assert_eq!(near.required_input(bounds), bounds.expand(1));
        assert_eq!(far.required_input(bounds), bounds.expand(2));
    }
}
