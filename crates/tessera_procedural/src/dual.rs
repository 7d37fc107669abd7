//! # Dual Chunk Granularity
//!
//! The pipeline works on *generation chunks* whose size shrinks with every
//! zoom layer. Caching and transfer work on fixed-size *render chunks*.
//! This module maps between the two with chunk-size arithmetic only, and
//! aggregates generation output into [`RenderChunk`]s.
//!
//! The mapping depends on the generation chunk size, never on how many
//! layers produced it.

use tessera_core::{ChunkBounds, ChunkCoord, Tile, TileKind, TilePos};

use crate::data::GenerationData;
use crate::error::{GenerationError, GenerationResult};
use crate::pipeline::Pipeline;

/// A fixed-size block of resolved tiles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderChunk {
    /// Render chunk coordinate.
    pub coord: ChunkCoord,
    /// Edge length in tiles.
    pub size: u32,
    /// Row-major tile kinds.
    tiles: Vec<TileKind>,
    /// Generation chunks that were aggregated.
    pub generation_chunk_count: u32,
}

impl RenderChunk {
    /// World position of the top-left tile.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> TilePos {
        self.coord.origin(self.size)
    }

    /// Kind of the tile at world `(x, y)`, or `None` outside this chunk.
    #[must_use]
    pub fn tile_kind(&self, x: i64, y: i64) -> Option<TileKind> {
        let origin = self.origin();
        let size = i64::from(self.size);
        let (lx, ly) = (x - origin.x, y - origin.y);
        if !(0..size).contains(&lx) || !(0..size).contains(&ly) {
            return None;
        }
        self.tiles.get((ly * size + lx) as usize).copied()
    }

    /// Iterates every tile with its world position.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        let origin = self.origin();
        let size = i64::from(self.size);
        self.tiles
            .iter()
            .enumerate()
            .map(move |(i, kind)| Tile::new(origin.x + i as i64 % size, origin.y + i as i64 / size, *kind))
    }

    /// Number of tiles held.
    #[inline]
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Share of land-like tiles.
    #[must_use]
    pub fn land_fraction(&self) -> f64 {
        if self.tiles.is_empty() {
            return 0.0;
        }
        self.tiles.iter().filter(|k| k.is_land()).count() as f64 / self.tiles.len() as f64
    }
}

/// Coordinate conversions between tiles, generation and render chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DualChunkMapper {
    render_chunk_size: u32,
}

impl DualChunkMapper {
    /// Creates a mapper for render chunks of `render_chunk_size` tiles.
    #[must_use]
    pub const fn new(render_chunk_size: u32) -> Self {
        Self { render_chunk_size }
    }

    /// Render chunk size in tiles.
    #[must_use]
    pub const fn render_chunk_size(&self) -> u32 {
        self.render_chunk_size
    }

    /// Render chunk containing world tile `(x, y)`.
    #[inline]
    #[must_use]
    pub const fn world_to_render_chunk(&self, x: i64, y: i64) -> ChunkCoord {
        ChunkCoord::from_tile_pos(x, y, self.render_chunk_size)
    }

    /// Generation chunk containing world tile `(x, y)`.
    #[inline]
    #[must_use]
    pub const fn world_to_generation_chunk(&self, x: i64, y: i64, generation_chunk_size: u32) -> ChunkCoord {
        ChunkCoord::from_tile_pos(x, y, generation_chunk_size)
    }

    /// Inclusive tile corners of a render chunk.
    #[must_use]
    pub const fn render_tile_bounds(&self, render: ChunkCoord) -> (TilePos, TilePos) {
        let min = render.origin(self.render_chunk_size);
        let last = self.render_chunk_size as i64 - 1;
        (min, TilePos::new(min.x + last, min.y + last))
    }

    /// Chunks of `chunk_size` overlapping a render chunk.
    #[must_use]
    pub const fn overlapping(&self, render: ChunkCoord, chunk_size: u32) -> ChunkBounds {
        let (min, max) = self.render_tile_bounds(render);
        ChunkBounds {
            min: min.chunk(chunk_size),
            max: max.chunk(chunk_size),
        }
    }

    /// Every generation chunk overlapping a render chunk.
    #[must_use]
    pub fn generation_chunks_for_render_chunk(&self, render: ChunkCoord, generation_chunk_size: u32) -> Vec<ChunkCoord> {
        self.overlapping(render, generation_chunk_size).iter().collect()
    }

    /// Base chunks the pipeline must be run over to cover a render chunk.
    #[must_use]
    pub const fn base_bounds_for_render_chunk(&self, render: ChunkCoord, base_chunk_size: u32) -> ChunkBounds {
        self.overlapping(render, base_chunk_size)
    }

    /// Every render chunk overlapping the tile rectangle `min..=max`.
    #[must_use]
    pub fn render_chunks_for_area(&self, min: TilePos, max: TilePos) -> Vec<ChunkCoord> {
        ChunkBounds {
            min: min.chunk(self.render_chunk_size),
            max: max.chunk(self.render_chunk_size),
        }
        .iter()
        .collect()
    }

    /// Collects the tiles of one render chunk from pipeline output.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::MissingInput`] if an overlapping
    /// generation chunk is absent from `data`.
    pub fn aggregate(&self, data: &GenerationData, render: ChunkCoord) -> GenerationResult<RenderChunk> {
        let gen_size = data.chunk_size;
        let size = i64::from(self.render_chunk_size);
        let (min, max) = self.render_tile_bounds(render);
        let mut tiles = vec![TileKind::Water; (size * size) as usize];
        let mut count = 0u32;

        for gen in self.overlapping(render, gen_size).iter() {
            let chunk = data.chunks.get(&gen).ok_or_else(|| GenerationError::MissingInput {
                layer: "render_aggregate".to_owned(),
                coord: gen,
            })?;
            count += 1;
            let origin = gen.origin(gen_size);
            let x0 = origin.x.max(min.x);
            let y0 = origin.y.max(min.y);
            let x1 = (origin.x + i64::from(gen_size) - 1).min(max.x);
            let y1 = (origin.y + i64::from(gen_size) - 1).min(max.y);
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let kind = chunk.tile_at((x - origin.x) as u32, (y - origin.y) as u32);
                    tiles[((y - min.y) * size + (x - min.x)) as usize] = kind;
                }
            }
        }

        Ok(RenderChunk {
            coord: render,
            size: self.render_chunk_size,
            tiles,
            generation_chunk_count: count,
        })
    }

    /// Runs `pipeline` over a render chunk and aggregates the result.
    ///
    /// # Errors
    ///
    /// Propagates pipeline and aggregation errors.
    pub fn generate(&self, pipeline: &Pipeline, render: ChunkCoord) -> GenerationResult<RenderChunk> {
        let bounds = self.base_bounds_for_render_chunk(render, pipeline.base_chunk_size());
        let data = pipeline.run(bounds)?;
        self.aggregate(&data, render)
    }
}
