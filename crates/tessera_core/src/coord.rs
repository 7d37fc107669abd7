//! # Coordinates
//!
//! Tile and chunk coordinates. All conversions use floor division so that
//! negative coordinates map to the chunk on their left, never toward zero.

use std::fmt;

/// World tile coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TilePos {
    /// X coordinate in tiles.
    pub x: i64,
    /// Y coordinate in tiles.
    pub y: i64,
}

impl TilePos {
    /// Creates a new tile position.
    #[inline]
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns the chunk containing this tile for the given chunk size.
    #[inline]
    #[must_use]
    pub const fn chunk(self, chunk_size: u32) -> ChunkCoord {
        ChunkCoord::from_tile_pos(self.x, self.y, chunk_size)
    }
}

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not tiles).
    pub x: i64,
    /// Y coordinate (in chunks, not tiles).
    pub y: i64,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Converts world tile coordinates to a chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn from_tile_pos(tile_x: i64, tile_y: i64, chunk_size: u32) -> Self {
        Self {
            x: tile_x.div_euclid(chunk_size as i64),
            y: tile_y.div_euclid(chunk_size as i64),
        }
    }

    /// Returns the world tile position of the chunk's origin corner.
    #[inline]
    #[must_use]
    pub const fn origin(self, chunk_size: u32) -> TilePos {
        TilePos::new(self.x * chunk_size as i64, self.y * chunk_size as i64)
    }

    /// Returns the coordinate offset by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i64, dy: i64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Returns the parent coordinate one subdivision level up.
    #[inline]
    #[must_use]
    pub const fn parent(self, factor: u32) -> Self {
        Self::new(self.x.div_euclid(factor as i64), self.y.div_euclid(factor as i64))
    }

    /// Euclidean distance to another chunk, in chunks.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx.hypot(dy)
    }

    /// Chebyshev (ring) distance to another chunk.
    #[inline]
    #[must_use]
    pub const fn ring_distance(self, other: Self) -> u64 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        if dx > dy {
            dx
        } else {
            dy
        }
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Inclusive rectangle of chunk coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkBounds {
    /// Minimum corner (inclusive).
    pub min: ChunkCoord,
    /// Maximum corner (inclusive).
    pub max: ChunkCoord,
}

impl ChunkBounds {
    /// Creates bounds from `(min_x, min_y, max_x, max_y)`.
    ///
    /// The corners are normalized, so swapped inputs still describe the
    /// same rectangle.
    #[must_use]
    pub fn new(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self {
            min: ChunkCoord::new(min_x.min(max_x), min_y.min(max_y)),
            max: ChunkCoord::new(min_x.max(max_x), min_y.max(max_y)),
        }
    }

    /// Bounds covering exactly one chunk.
    #[inline]
    #[must_use]
    pub const fn single(coord: ChunkCoord) -> Self {
        Self { min: coord, max: coord }
    }

    /// Width in chunks.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u64 {
        (self.max.x - self.min.x + 1) as u64
    }

    /// Height in chunks.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u64 {
        (self.max.y - self.min.y + 1) as u64
    }

    /// Number of chunks inside the bounds.
    #[inline]
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width() * self.height()
    }

    /// Returns true if `coord` lies inside the bounds.
    #[inline]
    #[must_use]
    pub const fn contains(&self, coord: ChunkCoord) -> bool {
        coord.x >= self.min.x && coord.x <= self.max.x && coord.y >= self.min.y && coord.y <= self.max.y
    }

    /// Grows the bounds by `margin` chunks on every side.
    #[inline]
    #[must_use]
    pub const fn expand(&self, margin: i64) -> Self {
        Self {
            min: ChunkCoord::new(self.min.x - margin, self.min.y - margin),
            max: ChunkCoord::new(self.max.x + margin, self.max.y + margin),
        }
    }

    /// Maps the bounds one subdivision level down (finer chunks).
    ///
    /// Every fine chunk whose parent lies inside `self` is covered.
    #[inline]
    #[must_use]
    pub const fn subdivide(&self, factor: u32) -> Self {
        let f = factor as i64;
        Self {
            min: ChunkCoord::new(self.min.x * f, self.min.y * f),
            max: ChunkCoord::new(self.max.x * f + f - 1, self.max.y * f + f - 1),
        }
    }

    /// Maps the bounds one subdivision level up (coarser chunks).
    #[inline]
    #[must_use]
    pub const fn coarsen(&self, factor: u32) -> Self {
        Self {
            min: self.min.parent(factor),
            max: self.max.parent(factor),
        }
    }

    /// Iterates every coordinate, row by row.
    pub fn iter(&self) -> impl Iterator<Item = ChunkCoord> {
        let (min, max) = (self.min, self.max);
        (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| ChunkCoord::new(x, y)))
    }
}

impl fmt::Display for ChunkBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_tiles_floor_to_left_chunk() {
        assert_eq!(ChunkCoord::from_tile_pos(-1, -1, 32), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_tile_pos(-32, 0, 32), ChunkCoord::new(-1, 0));
        assert_eq!(ChunkCoord::from_tile_pos(-33, 31, 32), ChunkCoord::new(-2, 0));
        assert_eq!(ChunkCoord::from_tile_pos(32, 64, 32), ChunkCoord::new(1, 2));
    }

    #[test]
    fn test_subdivide_then_coarsen_is_identity() {
        let bounds = ChunkBounds::new(-3, -1, 2, 4);
        let fine = bounds.subdivide(2);
        assert_eq!(fine, ChunkBounds::new(-6, -2, 5, 9));
        assert_eq!(fine.coarsen(2), bounds);
    }

    #[test]
    fn test_bounds_iter_covers_area() {
        let bounds = ChunkBounds::new(-1, -1, 1, 2);
        let coords: Vec<_> = bounds.iter().collect();
        assert_eq!(coords.len() as u64, bounds.area());
        assert!(coords.iter().all(|c| bounds.contains(*c)));
        assert_eq!(coords[0], ChunkCoord::new(-1, -1));
    }

    #[test]
    fn test_distances() {
        let a = ChunkCoord::new(0, 0);
        let b = ChunkCoord::new(3, -4);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert_eq!(a.ring_distance(b), 4);
    }
}
