//! # Tiles
//!
//! A [`Tile`] is an immutable value identified by its world position.
//! Renderers only ever see tiles; chunk internals stay inside the engine.

use std::fmt;

use crate::coord::TilePos;

/// Terrain classification of a single tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TileKind {
    /// Dry land.
    Land = 0,
    /// Shallow water.
    Water = 1,
    /// Land touching water.
    Coastal = 2,
    /// Open ocean far from any land.
    DeepWater = 3,
    /// Placeholder for a tile whose chunk is not generated yet.
    Loading = 4,
}

impl TileKind {
    /// Stable lowercase name, used by renderers and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Land => "land",
            Self::Water => "water",
            Self::Coastal => "coastal",
            Self::DeepWater => "deep_water",
            Self::Loading => "loading",
        }
    }

    /// Parses a kind from its stable name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "land" => Some(Self::Land),
            "water" => Some(Self::Water),
            "coastal" => Some(Self::Coastal),
            "deep_water" => Some(Self::DeepWater),
            "loading" => Some(Self::Loading),
            _ => None,
        }
    }

    /// Returns true for land-like kinds.
    #[inline]
    #[must_use]
    pub const fn is_land(self) -> bool {
        matches!(self, Self::Land | Self::Coastal)
    }

    /// Returns true for water-like kinds.
    #[inline]
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(self, Self::Water | Self::DeepWater)
    }
}

impl fmt::Display for TileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tile at a world position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    /// World X coordinate.
    pub x: i64,
    /// World Y coordinate.
    pub y: i64,
    /// Terrain kind.
    pub kind: TileKind,
}

impl Tile {
    /// Creates a new tile.
    #[inline]
    #[must_use]
    pub const fn new(x: i64, y: i64, kind: TileKind) -> Self {
        Self { x, y, kind }
    }

    /// Transient placeholder returned while a chunk is generating.
    #[inline]
    #[must_use]
    pub const fn loading(x: i64, y: i64) -> Self {
        Self::new(x, y, TileKind::Loading)
    }

    /// World position of this tile.
    #[inline]
    #[must_use]
    pub const fn pos(&self) -> TilePos {
        TilePos::new(self.x, self.y)
    }

    /// Returns true if this is a placeholder.
    #[inline]
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.kind, TileKind::Loading)
    }
}
