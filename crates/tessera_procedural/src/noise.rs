//! # Seeds & Noise
//!
//! Everything random in generation flows from a [`WorldSeed`].
//!
//! ## Determinism Guarantee
//!
//! Random decisions never share a running RNG stream. Each decision builds
//! its own generator from `(seed, stage, x, y, step)` with [`cell_rng`], so
//! the outcome for a cell cannot depend on how many other cells were
//! processed before it, or in which order.
//!
//! Smooth fields come from 2D [`SimplexNoise`], seeded per layer.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// World seed for deterministic generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a new world seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives an independent sub-seed for `purpose`.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }

    /// Derives the seed of a named layer or stage.
    #[inline]
    #[must_use]
    pub const fn for_stage(self, stage: &str) -> Self {
        self.derive(stage_hash(stage))
    }

    /// Derives a seed for one cell and decision step.
    #[inline]
    #[must_use]
    pub const fn cell(self, x: i64, y: i64, step: u64) -> Self {
        self.derive(x as u64).derive(y as u64 ^ 0x9e37_79b9_7f4a_7c15).derive(step)
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(12345)
    }
}

/// Stable FNV-1a hash of a stage name.
///
/// `std`'s hasher is randomized per process, so it cannot be used here.
#[must_use]
pub const fn stage_hash(name: &str) -> u64 {
    let bytes = name.as_bytes();
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        i += 1;
    }
    hash
}

/// Builds a fresh RNG for one decision at one cell.
#[inline]
#[must_use]
pub fn cell_rng(seed: WorldSeed, x: i64, y: i64, step: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed.cell(x, y, step).value())
}

/// Bernoulli trial for one cell and step.
#[inline]
#[must_use]
pub fn cell_chance(seed: WorldSeed, x: i64, y: i64, step: u64, probability: f64) -> bool {
    if probability <= 0.0 {
        return false;
    }
    if probability >= 1.0 {
        return true;
    }
    cell_rng(seed, x, y, step).gen::<f64>() < probability
}

/// Pre-computed permutation table for noise.
struct PermutationTable {
    /// 256 entries, doubled to avoid index wrapping.
    perm: [u8; 512],
}

impl PermutationTable {
    fn new(seed: WorldSeed) -> Self {
        let mut base: Vec<u8> = (0..=255).collect();
        base.shuffle(&mut ChaCha8Rng::seed_from_u64(seed.value()));

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = base[i & 255];
        }
        Self { perm }
    }

    #[inline]
    fn get(&self, index: usize) -> usize {
        usize::from(self.perm[index & 511])
    }
}

/// 12 gradient directions for 2D simplex.
const GRADIENTS: [[f64; 2]; 12] = [
    [1.0, 0.0],
    [1.0, 1.0],
    [0.0, 1.0],
    [-1.0, 1.0],
    [-1.0, 0.0],
    [-1.0, -1.0],
    [0.0, -1.0],
    [1.0, -1.0],
    [1.0, 0.0],
    [0.0, 1.0],
    [-1.0, 0.0],
    [0.0, -1.0],
];

/// 2D Simplex noise generator.
///
/// Produces smooth, continuous values in `[-1, 1]`; use
/// [`SimplexNoise::normalized`] for `[0, 1]` thresholds.
pub struct SimplexNoise {
    perm_table: PermutationTable,
}

impl SimplexNoise {
    /// Skewing factor: (sqrt(3) - 1) / 2.
    const F2: f64 = 0.366_025_403_784_439;
    /// Unskewing factor: (3 - sqrt(3)) / 6.
    const G2: f64 = 0.211_324_865_405_187;

    /// Creates a new simplex noise generator from a seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            perm_table: PermutationTable::new(seed),
        }
    }

    /// Samples noise at `(x, y)`, in `[-1, 1]`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let skew = (x + y) * Self::F2;
        let i = (x + skew).floor();
        let j = (y + skew).floor();

        let unskew = (i + j) * Self::G2;
        let x0 = x - (i - unskew);
        let y0 = y - (j - unskew);

        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - f64::from(i1) + Self::G2;
        let y1 = y0 - f64::from(j1) + Self::G2;
        let x2 = x0 - 1.0 + 2.0 * Self::G2;
        let y2 = y0 - 1.0 + 2.0 * Self::G2;

        let ii = (i as i64 & 255) as usize;
        let jj = (j as i64 & 255) as usize;
        let p = &self.perm_table;
        let g0 = p.get(ii + p.get(jj));
        let g1 = p.get(ii + i1 as usize + p.get(jj + j1 as usize));
        let g2 = p.get(ii + 1 + p.get(jj + 1));

        70.0 * (corner(x0, y0, g0) + corner(x1, y1, g1) + corner(x2, y2, g2))
    }

    /// Fractal noise: `octaves` layers, each at `lacunarity` times the
    /// frequency and `persistence` times the amplitude of the previous.
    #[must_use]
    pub fn octaved(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..octaves.max(1) {
            total += self.sample(x * frequency, y * frequency) * amplitude;
            max_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        total / max_amplitude
    }

    /// Single-octave sample mapped to `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn normalized(&self, x: f64, y: f64) -> f64 {
        ((self.sample(x, y) + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Three-octave fractal sample mapped to `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn fractal(&self, x: f64, y: f64) -> f64 {
        ((self.octaved(x, y, 3, 0.5, 2.0) + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

#[inline]
fn corner(x: f64, y: f64, gradient: usize) -> f64 {
    let t = 0.5 - x * x - y * y;
    if t < 0.0 {
        return 0.0;
    }
    let g = GRADIENTS[gradient % 12];
    let t2 = t * t;
    t2 * t2 * (x * g[0] + y * g[1])
}
