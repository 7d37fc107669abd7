//! # Zoom Layer
//!
//! Subdivides every chunk into `factor x factor` children and refines the
//! land/water boundary with cellular automata.
//!
//! ## Stages
//!
//! 1. Subdivide: children inherit the parent's land flag
//! 2. Fractal perturbation: some cells are re-decided by fractal noise
//! 3. Automaton passes: expansion, erosion and noise flips per iteration
//! 4. Island preservation: tiny land components from stage 2 survive
//!
//! ## Window
//!
//! The automaton runs on the output bounds grown by a margin of
//! `iterations + min_island_size + 1` cells. Errors caused by the missing
//! neighbors outside the window travel one cell per iteration, so they
//! never reach the output. Cells outside the output are discarded.

use std::collections::{HashMap, VecDeque};

use serde::Deserialize;
use tessera_core::{ChunkBounds, ChunkCoord, LayerSpec, TileKind};

use crate::data::{ChunkMeta, GenChunk, GenerationData};
use crate::error::{GenerationError, GenerationResult};
use crate::layer::{check_probability, decode_params, invalid, Layer};
use crate::noise::{cell_chance, SimplexNoise, WorldSeed};

const NAME: &str = "zoom";

const STEP_PERTURB: u64 = 0x5045_5254;
const STEP_EROSION: u64 = 1;
const STEP_NOISE: u64 = 2;

const MOORE: [(i64, i64); 8] = [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)];
const VON_NEUMANN: [(i64, i64); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];

/// Configuration of [`ZoomLayer`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    /// Children per parent, per axis.
    pub subdivision_factor: u32,
    /// Water turns land with at least this many land neighbors.
    pub land_expansion_threshold: u32,
    /// Chance that exposed land erodes, per iteration.
    pub erosion_probability: f64,
    /// Iterations when multi-pass is off.
    pub iterations: u32,
    /// Run a coarse pass then a fine pass instead of `iterations`.
    pub use_multi_pass: bool,
    /// Coarse pass iterations.
    pub pass_1_iterations: u32,
    /// Coarse pass expansion threshold.
    pub pass_1_expansion_threshold: u32,
    /// Coarse pass erosion chance.
    pub pass_1_erosion_probability: f64,
    /// Fine pass iterations.
    pub pass_2_iterations: u32,
    /// Fine pass expansion threshold.
    pub pass_2_expansion_threshold: u32,
    /// Fine pass erosion chance.
    pub pass_2_erosion_probability: f64,
    /// Fully surrounded cells become land unconditionally.
    pub protect_interior: bool,
    /// Neighbor count that qualifies as surrounded.
    pub interior_threshold: u32,
    /// Eight neighbors instead of four.
    pub use_moore_neighborhood: bool,
    /// Keep tiny land components alive through the automaton.
    pub preserve_islands: bool,
    /// Largest component size still preserved.
    pub min_island_size: u32,
    /// Random flips after each iteration.
    pub add_noise: bool,
    /// Flip chance away from coasts.
    pub noise_probability: f64,
    /// Use `edge_noise_probability` on coasts.
    pub edge_noise_boost: bool,
    /// Flip chance on coasts.
    pub edge_noise_probability: f64,
    /// Re-decide some cells from fractal noise before the automaton.
    pub fractal_perturbation: bool,
    /// Share of cells re-decided.
    pub perturbation_strength: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            subdivision_factor: 2,
            land_expansion_threshold: 3,
            erosion_probability: 0.25,
            iterations: 6,
            use_multi_pass: true,
            pass_1_iterations: 3,
            pass_1_expansion_threshold: 2,
            pass_1_erosion_probability: 0.1,
            pass_2_iterations: 3,
            pass_2_expansion_threshold: 4,
            pass_2_erosion_probability: 0.3,
            protect_interior: false,
            interior_threshold: 8,
            use_moore_neighborhood: true,
            preserve_islands: true,
            min_island_size: 1,
            add_noise: true,
            noise_probability: 0.15,
            edge_noise_boost: true,
            edge_noise_probability: 0.25,
            fractal_perturbation: true,
            perturbation_strength: 0.3,
        }
    }
}

impl ZoomConfig {
    /// Plain automaton: no noise, no perturbation, single pass.
    #[must_use]
    pub fn smooth() -> Self {
        Self {
            use_multi_pass: false,
            add_noise: false,
            fractal_perturbation: false,
            ..Self::default()
        }
    }

    /// `(expansion_threshold, erosion_probability)` for every iteration.
    #[must_use]
    pub fn schedule(&self) -> Vec<(u32, f64)> {
        if self.use_multi_pass {
            let coarse = (self.pass_1_expansion_threshold, self.pass_1_erosion_probability);
            let fine = (self.pass_2_expansion_threshold, self.pass_2_erosion_probability);
            std::iter::repeat(coarse)
                .take(self.pass_1_iterations as usize)
                .chain(std::iter::repeat(fine).take(self.pass_2_iterations as usize))
                .collect()
        } else {
            vec![(self.land_expansion_threshold, self.erosion_probability); self.iterations as usize]
        }
    }

    fn neighborhood(&self) -> &'static [(i64, i64)] {
        if self.use_moore_neighborhood {
            &MOORE
        } else {
            &VON_NEUMANN
        }
    }
}

/// Subdivision plus cellular-automata layer.
pub struct ZoomLayer {
    config: ZoomConfig,
    schedule: Vec<(u32, f64)>,
}

impl ZoomLayer {
    /// Creates the layer, validating the config.
    ///
    /// # Errors
    ///
    /// Fails if the factor is below 2, a probability is outside `[0, 1]`,
    /// or the interior threshold exceeds the neighborhood size.
    pub fn new(config: ZoomConfig) -> GenerationResult<Self> {
        if config.subdivision_factor < 2 {
            return Err(invalid(
                NAME,
                format!("subdivision_factor must be at least 2, got {}", config.subdivision_factor),
            ));
        }
        for (field, value) in [
            ("erosion_probability", config.erosion_probability),
            ("pass_1_erosion_probability", config.pass_1_erosion_probability),
            ("pass_2_erosion_probability", config.pass_2_erosion_probability),
            ("noise_probability", config.noise_probability),
            ("edge_noise_probability", config.edge_noise_probability),
            ("perturbation_strength", config.perturbation_strength),
        ] {
            check_probability(NAME, field, value)?;
        }
        let neighbors = config.neighborhood().len() as u32;
        if config.protect_interior && config.interior_threshold > neighbors {
            return Err(invalid(
                NAME,
                format!("interior_threshold {} exceeds neighborhood size {neighbors}", config.interior_threshold),
            ));
        }
        let schedule = config.schedule();
        Ok(Self { config, schedule })
    }

    /// Creates the layer from a pipeline spec.
    ///
    /// # Errors
    ///
    /// Fails on undecodable or invalid parameters.
    pub fn from_spec(spec: &LayerSpec) -> GenerationResult<Self> {
        Self::new(decode_params(spec)?)
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ZoomConfig {
        &self.config
    }

    fn island_limit(&self) -> usize {
        if self.config.preserve_islands {
            self.config.min_island_size as usize
        } else {
            0
        }
    }

    /// Cells of context needed around the output.
    #[must_use]
    pub fn margin(&self) -> i64 {
        self.schedule.len() as i64 + self.island_limit() as i64 + 1
    }
}

/// Dense land grid over an inclusive chunk window.
struct Grid {
    bounds: ChunkBounds,
    width: i64,
    cells: Vec<bool>,
}

impl Grid {
    fn index(&self, x: i64, y: i64) -> Option<usize> {
        let b = &self.bounds;
        if x < b.min.x || x > b.max.x || y < b.min.y || y > b.max.y {
            return None;
        }
        Some(((y - b.min.y) * self.width + (x - b.min.x)) as usize)
    }

    fn land(&self, x: i64, y: i64) -> Option<bool> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Size of the 4-connected land component at `start`, capped at `limit + 1`.
    fn component_size(&self, start: ChunkCoord, limit: usize) -> usize {
        let mut seen = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(c) = queue.pop_front() {
            for (dx, dy) in VON_NEUMANN {
                let n = c.offset(dx, dy);
                if self.land(n.x, n.y) == Some(true) && !seen.contains(&n) {
                    if seen.len() > limit {
                        return seen.len();
                    }
                    seen.push(n);
                    queue.push_back(n);
                }
            }
        }
        seen.len()
    }
}

impl Layer for ZoomLayer {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, mut data: GenerationData, bounds: ChunkBounds) -> GenerationResult<GenerationData> {
        let factor = self.config.subdivision_factor;
        if data.chunk_size < factor || data.chunk_size % factor != 0 {
            return Err(GenerationError::InvalidChunkSize {
                base: data.chunk_size,
                factors: vec![factor],
            });
        }
        let child_size = data.chunk_size / factor;
        let seed = data.seed.for_stage(NAME).derive(u64::from(child_size));
        let window = bounds.expand(self.margin());

        // Stages 1 and 2: inherit, then perturb.
        let fractal = self.config.fractal_perturbation.then(|| SimplexNoise::new(seed.derive(STEP_PERTURB)));
        let mut cells = Vec::with_capacity(window.area() as usize);
        for coord in window.iter() {
            let parent_coord = coord.parent(factor);
            let parent = data.chunks.get(&parent_coord).ok_or_else(|| GenerationError::MissingInput {
                layer: NAME.to_owned(),
                coord: parent_coord,
            })?;
            let mut land = parent.is_land();
            if let Some(noise) = &fractal {
                if cell_chance(seed, coord.x, coord.y, STEP_PERTURB, self.config.perturbation_strength) {
                    let value = noise.fractal(coord.x as f64 * 0.1, coord.y as f64 * 0.1);
                    if value > 0.6 {
                        land = true;
                    } else if value < 0.4 {
                        land = false;
                    }
                }
            }
            cells.push(land);
        }
        let mut grid = Grid {
            bounds: window,
            width: window.width() as i64,
            cells,
        };

        // Stage 4 input: tiny components of the pre-automaton grid.
        let limit = self.island_limit();
        let preserved: Vec<ChunkCoord> = if limit > 0 {
            bounds
                .iter()
                .filter(|c| grid.land(c.x, c.y) == Some(true) && grid.component_size(*c, limit) <= limit)
                .collect()
        } else {
            Vec::new()
        };

        // Stage 3: automaton.
        let offsets = self.config.neighborhood();
        let mut next = grid.cells.clone();
        for (iteration, &(threshold, erosion)) in self.schedule.iter().enumerate() {
            let step = (iteration as u64 + 1) << 8;
            for coord in window.iter() {
                let (x, y) = (coord.x, coord.y);
                let mut land_neighbors = 0u32;
                let mut total_neighbors = 0u32;
                let mut differs = false;
                let current = grid.land(x, y).unwrap_or(false);
                for &(dx, dy) in offsets {
                    if let Some(land) = grid.land(x + dx, y + dy) {
                        total_neighbors += 1;
                        land_neighbors += u32::from(land);
                    }
                }
                for (dx, dy) in MOORE {
                    if grid.land(x + dx, y + dy).is_some_and(|land| land != current) {
                        differs = true;
                        break;
                    }
                }

                let mut land = if self.config.protect_interior
                    && land_neighbors == total_neighbors
                    && total_neighbors >= self.config.interior_threshold
                {
                    true
                } else if !current {
                    land_neighbors >= threshold
                } else if land_neighbors < total_neighbors {
                    !cell_chance(seed, x, y, step | STEP_EROSION, erosion)
                } else {
                    true
                };

                if self.config.add_noise {
                    let p = if self.config.edge_noise_boost && differs {
                        self.config.edge_noise_probability
                    } else {
                        self.config.noise_probability
                    };
                    if cell_chance(seed, x, y, step | STEP_NOISE, p) {
                        land = !land;
                    }
                }
                if let Some(i) = grid.index(x, y) {
                    next[i] = land;
                }
            }
            std::mem::swap(&mut grid.cells, &mut next);
        }

        for coord in &preserved {
            if let Some(i) = grid.index(coord.x, coord.y) {
                grid.cells[i] = true;
            }
        }

        // Keep only the requested output.
        let mut chunks = HashMap::with_capacity(bounds.area() as usize);
        for coord in bounds.iter() {
            let parent_coord = coord.parent(factor);
            let depth = match data.chunks.get(&parent_coord).map(|p| p.meta) {
                Some(ChunkMeta::Subdivided { depth, .. }) => depth.saturating_add(1),
                _ => 1,
            };
            let kind = if grid.land(coord.x, coord.y) == Some(true) {
                TileKind::Land
            } else {
                TileKind::Water
            };
            let meta = ChunkMeta::Subdivided {
                parent: parent_coord,
                depth,
            };
            chunks.insert(coord, GenChunk::uniform(coord, child_size, kind, meta));
        }
        data.chunks = chunks;
        data.chunk_size = child_size;
        Ok(data)
    }

    fn required_input(&self, output: ChunkBounds) -> ChunkBounds {
        output.expand(self.margin()).coarsen(self.config.subdivision_factor)
    }

    fn scale_factor(&self) -> u32 {
        self.config.subdivision_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parent grid with one land chunk at the origin.
    fn single_island(size: u32) -> GenerationData {
        let mut data = GenerationData::new(WorldSeed::new(5), size);
        for coord in ChunkBounds::new(-8, -8, 8, 8).iter() {
            let kind = if coord == ChunkCoord::new(0, 0) {
                TileKind::Land
            } else {
                TileKind::Water
            };
            data.chunks.insert(coord, GenChunk::uniform(coord, size, kind, ChunkMeta::Base));
        }
        data
    }

    fn run(layer: &ZoomLayer, data: GenerationData, bounds: ChunkBounds) -> GenerationData {
        layer.process(data, bounds).unwrap()
    }

    #[test]
    fn test_subdivision_sizes_and_parents() {
        let layer = ZoomLayer::new(ZoomConfig::smooth()).unwrap();
        let bounds = ChunkBounds::new(-2, -2, 1, 1);
        let out = run(&layer, single_island(32), bounds);
        assert_eq!(out.chunk_size, 16);
        assert_eq!(out.chunks.len() as u64, bounds.area());
        let child = &out.chunks[&ChunkCoord::new(-1, 1)];
        assert_eq!(child.size, 16);
        assert_eq!(
            child.meta,
            ChunkMeta::Subdivided {
                parent: ChunkCoord::new(-1, 0),
                depth: 1
            }
        );
    }

    #[test]
    fn test_smooth_island_grows_from_children() {
        // With erosion off the four land children survive, and no water
        // cell touches three of them.
        let config = ZoomConfig {
            erosion_probability: 0.0,
            iterations: 1,
            preserve_islands: false,
            ..ZoomConfig::smooth()
        };
        let layer = ZoomLayer::new(config).unwrap();
        let out = run(&layer, single_island(32), ChunkBounds::new(-3, -3, 4, 4));
        for coord in ChunkBounds::new(0, 0, 1, 1).iter() {
            assert!(out.chunks[&coord].is_land(), "child {coord} eroded");
        }
        assert!(!out.chunks[&ChunkCoord::new(-3, -3)].is_land());
    }

    #[test]
    fn test_window_makes_output_batch_independent() {
        let layer = ZoomLayer::new(ZoomConfig::default()).unwrap();
        let mut parents = GenerationData::new(WorldSeed::new(77), 32);
        for coord in ChunkBounds::new(-20, -20, 20, 20).iter() {
            let kind = if (coord.x * 7 + coord.y * 3).rem_euclid(5) < 2 {
                TileKind::Land
            } else {
                TileKind::Water
            };
            parents.chunks.insert(coord, GenChunk::uniform(coord, 32, kind, ChunkMeta::Base));
        }

        let big = run(&layer, parents.clone(), ChunkBounds::new(-6, -6, 6, 6));
        for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(-6, 5), ChunkCoord::new(3, -1)] {
            let alone = run(&layer, parents.clone(), ChunkBounds::single(coord));
            assert_eq!(alone.chunks[&coord], big.chunks[&coord], "mismatch at {coord}");
        }
    }

    #[test]
    fn test_missing_parent_is_reported() {
        let layer = ZoomLayer::new(ZoomConfig::default()).unwrap();
        let data = GenerationData::new(WorldSeed::new(1), 32);
        let err = layer.process(data, ChunkBounds::single(ChunkCoord::new(0, 0))).err();
        assert!(matches!(err, Some(GenerationError::MissingInput { .. })));
    }

    #[test]
    fn test_required_input_covers_window() {
        let layer = ZoomLayer::new(ZoomConfig::default()).unwrap();
        let margin = layer.margin();
        assert_eq!(margin, 6 + 1 + 1);
        let input = layer.required_input(ChunkBounds::new(0, 0, 3, 3));
        assert_eq!(input, ChunkBounds::new(-4, -4, 5, 5));
    }

    #[test]
    fn test_multi_pass_schedule() {
        let schedule = ZoomConfig::default().schedule();
        assert_eq!(schedule.len(), 6);
        assert_eq!(schedule[0], (2, 0.1));
        assert_eq!(schedule[5], (4, 0.3));
        assert_eq!(ZoomConfig::smooth().schedule(), vec![(3, 0.25); 6]);
    }

    #[test]
    fn test_validation() {
        let bad_factor = ZoomConfig {
            subdivision_factor: 1,
            ..ZoomConfig::default()
        };
        assert!(ZoomLayer::new(bad_factor).is_err());
        let bad_probability = ZoomConfig {
            noise_probability: 1.5,
            ..ZoomConfig::default()
        };
        assert!(ZoomLayer::new(bad_probability).is_err());
    }

    #[test]
    fn test_isolated_land_is_preserved() {
        // Heavy erosion would wipe out a lone cell; preservation keeps it.
        let config = ZoomConfig {
            subdivision_factor: 2,
            erosion_probability: 1.0,
            land_expansion_threshold: 9,
            iterations: 3,
            min_island_size: 4,
            ..ZoomConfig::smooth()
        };
        let layer = ZoomLayer::new(config).unwrap();
        let out = run(&layer, single_island(32), ChunkBounds::new(-2, -2, 3, 3));
        for coord in ChunkBounds::new(0, 0, 1, 1).iter() {
            assert!(out.chunks[&coord].is_land(), "island cell {coord} lost");
        }
    }
}
