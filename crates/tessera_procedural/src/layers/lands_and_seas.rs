//! # Lands and Seas
//!
//! The coarse first stage: decides whether each base chunk is land or
//! water.
//!
//! ## Algorithms
//!
//! - `random_chunks`: biased d10 roll per chunk, land if `roll <= land_ratio`
//! - `perlin_noise`: fractal simplex noise, land above `1 - land_ratio / 10`
//! - `cellular_automata`: a 7x7 Moore automaton centred on the chunk; the
//!   centre cell after the final iteration decides

use rand::Rng;
use serde::Deserialize;
use tessera_core::{ChunkBounds, ChunkCoord, LayerSpec, TileKind};

use crate::data::{ChunkMeta, GenChunk, GenerationData};
use crate::error::GenerationResult;
use crate::layer::{check_probability, decode_params, invalid, Layer};
use crate::noise::{cell_chance, cell_rng, SimplexNoise, WorldSeed};

const NAME: &str = "lands_and_seas";

/// Edge length of the local automaton window.
const CA_WINDOW: i64 = 7;

/// Land/water assignment algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandAlgorithm {
    /// Independent biased coin per chunk.
    #[default]
    RandomChunks,
    /// Smooth noise field.
    PerlinNoise,
    /// Local cellular automaton.
    CellularAutomata,
}

/// Noise parameters for [`LandAlgorithm::PerlinNoise`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    /// Frequency per chunk.
    pub scale: f64,
    /// Octave count.
    pub octaves: u32,
    /// Amplitude decay per octave.
    pub persistence: f64,
    /// Frequency growth per octave.
    pub lacunarity: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            scale: 0.1,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Automaton parameters for [`LandAlgorithm::CellularAutomata`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AutomatonParams {
    /// Chance a window cell starts as land.
    pub initial_land_probability: f64,
    /// Automaton steps.
    pub iterations: u32,
    /// Water turns land with more than this many land neighbors.
    pub birth_limit: u32,
    /// Land survives with at least this many land neighbors.
    pub death_limit: u32,
}

impl Default for AutomatonParams {
    fn default() -> Self {
        Self {
            initial_land_probability: 0.4,
            iterations: 5,
            birth_limit: 4,
            death_limit: 3,
        }
    }
}

/// Configuration of [`LandsAndSeasLayer`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LandsAndSeasConfig {
    /// Land share in tenths, 1..=10.
    pub land_ratio: u32,
    /// Assignment algorithm.
    pub algorithm: LandAlgorithm,
    /// Parameters for `perlin_noise`.
    pub perlin_noise: NoiseParams,
    /// Parameters for `cellular_automata`.
    pub cellular_automata: AutomatonParams,
}

impl Default for LandsAndSeasConfig {
    fn default() -> Self {
        Self {
            land_ratio: 4,
            algorithm: LandAlgorithm::RandomChunks,
            perlin_noise: NoiseParams::default(),
            cellular_automata: AutomatonParams::default(),
        }
    }
}

/// Coarse land/water layer.
pub struct LandsAndSeasLayer {
    config: LandsAndSeasConfig,
}

impl LandsAndSeasLayer {
    /// Creates the layer, validating the config.
    ///
    /// # Errors
    ///
    /// Fails if `land_ratio` is outside 1..=10 or a probability is invalid.
    pub fn new(config: LandsAndSeasConfig) -> GenerationResult<Self> {
        if !(1..=10).contains(&config.land_ratio) {
            return Err(invalid(
                NAME,
                format!("land_ratio must be between 1 and 10, got {}", config.land_ratio),
            ));
        }
        check_probability(
            NAME,
            "cellular_automata.initial_land_probability",
            config.cellular_automata.initial_land_probability,
        )?;
        Ok(Self { config })
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
    pub fn config(&self) -> &LandsAndSeasConfig {
        &self.config
    }

    fn random_chunk(&self, seed: WorldSeed, coord: ChunkCoord) -> bool {
        let roll: u32 = cell_rng(seed, coord.x, coord.y, 0).gen_range(1..=10);
        roll <= self.config.land_ratio
    }

    fn noise_chunk(&self, noise: &SimplexNoise, coord: ChunkCoord) -> bool {
        let p = &self.config.perlin_noise;
        let value = noise.octaved(
            coord.x as f64 * p.scale,
            coord.y as f64 * p.scale,
            p.octaves,
            p.persistence,
            p.lacunarity,
        );
        let normalized = (value + 1.0) * 0.5;
        normalized > 1.0 - f64::from(self.config.land_ratio) / 10.0
    }

    fn automaton_chunk(&self, seed: WorldSeed, coord: ChunkCoord) -> bool {
        let p = &self.config.cellular_automata;
        let half = CA_WINDOW / 2;
        let n = CA_WINDOW as usize;
        let mut grid: Vec<bool> = Vec::with_capacity(n * n);
        for gy in 0..CA_WINDOW {
            for gx in 0..CA_WINDOW {
                let wx = coord.x + gx - half;
                let wy = coord.y + gy - half;
                grid.push(cell_chance(seed, wx, wy, 1, p.initial_land_probability));
            }
        }

        let mut next = grid.clone();
        for _ in 0..p.iterations {
            for gy in 0..CA_WINDOW {
                for gx in 0..CA_WINDOW {
                    let mut land = 0;
                    for dy in -1..=1 {
                        for dx in -1..=1 {
                            if dx == 0 && dy == 0 {
                                continue;
                            }
                            let (nx, ny) = (gx + dx, gy + dy);
                            // Outside the window counts as water.
                            if (0..CA_WINDOW).contains(&nx)
                                && (0..CA_WINDOW).contains(&ny)
                                && grid[(ny * CA_WINDOW + nx) as usize]
                            {
                                land += 1;
                            }
                        }
                    }
                    let index = (gy * CA_WINDOW + gx) as usize;
                    next[index] = if grid[index] {
                        land >= p.death_limit
                    } else {
                        land > p.birth_limit
                    };
                }
            }
            std::mem::swap(&mut grid, &mut next);
        }
        grid[(half * CA_WINDOW + half) as usize]
    }
}

impl Layer for LandsAndSeasLayer {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, mut data: GenerationData, bounds: ChunkBounds) -> GenerationResult<GenerationData> {
        let seed = data.seed.for_stage(NAME);
        let noise = matches!(self.config.algorithm, LandAlgorithm::PerlinNoise).then(|| SimplexNoise::new(seed));
        let size = data.chunk_size;

        for coord in bounds.iter() {
            let is_land = match (self.config.algorithm, &noise) {
                (LandAlgorithm::PerlinNoise, Some(noise)) => self.noise_chunk(noise, coord),
                (LandAlgorithm::CellularAutomata, _) => self.automaton_chunk(seed, coord),
                _ => self.random_chunk(seed, coord),
            };
            let kind = if is_land { TileKind::Land } else { TileKind::Water };
            data.chunks
                .insert(coord, GenChunk::uniform(coord, size, kind, ChunkMeta::Base));
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(config: LandsAndSeasConfig, seed: u64, bounds: ChunkBounds) -> GenerationData {
        let layer = LandsAndSeasLayer::new(config).unwrap();
        layer
            .process(GenerationData::new(WorldSeed::new(seed), 32), bounds)
            .unwrap()
    }

    fn land_share(data: &GenerationData) -> f64 {
        let land = data.chunks.values().filter(|c| c.is_land()).count();
        land as f64 / data.chunks.len() as f64
    }

    #[test]
    fn test_fills_every_chunk() {
        let bounds = ChunkBounds::new(-4, -4, 4, 4);
        let data = run(LandsAndSeasConfig::default(), 12345, bounds);
        assert_eq!(data.chunks.len() as u64, bounds.area());
        assert!(bounds.iter().all(|c| data.chunks.contains_key(&c)));
    }

    #[test]
    fn test_land_ratio_is_respected() {
        let bounds = ChunkBounds::new(-30, -30, 29, 29);
        let share = land_share(&run(LandsAndSeasConfig::default(), 7, bounds));
        assert!((share - 0.4).abs() < 0.05, "expected ~40% land, got {share}");

        let all_land = LandsAndSeasConfig {
            land_ratio: 10,
            ..LandsAndSeasConfig::default()
        };
        assert!((land_share(&run(all_land, 7, bounds)) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_batch_independent() {
        for algorithm in [
            LandAlgorithm::RandomChunks,
            LandAlgorithm::PerlinNoise,
            LandAlgorithm::CellularAutomata,
        ] {
            let config = LandsAndSeasConfig {
                algorithm,
                ..LandsAndSeasConfig::default()
            };
            let big = run(config.clone(), 99, ChunkBounds::new(-5, -5, 5, 5));
            for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(-5, 3), ChunkCoord::new(4, -2)] {
                let alone = run(config.clone(), 99, ChunkBounds::single(coord));
                assert_eq!(alone.chunks[&coord], big.chunks[&coord], "{algorithm:?} at {coord}");
            }
        }
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let config = LandsAndSeasConfig {
            land_ratio: 11,
            ..LandsAndSeasConfig::default()
        };
        assert!(LandsAndSeasLayer::new(config).is_err());
    }

    #[test]
    fn test_nested_params_decode() {
        let mut automaton = toml::Table::new();
        automaton.insert("iterations".into(), toml::Value::Integer(2));
        let spec = LayerSpec::new(NAME)
            .with("algorithm", "cellular_automata")
            .with("cellular_automata", toml::Value::Table(automaton));
        let layer = LandsAndSeasLayer::from_spec(&spec).unwrap();
        assert_eq!(layer.config().algorithm, LandAlgorithm::CellularAutomata);
        assert_eq!(layer.config().cellular_automata.iterations, 2);
        assert_eq!(layer.config().cellular_automata.birth_limit, 4);
    }
}
