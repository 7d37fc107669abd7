//! # Determinism Integration Test
//!
//! The same seed must produce the same world no matter how the requests
//! are batched or in which order render chunks are generated.

use tessera_core::{ChunkBounds, ChunkCoord, LayerSpec, TileKind, WorldConfig};
use tessera_procedural::{DualChunkMapper, GenerationError, Pipeline, RenderChunk};

fn render(config: &WorldConfig, coord: ChunkCoord) -> RenderChunk {
    let pipeline = Pipeline::from_config(config).unwrap();
    DualChunkMapper::new(config.render_chunk_size)
        .generate(&pipeline, coord)
        .unwrap()
}

/// Test: Two fresh pipelines agree on every tile.
#[test]
fn test_same_seed_same_world() {
    let config = WorldConfig::default();
    for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(-3, 7), ChunkCoord::new(100, -100)] {
        assert_eq!(render(&config, coord), render(&config, coord));
    }
}

/// Test: Generation order does not leak into results.
#[test]
fn test_order_independent() {
    let config = WorldConfig::multi_scale();
    let pipeline = Pipeline::from_config(&config).unwrap();
    let mapper = DualChunkMapper::new(config.render_chunk_size);
    let coords: Vec<ChunkCoord> = ChunkBounds::new(-1, -1, 1, 1).iter().collect();

    let forward: Vec<RenderChunk> = coords
        .iter()
        .map(|c| mapper.generate(&pipeline, *c).unwrap())
        .collect();
    let mut backward: Vec<RenderChunk> = coords
        .iter()
        .rev()
        .map(|c| mapper.generate(&pipeline, *c).unwrap())
        .collect();
    backward.reverse();

    assert_eq!(forward, backward);
}

/// Cuts a 5x5 block of render chunks out of one pipeline run and compares
/// each with the same chunk generated on its own.
fn assert_batch_matches_single(config: &WorldConfig) {
    let pipeline = Pipeline::from_config(config).unwrap();
    let mapper = DualChunkMapper::new(config.render_chunk_size);
    let base = pipeline.base_chunk_size();

    let first = mapper.base_bounds_for_render_chunk(ChunkCoord::new(-2, -2), base);
    let last = mapper.base_bounds_for_render_chunk(ChunkCoord::new(2, 2), base);
    let batch = pipeline
        .run(ChunkBounds { min: first.min, max: last.max })
        .unwrap();

    for coord in ChunkBounds::new(-2, -2, 2, 2).iter() {
        let from_batch = mapper.aggregate(&batch, coord).unwrap();
        let alone = mapper.generate(&pipeline, coord).unwrap();
        assert_eq!(from_batch, alone, "render chunk {coord} differs for {:?}", config.layer_names());
    }
}

/// Test: A render chunk cut from a large batch equals one generated alone.
#[test]
fn test_render_chunk_from_batch() {
    assert_batch_matches_single(&WorldConfig::default());
}

/// Test: Batch and single generation agree for the multi-scale layers.
#[test]
fn test_render_chunk_from_batch_multi_scale() {
    assert_batch_matches_single(&WorldConfig::multi_scale());
}

/// Test: Batch and single generation agree with islands, tiles and two zooms.
#[test]
fn test_render_chunk_from_batch_deep_chain() {
    let config = WorldConfig::default().with_layers(vec![
        LayerSpec::new("lands_and_seas"),
        LayerSpec::new("zoom"),
        LayerSpec::new("add_islands"),
        LayerSpec::new("zoom"),
        LayerSpec::new("tiles"),
    ]);
    assert_batch_matches_single(&config);
}

/// Test: Adjacent render chunks line up along the shared edge.
#[test]
fn test_seamless_borders() {
    let config = WorldConfig::default();
    let left = render(&config, ChunkCoord::new(0, 0));
    let right = render(&config, ChunkCoord::new(1, 0));

    let pipeline = Pipeline::from_config(&config).unwrap();
    let data = pipeline.run(ChunkBounds::new(0, 0, 3, 1)).unwrap();
    let size = i64::from(data.chunk_size);
    for y in 0..64 {
        let gen_left = ChunkCoord::from_tile_pos(63, y, data.chunk_size);
        let gen_right = ChunkCoord::from_tile_pos(64, y, data.chunk_size);
        let expected_left = data.chunks[&gen_left].tile_at((63 % size) as u32, (y % size) as u32);
        let expected_right = data.chunks[&gen_right].tile_at(0, (y % size) as u32);
        assert_eq!(left.tile_kind(63, y), Some(expected_left));
        assert_eq!(right.tile_kind(64, y), Some(expected_right));
    }
}

/// Test: Land share over a wide area follows the configured ratio.
#[test]
fn test_land_ratio_over_area() {
    let config = WorldConfig::default();
    let pipeline = Pipeline::from_config(&config).unwrap();
    let mapper = DualChunkMapper::new(config.render_chunk_size);

    let mut land = 0.0;
    let mut count = 0.0;
    for coord in ChunkBounds::new(0, 0, 5, 5).iter() {
        land += mapper.generate(&pipeline, coord).unwrap().land_fraction();
        count += 1.0;
    }
    let share = land / count;
    assert!(share > 0.05 && share < 0.9, "land share {share}");
}

/// Test: Every tile resolves to a concrete terrain kind.
#[test]
fn test_no_loading_tiles_generated() {
    for config in [WorldConfig::subdivision(), WorldConfig::multi_scale()] {
        let chunk = render(&config, ChunkCoord::new(2, -2));
        assert!(chunk.tiles().all(|t| t.kind != TileKind::Loading));
    }
}

/// Test: Misconfigured pipelines fail before generating anything.
#[test]
fn test_invalid_pipelines_rejected() {
    let config = WorldConfig::default().with_layers(vec![LayerSpec::new("no_such_layer")]);
    assert!(matches!(
        Pipeline::from_config(&config),
        Err(GenerationError::UnknownLayer(name)) if name == "no_such_layer"
    ));

    let mut odd = WorldConfig::default();
    odd.chunk_size = 33;
    assert!(matches!(
        Pipeline::from_config(&odd),
        Err(GenerationError::InvalidChunkSize { base: 33, .. })
    ));
}
