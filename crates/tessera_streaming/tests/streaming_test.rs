//! # Streaming Integration Test
//!
//! Drives a real world manager and worker thread the way a game loop would.

use std::thread;
use std::time::{Duration, Instant};

use tessera_core::{ChunkCoord, LayerSpec, TileKind, WorldConfig};
use tessera_streaming::WorldManager;

fn tick_until(world: &mut WorldManager, camera: (i64, i64), done: impl Fn(&WorldManager) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(30);
    while !done(world) {
        assert!(Instant::now() < deadline, "world did not settle in time");
        world.update_chunks(&camera, 0, 0);
        thread::sleep(Duration::from_millis(2));
    }
}

/// Test: A tile reads as loading, then as land or water, then stays put.
#[test]
fn test_tile_becomes_ready_and_stable() {
    let config = WorldConfig::default()
        .with_seed(12345)
        .with_layers(vec![
            LayerSpec::new("lands_and_seas").with("land_ratio", 4),
            LayerSpec::new("zoom"),
        ]);
    assert_eq!(config.chunk_size, 32);
    let mut world = WorldManager::new(config).unwrap();

    assert_eq!(world.get_tile(0, 0).kind, TileKind::Loading);

    tick_until(&mut world, (0, 0), |w| w.is_chunk_ready(ChunkCoord::new(0, 0)));
    let tile = world.get_tile(0, 0);
    assert!(matches!(tile.kind, TileKind::Land | TileKind::Water), "got {}", tile.kind);
    for _ in 0..10 {
        assert_eq!(world.get_tile(0, 0), tile);
    }
}

fn wait_for_generated(world: &WorldManager, count: u64) {
    let deadline = Instant::now() + Duration::from_secs(30);
    while world.get_statistics().worker_chunks_generated < count {
        assert!(Instant::now() < deadline, "worker did not generate {count} chunks");
        thread::sleep(Duration::from_millis(2));
    }
}

/// Test: A response dropped on a full consumer queue does not leave its
/// chunk loading for good.
#[test]
fn test_dropped_response_is_requested_again() {
    let mut config = WorldConfig::testing();
    config.queue_capacity = 2;
    config.request_timeout_ms = 200;
    let mut world = WorldManager::new(config).unwrap();

    // Fill the consumer queue without draining it.
    world.get_tile(0, 0);
    world.get_tile(16, 0);
    wait_for_generated(&world, 2);

    // These two responses find the queue full.
    world.get_tile(0, 16);
    world.get_tile(16, 16);
    wait_for_generated(&world, 4);
    let stuck = ChunkCoord::new(0, 1);
    assert!(world.get_statistics().messages_dropped >= 2);
    assert!(world.is_chunk_loading(stuck));
    assert!(!world.is_chunk_ready(stuck));

    let deadline = Instant::now() + Duration::from_secs(10);
    while !world.is_chunk_ready(stuck) {
        assert!(Instant::now() < deadline, "chunk stuck in loading after its response was dropped");
        world.update_chunks(&(8i64, 24i64), 0, 0);
        world.get_tile(0, 16);
        thread::sleep(Duration::from_millis(5));
    }
    assert_ne!(world.get_tile(0, 16).kind, TileKind::Loading);
}

/// Test: Moving one chunk east requests only the new column.
#[test]
fn test_move_requests_new_column_only() {
    let mut config = WorldConfig::testing();
    config.render_distance = 2;
    config.chunk_unload_distance = 3;
    let size = i64::from(config.render_chunk_size);
    let mut world = WorldManager::new(config).unwrap();

    world.update_chunks(&(0i64, 0i64), 0, 0);
    assert_eq!(world.get_statistics().chunks_requested, 25);

    world.update_chunks(&(size, 0i64), 0, 0);
    assert_eq!(world.get_statistics().chunks_requested, 30);
    for y in -2..=2 {
        let info = world.get_chunk_info(3 * size, y * size);
        assert!(info.loading || info.loaded, "chunk (3, {y}) not requested");
    }
}

/// Test: A long walk never holds more ready chunks than the limit.
#[test]
fn test_walk_respects_cache_limit() {
    let mut config = WorldConfig::testing();
    config.chunk_cache_limit = 12;
    let limit = config.chunk_cache_limit;
    let size = i64::from(config.render_chunk_size);
    let mut world = WorldManager::new(config).unwrap();

    for step in 0..40 {
        let camera = (step * size / 2, 0);
        world.update_chunks(&camera, 0, 0);
        world.get_tile(camera.0, camera.1);
        let stats = world.get_statistics();
        assert!(stats.loaded_render_chunks <= limit);
        thread::sleep(Duration::from_millis(1));
    }
    tick_until(&mut world, (20 * size, 0), |w| w.get_statistics().loading_chunks == 0);
    assert!(world.get_statistics().loaded_render_chunks <= limit);
}

/// Test: Each chunk is requested at most once while it is loading.
#[test]
fn test_at_most_one_request_in_flight() {
    let mut world = WorldManager::new(WorldConfig::testing()).unwrap();
    for _ in 0..20 {
        world.update_chunks(&(0i64, 0i64), 0, 0);
        for x in -20..20 {
            world.get_tile(x, x);
        }
    }
    let stats = world.get_statistics();
    assert_eq!(stats.chunks_requested, stats.requested_chunks as u64 + stats.chunks_failed);
}

/// Test: Reads return promptly even with a deep worker queue.
#[test]
fn test_get_tile_never_blocks() {
    let mut config = WorldConfig::testing();
    config.queue_capacity = 4096;
    config.chunk_cache_limit = 4096;
    let mut world = WorldManager::new(config).unwrap();

    let start = Instant::now();
    for x in 0..2000 {
        world.get_tile(x * 16, 0);
    }
    assert!(start.elapsed() < Duration::from_secs(2));
}

/// Test: Everything around the camera loads, then unloads after moving away.
#[test]
fn test_unload_after_moving_away() {
    let config = WorldConfig::testing();
    let size = i64::from(config.render_chunk_size);
    let mut world = WorldManager::new(config).unwrap();

    tick_until(&mut world, (0, 0), |w| {
        let stats = w.get_statistics();
        stats.loaded_render_chunks == 9 && stats.loading_chunks == 0
    });

    let far = (100 * size, 100 * size);
    world.update_chunks(&far, 0, 0);
    assert!(!world.is_chunk_ready(ChunkCoord::new(0, 0)));
    tick_until(&mut world, far, |w| w.is_chunk_ready(ChunkCoord::new(100, 100)));
    let stats = world.get_statistics();
    assert!(stats.loaded_render_chunks <= 9);
    assert!(stats.tile_cache_size <= 9 * 16 * 16);
}

/// Test: Shutdown is explicit, repeatable and also runs on drop.
#[test]
fn test_shutdown_and_drop() {
    let mut world = WorldManager::new(WorldConfig::testing()).unwrap();
    world.update_chunks(&(0i64, 0i64), 0, 0);
    world.shutdown();
    world.shutdown();
    drop(world);

    let world = WorldManager::new(WorldConfig::testing()).unwrap();
    drop(world);
}

/// Test: Invalid configs never start a worker.
#[test]
fn test_invalid_config_rejected() {
    let mut config = WorldConfig::testing();
    config.chunk_unload_distance = config.render_distance;
    assert!(WorldManager::new(config).is_err());

    let config = WorldConfig::testing().with_layers(vec![LayerSpec::new("mystery")]);
    assert!(WorldManager::new(config).is_err());
}
