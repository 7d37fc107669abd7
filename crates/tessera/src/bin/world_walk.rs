//! # World Walk
//!
//! Headless walk through a generated world.
//!
//! Usage: `world_walk [config.toml] [steps]`
//!
//! Walks the camera east one tile per tick, prints streaming statistics
//! every few hundred ticks, then draws the area around the final position.

use std::time::{Duration, Instant};

use tessera::{TileKind, WorldConfig, WorldManager, WorldStatistics};

const DEFAULT_STEPS: i64 = 2000;
const REPORT_EVERY: i64 = 250;
const TICK: Duration = Duration::from_millis(2);
const SCREEN_W: u32 = 160;
const SCREEN_H: u32 = 90;

fn load_config(path: Option<&str>) -> Result<WorldConfig, String> {
    let Some(path) = path else {
        return Ok(WorldConfig::default());
    };
    let source = std::fs::read_to_string(path).map_err(|e| format!("cannot read {path}: {e}"))?;
    WorldConfig::from_toml_str(&source).map_err(|e| e.to_string())
}

fn print_stats(tick: i64, stats: &WorldStatistics) {
    println!(
        "  tick {tick:>6} | ready {:>4} | loading {:>3} | requested {:>5} | failed {:>3} | tiles {:>6} | hit {:>5.1}% | gen {:>6.2}ms",
        stats.loaded_render_chunks,
        stats.loading_chunks,
        stats.chunks_requested,
        stats.chunks_failed,
        stats.tile_cache_size,
        stats.cache_hit_ratio * 100.0,
        stats.worker_avg_generation_time.as_secs_f64() * 1000.0,
    );
}

fn glyph(kind: TileKind) -> char {
    match kind {
        TileKind::Land => '#',
        TileKind::Coastal => '+',
        TileKind::Water => '~',
        TileKind::DeepWater => ' ',
        TileKind::Loading => '?',
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, steps_arg) = match args.first() {
        Some(first) if first.parse::<i64>().is_ok() => (None, Some(first.as_str())),
        first => (first.map(String::as_str), args.get(1).map(String::as_str)),
    };
    let steps = steps_arg.and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_STEPS);

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {e}");
            std::process::exit(1);
        }
    };

    println!("═══════════════════════════════════════════════════════════════════");
    println!("                          TESSERA WORLD WALK");
    println!("═══════════════════════════════════════════════════════════════════");
    println!("  seed:          {}", config.seed);
    println!("  layers:        {}", config.layer_names().join(" → "));
    println!("  chunk size:    {} (render {})", config.chunk_size, config.render_chunk_size);
    println!("  radius:        load {} / unload {}", config.render_distance, config.chunk_unload_distance);
    println!("  steps:         {steps}");
    println!();

    let mut world = match WorldManager::new(config) {
        Ok(world) => world,
        Err(e) => {
            eprintln!("✗ failed to start world: {e}");
            std::process::exit(1);
        }
    };
    println!("  generation chunk size: {}", world.generation_chunk_size());
    println!();

    let start = Instant::now();
    let mut camera = (0i64, 0i64);
    for tick in 0..steps {
        camera.0 = tick;
        world.update_chunks(&camera, SCREEN_W, SCREEN_H);
        world.get_tile(camera.0, camera.1);
        if tick % REPORT_EVERY == 0 {
            print_stats(tick, &world.get_statistics());
        }
        std::thread::sleep(TICK);
    }

    // Let the area under the camera finish.
    let settle = Instant::now();
    while world.get_statistics().loading_chunks > 0 && settle.elapsed() < Duration::from_secs(10) {
        world.update_chunks(&camera, SCREEN_W, SCREEN_H);
        std::thread::sleep(TICK);
    }
    print_stats(steps, &world.get_statistics());

    println!();
    println!("  map around ({}, {}):", camera.0, camera.1);
    for y in (camera.1 - 12)..(camera.1 + 12) {
        let row: String = ((camera.0 - 40)..(camera.0 + 40))
            .map(|x| glyph(world.get_tile(x, y).kind))
            .collect();
        println!("  {row}");
    }
    println!();

    world.shutdown();
    let stats = world.get_statistics();
    println!(
        "✓ walked {steps} tiles in {:.2}s, {} chunks generated, {} messages dropped",
        start.elapsed().as_secs_f64(),
        stats.worker_chunks_generated,
        stats.messages_dropped,
    );
}
