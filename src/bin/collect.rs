//! Collect a synthetic navigation dataset end to end.
//!
//! Runs the full pipeline against the built-in analytic world: navigability
//! analysis, seeded viewpoint and trajectory sampling, and batched rendering
//! of every sampled pose into the dataset directory layout. Useful for
//! smoke-testing the pipeline and producing fixture datasets without a
//! simulation runtime.
//!
//! Usage:
//!   cargo run --bin collect -- --out <path> [--seed <n>] [--samples <n>]
//!                              [--envs <n>] [--world-size <m>]
//!                              [--outputs <tag,tag>] [--viz]
//!
//! Default output: dataset/ with rgb and distance_to_image_plane images

use nav_sampler::fixtures::{FlatWorld, MockScene};
use nav_sampler::render::{BatchRenderer, CameraConfig, RenderJobConfig};
use nav_sampler::sim::OutputKind;
use nav_sampler::{AnalysisConfig, SamplingConfig, TrajectorySampler, ViewpointSampler};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// Metadata describing one collection run.
#[derive(Debug, Clone, Serialize)]
struct RunMetadata {
    version: String,
    seed: u64,
    viewpoints: usize,
    trajectories: usize,
    bucket_ranges: Vec<[f32; 2]>,
    envs: usize,
    world_size: f32,
    resolution: [u32; 2],
    render_rounds: usize,
    images_written: usize,
}

const RESOLUTION: [u32; 2] = [320, 240];

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let out_dir = parse_arg(&args, "--out").unwrap_or_else(|| "dataset".to_string());
    let seed: u64 = parse_num(&args, "--seed").unwrap_or(1);
    let samples: usize = parse_num(&args, "--samples").unwrap_or(100);
    let envs: usize = parse_num(&args, "--envs").unwrap_or(2);
    let world_size: f32 = parse_num(&args, "--world-size").unwrap_or(10.0);
    let debug_viz = args.iter().any(|a| a == "--viz");
    let outputs_arg =
        parse_arg(&args, "--outputs").unwrap_or_else(|| "rgb,distance_to_image_plane".to_string());
    let outputs: Vec<OutputKind> = outputs_arg
        .split(',')
        .map(|tag| {
            OutputKind::parse(tag.trim()).unwrap_or_else(|| {
                println!("Unknown output type: {}", tag.trim());
                println!("Recognized: rgb, semantic_segmentation, distance_to_image_plane");
                std::process::exit(1);
            })
        })
        .collect();

    println!("=== nav-sampler dataset collection ===");
    println!("Output directory: {}", out_dir);
    println!("Seed: {}", seed);
    println!("Viewpoints: {}", samples);
    println!("Environments: {} ({}m floor)", envs, world_size);

    let out_path = PathBuf::from(&out_dir);
    fs::create_dir_all(&out_path).expect("Failed to create output directory");

    // A perfectly flat synthetic floor has zero probe-distance spread
    let analysis = AnalysisConfig {
        min_std_hit_distance: 0.0,
        ..AnalysisConfig::default()
    };
    let sampling = SamplingConfig {
        seed,
        save_path: Some(out_path.join("samples")),
        debug_viz,
        ..SamplingConfig::default()
    };

    println!("\n--- Sampling viewpoints ---");
    let world = FlatWorld::new(world_size, envs);
    let mut viewpoint_sampler =
        ViewpointSampler::new(analysis.clone(), sampling.clone(), world.clone())
            .expect("Failed to build viewpoint sampler");
    let viewpoints = viewpoint_sampler
        .sample_viewpoints(samples, seed)
        .expect("Viewpoint sampling failed");

    if debug_viz {
        println!("\n--- Debug visualization ---");
        let mut viz_scene = MockScene::new(envs, RESOLUTION[0], RESOLUTION[1]);
        viewpoint_sampler.visualize(&mut viz_scene, "camera_0", &viewpoints, 10);
    }

    println!("\n--- Sampling trajectories ---");
    let bucket_counts = vec![samples / 10 + 1, samples / 10 + 1];
    let bucket_min = vec![1.0, 3.0];
    let bucket_max = vec![3.0, 6.0];
    let mut trajectory_sampler = TrajectorySampler::new(analysis, sampling, world)
        .expect("Failed to build trajectory sampler");
    let trajectories = trajectory_sampler
        .sample_paths(&bucket_counts, &bucket_min, &bucket_max)
        .expect("Trajectory sampling failed");

    let cache_stats = viewpoint_sampler
        .cache()
        .stats()
        .expect("Failed to read sample cache");
    println!(
        "Sample cache: {} entries, {} bytes",
        cache_stats.entries, cache_stats.bytes
    );

    println!("\n--- Rendering ---");
    let scene = MockScene::new(envs, RESOLUTION[0], RESOLUTION[1]);
    let render_cfg = RenderJobConfig {
        cameras: vec![CameraConfig::new("camera_0", outputs)],
        ..RenderJobConfig::default()
    };
    let mut renderer = BatchRenderer::new(scene, render_cfg, out_path.clone())
        .expect("Failed to build renderer");

    let mut all_poses = viewpoints.clone();
    for trajectory in &trajectories {
        all_poses.extend_from_slice(&trajectory.poses);
    }
    let stats = renderer
        .render_viewpoints(&all_poses)
        .expect("Rendering failed");

    let metadata = RunMetadata {
        version: "1.0".to_string(),
        seed,
        viewpoints: viewpoints.len(),
        trajectories: trajectories.len(),
        bucket_ranges: bucket_min
            .iter()
            .zip(bucket_max.iter())
            .map(|(&lo, &hi)| [lo, hi])
            .collect(),
        envs,
        world_size,
        resolution: RESOLUTION,
        render_rounds: stats.rounds,
        images_written: stats.images_written,
    };
    let metadata_json = serde_json::to_string_pretty(&metadata).expect("Failed to encode metadata");
    let metadata_path = out_path.join("metadata.json");
    fs::write(&metadata_path, &metadata_json).expect("Failed to write metadata");

    println!("\n=== Collection complete ===");
    println!("Viewpoints: {}", viewpoints.len());
    println!("Trajectories: {}", trajectories.len());
    println!("Images written: {}", stats.images_written);
    println!("Metadata: {:?}", metadata_path);
}

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1).cloned())
}

fn parse_num<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    parse_arg(args, flag).and_then(|s| s.parse().ok())
}
