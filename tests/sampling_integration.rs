//! End-to-end pipeline tests: analysis, sampling and rendering against the
//! synthetic analytic world, asserting on the persisted dataset.

use nav_sampler::fixtures::{FlatWorld, MockScene};
use nav_sampler::render::{BatchRenderer, CameraConfig, RenderJobConfig};
use nav_sampler::sim::{ColorAdapter, OutputKind, RayCaster};
use nav_sampler::{
    AnalysisConfig, SamplingConfig, TrajectorySampler, ViewpointSampler,
};
use std::fs;
use tempfile::TempDir;

fn analysis_config() -> AnalysisConfig {
    AnalysisConfig {
        min_std_hit_distance: 0.0,
        ..AnalysisConfig::default()
    }
}

fn sampling_config(dir: &TempDir) -> SamplingConfig {
    SamplingConfig {
        save_path: Some(dir.path().join("samples")),
        ..SamplingConfig::default()
    }
}

#[test]
fn test_full_pipeline_produces_dataset() {
    let temp_dir = TempDir::new().unwrap();

    let mut sampler = ViewpointSampler::new(
        analysis_config(),
        sampling_config(&temp_dir),
        FlatWorld::new(10.0, 2),
    )
    .unwrap();
    let poses = sampler.sample_viewpoints(25, 42).unwrap();
    assert_eq!(poses.len(), 25);

    let cfg = RenderJobConfig {
        cameras: vec![CameraConfig::new(
            "camera_0",
            vec![OutputKind::Rgb, OutputKind::DistanceToImagePlane],
        )],
        ..RenderJobConfig::default()
    };
    let dataset_dir = temp_dir.path().join("dataset");
    let mut renderer = BatchRenderer::new(MockScene::new(2, 16, 16), cfg, &dataset_dir).unwrap();
    let stats = renderer.render_viewpoints(&poses).unwrap();

    // 25 poses over 2 parallel instances
    assert_eq!(stats.rounds, 13);
    assert_eq!(stats.images_written, 50);

    let camera_dir = dataset_dir.join("camera_0");
    assert!(camera_dir.join("intrinsics.txt").exists());
    let pose_rows = fs::read_to_string(dataset_dir.join("camera_poses.txt")).unwrap();
    assert_eq!(pose_rows.lines().count(), 25);

    for tag in ["rgb", "distance_to_image_plane"] {
        let count = fs::read_dir(camera_dir.join(tag)).unwrap().count();
        assert_eq!(count, 25, "unexpected image count under {}", tag);
    }
}

#[test]
fn test_seed_reproducible_across_runs() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();

    let mut sampler_a = ViewpointSampler::new(
        analysis_config(),
        sampling_config(&dir_a),
        FlatWorld::new(8.0, 2),
    )
    .unwrap();
    let mut sampler_b = ViewpointSampler::new(
        analysis_config(),
        sampling_config(&dir_b),
        FlatWorld::new(8.0, 2),
    )
    .unwrap();

    // Independent caches, same seed: bit-identical pose sequences
    let a = sampler_a.sample_viewpoints(40, 7).unwrap();
    let b = sampler_b.sample_viewpoints(40, 7).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_sampled_positions_keep_wall_clearance() {
    let temp_dir = TempDir::new().unwrap();
    let world = FlatWorld::new(10.0, 1).with_pillar([5.0, 5.0], 0.6);
    let cfg = analysis_config();
    let min_wall = cfg.min_wall_distance;

    let mut sampler =
        ViewpointSampler::new(cfg, sampling_config(&temp_dir), world.clone()).unwrap();
    let poses = sampler.sample_viewpoints(30, 3).unwrap();

    for pose in &poses {
        let p = pose.position();
        let lateral = world.cast_ray(
            0,
            p,
            (glam::Vec3::new(5.0, 5.0, p.z) - p).normalize(),
        );
        if let Some(dist) = lateral {
            // Clearance is enforced over a discrete ray fan, so allow the
            // small angular undersampling margin
            assert!(
                dist >= min_wall * 0.95,
                "pose at {:?} is {}m from the pillar",
                p,
                dist
            );
        }
    }
}

#[test]
fn test_trajectories_render_into_same_dataset() {
    let temp_dir = TempDir::new().unwrap();
    let world = FlatWorld::new(10.0, 1);

    let mut viewpoint_sampler = ViewpointSampler::new(
        analysis_config(),
        sampling_config(&temp_dir),
        world.clone(),
    )
    .unwrap();
    let viewpoints = viewpoint_sampler.sample_viewpoints(6, 1).unwrap();

    let mut trajectory_sampler =
        TrajectorySampler::new(analysis_config(), sampling_config(&temp_dir), world).unwrap();
    let trajectories = trajectory_sampler
        .sample_paths(&[3, 3], &[1.0, 3.0], &[3.0, 6.0])
        .unwrap();
    assert_eq!(trajectories.len(), 6);
    for trajectory in &trajectories {
        assert!(trajectory.length >= 1.0 && trajectory.length <= 6.0);
    }

    let cfg = RenderJobConfig {
        cameras: vec![CameraConfig::new(
            "camera_0",
            vec![OutputKind::DistanceToImagePlane],
        )],
        ..RenderJobConfig::default()
    };
    let dataset_dir = temp_dir.path().join("dataset");
    let mut renderer = BatchRenderer::new(MockScene::new(1, 8, 8), cfg, &dataset_dir).unwrap();

    // Viewpoint batch first, trajectory poses appended with monotone indices
    renderer.render_viewpoints(&viewpoints).unwrap();
    let trajectory_poses: Vec<_> = trajectories
        .iter()
        .flat_map(|t| t.poses.iter().copied())
        .collect();
    renderer.render_viewpoints(&trajectory_poses).unwrap();

    let image_dir = dataset_dir.join("camera_0").join("distance_to_image_plane");
    let total = viewpoints.len() + trajectory_poses.len();
    assert_eq!(fs::read_dir(&image_dir).unwrap().count(), total);
    assert!(image_dir.join("0000.png").exists());
    assert!(image_dir
        .join(format!("{:04}.png", total - 1))
        .exists());
}

#[test]
fn test_rasterized_scene_gets_warmup_frames() {
    let temp_dir = TempDir::new().unwrap();
    let cfg = RenderJobConfig {
        cameras: vec![CameraConfig::new("cam", vec![OutputKind::Rgb])],
        warmup_steps: 10,
        ..RenderJobConfig::default()
    };
    let scene = MockScene::new(3, 8, 8).rasterized();
    let mut renderer = BatchRenderer::new(scene, cfg, temp_dir.path()).unwrap();
    let stats = renderer.render_viewpoints(&pose_grid(7)).unwrap();

    assert_eq!(stats.rounds, 3);
    assert_eq!(renderer.scene().render_steps, 30);
    assert_eq!(renderer.scene().updates, 3);
}

#[test]
fn test_invalid_sensor_pixels_persist_as_zero() {
    let temp_dir = TempDir::new().unwrap();
    let cfg = RenderJobConfig {
        cameras: vec![CameraConfig::new(
            "depth_cam",
            vec![OutputKind::DistanceToImagePlane],
        )],
        ..RenderJobConfig::default()
    };
    let scene = MockScene::new(1, 4, 4).with_invalid_pixels();
    let mut renderer = BatchRenderer::new(scene, cfg, temp_dir.path()).unwrap();
    renderer.render_viewpoints(&pose_grid(1)).unwrap();

    let img = image::open(
        temp_dir
            .path()
            .join("depth_cam")
            .join("distance_to_image_plane")
            .join("0000.png"),
    )
    .unwrap()
    .to_luma16();
    assert_eq!(img.get_pixel(0, 0).0[0], 0);
    assert_eq!(img.get_pixel(1, 0).0[0], 0);
    // Remaining pixels keep the scaled 0.5m depth
    assert_eq!(img.get_pixel(3, 3).0[0], 500);
}

#[test]
fn test_colorized_semantics_in_dataset() {
    let temp_dir = TempDir::new().unwrap();
    let lut = vec![[200, 0, 0], [0, 200, 0], [0, 0, 200]];
    let cfg = RenderJobConfig {
        cameras: vec![CameraConfig::new(
            "sem_cam",
            vec![OutputKind::SemanticSegmentation],
        )
        .with_adapter(ColorAdapter::Colorized(lut.clone()))],
        ..RenderJobConfig::default()
    };
    let scene = MockScene::new(1, 6, 6).with_raw_semantics();
    let mut renderer = BatchRenderer::new(scene, cfg, temp_dir.path()).unwrap();
    renderer.render_viewpoints(&pose_grid(1)).unwrap();

    let img = image::open(
        temp_dir
            .path()
            .join("sem_cam")
            .join("semantic_segmentation")
            .join("0000.png"),
    )
    .unwrap()
    .to_rgb8();
    for (x, y) in [(0u32, 0u32), (2, 1), (4, 4)] {
        let class = MockScene::class_at(x, y) as usize;
        assert_eq!(img.get_pixel(x, y).0, lut[class]);
    }
}

fn pose_grid(n: usize) -> Vec<nav_sampler::Pose> {
    (0..n)
        .map(|i| {
            nav_sampler::Pose::from_euler(glam::Vec3::new(i as f32, 0.0, 1.0), 0.0, 0.0, 0.0)
        })
        .collect()
}
