//! Synthetic test environments.
//!
//! This module provides simulator-free implementations of the collaborator
//! traits, enabling testing of the full analysis/sampling/rendering pipeline
//! without a simulation runtime.
//!
//! - [`FlatWorld`]: an analytic ray caster over a flat square floor per
//!   environment instance, with an optional blocking pillar, deterministic
//!   surface roughness and a two-class semantic split.
//! - [`MockScene`]: a scene whose camera buffers are computed analytically,
//!   with call counters for asserting warm-up and stepping behavior.

use crate::sim::{Aabb, Frame, OutputKind, RayCaster, Scene};
use crate::{CameraIntrinsics, Pose};
use glam::Vec3;
use std::collections::HashMap;

/// Deterministic pseudo-noise in `[0, 1)` from a surface coordinate.
fn surface_noise(x: f32, y: f32) -> f32 {
    let v = (x * 12.9898 + y * 78.233).sin() * 43758.5453;
    v.fract().abs()
}

/// Base floor height. Sits above the default ground-plane accessibility
/// threshold so the whole floor counts as traversable.
pub const FLOOR_Z: f32 = 0.5;

/// An infinitely tall blocking column. Vertical probes starting inside it
/// never return; lateral rays hit its surface.
#[derive(Clone, Copy, Debug)]
struct Pillar {
    center: [f32; 2],
    radius: f32,
}

/// Analytic ray caster: identical square floors at `z = 0`, one per
/// environment instance.
#[derive(Clone, Debug)]
pub struct FlatWorld {
    size: f32,
    envs: usize,
    pillar: Option<Pillar>,
    roughness: f32,
    class_split: bool,
}

impl FlatWorld {
    pub fn new(size: f32, envs: usize) -> Self {
        Self {
            size,
            envs,
            pillar: None,
            roughness: 0.0,
            class_split: false,
        }
    }

    /// Place a blocking column in every instance.
    pub fn with_pillar(mut self, center: [f32; 2], radius: f32) -> Self {
        self.pillar = Some(Pillar { center, radius });
        self
    }

    /// Perturb the floor height with deterministic noise of the given
    /// amplitude, giving probe bundles a nonzero hit-distance spread.
    pub fn with_roughness(mut self, amplitude: f32) -> Self {
        self.roughness = amplitude;
        self
    }

    /// Classify the floor: class 0 on the left half, class 1 on the right.
    pub fn with_class_split(mut self) -> Self {
        self.class_split = true;
        self
    }

    fn floor_height(&self, x: f32, y: f32) -> f32 {
        FLOOR_Z + self.roughness * surface_noise(x, y)
    }

    fn in_pillar(&self, x: f32, y: f32) -> bool {
        match self.pillar {
            Some(p) => {
                let dx = x - p.center[0];
                let dy = y - p.center[1];
                dx * dx + dy * dy <= p.radius * p.radius
            }
            None => false,
        }
    }

    /// Smallest positive distance along a lateral ray to the pillar surface.
    fn pillar_hit(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let p = self.pillar?;
        let ox = origin.x - p.center[0];
        let oy = origin.y - p.center[1];
        let (dx, dy) = (direction.x, direction.y);

        let a = dx * dx + dy * dy;
        if a < 1e-12 {
            return None;
        }
        let b = 2.0 * (ox * dx + oy * dy);
        let c = ox * ox + oy * oy - p.radius * p.radius;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t0 = (-b - sqrt_disc) / (2.0 * a);
        let t1 = (-b + sqrt_disc) / (2.0 * a);
        [t0, t1].into_iter().find(|&t| t > 0.0)
    }
}

impl RayCaster for FlatWorld {
    fn num_envs(&self) -> usize {
        self.envs
    }

    fn bounds(&self, _env: usize) -> Aabb {
        Aabb::new(Vec3::ZERO, Vec3::new(self.size, self.size, 3.0))
    }

    fn cast_ray(&self, _env: usize, origin: Vec3, direction: Vec3) -> Option<f32> {
        if direction.z < -0.99 {
            // Vertical floor probe
            let (x, y) = (origin.x, origin.y);
            if x < 0.0 || x > self.size || y < 0.0 || y > self.size {
                return None;
            }
            if self.in_pillar(x, y) {
                return None;
            }
            let surface = self.floor_height(x, y);
            if origin.z <= surface {
                return None;
            }
            return Some(origin.z - surface);
        }
        if direction.z.abs() < 0.01 {
            return self.pillar_hit(origin, direction);
        }
        None
    }

    fn semantic_class(&self, _env: usize, point: Vec3) -> Option<u32> {
        if !self.class_split {
            return Some(0);
        }
        Some(if point.x > self.size / 2.0 { 1 } else { 0 })
    }
}

/// Scene stub with analytic camera buffers and call counters.
#[derive(Clone, Debug)]
pub struct MockScene {
    num_envs: usize,
    width: u32,
    height: u32,
    rasterized: bool,
    inject_invalid: bool,
    raw_semantics: bool,
    /// Latest pose pushed per `(camera, env)`
    pub poses: HashMap<(String, usize), Pose>,
    pub render_steps: usize,
    pub updates: usize,
    pub write_calls: usize,
}

impl MockScene {
    pub fn new(num_envs: usize, width: u32, height: u32) -> Self {
        Self {
            num_envs,
            width,
            height,
            rasterized: false,
            inject_invalid: false,
            raw_semantics: false,
            poses: HashMap::new(),
            render_steps: 0,
            updates: 0,
            write_calls: 0,
        }
    }

    /// Mark all cameras as rasterized sensors (requires warm-up frames).
    pub fn rasterized(mut self) -> Self {
        self.rasterized = true;
        self
    }

    /// Corrupt the first pixels of every depth and color buffer with
    /// NaN/Inf, as a dropped sensor frame would.
    pub fn with_invalid_pixels(mut self) -> Self {
        self.inject_invalid = true;
        self
    }

    /// Emit single-channel class-id semantic frames instead of pre-colorized
    /// 3-channel ones.
    pub fn with_raw_semantics(mut self) -> Self {
        self.raw_semantics = true;
        self
    }

    /// Per-pixel class id of the synthetic semantic pattern.
    pub fn class_at(x: u32, y: u32) -> u32 {
        (x + y) % 3
    }
}

impl Scene for MockScene {
    fn num_envs(&self) -> usize {
        self.num_envs
    }

    fn physics_dt(&self) -> f32 {
        0.01
    }

    fn is_rasterized(&self, _camera: &str) -> bool {
        self.rasterized
    }

    fn intrinsics(&self, _camera: &str) -> CameraIntrinsics {
        CameraIntrinsics::from_fov(self.width, self.height, 60.0)
    }

    fn set_world_poses(&mut self, camera: &str, poses: &[Pose], env_ids: &[usize]) {
        for (pose, &env) in poses.iter().zip(env_ids.iter()) {
            self.poses.insert((camera.to_string(), env), *pose);
        }
    }

    fn write_data(&mut self) {
        self.write_calls += 1;
    }

    fn render_step(&mut self) {
        self.render_steps += 1;
    }

    fn update(&mut self, _dt: f32) {
        self.updates += 1;
    }

    fn output(&mut self, _camera: &str, kind: OutputKind, env: usize) -> Frame {
        let (w, h) = (self.width, self.height);
        match kind {
            OutputKind::Rgb => {
                let mut data = Vec::with_capacity((w * h * 3) as usize);
                for y in 0..h {
                    for x in 0..w {
                        data.push((env * 10) as f32 % 256.0);
                        data.push((x % 256) as f32);
                        data.push((y % 256) as f32);
                    }
                }
                if self.inject_invalid {
                    data[0] = f32::NAN;
                }
                Frame::new(w, h, 3, data)
            }
            OutputKind::SemanticSegmentation => {
                if self.raw_semantics {
                    let mut data = Vec::with_capacity((w * h) as usize);
                    for y in 0..h {
                        for x in 0..w {
                            data.push(Self::class_at(x, y) as f32);
                        }
                    }
                    Frame::new(w, h, 1, data)
                } else {
                    let mut data = Vec::with_capacity((w * h * 3) as usize);
                    for y in 0..h {
                        for x in 0..w {
                            let class = Self::class_at(x, y) as f32;
                            data.push(class * 80.0);
                            data.push(class * 40.0);
                            data.push(class * 20.0);
                        }
                    }
                    Frame::new(w, h, 3, data)
                }
            }
            OutputKind::DistanceToImagePlane => {
                let mut data = vec![0.5 * (env + 1) as f32; (w * h) as usize];
                if self.inject_invalid {
                    data[0] = f32::NAN;
                    if data.len() > 1 {
                        data[1] = f32::INFINITY;
                    }
                }
                Frame::new(w, h, 1, data)
            }
        }
    }
}
