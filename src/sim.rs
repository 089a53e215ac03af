//! Simulation collaborator interfaces.
//!
//! The engine never talks to a simulation runtime directly. It consumes two
//! narrow abstractions that a host process implements on top of its engine of
//! choice:
//!
//! - [`RayCaster`]: a hit-or-miss ray query against the environment mesh,
//!   used for vertical surface probing and lateral obstacle probing.
//! - [`Scene`]: pose-settable camera instances with per-frame output buffers
//!   and an explicit step/render primitive.
//!
//! Both handles are passed explicitly into the analyzer, samplers and
//! renderer; there is no ambient simulation singleton.

use crate::{CameraIntrinsics, Pose};
use glam::Vec3;

/// Axis-aligned bounding box of one environment instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Ray/hit query primitive provided by the environment collaborator.
///
/// Directions are expected to be normalized; the returned value is the hit
/// distance along the ray, or `None` on a miss.
pub trait RayCaster {
    /// Number of simulated environment instances.
    fn num_envs(&self) -> usize;

    /// Bounding box of the given environment instance.
    fn bounds(&self, env: usize) -> Aabb;

    /// Cast a ray and return the hit distance, if any.
    fn cast_ray(&self, env: usize, origin: Vec3, direction: Vec3) -> Option<f32>;

    /// Terrain class at a surface point, when the environment carries
    /// semantics. Used for edge cost weighting; defaults to unclassified.
    fn semantic_class(&self, _env: usize, _point: Vec3) -> Option<u32> {
        None
    }
}

/// Recognized per-camera output types.
///
/// This is a closed set: camera configurations are validated against it at
/// load time rather than carrying free-form annotator strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// 3- or 4-channel color image
    Rgb,
    /// Per-pixel terrain class, 1 channel of class ids or 3/4 channels when
    /// the camera colorizes internally
    SemanticSegmentation,
    /// Per-pixel distance to the image plane, 1 channel
    DistanceToImagePlane,
}

impl OutputKind {
    /// Directory name used in the on-disk dataset layout.
    pub fn tag(&self) -> &'static str {
        match self {
            OutputKind::Rgb => "rgb",
            OutputKind::SemanticSegmentation => "semantic_segmentation",
            OutputKind::DistanceToImagePlane => "distance_to_image_plane",
        }
    }

    /// Parse an output tag from configuration input.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rgb" => Some(OutputKind::Rgb),
            "semantic_segmentation" => Some(OutputKind::SemanticSegmentation),
            "distance_to_image_plane" => Some(OutputKind::DistanceToImagePlane),
            _ => None,
        }
    }
}

/// One camera output buffer, row-major `(height, width, channels)` f32.
///
/// Channel semantics are decided by the consumer: 3 or 4 channels are a
/// color/semantic image, a single channel is depth or raw class ids.
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<f32>,
}

impl Frame {
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), (width * height * channels) as usize);
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    /// Value at `(x, y, c)`. Returns `None` out of bounds.
    pub fn get(&self, x: u32, y: u32, c: u32) -> Option<f32> {
        if x >= self.width || y >= self.height || c >= self.channels {
            return None;
        }
        let idx = ((y * self.width + x) * self.channels + c) as usize;
        self.data.get(idx).copied()
    }
}

/// Capability-based camera output adapter.
///
/// Replaces sensor subclass hierarchies that override color mapping: a
/// single-channel semantic frame is either persisted raw (class id per
/// pixel) or colorized through an explicit class → RGB lookup table.
#[derive(Clone, Debug, Default)]
pub enum ColorAdapter {
    #[default]
    Raw,
    Colorized(Vec<[u8; 3]>),
}

impl ColorAdapter {
    /// Map a class id to an RGB color. Raw adapters and out-of-table classes
    /// fall back to a grayscale encoding of the id.
    pub fn color_for(&self, class: u32) -> [u8; 3] {
        match self {
            ColorAdapter::Raw => {
                let v = class.min(255) as u8;
                [v, v, v]
            }
            ColorAdapter::Colorized(lut) => lut
                .get(class as usize)
                .copied()
                .unwrap_or([0, 0, 0]),
        }
    }

    pub fn is_colorized(&self) -> bool {
        matches!(self, ColorAdapter::Colorized(_))
    }
}

/// Scene abstraction provided by the simulation collaborator.
///
/// One call to [`Scene::update`] advances simulated time by one physics step
/// and repopulates all camera buffers for the poses previously pushed with
/// [`Scene::set_world_poses`]. Rasterized sensors additionally need a fixed
/// number of [`Scene::render_step`] warm-up calls before their buffers are
/// valid; pure geometric ray casters do not.
pub trait Scene {
    /// Number of parallel camera instances (one per environment instance).
    fn num_envs(&self) -> usize;

    /// Simulated time advanced by one `update` call.
    fn physics_dt(&self) -> f32;

    /// Whether the named camera is a full rasterized sensor as opposed to a
    /// pure geometric ray caster.
    fn is_rasterized(&self, camera: &str) -> bool;

    /// Intrinsics of the named camera.
    fn intrinsics(&self, camera: &str) -> CameraIntrinsics;

    /// Assign world poses to the camera instances listed in `env_ids`.
    fn set_world_poses(&mut self, camera: &str, poses: &[Pose], env_ids: &[usize]);

    /// Push pending pose assignments into the simulation.
    fn write_data(&mut self);

    /// Advance rendering without stepping physics (sensor warm-up and debug
    /// visualization frames).
    fn render_step(&mut self);

    /// Advance simulated time and repopulate camera buffers.
    fn update(&mut self, dt: f32);

    /// Pull the current output buffer of one camera instance.
    fn output(&mut self, camera: &str, kind: OutputKind, env: usize) -> Frame;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_kind_tags() {
        assert_eq!(OutputKind::Rgb.tag(), "rgb");
        assert_eq!(
            OutputKind::SemanticSegmentation.tag(),
            "semantic_segmentation"
        );
        assert_eq!(
            OutputKind::DistanceToImagePlane.tag(),
            "distance_to_image_plane"
        );
    }

    #[test]
    fn test_output_kind_parse_roundtrip() {
        for kind in [
            OutputKind::Rgb,
            OutputKind::SemanticSegmentation,
            OutputKind::DistanceToImagePlane,
        ] {
            assert_eq!(OutputKind::parse(kind.tag()), Some(kind));
        }
        assert_eq!(OutputKind::parse("normals"), None);
    }

    #[test]
    fn test_frame_indexing() {
        let frame = Frame::new(2, 2, 1, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frame.get(0, 0, 0), Some(1.0));
        assert_eq!(frame.get(1, 0, 0), Some(2.0));
        assert_eq!(frame.get(0, 1, 0), Some(3.0));
        assert_eq!(frame.get(1, 1, 0), Some(4.0));
        assert_eq!(frame.get(2, 0, 0), None);
        assert_eq!(frame.get(0, 0, 1), None);
    }

    #[test]
    fn test_frame_multichannel_indexing() {
        let frame = Frame::new(2, 1, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(frame.get(0, 0, 2), Some(3.0));
        assert_eq!(frame.get(1, 0, 0), Some(4.0));
    }

    #[test]
    fn test_color_adapter_raw_grayscale() {
        let adapter = ColorAdapter::Raw;
        assert_eq!(adapter.color_for(7), [7, 7, 7]);
        assert_eq!(adapter.color_for(999), [255, 255, 255]);
        assert!(!adapter.is_colorized());
    }

    #[test]
    fn test_color_adapter_lut() {
        let adapter = ColorAdapter::Colorized(vec![[0, 0, 0], [255, 0, 0], [0, 255, 0]]);
        assert_eq!(adapter.color_for(1), [255, 0, 0]);
        assert_eq!(adapter.color_for(2), [0, 255, 0]);
        // Out-of-table class falls back to black
        assert_eq!(adapter.color_for(3), [0, 0, 0]);
        assert!(adapter.is_colorized());
    }

    #[test]
    fn test_aabb_size_and_center() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::new(10.0, 10.0, 2.0));
        assert_eq!(aabb.size(), Vec3::new(10.0, 10.0, 2.0));
        assert_eq!(aabb.center(), Vec3::new(5.0, 5.0, 1.0));
    }
}
