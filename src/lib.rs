//! nav-sampler: navigability analysis and pose sampling for navigation datasets
//!
//! This library turns a reconstructed or procedurally-placed 3D environment into
//! labeled synthetic training data for vision-based navigation policies. It
//! probes the environment mesh to build a graph of traversable points, samples
//! seed-reproducible camera viewpoints and multi-node trajectories from that
//! graph, and drives batched rendering of the sampled poses into a structured
//! image dataset on disk.
//!
//! The simulation engine itself is an external collaborator: the library only
//! needs a ray/hit query primitive ([`sim::RayCaster`]) and a scene abstraction
//! with pose-settable cameras and per-frame output buffers ([`sim::Scene`]).
//!
//! # Pipeline
//!
//! ```ignore
//! use nav_sampler::{
//!     AnalysisConfig, SamplingConfig, ViewpointSampler,
//!     render::{BatchRenderer, RenderJobConfig},
//! };
//!
//! let mut sampler = ViewpointSampler::new(
//!     AnalysisConfig::default(),
//!     SamplingConfig::default(),
//!     raycaster,
//! )?;
//! let poses = sampler.sample_viewpoints(1000, 42)?;
//!
//! let mut renderer = BatchRenderer::new(scene, RenderJobConfig::default(), save_dir)?;
//! let stats = renderer.render_viewpoints(&poses)?;
//! // stats.rounds == ceil(1000 / scene.num_envs())
//! ```
//!
//! # Determinism
//!
//! Sampling the same `(seed, count)` twice returns bit-identical pose
//! sequences: results are persisted to a seed/count-keyed cache file on first
//! computation and returned verbatim afterwards.

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub mod analysis;
pub mod cache;
pub mod fixtures;
pub mod render;
pub mod sim;
pub mod trajectory;
pub mod viewpoint;

pub use analysis::{NavGraph, TerrainAnalyzer};
pub use trajectory::{Trajectory, TrajectorySampler};
pub use viewpoint::ViewpointSampler;

/// A full 6-DoF camera/robot pose: `[x, y, z, qx, qy, qz, qw]`.
///
/// Produced by the samplers, consumed read-only by the renderer. The
/// quaternion is stored in `(x, y, z, w)` order to match the on-disk pose
/// table layout.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// World position (z up)
    pub position: [f32; 3],
    /// Orientation quaternion `(qx, qy, qz, qw)`
    pub orientation: [f32; 4],
}

impl Pose {
    /// Create a pose from a position and orientation.
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position: position.to_array(),
            orientation: [orientation.x, orientation.y, orientation.z, orientation.w],
        }
    }

    /// Create a pose from a position and XYZ Euler angles in radians.
    ///
    /// `x_angle` and `y_angle` tilt the camera around its forward and
    /// horizontal axes; `z_angle` is the heading (yaw) in the ground plane.
    pub fn from_euler(position: Vec3, x_angle: f32, y_angle: f32, z_angle: f32) -> Self {
        Self::new(
            position,
            Quat::from_euler(EulerRot::XYZ, x_angle, y_angle, z_angle),
        )
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_xyzw(
            self.orientation[0],
            self.orientation[1],
            self.orientation[2],
            self.orientation[3],
        )
    }

    /// Flatten to the 7-column row written to `camera_poses.txt`.
    pub fn to_row(&self) -> [f32; 7] {
        [
            self.position[0],
            self.position[1],
            self.position[2],
            self.orientation[0],
            self.orientation[1],
            self.orientation[2],
            self.orientation[3],
        ]
    }
}

/// Camera intrinsic parameters, written once per camera as a comma-separated
/// 3×3 matrix (`intrinsics.txt`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length in pixels (fx, fy)
    pub focal_length: [f64; 2],
    /// Principal point (cx, cy) - typically image center
    pub principal_point: [f64; 2],
    /// Image dimensions (width, height)
    pub image_size: [u32; 2],
}

impl CameraIntrinsics {
    /// Compute intrinsics from a resolution and vertical field of view.
    pub fn from_fov(width: u32, height: u32, fov_deg: f64) -> Self {
        let fov = fov_deg.to_radians();
        // focal_length = (height/2) / tan(fov/2)
        let fy = (height as f64 / 2.0) / (fov / 2.0).tan();
        let fx = fy; // Assuming square pixels

        Self {
            focal_length: [fx, fy],
            principal_point: [width as f64 / 2.0, height as f64 / 2.0],
            image_size: [width, height],
        }
    }

    /// The 3×3 calibration matrix `K`.
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.focal_length[0], 0.0, self.principal_point[0]],
            [0.0, self.focal_length[1], self.principal_point[1]],
            [0.0, 0.0, 1.0],
        ]
    }

}

/// Terrain class → traversal cost factor, applied to edge weights when
/// configured. Classes missing from the map keep a factor of 1.
pub type SemanticCostMap = HashMap<u32, f32>;

/// Thresholds and probe parameters for navigability analysis.
#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    /// Horizontal grid spacing for surface probing (meters)
    pub grid_resolution: f32,
    /// Height of the sampled camera/robot point above the detected surface
    pub height: f32,
    /// Minimum height above the ground plane to be considered accessible
    pub min_height: f32,
    /// Height of the ground plane
    pub ground_height: f32,
    /// Minimum lateral clearance for a robot body to occupy a point safely
    pub min_wall_distance: f32,
    /// Reject a cell if fewer than this fraction of probe rays hit geometry
    pub min_hit_rate: f32,
    /// Reject a cell if the mean probe hit distance is below this value
    pub min_avg_hit_distance: f32,
    /// Reject a cell if the std of probe hit distances is below this value
    pub min_std_hit_distance: f32,
    /// Maximum distance between two nodes to connect them with an edge
    pub neighbor_radius: f32,
    /// Number of horizontal clearance rays cast from each accepted node
    pub lateral_rays: usize,
    /// Clearance above the instance bounding box for vertical probe origins
    pub probe_clearance: f32,
    /// Optional terrain-class cost weighting for trajectory search
    pub semantic_costs: Option<SemanticCostMap>,
    /// Fraction of surface covered by enough distinct views; consumed by the
    /// external exploration collaborator, not by the sampling engine
    pub conv_rate: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            grid_resolution: 0.5,
            height: 0.5,
            min_height: 0.2,
            ground_height: -0.1,
            min_wall_distance: 0.5,
            min_hit_rate: 0.8,
            min_avg_hit_distance: 0.5,
            min_std_hit_distance: 0.5,
            neighbor_radius: 1.5,
            lateral_rays: 16,
            probe_clearance: 1.0,
            semantic_costs: None,
            conv_rate: 0.9,
        }
    }
}

/// Sampler-facing configuration: seeding, orientation ranges and persistence.
#[derive(Clone, Debug)]
pub struct SamplingConfig {
    /// Random seed for trajectory sampling (viewpoint sampling takes its seed
    /// per call)
    pub seed: u64,
    /// Tilt range around the camera forward axis (degrees)
    pub x_angle_range: (f32, f32),
    /// Tilt range around the camera horizontal axis (degrees); negative
    /// values look down
    pub y_angle_range: (f32, f32),
    /// Per-path retry budget for trajectory sampling before a bucket is
    /// declared unsatisfiable
    pub max_retries: usize,
    /// Path of the environment's source asset, used to derive the default
    /// save directory when `save_path` is unset
    pub terrain_path: PathBuf,
    /// Override for the sample cache / dataset directory
    pub save_path: Option<PathBuf>,
    /// Render a bounded number of observation-only frames after sampling
    pub debug_viz: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            x_angle_range: (-2.5, 2.5),
            y_angle_range: (-2.0, 5.0),
            max_retries: 100,
            terrain_path: PathBuf::new(),
            save_path: None,
            debug_viz: false,
        }
    }
}

impl SamplingConfig {
    /// Resolve the directory used for sample caches and rendered datasets.
    ///
    /// Uses `save_path` when set, otherwise derives a directory next to the
    /// terrain asset from its file stem.
    pub fn resolve_save_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.save_path {
            return Ok(path.clone());
        }
        if self.terrain_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingTerrainPath);
        }
        let stem = self
            .terrain_path
            .file_stem()
            .ok_or_else(|| ConfigError::InvalidTerrainPath(self.terrain_path.clone()))?;
        let parent = self
            .terrain_path
            .parent()
            .unwrap_or(std::path::Path::new(""));
        Ok(parent.join(stem))
    }
}

/// Errors surfaced while resolving or validating configuration.
///
/// All configuration errors are fatal and reported immediately, before any
/// sampling or rendering work starts.
#[derive(Debug)]
pub enum ConfigError {
    /// No save path override and no terrain asset path to derive one from
    MissingTerrainPath,
    /// Terrain asset path has no usable file stem
    InvalidTerrainPath(PathBuf),
    /// Camera/output mapping failed validation
    InvalidCameras(String),
    /// Distance bucket slices have mismatched lengths
    MismatchedBuckets {
        counts: usize,
        min_distances: usize,
        max_distances: usize,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingTerrainPath => {
                write!(
                    f,
                    "no save path set and no terrain asset path to derive one from"
                )
            }
            ConfigError::InvalidTerrainPath(path) => {
                write!(f, "terrain asset path has no file stem: {}", path.display())
            }
            ConfigError::InvalidCameras(msg) => write!(f, "invalid camera config: {}", msg),
            ConfigError::MismatchedBuckets {
                counts,
                min_distances,
                max_distances,
            } => write!(
                f,
                "distance bucket slices have mismatched lengths: {} counts, {} min, {} max",
                counts, min_distances, max_distances
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors surfaced by the viewpoint and trajectory samplers.
#[derive(Debug)]
pub enum SampleError {
    /// The graph cannot supply the requested number of samples
    InsufficientGraph { requested: usize, achieved: usize },
    /// A distance bucket cannot be filled from the graph
    Bucket {
        bucket: usize,
        requested: usize,
        achieved: usize,
    },
    Config(ConfigError),
    Cache(cache::CacheError),
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleError::InsufficientGraph {
                requested,
                achieved,
            } => write!(
                f,
                "graph density insufficient: requested {} samples, achieved {}",
                requested, achieved
            ),
            SampleError::Bucket {
                bucket,
                requested,
                achieved,
            } => write!(
                f,
                "distance bucket {} unsatisfiable: requested {} paths, achieved {}",
                bucket, requested, achieved
            ),
            SampleError::Config(e) => write!(f, "config error: {}", e),
            SampleError::Cache(e) => write!(f, "cache error: {}", e),
        }
    }
}

impl std::error::Error for SampleError {}

impl From<ConfigError> for SampleError {
    fn from(e: ConfigError) -> Self {
        SampleError::Config(e)
    }
}

impl From<cache::CacheError> for SampleError {
    fn from(e: cache::CacheError) -> Self {
        SampleError::Cache(e)
    }
}
