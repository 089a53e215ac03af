//! Batched rendering of sampled poses into an on-disk image dataset.
//!
//! Poses are consumed in rounds of `num_envs`: every parallel camera
//! instance gets one pose per round, the scene steps once, and each
//! configured camera/output pair persists one image per instance. The
//! resulting layout is
//!
//! ```text
//! <save_dir>/camera_poses.txt
//! <save_dir>/<camera>/intrinsics.txt
//! <save_dir>/<camera>/<output>/<index>.png
//! ```
//!
//! with zero-padded indices that stay monotone across multiple render calls,
//! so interleaved viewpoint and trajectory batches never collide.
//!
//! Single-channel frames are persisted as 16-bit grayscale PNG with a
//! configurable metric scale; 3- and 4-channel frames as 8-bit RGB. NaN and
//! infinite pixels are zeroed before quantization.

use crate::sim::{ColorAdapter, Frame, OutputKind, Scene};
use crate::{ConfigError, Pose};
use image::{ImageBuffer, Luma, Rgb};
use std::collections::HashMap;
use std::fs;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

/// One camera to render: its scene name, the outputs to persist and how
/// single-channel semantic frames are mapped to color.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub name: String,
    pub outputs: Vec<OutputKind>,
    pub adapter: ColorAdapter,
}

impl CameraConfig {
    pub fn new(name: impl Into<String>, outputs: Vec<OutputKind>) -> Self {
        Self {
            name: name.into(),
            outputs,
            adapter: ColorAdapter::Raw,
        }
    }

    pub fn with_adapter(mut self, adapter: ColorAdapter) -> Self {
        self.adapter = adapter;
        self
    }
}

/// Renderer configuration.
#[derive(Clone, Debug)]
pub struct RenderJobConfig {
    pub cameras: Vec<CameraConfig>,
    /// Metric depth is multiplied by this before 16-bit quantization
    pub depth_scale: f32,
    /// Render warm-up frames per round when any camera is rasterized
    pub warmup_steps: usize,
    /// Zero-padding width of image indices in filenames
    pub pad_width: usize,
}

impl Default for RenderJobConfig {
    fn default() -> Self {
        Self {
            cameras: vec![CameraConfig::new(
                "camera_0",
                vec![OutputKind::Rgb, OutputKind::DistanceToImagePlane],
            )],
            depth_scale: 1000.0,
            warmup_steps: 10,
            pad_width: 4,
        }
    }
}

impl RenderJobConfig {
    /// Reject camera mappings that cannot produce a dataset.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cameras.is_empty() {
            return Err(ConfigError::InvalidCameras("no cameras configured".into()));
        }
        for camera in &self.cameras {
            if camera.name.is_empty() {
                return Err(ConfigError::InvalidCameras("camera with empty name".into()));
            }
            if camera.outputs.is_empty() {
                return Err(ConfigError::InvalidCameras(format!(
                    "camera {} has no outputs",
                    camera.name
                )));
            }
        }
        let mut names: Vec<&str> = self.cameras.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.cameras.len() {
            return Err(ConfigError::InvalidCameras(
                "duplicate camera names".into(),
            ));
        }
        Ok(())
    }
}

/// Per-call render statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    /// Rounds of `num_envs` poses consumed
    pub rounds: usize,
    /// Images persisted in this call
    pub images_written: usize,
}

/// Errors surfaced by the batch renderer. Image persistence failures are
/// fatal: a dataset with silently missing frames is worse than an abort.
#[derive(Debug)]
pub enum RenderError {
    Config(ConfigError),
    Io(std::io::Error),
    Image(image::ImageError),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Config(e) => write!(f, "render config error: {}", e),
            RenderError::Io(e) => write!(f, "render I/O error: {}", e),
            RenderError::Image(e) => write!(f, "image write error: {}", e),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<ConfigError> for RenderError {
    fn from(e: ConfigError) -> Self {
        RenderError::Config(e)
    }
}

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        RenderError::Io(e)
    }
}

impl From<image::ImageError> for RenderError {
    fn from(e: image::ImageError) -> Self {
        RenderError::Image(e)
    }
}

/// Drives batched pose rendering through a [`Scene`] into the dataset
/// directory layout.
pub struct BatchRenderer<S: Scene> {
    scene: S,
    cfg: RenderJobConfig,
    save_dir: PathBuf,
    /// Next image index per `(camera, output)`
    counters: HashMap<(String, OutputKind), usize>,
}

impl<S: Scene> BatchRenderer<S> {
    /// Validate the configuration, create the dataset directory tree and
    /// write each camera's intrinsics file.
    pub fn new(scene: S, cfg: RenderJobConfig, save_dir: impl Into<PathBuf>) -> Result<Self, RenderError> {
        cfg.validate()?;
        if scene.num_envs() == 0 {
            return Err(ConfigError::InvalidCameras(
                "scene reports zero camera instances".into(),
            )
            .into());
        }
        let save_dir = save_dir.into();

        let mut renderer = Self {
            scene,
            cfg,
            save_dir,
            counters: HashMap::new(),
        };
        for camera in renderer.cfg.cameras.clone() {
            let camera_dir = renderer.save_dir.join(&camera.name);
            for output in &camera.outputs {
                fs::create_dir_all(camera_dir.join(output.tag()))?;
            }
            renderer.write_intrinsics(&camera.name, &camera_dir)?;
        }
        Ok(renderer)
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Render all poses in rounds of `num_envs` and persist every configured
    /// camera/output image.
    pub fn render_viewpoints(&mut self, poses: &[Pose]) -> Result<RenderStats, RenderError> {
        if poses.is_empty() {
            return Ok(RenderStats {
                rounds: 0,
                images_written: 0,
            });
        }

        self.append_pose_rows(poses)?;

        let num_envs = self.scene.num_envs();
        let rounds = poses.len().div_ceil(num_envs);
        let needs_warmup = self
            .cfg
            .cameras
            .iter()
            .any(|c| self.scene.is_rasterized(&c.name));
        let total_images: usize =
            poses.len() * self.cfg.cameras.iter().map(|c| c.outputs.len()).sum::<usize>();

        let mut images_written = 0usize;
        for round in 0..rounds {
            let batch = &poses[round * num_envs..(round * num_envs + num_envs).min(poses.len())];
            let env_ids: Vec<usize> = (0..batch.len()).collect();

            for camera in &self.cfg.cameras {
                self.scene.set_world_poses(&camera.name, batch, &env_ids);
            }
            self.scene.write_data();

            if needs_warmup {
                for _ in 0..self.cfg.warmup_steps {
                    self.scene.render_step();
                }
            }
            let dt = self.scene.physics_dt();
            self.scene.update(dt);

            for camera in self.cfg.cameras.clone() {
                for &output in &camera.outputs {
                    for &env in &env_ids {
                        let frame = self.scene.output(&camera.name, output, env);
                        self.persist_frame(&camera, output, &frame)?;
                        images_written += 1;
                        if images_written % 100 == 0 {
                            println!(
                                "[INFO] Rendered {}/{} images.",
                                images_written, total_images
                            );
                        }
                    }
                }
            }
        }

        println!(
            "[INFO] Render batch done: {} poses, {} rounds, {} images under {}",
            poses.len(),
            rounds,
            images_written,
            self.save_dir.display()
        );
        Ok(RenderStats {
            rounds,
            images_written,
        })
    }

    /// Write one frame to disk under its camera/output directory, advancing
    /// the monotone image index.
    fn persist_frame(
        &mut self,
        camera: &CameraConfig,
        output: OutputKind,
        frame: &Frame,
    ) -> Result<(), RenderError> {
        let key = (camera.name.clone(), output);
        let index = *self.counters.get(&key).unwrap_or(&0);
        self.counters.insert(key, index + 1);

        let path = self
            .save_dir
            .join(&camera.name)
            .join(output.tag())
            .join(format!("{:0width$}.png", index, width = self.cfg.pad_width));

        // Dropped sensor frames leave NaN/Inf pixels; zero them out
        let scrub = |v: f32| if v.is_finite() { v } else { 0.0 };

        if frame.channels >= 3 {
            let mut buf = ImageBuffer::<Rgb<u8>, Vec<u8>>::new(frame.width, frame.height);
            for (x, y, pixel) in buf.enumerate_pixels_mut() {
                let mut rgb = [0u8; 3];
                for (c, channel) in rgb.iter_mut().enumerate() {
                    let v = scrub(frame.get(x, y, c as u32).unwrap_or(0.0));
                    *channel = v.clamp(0.0, 255.0) as u8;
                }
                *pixel = Rgb(rgb);
            }
            buf.save(&path)?;
        } else if output == OutputKind::SemanticSegmentation && camera.adapter.is_colorized() {
            let mut buf = ImageBuffer::<Rgb<u8>, Vec<u8>>::new(frame.width, frame.height);
            for (x, y, pixel) in buf.enumerate_pixels_mut() {
                let class = scrub(frame.get(x, y, 0).unwrap_or(0.0)).max(0.0) as u32;
                *pixel = Rgb(camera.adapter.color_for(class));
            }
            buf.save(&path)?;
        } else {
            let scale = self.cfg.depth_scale;
            let mut buf = ImageBuffer::<Luma<u16>, Vec<u16>>::new(frame.width, frame.height);
            for (x, y, pixel) in buf.enumerate_pixels_mut() {
                let v = scrub(frame.get(x, y, 0).unwrap_or(0.0)) * scale;
                *pixel = Luma([v.clamp(0.0, u16::MAX as f32) as u16]);
            }
            buf.save(&path)?;
        }
        Ok(())
    }

    /// Comma-separated 3x3 calibration matrix, one row per line.
    fn write_intrinsics(&self, camera: &str, camera_dir: &Path) -> Result<(), RenderError> {
        let k = self.scene.intrinsics(camera).matrix();
        let mut out = String::new();
        for row in &k {
            out.push_str(&format!("{},{},{}\n", row[0], row[1], row[2]));
        }
        fs::write(camera_dir.join("intrinsics.txt"), out)?;
        Ok(())
    }

    /// Append the 7-column pose rows for this batch to the dataset-level
    /// pose table, keeping row order aligned with image indices.
    fn append_pose_rows(&self, poses: &[Pose]) -> Result<(), RenderError> {
        let path = self.save_dir.join("camera_poses.txt");
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        for pose in poses {
            let r = pose.to_row();
            writeln!(
                file,
                "{},{},{},{},{},{},{}",
                r[0], r[1], r[2], r[3], r[4], r[5], r[6]
            )?;
        }
        Ok(())
    }
}
