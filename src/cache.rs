//! Sample caching for deterministic, restartable dataset collection.
//!
//! Sampling the same `(seed, count)` pair twice must return bit-identical
//! results, so the samplers persist every computed sample set into a
//! seed/count-keyed binary file and load it verbatim on subsequent runs.
//!
//! # Example
//!
//! ```rust,no_run
//! use nav_sampler::{cache::SampleCache, Pose};
//!
//! let cache = SampleCache::new("/data/scans/office").unwrap();
//! let key = cache.viewpoint_path(42, 1000);
//! if let Some(poses) = cache.load::<Vec<Pose>>(&key).unwrap() {
//!     // reuse previous run
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors from cache persistence.
#[derive(Debug)]
pub enum CacheError {
    /// Cache directory creation or file I/O failed
    Io(std::io::Error),
    /// Binary encoding or decoding of a sample set failed
    Encode(bincode::Error),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io(e) => write!(f, "cache I/O error: {}", e),
            CacheError::Encode(e) => write!(f, "cache encoding error: {}", e),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Io(e)
    }
}

impl From<bincode::Error> for CacheError {
    fn from(e: bincode::Error) -> Self {
        CacheError::Encode(e)
    }
}

/// A directory of seed-keyed sample blobs.
#[derive(Debug, Clone)]
pub struct SampleCache {
    dir: PathBuf,
}

impl SampleCache {
    /// Open (and create if needed) the cache directory.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for a viewpoint sample set.
    pub fn viewpoint_path(&self, seed: u64, count: usize) -> PathBuf {
        self.dir
            .join(format!("viewpoints_seed{}_samples{}.bin", seed, count))
    }

    /// Cache file for a trajectory sample set. The requested distance
    /// ranges are part of the key: the same seed and counts with different
    /// buckets must never collide.
    pub fn trajectory_path(&self, seed: u64, ranges: &[(f32, f32)], total: usize) -> PathBuf {
        let spans: Vec<String> = ranges
            .iter()
            .map(|(lo, hi)| format!("{}-{}", lo, hi))
            .collect();
        self.dir.join(format!(
            "paths_seed{}_d{}_samples{}.bin",
            seed,
            spans.join("_"),
            total
        ))
    }

    /// Load a previously stored sample set. `Ok(None)` on a cache miss.
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, CacheError> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        let value = bincode::deserialize(&bytes)?;
        Ok(Some(value))
    }

    /// Persist a sample set, overwriting any previous entry.
    pub fn store<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), CacheError> {
        let bytes = bincode::serialize(value)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Count and total size of the `.bin` entries currently on disk.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "bin").unwrap_or(false) {
                stats.entries += 1;
                stats.bytes += entry.metadata()?.len();
            }
        }
        Ok(stats)
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of sample blobs in the cache directory
    pub entries: usize,
    /// Total size of all blobs in bytes
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pose;
    use glam::Vec3;
    use tempfile::TempDir;

    #[test]
    fn test_new_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let cache = SampleCache::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(cache.dir(), nested);
    }

    #[test]
    fn test_new_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        SampleCache::new(temp_dir.path()).unwrap();
        SampleCache::new(temp_dir.path()).unwrap();
    }

    #[test]
    fn test_viewpoint_filename_convention() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SampleCache::new(temp_dir.path()).unwrap();
        let path = cache.viewpoint_path(42, 1000);
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "viewpoints_seed42_samples1000.bin"
        );
    }

    #[test]
    fn test_trajectory_filename_convention() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SampleCache::new(temp_dir.path()).unwrap();
        let path = cache.trajectory_path(7, &[(1.0, 3.0), (4.5, 8.0)], 300);
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "paths_seed7_d1-3_4.5-8_samples300.bin"
        );
    }

    #[test]
    fn test_trajectory_keys_distinguish_ranges() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SampleCache::new(temp_dir.path()).unwrap();
        let short = cache.trajectory_path(1, &[(1.0, 3.0)], 4);
        let long = cache.trajectory_path(1, &[(5.0, 8.0)], 4);
        assert_ne!(short, long);
    }

    #[test]
    fn test_miss_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SampleCache::new(temp_dir.path()).unwrap();
        let loaded: Option<Vec<Pose>> = cache.load(&cache.viewpoint_path(1, 10)).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_store_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SampleCache::new(temp_dir.path()).unwrap();

        let poses = vec![
            Pose::from_euler(Vec3::new(1.0, 2.0, 0.5), 0.0, 0.1, 1.5),
            Pose::from_euler(Vec3::new(-3.0, 0.0, 0.5), 0.02, -0.03, -0.7),
        ];
        let path = cache.viewpoint_path(42, 2);
        cache.store(&path, &poses).unwrap();

        let loaded: Vec<Pose> = cache.load(&path).unwrap().unwrap();
        assert_eq!(loaded, poses);
    }

    #[test]
    fn test_distinct_keys_do_not_collide() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SampleCache::new(temp_dir.path()).unwrap();

        let a = vec![Pose::from_euler(Vec3::ZERO, 0.0, 0.0, 0.0)];
        let b = vec![Pose::from_euler(Vec3::ONE, 0.0, 0.0, 1.0)];
        cache.store(&cache.viewpoint_path(1, 1), &a).unwrap();
        cache.store(&cache.viewpoint_path(2, 1), &b).unwrap();

        let loaded_a: Vec<Pose> = cache.load(&cache.viewpoint_path(1, 1)).unwrap().unwrap();
        let loaded_b: Vec<Pose> = cache.load(&cache.viewpoint_path(2, 1)).unwrap().unwrap();
        assert_eq!(loaded_a, a);
        assert_eq!(loaded_b, b);
    }

    #[test]
    fn test_stats_count_entries() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SampleCache::new(temp_dir.path()).unwrap();
        assert_eq!(cache.stats().unwrap(), CacheStats::default());

        let poses = vec![Pose::from_euler(Vec3::ZERO, 0.0, 0.0, 0.0)];
        cache.store(&cache.viewpoint_path(1, 1), &poses).unwrap();
        cache.store(&cache.viewpoint_path(2, 1), &poses).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert!(stats.bytes > 0);
    }
}
