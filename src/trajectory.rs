//! Distance-bucketed trajectory sampling over the navigability graph.
//!
//! Each trajectory is a least-cost path between two graph nodes whose
//! cumulative geometric length falls into a requested distance bucket. Paths
//! are found with Dijkstra over the edge costs, accepting the first settled
//! node whose accumulated distance lands in range, so short buckets resolve
//! without exploring the whole graph.

use crate::analysis::TerrainAnalyzer;
use crate::cache::SampleCache;
use crate::sim::RayCaster;
use crate::{AnalysisConfig, ConfigError, Pose, SampleError, SamplingConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A sampled path: ordered poses along graph nodes, each oriented toward its
/// successor, plus the cumulative geometric length and the distance bucket
/// the path was drawn for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub poses: Vec<Pose>,
    pub length: f32,
    pub bucket: usize,
}

/// Frontier entry for the least-cost search. Ordered as a min-heap on cost.
#[derive(Clone, Copy, PartialEq)]
struct State {
    cost: f32,
    node: usize,
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Samples distance-bucketed trajectories from the navigability graph.
pub struct TrajectorySampler<R: RayCaster> {
    analyzer: TerrainAnalyzer<R>,
    cfg: SamplingConfig,
    cache: SampleCache,
}

impl<R: RayCaster> TrajectorySampler<R> {
    pub fn new(
        analysis: AnalysisConfig,
        cfg: SamplingConfig,
        raycaster: R,
    ) -> Result<Self, SampleError> {
        let save_dir = cfg.resolve_save_dir()?;
        let cache = SampleCache::new(&save_dir)?;
        Ok(Self {
            analyzer: TerrainAnalyzer::new(analysis, raycaster),
            cfg,
            cache,
        })
    }

    pub fn analyzer(&self) -> &TerrainAnalyzer<R> {
        &self.analyzer
    }

    /// Sample trajectories per distance bucket: `counts[i]` paths whose
    /// length falls in `[min_distances[i], max_distances[i]]`.
    ///
    /// The three slices must have equal length. Results for the same
    /// configuration seed and bucket shape are cached and returned verbatim.
    pub fn sample_paths(
        &mut self,
        counts: &[usize],
        min_distances: &[f32],
        max_distances: &[f32],
    ) -> Result<Vec<Trajectory>, SampleError> {
        if counts.len() != min_distances.len() || counts.len() != max_distances.len() {
            return Err(ConfigError::MismatchedBuckets {
                counts: counts.len(),
                min_distances: min_distances.len(),
                max_distances: max_distances.len(),
            }
            .into());
        }

        let total: usize = counts.iter().sum();
        let ranges: Vec<(f32, f32)> = min_distances
            .iter()
            .zip(max_distances.iter())
            .map(|(&lo, &hi)| (lo, hi))
            .collect();
        let key = self.cache.trajectory_path(self.cfg.seed, &ranges, total);
        if let Some(paths) = self.cache.load::<Vec<Trajectory>>(&key)? {
            println!(
                "[INFO] Loaded {} cached trajectories from {}",
                paths.len(),
                key.display()
            );
            return Ok(paths);
        }

        if !self.analyzer.is_complete() {
            self.analyzer.analyse();
        }

        let mut rng = StdRng::seed_from_u64(self.cfg.seed);
        let mut paths = Vec::with_capacity(total);
        for (bucket, (&count, (&min_d, &max_d))) in counts
            .iter()
            .zip(min_distances.iter().zip(max_distances.iter()))
            .enumerate()
        {
            let before = paths.len();
            self.fill_bucket(bucket, count, min_d, max_d, &mut rng, &mut paths)?;
            println!(
                "[INFO] Bucket {} [{:.1}m, {:.1}m]: {} trajectories.",
                bucket,
                min_d,
                max_d,
                paths.len() - before
            );
        }

        self.cache.store(&key, &paths)?;
        Ok(paths)
    }

    fn fill_bucket(
        &self,
        bucket: usize,
        count: usize,
        min_d: f32,
        max_d: f32,
        rng: &mut StdRng,
        paths: &mut Vec<Trajectory>,
    ) -> Result<(), SampleError> {
        let graph = self.analyzer.graph();
        let adjacency = graph.adjacency();
        let mut achieved = 0;

        while achieved < count {
            let mut found = None;
            for _ in 0..self.cfg.max_retries {
                if graph.nodes.is_empty() {
                    break;
                }
                let start = rng.gen_range(0..graph.nodes.len());
                if let Some(path) = self.search(start, min_d, max_d, &adjacency) {
                    found = Some(path);
                    break;
                }
            }

            let Some((node_path, length)) = found else {
                return Err(SampleError::Bucket {
                    bucket,
                    requested: count,
                    achieved,
                });
            };

            paths.push(Trajectory {
                poses: self.path_poses(&node_path),
                length,
                bucket,
            });
            achieved += 1;
        }
        Ok(())
    }

    /// Least-cost search from `start`, accepting the first settled node whose
    /// accumulated geometric distance falls into `[min_d, max_d]`.
    fn search(
        &self,
        start: usize,
        min_d: f32,
        max_d: f32,
        adjacency: &[Vec<(usize, f32, f32)>],
    ) -> Option<(Vec<usize>, f32)> {
        let n = adjacency.len();
        let mut cost = vec![f32::INFINITY; n];
        let mut dist = vec![f32::INFINITY; n];
        let mut prev = vec![usize::MAX; n];
        let mut settled = vec![false; n];
        let mut heap = BinaryHeap::new();

        cost[start] = 0.0;
        dist[start] = 0.0;
        heap.push(State {
            cost: 0.0,
            node: start,
        });

        while let Some(State { cost: c, node }) = heap.pop() {
            if settled[node] {
                continue;
            }
            settled[node] = true;

            if node != start && dist[node] >= min_d && dist[node] <= max_d {
                return Some((self.reconstruct(start, node, &prev), dist[node]));
            }
            // Everything settled beyond the bucket is over-long
            if dist[node] > max_d {
                continue;
            }

            for &(neighbor, edge_cost, edge_dist) in &adjacency[node] {
                let next_cost = c + edge_cost;
                if next_cost < cost[neighbor] {
                    cost[neighbor] = next_cost;
                    dist[neighbor] = dist[node] + edge_dist;
                    prev[neighbor] = node;
                    heap.push(State {
                        cost: next_cost,
                        node: neighbor,
                    });
                }
            }
        }
        None
    }

    fn reconstruct(&self, start: usize, end: usize, prev: &[usize]) -> Vec<usize> {
        let mut path = vec![end];
        let mut node = end;
        while node != start {
            node = prev[node];
            path.push(node);
        }
        path.reverse();
        path
    }

    /// Poses along the node path, each heading toward its successor. The
    /// terminal pose keeps the last segment's heading.
    fn path_poses(&self, node_path: &[usize]) -> Vec<Pose> {
        let graph = self.analyzer.graph();
        let mut poses = Vec::with_capacity(node_path.len());
        let mut yaw = 0.0;
        for (i, &node) in node_path.iter().enumerate() {
            let position = graph.nodes[node].position;
            if let Some(&next) = node_path.get(i + 1) {
                let target = graph.nodes[next].position;
                yaw = (target.y - position.y).atan2(target.x - position.x);
            }
            poses.push(Pose::from_euler(position, 0.0, 0.0, yaw));
        }
        poses
    }
}
