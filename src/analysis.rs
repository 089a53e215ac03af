//! Navigability analysis: traversability graph construction from geometric probes.
//!
//! The analyzer lays a regular horizontal grid over each environment
//! instance's bounding box, probes every cell with a bundle of vertical rays,
//! filters cells on hit statistics, surface height and lateral wall
//! clearance, and connects the surviving points into a reachability graph.
//! The finalized graph is immutable and shared read-only with the samplers.

use crate::sim::RayCaster;
use crate::AnalysisConfig;
use glam::Vec3;
use std::f32::consts::TAU;

/// A traversable point on or above the navigable surface, tagged with the
/// environment instance it belongs to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GraphNode {
    pub position: Vec3,
    pub env: usize,
}

/// A directed reachability edge between two nodes of the same environment
/// instance. Distance is symmetric; `cost` equals `distance` unless a
/// semantic cost mapping weights the terrain class.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GraphEdge {
    pub origin: usize,
    pub neighbor: usize,
    pub distance: f32,
    pub cost: f32,
}

/// The navigability graph: accepted nodes, reachability edges, and a
/// completion flag that samplers check before drawing from the graph.
#[derive(Clone, Debug, Default)]
pub struct NavGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub complete: bool,
}

impl NavGraph {
    /// Indices of all nodes belonging to one environment instance.
    pub fn nodes_in_env(&self, env: usize) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.env == env)
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of all edges whose origin node belongs to one environment
    /// instance.
    pub fn edges_in_env(&self, env: usize) -> Vec<usize> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| self.nodes[e.origin].env == env)
            .map(|(i, _)| i)
            .collect()
    }

    /// Adjacency list `node -> [(neighbor, cost, distance)]` for path search.
    pub fn adjacency(&self) -> Vec<Vec<(usize, f32, f32)>> {
        let mut adj = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            adj[edge.origin].push((edge.neighbor, edge.cost, edge.distance));
        }
        adj
    }
}

/// Hit statistics of one vertical probe bundle.
#[derive(Clone, Copy, Debug)]
struct BundleStats {
    hit_rate: f32,
    mean_distance: f32,
    std_distance: f32,
}

/// Builds and caches the [`NavGraph`] for an environment via a [`RayCaster`].
pub struct TerrainAnalyzer<R: RayCaster> {
    cfg: AnalysisConfig,
    raycaster: R,
    graph: NavGraph,
}

impl<R: RayCaster> TerrainAnalyzer<R> {
    pub fn new(cfg: AnalysisConfig, raycaster: R) -> Self {
        Self {
            cfg,
            raycaster,
            graph: NavGraph::default(),
        }
    }

    /// Whether [`TerrainAnalyzer::analyse`] has run to completion.
    pub fn is_complete(&self) -> bool {
        self.graph.complete
    }

    /// The finalized graph. Meaningful only once [`Self::is_complete`].
    pub fn graph(&self) -> &NavGraph {
        &self.graph
    }

    pub fn raycaster(&self) -> &R {
        &self.raycaster
    }

    /// Probe every grid cell of every environment instance and build the
    /// graph. Idempotent: a complete graph is not rebuilt.
    pub fn analyse(&mut self) {
        if self.graph.complete {
            return;
        }

        let mut nodes = Vec::new();
        for env in 0..self.raycaster.num_envs() {
            let accepted = self.probe_env(env);
            if accepted.is_empty() {
                println!("[WARN] Environment {} yields no traversable points.", env);
            }
            nodes.extend(accepted);
        }

        let edges = self.connect_nodes(&nodes);
        println!(
            "[INFO] Terrain analysis complete: {} nodes, {} edges across {} environments.",
            nodes.len(),
            edges.len(),
            self.raycaster.num_envs()
        );

        self.graph = NavGraph {
            nodes,
            edges,
            complete: true,
        };
    }

    /// Probe the grid of one environment instance and return accepted nodes.
    fn probe_env(&self, env: usize) -> Vec<GraphNode> {
        let bounds = self.raycaster.bounds(env);
        let size = bounds.size();
        let res = self.cfg.grid_resolution;
        let cells_x = (size.x / res).floor().max(0.0) as usize;
        let cells_y = (size.y / res).floor().max(0.0) as usize;
        let origin_z = bounds.max.z + self.cfg.probe_clearance;

        let mut accepted = Vec::new();
        for ix in 0..cells_x {
            for iy in 0..cells_y {
                let x = bounds.min.x + (ix as f32 + 0.5) * res;
                let y = bounds.min.y + (iy as f32 + 0.5) * res;

                let Some(stats) = self.probe_cell(env, x, y, origin_z) else {
                    continue;
                };
                if !self.accept_stats(&stats) {
                    continue;
                }

                let surface_z = origin_z - stats.mean_distance;
                if surface_z - self.cfg.ground_height < self.cfg.min_height {
                    continue;
                }

                let position = Vec3::new(x, y, surface_z + self.cfg.height);
                if self.wall_clearance(env, position) < self.cfg.min_wall_distance {
                    continue;
                }

                accepted.push(GraphNode { position, env });
            }
        }
        accepted
    }

    /// Cast the vertical probe bundle for one cell and collect hit
    /// statistics. Returns `None` when no ray hits at all.
    fn probe_cell(&self, env: usize, x: f32, y: f32, origin_z: f32) -> Option<BundleStats> {
        // 3x3 jitter pattern spanning the cell
        let step = self.cfg.grid_resolution / 3.0;
        let mut rays = 0usize;
        let mut distances = Vec::with_capacity(9);
        for dx in -1..=1 {
            for dy in -1..=1 {
                rays += 1;
                let origin = Vec3::new(x + dx as f32 * step, y + dy as f32 * step, origin_z);
                if let Some(dist) = self.raycaster.cast_ray(env, origin, Vec3::NEG_Z) {
                    distances.push(dist);
                }
            }
        }

        if distances.is_empty() {
            return None;
        }

        let n = distances.len() as f32;
        let mean = distances.iter().sum::<f32>() / n;
        let var = distances.iter().map(|d| (d - mean) * (d - mean)).sum::<f32>() / n;

        Some(BundleStats {
            hit_rate: n / rays as f32,
            mean_distance: mean,
            std_distance: var.sqrt(),
        })
    }

    fn accept_stats(&self, stats: &BundleStats) -> bool {
        stats.hit_rate >= self.cfg.min_hit_rate
            && stats.mean_distance >= self.cfg.min_avg_hit_distance
            && stats.std_distance >= self.cfg.min_std_hit_distance
    }

    /// Nearest lateral hit around a candidate point, or infinity when all
    /// clearance rays miss.
    fn wall_clearance(&self, env: usize, position: Vec3) -> f32 {
        let mut nearest = f32::INFINITY;
        for i in 0..self.cfg.lateral_rays {
            let angle = i as f32 / self.cfg.lateral_rays as f32 * TAU;
            let dir = Vec3::new(angle.cos(), angle.sin(), 0.0);
            if let Some(dist) = self.raycaster.cast_ray(env, position, dir) {
                nearest = nearest.min(dist);
            }
        }
        nearest
    }

    /// Connect every accepted node to every other node of the same instance
    /// within the neighbor radius, recording both edge directions.
    fn connect_nodes(&self, nodes: &[GraphNode]) -> Vec<GraphEdge> {
        let mut edges = Vec::new();
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                if nodes[i].env != nodes[j].env {
                    continue;
                }
                let distance = nodes[i].position.distance(nodes[j].position);
                if distance <= 0.0 || distance > self.cfg.neighbor_radius {
                    continue;
                }
                let cost_ij = distance * self.cost_factor(nodes[j].env, nodes[j].position);
                let cost_ji = distance * self.cost_factor(nodes[i].env, nodes[i].position);
                edges.push(GraphEdge {
                    origin: i,
                    neighbor: j,
                    distance,
                    cost: cost_ij,
                });
                edges.push(GraphEdge {
                    origin: j,
                    neighbor: i,
                    distance,
                    cost: cost_ji,
                });
            }
        }
        edges
    }

    /// Semantic traversal cost factor of the terrain under a node.
    fn cost_factor(&self, env: usize, position: Vec3) -> f32 {
        let Some(costs) = &self.cfg.semantic_costs else {
            return 1.0;
        };
        match self.raycaster.semantic_class(env, position) {
            Some(class) => costs.get(&class).copied().unwrap_or(1.0),
            None => 1.0,
        }
    }
}
