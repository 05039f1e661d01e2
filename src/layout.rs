//! Spatial adjacency between cells and force-directed relaxation of their positions.

use crate::grid::SpatialGrid;
use crate::triangulation::delaunay_edges;
use growth_common::vecmath::{angle_to_vec, centroid};
use growth_common::{LayoutParams, Vec2};
use log::{trace, warn};
use rand::Rng;
use std::collections::HashSet;
use std::f64::consts::PI;

/// Undirected contact graph over cell indices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdjacencyGraph {
    num_nodes: usize,
    edges: Vec<(usize, usize)>,
    neighbors: Vec<Vec<usize>>,
}

impl AdjacencyGraph {
    /// Builds a graph from an arbitrary edge list. Self loops are dropped,
    /// `(a, b)` and `(b, a)` are merged, and out-of-range indices are rejected.
    pub fn from_edges<I>(num_nodes: usize, edges: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut normalized = Vec::new();
        for (a, b) in edges {
            if a >= num_nodes || b >= num_nodes {
                anyhow::bail!("Edge ({}, {}) references a node outside 0..{}.", a, b, num_nodes);
            }
            if a != b {
                normalized.push(if a < b { (a, b) } else { (b, a) });
            }
        }
        Ok(Self::from_sorted(num_nodes, normalized))
    }

    fn from_sorted(num_nodes: usize, mut edges: Vec<(usize, usize)>) -> Self {
        edges.sort_unstable();
        edges.dedup();
        let mut neighbors = vec![Vec::new(); num_nodes];
        for &(a, b) in &edges {
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
        AdjacencyGraph { num_nodes, edges, neighbors }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Edges as `(i, j)` with `i < j`, sorted.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.neighbors[node]
    }

    pub fn contains_edge(&self, a: usize, b: usize) -> bool {
        a < self.num_nodes && self.neighbors[a].contains(&b)
    }

    pub fn degree(&self, node: usize) -> usize {
        self.neighbors[node].len()
    }
}

/// Contact graph of `positions`: Delaunay edges no longer than `max_edge_length`.
///
/// When no triangle exists (fewer than three points, or all collinear) the
/// points are chained in x-then-y order instead, under the same cutoff.
pub fn build_adjacency(positions: &[Vec2], max_edge_length: f64) -> AdjacencyGraph {
    let n = positions.len();
    let mut edges = delaunay_edges(positions);

    if edges.is_empty() && n >= 2 {
        if n >= 3 {
            warn!("Triangulation of {} cells is degenerate; chaining cells instead.", n);
        }
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            let (pa, pb) = (positions[a], positions[b]);
            pa.x.total_cmp(&pb.x).then(pa.y.total_cmp(&pb.y))
        });
        edges = order
            .windows(2)
            .map(|w| if w[0] < w[1] { (w[0], w[1]) } else { (w[1], w[0]) })
            .collect();
    }

    let max_sq = max_edge_length * max_edge_length;
    edges.retain(|&(a, b)| positions[a].distance_squared(positions[b]) <= max_sq);
    AdjacencyGraph::from_sorted(n, edges)
}

/// Expected spacing between neighbors when `n` cells fill a disc of radius `scale`.
pub fn rest_spacing(n: usize, scale: f64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    scale * (PI / n as f64).sqrt()
}

/// Moves every position that exactly repeats an earlier one by `radius` in a
/// random direction. Returns how many points were moved.
pub fn separate_coincident<R: Rng + ?Sized>(positions: &mut [Vec2], radius: f64, rng: &mut R) -> usize {
    let mut seen: HashSet<(u64, u64)> = HashSet::with_capacity(positions.len());
    let mut moved = 0;
    for p in positions.iter_mut() {
        let key = (p.x.to_bits(), p.y.to_bits());
        if !seen.insert(key) {
            let angle = rng.random_range(0.0..2.0 * PI);
            *p += angle_to_vec(angle) * radius;
            seen.insert((p.x.to_bits(), p.y.to_bits()));
            moved += 1;
        }
    }
    moved
}

/// Translates to `center` and rescales so the largest centered coordinate magnitude equals `scale`.
pub fn rescale(positions: &[Vec2], center: Vec2, scale: f64) -> Vec<Vec2> {
    let mean = centroid(positions);
    let lim = positions
        .iter()
        .map(|p| (*p - mean).max_abs())
        .fold(0.0f64, f64::max);
    if lim <= 0.0 {
        return positions.iter().map(|_| center).collect();
    }
    positions
        .iter()
        .map(|p| (*p - mean) * (scale / lim) + center)
        .collect()
}

/// Relaxes `positions` with a spring layout seeded at their current values.
///
/// Edges of `graph` pull toward the rest spacing of a disc of radius `scale`,
/// any two cells closer than that spacing push apart, and a weak pull holds
/// the colony on `center`. The result is rescaled so its extent is `scale`.
/// Fewer than three positions are returned unchanged.
pub fn relax(
    graph: &AdjacencyGraph,
    positions: &[Vec2],
    center: Vec2,
    scale: f64,
    params: &LayoutParams,
) -> Vec<Vec2> {
    let n = positions.len();
    if n < 3 || !(scale > 0.0) || positions.iter().any(|p| !p.is_finite()) {
        return positions.to_vec();
    }
    debug_assert_eq!(graph.num_nodes(), n);

    let rest = rest_spacing(n, scale);
    let rest_sq = rest * rest;
    let mut pos = rescale(positions, center, scale);
    let mut forces = vec![Vec2::zero(); n];
    let mut step = params.step;

    for iteration in 0..params.iterations {
        forces.iter_mut().for_each(|f| *f = Vec2::zero());

        // Springs along contacts
        for &(a, b) in graph.edges() {
            let delta = pos[b] - pos[a];
            let dist = delta.length();
            if dist <= 0.0 {
                continue;
            }
            let pull = delta * (params.spring * (dist - rest) / dist);
            forces[a] += pull;
            forces[b] -= pull;
        }

        // Short-range repulsion
        let grid = SpatialGrid::build(&pos, rest);
        for i in 0..n {
            let here = pos[i];
            let mut push = Vec2::zero();
            grid.for_each_neighbor(i, here, rest_sq, &pos, |j, dist_sq| {
                let dist = dist_sq.sqrt();
                if dist > 0.0 {
                    push += (here - pos[j]) * (params.repulsion * (rest - dist) / dist);
                }
                true
            });
            forces[i] += push;
        }

        // Anchor to the center
        let mut max_move = 0.0f64;
        for (p, f) in pos.iter_mut().zip(&forces) {
            let total = *f - (*p - center) * params.gravity;
            let displacement = (total * step).clamp_length(0.5 * rest);
            *p += displacement;
            max_move = max_move.max(displacement.length());
        }

        trace!("Relaxation iteration {}: max displacement {:.3e}", iteration, max_move);
        if max_move < params.tolerance * rest {
            break;
        }
        step *= params.cooling;
    }

    rescale(&pos, center, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn disc(n: usize, radius: f64) -> Vec<Vec2> {
        // Sunflower spiral, roughly uniform areal density
        let golden = PI * (3.0 - 5f64.sqrt());
        (0..n)
            .map(|i| {
                let r = radius * ((i as f64 + 0.5) / n as f64).sqrt();
                angle_to_vec(i as f64 * golden) * r
            })
            .collect()
    }

    #[test]
    fn adjacency_respects_cutoff_and_is_undirected() {
        let positions = disc(300, 1.0);
        let graph = build_adjacency(&positions, 0.1);
        assert!(graph.num_edges() > 0);
        for &(a, b) in graph.edges() {
            assert!(a < b);
            assert!(positions[a].distance(positions[b]) <= 0.1);
            assert!(graph.contains_edge(a, b) && graph.contains_edge(b, a));
        }
    }

    #[test]
    fn cutoff_removes_long_edges() {
        let positions = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.05, 0.0),
            Vec2::new(0.0, 0.05),
            Vec2::new(5.0, 5.0),
        ];
        let graph = build_adjacency(&positions, 0.1);
        assert_eq!(graph.degree(3), 0);
        assert_eq!(graph.num_edges(), 3);
    }

    #[test]
    fn small_sets_fall_back_to_a_chain() {
        let two = [Vec2::zero(), Vec2::new(0.05, 0.0)];
        assert_eq!(build_adjacency(&two, 0.1).edges(), &[(0, 1)]);
        assert_eq!(build_adjacency(&two, 0.01).num_edges(), 0);
        let line = [Vec2::new(0.2, 0.0), Vec2::zero(), Vec2::new(0.1, 0.0)];
        assert_eq!(build_adjacency(&line, 0.15).edges(), &[(0, 2), (1, 2)]);
        assert_eq!(build_adjacency(&[Vec2::zero()], 0.1).num_edges(), 0);
    }

    #[test]
    fn from_edges_normalizes_and_validates() {
        let graph = AdjacencyGraph::from_edges(3, [(1, 0), (0, 1), (2, 2), (1, 2)]).unwrap();
        assert_eq!(graph.edges(), &[(0, 1), (1, 2)]);
        assert!(AdjacencyGraph::from_edges(2, [(0, 2)]).is_err());
    }

    #[test]
    fn relax_leaves_tiny_colonies_alone() {
        let positions = vec![Vec2::new(0.3, 0.1), Vec2::new(-0.2, 0.4)];
        let graph = build_adjacency(&positions, 0.1);
        let relaxed = relax(&graph, &positions, Vec2::zero(), 1.0, &LayoutParams::default());
        assert_eq!(relaxed, positions);
    }

    #[test]
    fn relax_sets_extent_and_center() {
        let positions = disc(200, 0.3);
        let graph = build_adjacency(&positions, 0.1);
        let center = Vec2::new(0.5, -0.25);
        let relaxed = relax(&graph, &positions, center, 0.8, &LayoutParams::default());
        let mean = centroid(&relaxed);
        assert!(mean.distance(center) < 1e-9);
        let extent = relaxed.iter().map(|p| (*p - mean).max_abs()).fold(0.0, f64::max);
        assert!((extent - 0.8).abs() < 1e-9);
        assert!(relaxed.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn relax_is_deterministic() {
        let positions = disc(120, 0.5);
        let graph = build_adjacency(&positions, 0.2);
        let params = LayoutParams::default();
        let a = relax(&graph, &positions, Vec2::zero(), 0.5, &params);
        let b = relax(&graph, &positions, Vec2::zero(), 0.5, &params);
        assert_eq!(a, b);
    }

    #[test]
    fn coincident_points_are_separated() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut positions = vec![Vec2::zero(); 4];
        positions.push(Vec2::new(1.0, 1.0));
        let moved = separate_coincident(&mut positions, 0.01, &mut rng);
        assert_eq!(moved, 3);
        assert_eq!(positions[0], Vec2::zero());
        assert_eq!(positions[4], Vec2::new(1.0, 1.0));
        for p in &positions[1..4] {
            assert!((p.length() - 0.01).abs() < 1e-12);
        }
    }
}
