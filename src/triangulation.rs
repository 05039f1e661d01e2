//! Delaunay triangulation of cell centers (incremental Bowyer-Watson).
//!
//! Only the edge set is exposed; the adjacency layer filters it by length.

use growth_common::Vec2;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Triangle {
    v: [usize; 3],
    center: Vec2,
    radius_sq: f64,
}

impl Triangle {
    /// Returns `None` when the three vertices are collinear.
    fn new(v: [usize; 3], pts: &[Vec2]) -> Option<Self> {
        let (a, b, c) = (pts[v[0]], pts[v[1]], pts[v[2]]);
        let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
        if d.abs() < f64::EPSILON * 1e-6 {
            return None;
        }
        let a2 = a.length_squared();
        let b2 = b.length_squared();
        let c2 = c.length_squared();
        let center = Vec2::new(
            (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
            (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
        );
        Some(Triangle { v, center, radius_sq: center.distance_squared(a) })
    }

    fn circumcircle_contains(&self, p: Vec2) -> bool {
        self.center.distance_squared(p) < self.radius_sq
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.v;
        [ordered(a, b), ordered(b, c), ordered(c, a)]
    }
}

#[inline(always)]
fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

/// Edges of the Delaunay triangulation of `points`, as sorted `(i, j)` pairs
/// with `i < j`. Fewer than three points, or a fully collinear set, yield no
/// edges. Exactly coincident points after the first are left unconnected.
pub fn delaunay_edges(points: &[Vec2]) -> Vec<(usize, usize)> {
    let n = points.len();
    if n < 3 || points.iter().any(|p| !p.is_finite()) {
        return Vec::new();
    }

    // Bounding box and an enclosing super triangle
    let (mut min, mut max) = (points[0], points[0]);
    for p in points {
        min = Vec2::new(min.x.min(p.x), min.y.min(p.y));
        max = Vec2::new(max.x.max(p.x), max.y.max(p.y));
    }
    let span = (max.x - min.x).max(max.y - min.y).max(1e-9);
    let mid = (min + max) * 0.5;

    let mut pts = points.to_vec();
    pts.push(Vec2::new(mid.x - 20.0 * span, mid.y - span));
    pts.push(Vec2::new(mid.x, mid.y + 20.0 * span));
    pts.push(Vec2::new(mid.x + 20.0 * span, mid.y - span));

    let mut triangles = match Triangle::new([n, n + 1, n + 2], &pts) {
        Some(t) => vec![t],
        None => return Vec::new(),
    };

    let mut boundary: HashMap<(usize, usize), u32> = HashMap::new();
    for (idx, &p) in points.iter().enumerate() {
        boundary.clear();
        let mut kept = Vec::with_capacity(triangles.len() + 2);
        for t in triangles.drain(..) {
            if t.circumcircle_contains(p) {
                for e in t.edges() {
                    *boundary.entry(e).or_insert(0) += 1;
                }
            } else {
                kept.push(t);
            }
        }
        triangles = kept;

        // Edges seen once bound the cavity left by the removed triangles
        for (&(a, b), &count) in &boundary {
            if count == 1 {
                if let Some(t) = Triangle::new([a, b, idx], &pts) {
                    triangles.push(t);
                }
            }
        }
    }

    let mut edges: Vec<(usize, usize)> = triangles
        .iter()
        .filter(|t| t.v.iter().all(|&v| v < n))
        .flat_map(|t| t.edges())
        .collect();
    edges.sort_unstable();
    edges.dedup();
    edges
}
