use growth_common::Vec2;

/// Upper bound on grid cells per axis; beyond this buckets simply get fuller.
const MAX_GRID_DIM: usize = 1024;

/// Uniform bucket grid over a point set, built by counting sort.
///
/// Points are bucketed once; `for_each_neighbor` then only visits the 3x3
/// block of buckets around a query position.
#[derive(Debug)]
pub struct SpatialGrid {
    origin: Vec2,
    inv_cell_size: f64,
    dim_x: usize,
    dim_y: usize,
    // Number of points in each grid cell
    cell_counts: Vec<u32>,
    // Start index in cell_point_indices for each grid cell (prefix sum)
    cell_starts: Vec<u32>,
    // Point indices sorted by grid cell
    cell_point_indices: Vec<u32>,
}

impl SpatialGrid {
    /// Buckets `positions` into square cells of side `cell_size`.
    pub fn build(positions: &[Vec2], cell_size: f64) -> Self {
        let (mut min, mut max) = match positions.first() {
            Some(p) => (*p, *p),
            None => (Vec2::zero(), Vec2::zero()),
        };
        for p in positions {
            min = Vec2::new(min.x.min(p.x), min.y.min(p.y));
            max = Vec2::new(max.x.max(p.x), max.y.max(p.y));
        }

        let span = (max.x - min.x).max(max.y - min.y);
        let cell_size = cell_size.max(span / MAX_GRID_DIM as f64).max(1e-12);
        let inv_cell_size = 1.0 / cell_size;
        let dim_x = (((max.x - min.x) * inv_cell_size).floor() as usize + 1).min(MAX_GRID_DIM);
        let dim_y = (((max.y - min.y) * inv_cell_size).floor() as usize + 1).min(MAX_GRID_DIM);
        let num_grid_cells = dim_x * dim_y;

        let mut grid = SpatialGrid {
            origin: min,
            inv_cell_size,
            dim_x,
            dim_y,
            cell_counts: vec![0; num_grid_cells],
            cell_starts: vec![0; num_grid_cells],
            cell_point_indices: vec![0; positions.len()],
        };

        // Phase 1: grid index of every point
        let point_cells: Vec<usize> = positions.iter().map(|p| grid.cell_index(*p)).collect();

        // Phase 2: count points per cell
        for &cell in &point_cells {
            grid.cell_counts[cell] += 1;
        }

        // Phase 3: prefix sum into start offsets
        let mut total = 0u32;
        for (start, count) in grid.cell_starts.iter_mut().zip(&grid.cell_counts) {
            *start = total;
            total += count;
        }

        // Phase 4: scatter point indices into their buckets
        let mut offsets = grid.cell_starts.clone();
        for (idx, &cell) in point_cells.iter().enumerate() {
            grid.cell_point_indices[offsets[cell] as usize] = idx as u32;
            offsets[cell] += 1;
        }

        grid
    }

    #[inline(always)]
    fn cell_coords(&self, pos: Vec2) -> (i64, i64) {
        (
            ((pos.x - self.origin.x) * self.inv_cell_size).floor() as i64,
            ((pos.y - self.origin.y) * self.inv_cell_size).floor() as i64,
        )
    }

    #[inline(always)]
    fn cell_index(&self, pos: Vec2) -> usize {
        let (gx, gy) = self.cell_coords(pos);
        // Clamp to grid dimensions to handle edge cases
        let gx = gx.clamp(0, self.dim_x as i64 - 1) as usize;
        let gy = gy.clamp(0, self.dim_y as i64 - 1) as usize;
        gy * self.dim_x + gx
    }

    /// Calls `f` for every point other than `point_idx` lying strictly within
    /// `sqrt(max_dist_sq)` of `pos`. Returning `false` from `f` stops the search.
    ///
    /// Only the 3x3 block around `pos` is visited, so `max_dist_sq` must not
    /// exceed the squared cell size used at build time.
    pub fn for_each_neighbor<F>(
        &self,
        point_idx: usize,
        pos: Vec2,
        max_dist_sq: f64,
        positions: &[Vec2],
        mut f: F,
    ) where
        F: FnMut(usize, f64) -> bool,
    {
        if self.cell_counts.is_empty() {
            return;
        }
        let (center_x, center_y) = self.cell_coords(pos);

        for dy in -1..=1 {
            for dx in -1..=1 {
                let gx = center_x + dx;
                let gy = center_y + dy;
                if gx < 0 || gy < 0 || gx >= self.dim_x as i64 || gy >= self.dim_y as i64 {
                    continue;
                }
                let grid_idx = gy as usize * self.dim_x + gx as usize;
                let start = self.cell_starts[grid_idx] as usize;
                let end = start + self.cell_counts[grid_idx] as usize;

                for &neighbor in &self.cell_point_indices[start..end] {
                    let neighbor = neighbor as usize;
                    // Don't compare a point to itself
                    if neighbor == point_idx {
                        continue;
                    }
                    let dist_sq = pos.distance_squared(positions[neighbor]);
                    if dist_sq < max_dist_sq && !f(neighbor, dist_sq) {
                        return;
                    }
                }
            }
        }
    }
}
