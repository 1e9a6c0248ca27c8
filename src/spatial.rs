// Nearest-point location in unstructured point sets
//
// Uniform bin grid over the bounding box. Each bin stores the indices of the
// points inside it. A query searches shells of bins of growing Chebyshev
// radius around the query bin until no unsearched bin can hold a closer point.
//
// The grid is built once and only read afterwards, so it can be shared
// between rayon workers.

use crate::geometry::{bounds, Point3D};

/// Target average number of points per occupied bin
const POINTS_PER_CELL: f64 = 8.0;

/// Immutable spatial index for closest-point queries
#[derive(Debug, Clone)]
pub struct PointGrid {
    points: Vec<Point3D>,
    bounds_min: Point3D,
    dims: (usize, usize, usize),
    cell_size: (f64, f64, f64),
    /// cells[iz * (nx*ny) + iy * nx + ix] = list of point indices
    cells: Vec<Vec<usize>>,
}

impl PointGrid {
    /// Build a grid over `points`. Returns None for an empty set.
    pub fn build(points: &[Point3D]) -> Option<Self> {
        let (min, max) = bounds(points)?;
        let extent = max - min;
        let max_extent = extent.x.max(extent.y).max(extent.z).max(1e-10);

        // Cell edge so that a dense box would hold ~POINTS_PER_CELL points
        let volume = extent.x.max(max_extent * 1e-3)
            * extent.y.max(max_extent * 1e-3)
            * extent.z.max(max_extent * 1e-3);
        let base_cell_size = (volume * POINTS_PER_CELL / points.len() as f64)
            .cbrt()
            .max(max_extent / 256.0);

        let nx = ((extent.x / base_cell_size).ceil() as usize).max(1);
        let ny = ((extent.y / base_cell_size).ceil() as usize).max(1);
        let nz = ((extent.z / base_cell_size).ceil() as usize).max(1);

        let cell_size = (
            (extent.x / nx as f64).max(1e-10),
            (extent.y / ny as f64).max(1e-10),
            (extent.z / nz as f64).max(1e-10),
        );

        let total_cells = nx * ny * nz;
        let mut cells: Vec<Vec<usize>> = vec![Vec::new(); total_cells];

        for (pi, p) in points.iter().enumerate() {
            let ix = cell_index_1d(p.x, min.x, cell_size.0, nx);
            let iy = cell_index_1d(p.y, min.y, cell_size.1, ny);
            let iz = cell_index_1d(p.z, min.z, cell_size.2, nz);
            cells[iz * (nx * ny) + iy * nx + ix].push(pi);
        }

        log::debug!("PointGrid: {}x{}x{} = {} cells for {} points",
            nx, ny, nz, total_cells, points.len());

        Some(PointGrid {
            points: points.to_vec(),
            bounds_min: min,
            dims: (nx, ny, nz),
            cell_size,
            cells,
        })
    }

    pub fn points(&self) -> &[Point3D] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the point closest to `query` (ties resolve to the lower index)
    pub fn find_closest_point(&self, query: &Point3D) -> usize {
        let (nx, ny, nz) = self.dims;

        let ix = cell_index_1d(query.x, self.bounds_min.x, self.cell_size.0, nx) as i64;
        let iy = cell_index_1d(query.y, self.bounds_min.y, self.cell_size.1, ny) as i64;
        let iz = cell_index_1d(query.z, self.bounds_min.z, self.cell_size.2, nz) as i64;

        let min_cell = self.cell_size.0.min(self.cell_size.1).min(self.cell_size.2);
        let max_radius = nx.max(ny).max(nz) as i64;

        let mut best = usize::MAX;
        let mut best_dist2 = f64::INFINITY;

        for radius in 0..=max_radius {
            for dz in -radius..=radius {
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        // Only the shell of this radius
                        if dx.abs() != radius && dy.abs() != radius && dz.abs() != radius {
                            continue;
                        }

                        let (cx, cy, cz) = (ix + dx, iy + dy, iz + dz);
                        if cx < 0 || cy < 0 || cz < 0 {
                            continue;
                        }
                        let (cx, cy, cz) = (cx as usize, cy as usize, cz as usize);
                        if cx >= nx || cy >= ny || cz >= nz {
                            continue;
                        }

                        for &pi in &self.cells[cz * (nx * ny) + cy * nx + cx] {
                            let d2 = (self.points[pi] - query).norm_squared();
                            if d2 < best_dist2 || (d2 == best_dist2 && pi < best) {
                                best_dist2 = d2;
                                best = pi;
                            }
                        }
                    }
                }
            }

            // Anything outside this shell is at least `radius` cells away
            let reach = radius as f64 * min_cell;
            if best != usize::MAX && best_dist2 <= reach * reach {
                break;
            }
        }

        best
    }
}

/// Compute 1D cell index for a coordinate value.
fn cell_index_1d(value: f64, min: f64, cell_size: f64, num_cells: usize) -> usize {
    if cell_size <= 0.0 || num_cells == 0 {
        return 0;
    }
    let idx = ((value - min) / cell_size).floor() as i64;
    idx.clamp(0, (num_cells - 1) as i64) as usize
}
