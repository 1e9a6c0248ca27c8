// Voxelization of the reconstructed LV onto a cubic grid
//
// A grid point p is tissue when it lies on the inner side of all three
// reference surfaces (epicardium, endocardium, base). For each surface the
// closest surface vertex s is found and p is on the inner side when the
// angle between the vertex normal at s and (p − s) is at most 90°.
//
// Normals of the reference surfaces must point into the wall: the assembled
// epicardium already does, the endocardium and base are flipped.
//
// Tissue voxels take the fiber of the closest point of the fiber mesh.

use crate::assembly::AssembledSurfaces;
use crate::codec::encode_component;
use crate::geometry::{angle_between, Point3D, Vector3D};
use crate::mesh::{FiberMesh, PolygonalSurface};
use crate::spatial::PointGrid;
use crate::{Error, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Voxel label of empty space
pub const LABEL_EMPTY: u8 = 0;
/// Voxel label of healthy myocardium
pub const LABEL_TISSUE: u8 = 1;
/// Voxel label of fibrotic myocardium
pub const LABEL_FIBROSIS: u8 = 2;

/// Placement of the cubic voxel grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    /// Cells per side
    pub n_side: usize,

    /// Position of cell (0, 0, 0)
    pub origin: Point3D,

    /// Cell spacing
    pub dr: f64,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            n_side: 100,
            origin: Point3D::new(-50.0, -50.0, -5.0),
            dr: 1.0,
        }
    }
}

impl GridParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_side == 0 {
            return Err(Error::InvalidParameter("n_side must be positive".to_string()));
        }
        if !(self.dr > 0.0 && self.dr.is_finite()) {
            return Err(Error::InvalidParameter(format!("dr must be positive, got {}", self.dr)));
        }
        if !(self.origin.x.is_finite() && self.origin.y.is_finite() && self.origin.z.is_finite()) {
            return Err(Error::InvalidParameter(format!("origin must be finite, got {:?}", self.origin)));
        }
        Ok(())
    }

    pub fn num_voxels(&self) -> usize {
        self.n_side * self.n_side * self.n_side
    }

    /// Position of cell (i, j, k)
    pub fn grid_point(&self, i: usize, j: usize, k: usize) -> Point3D {
        Point3D::new(
            self.origin.x + self.dr * i as f64,
            self.origin.y + self.dr * j as f64,
            self.origin.z + self.dr * k as f64,
        )
    }
}

/// Surface vertices with unit normals and a closest-point index over them
#[derive(Debug, Clone)]
pub struct ReferenceSurface {
    normals: Vec<Vector3D>,
    index: PointGrid,
}

impl ReferenceSurface {
    /// Build from explicit vertices and unit normals
    pub fn new(points: Vec<Point3D>, normals: Vec<Vector3D>) -> Result<Self> {
        if points.len() != normals.len() {
            return Err(Error::InvalidParameter(format!(
                "{} reference points but {} normals", points.len(), normals.len()
            )));
        }
        let index = PointGrid::build(&points)
            .ok_or_else(|| Error::NotReconstructed("reference surface has no points".to_string()))?;
        Ok(Self { normals, index })
    }

    /// Vertices of a triangulated surface with area-weighted normals.
    ///
    /// Vertices outside every triangle are dropped. With `flip` the normals
    /// are reversed.
    pub fn from_polygonal(surface: &PolygonalSurface, flip: bool) -> Result<Self> {
        let sign = if flip { -1.0 } else { 1.0 };
        let (points, normals): (Vec<Point3D>, Vec<Vector3D>) = surface
            .points
            .iter()
            .zip(surface.vertex_normals())
            .filter_map(|(p, n)| n.map(|n| (*p, n * sign)))
            .unzip();
        Self::new(points, normals)
    }

    pub fn points(&self) -> &[Point3D] {
        self.index.points()
    }

    pub fn normals(&self) -> &[Vector3D] {
        &self.normals
    }

    pub fn len(&self) -> usize {
        self.normals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normals.is_empty()
    }

    /// Angle between the normal at the closest vertex and the direction to `p`
    pub fn angle_to(&self, p: &Point3D) -> f64 {
        let closest = self.index.find_closest_point(p);
        let offset = p - self.index.points()[closest];
        angle_between(&self.normals[closest], &offset)
    }

    /// True when `p` is on the side the normals point to
    pub fn faces(&self, p: &Point3D) -> bool {
        self.angle_to(p) <= FRAC_PI_2
    }
}

/// The three surfaces bounding the myocardium
#[derive(Debug, Clone)]
pub struct ReferenceSurfaces {
    pub epi: ReferenceSurface,
    pub endo: ReferenceSurface,
    pub base: ReferenceSurface,
}

impl ReferenceSurfaces {
    pub fn new(epi: ReferenceSurface, endo: ReferenceSurface, base: ReferenceSurface) -> Self {
        Self { epi, endo, base }
    }

    /// Reference surfaces of an assembled LV; endo and base normals are flipped
    pub fn from_assembled(surfaces: &AssembledSurfaces) -> Result<Self> {
        Ok(Self {
            epi: ReferenceSurface::from_polygonal(&surfaces.epi, false)?,
            endo: ReferenceSurface::from_polygonal(&surfaces.endo, true)?,
            base: ReferenceSurface::from_polygonal(&surfaces.base, true)?,
        })
    }

    /// A point is tissue only if it is inside with respect to all three surfaces
    pub fn is_inside(&self, p: &Point3D) -> bool {
        self.epi.faces(p) && self.endo.faces(p) && self.base.faces(p)
    }
}

/// Cubic label array, flattened as (i·n + j)·n + k
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    pub n_side: usize,
    pub labels: Vec<u8>,
}

impl VoxelGrid {
    /// All-empty grid
    pub fn new(n_side: usize) -> Self {
        Self {
            n_side,
            labels: vec![LABEL_EMPTY; n_side * n_side * n_side],
        }
    }

    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.n_side + j) * self.n_side + k
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> u8 {
        self.labels[self.index(i, j, k)]
    }

    pub fn set(&mut self, i: usize, j: usize, k: usize, label: u8) {
        let idx = self.index(i, j, k);
        self.labels[idx] = label;
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn count(&self, label: u8) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    /// Number of non-empty voxels
    pub fn tissue_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l != LABEL_EMPTY).count()
    }

    /// Grid positions of the tissue voxels, for display.
    ///
    /// With `healthy_only` fibrotic voxels are left out.
    pub fn tissue_points(&self, params: &GridParams, healthy_only: bool) -> Vec<Point3D> {
        let n = self.n_side;
        let mut points = Vec::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let label = self.get(i, j, k);
                    let keep = if healthy_only { label == LABEL_TISSUE } else { label != LABEL_EMPTY };
                    if keep {
                        points.push(params.grid_point(i, j, k));
                    }
                }
            }
        }
        points
    }
}

/// Fixed-point fiber components, channel-major: c·n³ + voxel index
#[derive(Debug, Clone, PartialEq)]
pub struct FiberGrid {
    pub n_side: usize,
    pub data: Vec<i8>,
}

impl FiberGrid {
    /// All-zero grid
    pub fn new(n_side: usize) -> Self {
        Self {
            n_side,
            data: vec![0; 3 * n_side * n_side * n_side],
        }
    }

    pub fn num_voxels(&self) -> usize {
        self.n_side * self.n_side * self.n_side
    }

    /// Encoded components of one voxel
    pub fn get(&self, voxel: usize) -> [i8; 3] {
        let n3 = self.num_voxels();
        [self.data[voxel], self.data[n3 + voxel], self.data[2 * n3 + voxel]]
    }

    pub fn set(&mut self, voxel: usize, value: [i8; 3]) {
        let n3 = self.num_voxels();
        for (c, v) in value.into_iter().enumerate() {
            self.data[c * n3 + voxel] = v;
        }
    }

    pub fn clear(&mut self, voxel: usize) {
        self.set(voxel, [0; 3]);
    }
}

/// Rasterizes the LV onto a cubic grid
#[derive(Debug, Clone)]
pub struct Voxelizer {
    params: GridParams,
}

impl Voxelizer {
    pub fn new(params: GridParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GridParams {
        &self.params
    }

    /// Label every grid point and attach the closest mesh fiber to tissue
    pub fn generate(&self, mesh: &FiberMesh, surfaces: &ReferenceSurfaces) -> Result<(VoxelGrid, FiberGrid)> {
        self.params.validate()?;
        if mesh.is_empty() {
            return Err(Error::NotReconstructed("fiber mesh is empty".to_string()));
        }
        if mesh.fibers.len() != mesh.points.len() {
            return Err(Error::NotReconstructed(format!(
                "fiber mesh has {} points but {} fibers", mesh.points.len(), mesh.fibers.len()
            )));
        }
        if surfaces.epi.is_empty() || surfaces.endo.is_empty() || surfaces.base.is_empty() {
            return Err(Error::NotReconstructed("reference surfaces are empty".to_string()));
        }

        let fiber_index = PointGrid::build(&mesh.points)
            .ok_or_else(|| Error::NotReconstructed("fiber mesh is empty".to_string()))?;

        let n = self.params.n_side;
        let slab_len = n * n;
        log::info!("  Voxelizing {}^3 grid (dr = {}, origin = [{}, {}, {}])",
            n, self.params.dr, self.params.origin.x, self.params.origin.y, self.params.origin.z);

        // One slab per i; labels plus the three fiber channels of that slab
        let slabs: Vec<(Vec<u8>, [Vec<i8>; 3])> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut labels = vec![LABEL_EMPTY; slab_len];
                let mut channels = [vec![0i8; slab_len], vec![0i8; slab_len], vec![0i8; slab_len]];

                for j in 0..n {
                    for k in 0..n {
                        let p = self.params.grid_point(i, j, k);
                        if !surfaces.is_inside(&p) {
                            continue;
                        }
                        let local = j * n + k;
                        labels[local] = LABEL_TISSUE;

                        let fiber = mesh.fibers[fiber_index.find_closest_point(&p)];
                        for (c, channel) in channels.iter_mut().enumerate() {
                            channel[local] = encode_component(fiber[c]);
                        }
                    }
                }
                (labels, channels)
            })
            .collect();

        let mut grid = VoxelGrid::new(n);
        let mut fibers = FiberGrid::new(n);
        let n3 = n * slab_len;

        for (i, (labels, channels)) in slabs.into_iter().enumerate() {
            let start = i * slab_len;
            grid.labels[start..start + slab_len].copy_from_slice(&labels);
            for (c, channel) in channels.iter().enumerate() {
                let offset = c * n3 + start;
                fibers.data[offset..offset + slab_len].copy_from_slice(channel);
            }
        }

        log::info!("  → {} tissue voxels of {}", grid.tissue_count(), grid.len());
        Ok((grid, fibers))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::f64::consts::PI;

    /// Lower half of a sphere centred at the origin, normals scaled by `sign`
    fn hemisphere(radius: f64, sign: f64) -> ReferenceSurface {
        let mut points = Vec::new();
        let mut normals = Vec::new();
        for a in 0..=60 {
            let theta = FRAC_PI_2 + FRAC_PI_2 * a as f64 / 60.0;
            for b in 0..120 {
                let phi = 2.0 * PI * b as f64 / 120.0;
                let dir = Vector3D::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
                points.push(Point3D::from(dir * radius));
                normals.push(dir * sign);
            }
        }
        ReferenceSurface::new(points, normals).unwrap()
    }

    fn annulus(r_in: f64, r_out: f64) -> ReferenceSurface {
        let mut points = Vec::new();
        for a in 0..=30 {
            let r = r_in + (r_out - r_in) * a as f64 / 30.0;
            for b in 0..120 {
                let phi = 2.0 * PI * b as f64 / 120.0;
                points.push(Point3D::new(r * phi.cos(), r * phi.sin(), 0.0));
            }
        }
        let normals = vec![Vector3D::new(0.0, 0.0, -1.0); points.len()];
        ReferenceSurface::new(points, normals).unwrap()
    }

    /// Thick hemispherical shell between radii 4 and 10 below z = 0
    pub(crate) fn shell_surfaces() -> ReferenceSurfaces {
        ReferenceSurfaces::new(hemisphere(10.0, -1.0), hemisphere(4.0, 1.0), annulus(4.0, 10.0))
    }

    fn two_point_mesh() -> FiberMesh {
        FiberMesh::new(
            vec![Point3D::new(0.0, 0.0, -5.0), Point3D::new(0.0, 0.0, 5.0)],
            vec![Vector3D::new(0.0, 0.0, 1.0), Vector3D::new(1.0, 0.0, 0.0)],
        )
        .unwrap()
    }

    fn small_grid() -> GridParams {
        GridParams { n_side: 4, origin: Point3D::new(-6.0, -6.0, -6.0), dr: 4.0 }
    }

    #[test]
    fn test_hemisphere_matches_geometry() {
        let params = small_grid();
        let (grid, fibers) = Voxelizer::new(params.clone())
            .generate(&two_point_mesh(), &shell_surfaces())
            .unwrap();

        let mut tissue = 0;
        for i in 0..4 {
            for j in 0..4 {
                for k in 0..4 {
                    let p = params.grid_point(i, j, k);
                    let r = p.coords.norm();
                    let expected = p.z < 0.0 && (4.0..=10.0).contains(&r);
                    let idx = grid.index(i, j, k);
                    assert_eq!(grid.get(i, j, k) == LABEL_TISSUE, expected, "voxel {:?}", p);

                    if expected {
                        tissue += 1;
                        assert_eq!(fibers.get(idx), [0, 0, 127]);
                    } else {
                        assert_eq!(fibers.get(idx), [0, 0, 0]);
                    }
                }
            }
        }
        assert_eq!(tissue, 24);
        assert_eq!(grid.tissue_count(), 24);
        assert_eq!(grid.tissue_points(&params, false).len(), 24);
    }

    #[test]
    fn test_all_three_surfaces_must_agree() {
        let single = |normal: Vector3D| {
            ReferenceSurface::new(vec![Point3D::origin()], vec![normal]).unwrap()
        };
        let surfaces = ReferenceSurfaces::new(
            single(Vector3D::x()),
            single(Vector3D::y()),
            single(Vector3D::z()),
        );

        assert!(surfaces.is_inside(&Point3D::new(1.0, 1.0, 1.0)));
        assert!(!surfaces.is_inside(&Point3D::new(-1.0, 1.0, 1.0)));
        assert!(!surfaces.is_inside(&Point3D::new(1.0, -1.0, 1.0)));
        assert!(!surfaces.is_inside(&Point3D::new(1.0, 1.0, -1.0)));
        // On the surface point itself the offset is zero: angle 0
        assert!(surfaces.is_inside(&Point3D::origin()));
    }

    #[test]
    fn test_from_polygonal_drops_loose_vertices() {
        let surface = PolygonalSurface::new(
            vec![
                Point3D::new(0.0, 0.0, 0.0),
                Point3D::new(1.0, 0.0, 0.0),
                Point3D::new(0.0, 1.0, 0.0),
                Point3D::new(5.0, 5.0, 5.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();

        let up = ReferenceSurface::from_polygonal(&surface, false).unwrap();
        assert_eq!(up.len(), 3);
        assert!(up.normals().iter().all(|n| (n - Vector3D::z()).norm() < 1e-12));

        let down = ReferenceSurface::from_polygonal(&surface, true).unwrap();
        assert!(down.normals().iter().all(|n| (n + Vector3D::z()).norm() < 1e-12));
        assert!(down.faces(&Point3D::new(0.2, 0.2, -1.0)));
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let result = Voxelizer::new(small_grid()).generate(&FiberMesh::default(), &shell_surfaces());
        assert!(matches!(result, Err(Error::NotReconstructed(_))));
    }

    #[test]
    fn test_mesh_without_fibers_is_rejected() {
        let mesh = FiberMesh { points: vec![Point3D::new(0.0, 0.0, -5.0)], fibers: vec![] };
        let result = Voxelizer::new(small_grid()).generate(&mesh, &shell_surfaces());
        assert!(matches!(result, Err(Error::NotReconstructed(_))));
    }

    #[test]
    fn test_fiber_grid_channel_layout() {
        let mut fibers = FiberGrid::new(2);
        fibers.set(3, [1, -2, 3]);
        assert_eq!(fibers.data[3], 1);
        assert_eq!(fibers.data[8 + 3], -2);
        assert_eq!(fibers.data[16 + 3], 3);
        assert_eq!(fibers.get(3), [1, -2, 3]);
        fibers.clear(3);
        assert!(fibers.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_tissue_points_healthy_only() {
        let params = GridParams { n_side: 2, origin: Point3D::origin(), dr: 1.0 };
        let mut grid = VoxelGrid::new(2);
        grid.set(0, 0, 1, LABEL_TISSUE);
        grid.set(1, 1, 1, LABEL_FIBROSIS);

        assert_eq!(grid.index(1, 0, 1), 5);
        assert_eq!(grid.tissue_points(&params, false).len(), 2);
        assert_eq!(grid.tissue_points(&params, true), vec![Point3D::new(0.0, 0.0, 1.0)]);
    }
}
