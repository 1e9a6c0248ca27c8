// Polygonal surface assembly by projected Delaunay triangulation
//
// A cup-shaped LV surface is flattened onto the xy-plane with a height
// dependent scale, (x, y) * (z + increment)^power, so the levels of the cup
// become nested rings. The projected points are triangulated with delaunator
// and the triangles are lifted back onto the original 3D points.
//
// The basal surface is an annulus: after triangulation every triangle whose
// projected centroid falls inside the endocardial ring is removed.

use crate::geometry::{orient_2d, point_in_polygon_2d, Point2D, Point3D};
use crate::mesh::PolygonalSurface;
use crate::reconstruction::AnatomicalSurfaces;
use crate::{Error, Result};
use delaunator::{triangulate, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Relative area below which a projected triangle counts as degenerate
const DEGENERATE_AREA: f64 = 1e-14;

/// Projection and merge parameters for one surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssemblyParams {
    /// Height offset added before scaling
    pub increment: f64,

    /// Exponent of the height scale
    pub power: f64,

    /// Merge distance for projected points, relative to the projected
    /// bounding-box diagonal (0 merges exact duplicates only)
    pub tolerance: f64,
}

impl AssemblyParams {
    pub fn new(increment: f64, power: f64, tolerance: f64) -> Self {
        Self { increment, power, tolerance }
    }

    /// Scaled 2D position of a surface point
    pub fn project(&self, p: &Point3D) -> Point2D {
        let coeff = (p.z + self.increment).powf(self.power);
        Point2D::new(coeff * p.x, coeff * p.y)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.increment.is_finite() || !self.power.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "assembly increment and power must be finite, got {} and {}",
                self.increment, self.power
            )));
        }
        if !(self.tolerance >= 0.0 && self.tolerance.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "assembly tolerance must be non-negative, got {}", self.tolerance
            )));
        }
        Ok(())
    }
}

/// Assembly parameters of the three LV surfaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    pub epi: AssemblyParams,
    pub endo: AssemblyParams,
    pub base: AssemblyParams,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            epi: AssemblyParams::new(49.0, 2.0, 1e-4),
            endo: AssemblyParams::new(4.0, 2.0, 1e-4),
            base: AssemblyParams::new(4.0, 2.0, 0.0),
        }
    }
}

impl AssemblyConfig {
    pub fn validate(&self) -> Result<()> {
        self.epi.validate()?;
        self.endo.validate()?;
        self.base.validate()
    }
}

/// Union of several surfaces
#[derive(Debug, Clone, Default)]
pub struct MergedSurface {
    /// All points and triangles, indices shifted per input surface
    pub surface: PolygonalSurface,

    /// The same points without connectivity
    pub points: Vec<Point3D>,
}

/// Polygonal LV surfaces ready for voxelization
#[derive(Debug, Clone)]
pub struct AssembledSurfaces {
    pub epi: PolygonalSurface,
    pub endo: PolygonalSurface,
    pub base: PolygonalSurface,
    pub merged: MergedSurface,
}

/// Triangulates surface point sets through a height-scaled projection
#[derive(Debug, Clone)]
pub struct SurfaceAssembler {
    params: AssemblyParams,
}

impl SurfaceAssembler {
    pub fn new(params: AssemblyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AssemblyParams {
        &self.params
    }

    /// Triangulate a point set; every input point is kept in input order
    pub fn assemble(&self, points: &[Point3D]) -> Result<PolygonalSurface> {
        let projected = self.project_all(points)?;
        let triangles = self.triangulate_projected(&projected)?;
        Ok(PolygonalSurface::new(points.to_vec(), triangles)?)
    }

    /// Triangulate a point set, then cut out the region enclosed by `border`
    pub fn assemble_with_border(&self, points: &[Point3D], border: &[Point3D]) -> Result<PolygonalSurface> {
        let projected = self.project_all(points)?;
        let ring = self.project_all(border)?;
        if ring.len() < 3 {
            return Err(Error::Triangulation(format!(
                "border ring needs at least 3 points, got {}", ring.len()
            )));
        }

        let triangles = self.triangulate_projected(&projected)?;
        let before = triangles.len();

        let kept: Vec<[usize; 3]> = triangles
            .into_iter()
            .filter(|tri| {
                let c = centroid_2d(&projected, tri);
                !point_in_polygon_2d(&c, &ring)
            })
            .collect();

        log::debug!("  Border excision removed {} of {} triangles", before - kept.len(), before);

        if kept.is_empty() {
            return Err(Error::Triangulation("border excision removed every triangle".to_string()));
        }
        Ok(PolygonalSurface::new(points.to_vec(), kept)?)
    }

    fn project_all(&self, points: &[Point3D]) -> Result<Vec<Point2D>> {
        self.params.validate()?;
        points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let q = self.params.project(p);
                if q.x.is_finite() && q.y.is_finite() {
                    Ok(q)
                } else {
                    Err(Error::Triangulation(format!(
                        "point {} ({}, {}, {}) has no finite projection", i, p.x, p.y, p.z
                    )))
                }
            })
            .collect()
    }

    /// Delaunay triangles over the merged projected points, indexed into the
    /// full point list, counter-clockwise and without degenerate faces
    fn triangulate_projected(&self, projected: &[Point2D]) -> Result<Vec<[usize; 3]>> {
        if projected.len() < 3 {
            return Err(Error::Triangulation(format!(
                "need at least 3 points, got {}", projected.len()
            )));
        }

        let diagonal = projected_diagonal(projected);
        let representatives = merge_close_points(projected, self.params.tolerance * diagonal);

        let coords: Vec<Point> = representatives
            .iter()
            .map(|&i| Point { x: projected[i].x, y: projected[i].y })
            .collect();
        let result = triangulate(&coords);

        let min_area = DEGENERATE_AREA * diagonal * diagonal;
        let mut triangles = Vec::with_capacity(result.triangles.len() / 3);

        for t in result.triangles.chunks_exact(3) {
            let mut tri = [representatives[t[0]], representatives[t[1]], representatives[t[2]]];
            let area = orient_2d(&projected[tri[0]], &projected[tri[1]], &projected[tri[2]]);
            if area.abs() <= min_area {
                continue;
            }
            if area < 0.0 {
                tri.swap(1, 2);
            }
            triangles.push(tri);
        }

        log::debug!("  Triangulated {} points ({} after merge) into {} triangles",
            projected.len(), representatives.len(), triangles.len());

        if triangles.is_empty() {
            return Err(Error::Triangulation(format!(
                "{} points produced no triangles (collinear projection?)", projected.len()
            )));
        }
        Ok(triangles)
    }
}

/// Concatenate surfaces, shifting each surface's triangle indices by the
/// number of points before it
pub fn merge(surfaces: &[&PolygonalSurface]) -> MergedSurface {
    let total_points = surfaces.iter().map(|s| s.num_points()).sum();
    let total_triangles = surfaces.iter().map(|s| s.num_triangles()).sum();

    let mut points = Vec::with_capacity(total_points);
    let mut triangles = Vec::with_capacity(total_triangles);

    for surface in surfaces {
        let offset = points.len();
        points.extend_from_slice(&surface.points);
        triangles.extend(
            surface
                .triangles
                .iter()
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
    }

    MergedSurface {
        surface: PolygonalSurface { points: points.clone(), triangles },
        points,
    }
}

/// Assemble epi, endo and base (with the endocardial hole) and their union
pub fn assemble_lv(surfaces: &AnatomicalSurfaces, config: &AssemblyConfig) -> Result<AssembledSurfaces> {
    config.validate()?;

    let epi = SurfaceAssembler::new(config.epi).assemble(&surfaces.epi)?;
    let endo = SurfaceAssembler::new(config.endo).assemble(&surfaces.endo)?;

    let base = SurfaceAssembler::new(config.base).assemble_with_border(&surfaces.base, &surfaces.hole_endo)?;

    let merged = merge(&[&epi, &endo, &base]);

    log::info!("  Assembled: epi={} endo={} base={} triangles ({} points merged)",
        epi.num_triangles(), endo.num_triangles(), base.num_triangles(), merged.points.len());

    Ok(AssembledSurfaces { epi, endo, base, merged })
}

fn centroid_2d(points: &[Point2D], tri: &[usize; 3]) -> Point2D {
    let (a, b, c) = (points[tri[0]], points[tri[1]], points[tri[2]]);
    Point2D::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0)
}

fn projected_diagonal(points: &[Point2D]) -> f64 {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    ((max_x - min_x).powi(2) + (max_y - min_y).powi(2)).sqrt()
}

/// Collapse points closer than `radius` onto the first of them.
///
/// Returns the indices of the surviving points in input order. Exact
/// duplicates are always collapsed.
fn merge_close_points(points: &[Point2D], radius: f64) -> Vec<usize> {
    let mut representatives = Vec::with_capacity(points.len());

    if radius <= 0.0 {
        let mut seen: HashMap<(u64, u64), usize> = HashMap::with_capacity(points.len());
        for (i, p) in points.iter().enumerate() {
            // +0.0 folds -0.0 onto 0.0
            let key = ((p.x + 0.0).to_bits(), (p.y + 0.0).to_bits());
            seen.entry(key).or_insert_with(|| {
                representatives.push(i);
                i
            });
        }
        return representatives;
    }

    // Hash grid with cell = radius: a close neighbour lies in the 3x3 block
    let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    let radius2 = radius * radius;

    for (i, p) in points.iter().enumerate() {
        let cx = (p.x / radius).floor() as i64;
        let cy = (p.y / radius).floor() as i64;

        let mut duplicate = false;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(members) = cells.get(&(cx + dx, cy + dy)) {
                    if members.iter().any(|&j| (points[j] - p).norm_squared() <= radius2) {
                        duplicate = true;
                        break 'search;
                    }
                }
            }
        }

        if !duplicate {
            cells.entry((cx, cy)).or_default().push(i);
            representatives.push(i);
        }
    }

    representatives
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstruction::tests::hemisphere_contours;
    use crate::reconstruction::{ReconstructionConfig, SurfaceReconstructor};
    use std::f64::consts::PI;

    fn ring(radius: f64, z: f64, n: usize) -> Vec<Point3D> {
        (0..n)
            .map(|i| {
                let phi = i as f64 * 2.0 * PI / n as f64;
                Point3D::new(radius * phi.cos(), radius * phi.sin(), z)
            })
            .collect()
    }

    fn lv_surfaces() -> AnatomicalSurfaces {
        let config = ReconstructionConfig {
            wall_points: 8,
            surface_points: 16,
            gamma_layers: 3,
            gamma_0: 0.0,
            gamma_1: 1.0,
        };
        SurfaceReconstructor::new(config)
            .construct_surfaces(&hemisphere_contours(8, 9))
            .unwrap()
    }

    #[test]
    fn test_projection() {
        let params = AssemblyParams::new(4.0, 2.0, 0.0);
        let q = params.project(&Point3D::new(1.0, -2.0, 1.0));
        assert!((q.x - 25.0).abs() < 1e-12);
        assert!((q.y + 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_disk_is_counter_clockwise() {
        let mut points = ring(5.0, 0.0, 12);
        points.push(Point3D::new(0.0, 0.0, 0.0));
        let surface = SurfaceAssembler::new(AssemblyParams::new(1.0, 1.0, 0.0))
            .assemble(&points)
            .unwrap();

        assert_eq!(surface.num_points(), 13);
        assert!(surface.num_triangles() >= 11);
        for t in 0..surface.num_triangles() {
            assert!(surface.face_normal(t).z > 0.0);
        }
        // Total area close to the inscribed 12-gon
        let expected = 0.5 * 12.0 * 25.0 * (2.0 * PI / 12.0).sin();
        assert!((surface.area() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_duplicates_are_kept_but_unreferenced() {
        let mut points = ring(5.0, 0.0, 8);
        points.push(points[0]);
        let surface = SurfaceAssembler::new(AssemblyParams::new(1.0, 1.0, 0.0))
            .assemble(&points)
            .unwrap();

        assert_eq!(surface.num_points(), 9);
        assert!(surface.triangles.iter().all(|t| !t.contains(&8)));
    }

    #[test]
    fn test_border_excises_hole() {
        let mut points = ring(10.0, 0.0, 16);
        points.extend(ring(6.0, 0.0, 16));
        let hole = ring(6.0, 0.0, 16);

        let params = AssemblyParams::new(1.0, 1.0, 0.0);
        let full = SurfaceAssembler::new(params).assemble(&points).unwrap();
        let annulus = SurfaceAssembler::new(params).assemble_with_border(&points, &hole).unwrap();

        assert!(annulus.num_triangles() < full.num_triangles());
        for t in 0..annulus.num_triangles() {
            let tri = annulus.triangles[t];
            let c = (points[tri[0]].coords + points[tri[1]].coords + points[tri[2]].coords) / 3.0;
            assert!(c.xy().norm() > 5.0, "triangle {} has centroid inside the hole", t);
        }
        let inner = 0.5 * 16.0 * 36.0 * (2.0 * PI / 16.0).sin();
        assert!((full.area() - annulus.area() - inner).abs() < 1e-6);

        // Ring orientation does not matter
        let reversed: Vec<Point3D> = hole.iter().rev().copied().collect();
        let annulus_rev = SurfaceAssembler::new(params).assemble_with_border(&points, &reversed).unwrap();
        assert_eq!(annulus_rev.triangles, annulus.triangles);
    }

    #[test]
    fn test_too_few_points() {
        let err = SurfaceAssembler::new(AssemblyParams::new(1.0, 1.0, 0.0))
            .assemble(&ring(1.0, 0.0, 2))
            .unwrap_err();
        assert!(matches!(err, Error::Triangulation(_)));
    }

    #[test]
    fn test_merge_counts_are_sums() {
        let assembled = assemble_lv(&lv_surfaces(), &AssemblyConfig::default()).unwrap();
        let merged = &assembled.merged;

        let points = assembled.epi.num_points() + assembled.endo.num_points() + assembled.base.num_points();
        let triangles = assembled.epi.num_triangles()
            + assembled.endo.num_triangles()
            + assembled.base.num_triangles();

        assert_eq!(merged.points.len(), points);
        assert_eq!(merged.surface.num_points(), points);
        assert_eq!(merged.surface.num_triangles(), triangles);

        // Endo triangles are shifted past the epi points
        let offset = assembled.epi.num_points();
        assert_eq!(merged.surface.triangles[assembled.epi.num_triangles()][0],
            assembled.endo.triangles[0][0] + offset);
    }

    #[test]
    fn test_lv_surfaces_orientation() {
        let assembled = assemble_lv(&lv_surfaces(), &AssemblyConfig::default()).unwrap();

        // Cup surfaces wind counter-clockwise seen from above: normals point up
        for t in 0..assembled.epi.num_triangles() {
            assert!(assembled.epi.face_normal(t).z >= 0.0);
        }
        for t in 0..assembled.base.num_triangles() {
            assert!(assembled.base.face_normal(t).z >= 0.0);
        }

        // Base is an annulus between the endo and epi rings
        let base = &assembled.base;
        for tri in &base.triangles {
            let c = (base.points[tri[0]].coords + base.points[tri[1]].coords + base.points[tri[2]].coords) / 3.0;
            assert!(c.xy().norm() > 7.0);
        }
    }
}
