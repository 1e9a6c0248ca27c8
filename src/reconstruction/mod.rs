// Spline reconstruction of the left ventricle from meridian contours
//
// ALGORITHM FLOW:
// 1. Per meridian: radius vs. ψ spline of one wall (RadialWallSpline)
// 2. Transpose per-meridian profiles into per-level arrays
// 3. Per ψ level: periodic spline in φ for radius and for height
// 4. Cylindrical → Cartesian, flattened level-major
// 5. Volume: blend epi/endo radii over γ layers and derive the fiber field
//    (see `fibers`)

pub mod fibers;

use crate::contour::{ContourData, Wall};
use crate::geometry::{linspace, Point3D};
use crate::mesh::FiberMesh;
use crate::spline::radial::height_at_level;
use crate::spline::{AngularProfile, PeriodicAngularSpline, RadialProfile, RadialWallSpline};
use crate::{Error, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for the spline reconstruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Number of ψ levels sampled along each meridian
    pub wall_points: usize,

    /// Number of φ samples around each level (seam sample included twice)
    pub surface_points: usize,

    /// Number of γ layers through the wall
    pub gamma_layers: usize,

    /// Wall depth of the outermost layer
    pub gamma_0: f64,

    /// Wall depth of the innermost layer
    pub gamma_1: f64,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            wall_points: 60,
            surface_points: 60,
            gamma_layers: 3,
            gamma_0: 0.0,
            gamma_1: 1.0,
        }
    }
}

impl ReconstructionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.wall_points < 2 {
            return Err(Error::InvalidParameter(format!(
                "wall_points must be at least 2, got {}", self.wall_points
            )));
        }
        if self.surface_points < 2 {
            return Err(Error::InvalidParameter(format!(
                "surface_points must be at least 2, got {}", self.surface_points
            )));
        }
        if self.gamma_layers < 1 {
            return Err(Error::InvalidParameter("gamma_layers must be at least 1".to_string()));
        }
        if !self.gamma_0.is_finite() || !self.gamma_1.is_finite() || self.gamma_1 <= self.gamma_0 {
            return Err(Error::InvalidParameter(format!(
                "gamma range must be strictly increasing, got [{}, {}]",
                self.gamma_0, self.gamma_1
            )));
        }
        Ok(())
    }

    /// γ of every layer, gamma_0 to gamma_1 inclusive
    pub fn gammas(&self) -> Vec<f64> {
        linspace(self.gamma_0, self.gamma_1, self.gamma_layers)
    }
}

/// Point sets of every anatomical surface produced by one reconstruction
#[derive(Debug, Clone, Default)]
pub struct AnatomicalSurfaces {
    pub epi: Vec<Point3D>,
    pub endo: Vec<Point3D>,
    pub base: Vec<Point3D>,
    /// Basal ring of the endocardium (ψ = 0, γ = 1), cut out of the base
    pub hole_endo: Vec<Point3D>,
    /// Basal ring of the epicardium (ψ = 0, γ = 0)
    pub hole_epi: Vec<Point3D>,
}

impl AnatomicalSurfaces {
    /// All five point sets concatenated in field order
    pub fn combined(&self) -> Vec<Point3D> {
        let mut points = Vec::with_capacity(
            self.epi.len() + self.endo.len() + self.base.len()
                + self.hole_endo.len() + self.hole_epi.len(),
        );
        points.extend_from_slice(&self.epi);
        points.extend_from_slice(&self.endo);
        points.extend_from_slice(&self.base);
        points.extend_from_slice(&self.hole_endo);
        points.extend_from_slice(&self.hole_epi);
        points
    }
}

/// Output of a reconstruction run
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Volumetric point mesh with one fiber vector per point
    pub mesh: FiberMesh,

    /// Surface point sets for polygonal assembly
    pub surfaces: AnatomicalSurfaces,
}

/// Reconstructs LV surfaces and the fiber-bearing volume mesh
#[derive(Debug, Clone)]
pub struct SurfaceReconstructor {
    config: ReconstructionConfig,
}

impl SurfaceReconstructor {
    pub fn new(config: ReconstructionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// Build surfaces and the full mesh (main entry point)
    pub fn reconstruct(&self, data: &ContourData) -> Result<Reconstruction> {
        log::info!("Reconstructing LV from {} meridians", data.num_meridians());
        let surfaces = self.construct_surfaces(data)?;
        let mesh = self.construct_mesh(data)?;
        Ok(Reconstruction { mesh, surfaces })
    }

    /// Epi, endo and base surface point sets plus the two basal rings
    pub fn construct_surfaces(&self, data: &ContourData) -> Result<AnatomicalSurfaces> {
        self.check_input(data)?;
        let n_phi = self.config.surface_points;

        let epi = self.construct_wall_surface(data, Wall::Epi, 0.0)?;
        let endo = self.construct_wall_surface(data, Wall::Endo, 1.0)?;

        // Basal rings come from the ψ = 0 level of both walls
        let epi_base = fit_radial_profiles(data, Wall::Epi, self.config.gamma_0, self.config.wall_points)?;
        let endo_base = fit_radial_profiles(data, Wall::Endo, self.config.gamma_1, self.config.wall_points)?;
        let epi_ring = angular_profile(&level_values(&epi_base, 0, |p| &p.radius), n_phi)?;
        let endo_ring = angular_profile(&level_values(&endo_base, 0, |p| &p.radius), n_phi)?;
        let z_max = data.z_max_list(Wall::Endo);
        let h = data.h();

        let base_gammas = linspace(0.0, 1.0, self.config.gamma_layers);
        let mut base = Vec::with_capacity(base_gammas.len() * n_phi);
        for &gamma in &base_gammas {
            base.extend(basal_ring(&epi_ring, &endo_ring, &z_max, h, gamma)?);
        }

        let hole_endo = basal_ring(&epi_ring, &endo_ring, &z_max, h, 1.0)?;
        let hole_epi = basal_ring(&epi_ring, &endo_ring, &z_max, h, 0.0)?;

        log::info!("  Surfaces: epi={} endo={} base={} points",
            epi.len(), endo.len(), base.len());

        Ok(AnatomicalSurfaces { epi, endo, base, hole_endo, hole_epi })
    }

    /// Volumetric point mesh with fibers
    pub fn construct_mesh(&self, data: &ContourData) -> Result<FiberMesh> {
        self.check_input(data)?;
        fibers::construct_fiber_mesh(data, &self.config)
    }

    /// Point set of one wall at a fixed wall depth
    pub fn construct_wall_surface(&self, data: &ContourData, wall: Wall, gamma: f64) -> Result<Vec<Point3D>> {
        let n_psi = self.config.wall_points;
        let n_phi = self.config.surface_points;
        let profiles = fit_radial_profiles(data, wall, gamma, n_psi)?;

        let levels: Vec<Vec<Point3D>> = (0..n_psi)
            .into_par_iter()
            .map(|i| -> Result<Vec<Point3D>> {
                let radius = angular_profile(&level_values(&profiles, i, |p| &p.radius), n_phi)?;
                let height = angular_profile(&level_values(&profiles, i, |p| &p.height), n_phi)?;
                Ok(to_cartesian(&radius, &height.values))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(levels.into_iter().flatten().collect())
    }

    fn check_input(&self, data: &ContourData) -> Result<()> {
        self.config.validate()?;
        data.validate()
    }
}

/// One radial profile per meridian for the given wall and wall depth
pub(crate) fn fit_radial_profiles(
    data: &ContourData,
    wall: Wall,
    gamma: f64,
    n_psi: usize,
) -> Result<Vec<RadialProfile>> {
    let h = data.h();
    data.meridians
        .par_iter()
        .map(|meridian| -> Result<RadialProfile> {
            let contour = meridian.wall(wall);
            let spline = RadialWallSpline::fit(&contour.ro, &contour.z, contour.z_max, h, gamma)?;
            Ok(spline.evaluate(n_psi))
        })
        .collect()
}

/// Values of one ψ level across all meridians
pub(crate) fn level_values<F>(profiles: &[RadialProfile], level: usize, field: F) -> Vec<f64>
where
    F: Fn(&RadialProfile) -> &Vec<f64>,
{
    profiles.iter().map(|p| field(p)[level]).collect()
}

/// Periodic fit over meridian values, sampled at `n_phi` azimuths
pub(crate) fn angular_profile(values: &[f64], n_phi: usize) -> Result<AngularProfile> {
    Ok(PeriodicAngularSpline::fit_evenly(values)?.evaluate(n_phi))
}

/// Heights of one level across meridians, interpolated in φ
pub(crate) fn level_heights(z_max: &[f64], h: f64, gamma: f64, psi: f64, n_phi: usize) -> Result<AngularProfile> {
    let heights: Vec<f64> = z_max.iter().map(|&zm| height_at_level(zm, h, gamma, psi)).collect();
    angular_profile(&heights, n_phi)
}

/// Blend of the epi and endo radii at wall depth `gamma`
pub(crate) fn blend(epi: &[f64], endo: &[f64], gamma: f64) -> Vec<f64> {
    epi.iter().zip(endo).map(|(e, n)| e * (1.0 - gamma) + n * gamma).collect()
}

fn to_cartesian(radius: &AngularProfile, heights: &[f64]) -> Vec<Point3D> {
    radius.phi.iter()
        .zip(&radius.values)
        .zip(heights)
        .map(|((phi, ro), z)| Point3D::new(ro * phi.cos(), ro * phi.sin(), *z))
        .collect()
}

fn basal_ring(
    epi_ring: &AngularProfile,
    endo_ring: &AngularProfile,
    z_max: &[f64],
    h: f64,
    gamma: f64,
) -> Result<Vec<Point3D>> {
    let radius = AngularProfile {
        phi: endo_ring.phi.clone(),
        values: blend(&epi_ring.values, &endo_ring.values, gamma),
    };
    let heights = level_heights(z_max, h, gamma, 0.0, endo_ring.len())?;
    Ok(to_cartesian(&radius, &heights.values))
}
