// Volumetric LV point mesh with an analytic fiber field
//
// The wall is filled by blending the epi (γ = 0) and endo (γ = 1) radius
// fields over `gamma_layers` layers. At every point the radius field is
// differentiated by finite differences in γ, ψ and φ, and the fiber direction
// follows from a closed form whose helix angle is Ph = π·γ.
//
// The last ψ level uses the previous level as its "next" neighbour, so
// ∂ρ/∂ψ changes sign there.

use super::{angular_profile, blend, fit_radial_profiles, level_heights, level_values, ReconstructionConfig};
use crate::contour::{ContourData, Wall};
use crate::geometry::{linspace, normalize_or_zero, Point3D, Vector3D};
use crate::mesh::FiberMesh;
use crate::spline::AngularProfile;
use crate::Result;
use rayon::prelude::*;
use std::f64::consts::{FRAC_PI_2, PI};

/// Upper ψ of the volume levels; stays below π/2 so (π − 2ψ) never vanishes
pub const PSI_VOLUME_MAX: f64 = FRAC_PI_2 - 1e-4;

/// Azimuthal scale of the helix term
const PHI_MAX: f64 = 3.0 * PI;

/// Build the fiber-bearing point mesh.
///
/// Points are ordered γ layer, then ψ level, then φ sample; the count is
/// `gamma_layers × wall_points × surface_points`.
pub fn construct_fiber_mesh(data: &ContourData, config: &ReconstructionConfig) -> Result<FiberMesh> {
    config.validate()?;
    let n_psi = config.wall_points;
    let n_phi = config.surface_points;
    let h = data.h();
    let z_max = data.z_max_list(Wall::Endo);

    log::info!("  Volume mesh: {} layers x {} levels x {} samples",
        config.gamma_layers, n_psi, n_phi);

    let epi_profiles = fit_radial_profiles(data, Wall::Epi, 0.0, n_psi)?;
    let endo_profiles = fit_radial_profiles(data, Wall::Endo, 1.0, n_psi)?;

    // Per-level radius around the circumference, shared by every layer
    let wall_levels: Vec<(AngularProfile, AngularProfile)> = (0..n_psi)
        .into_par_iter()
        .map(|i| -> Result<(AngularProfile, AngularProfile)> {
            let epi = angular_profile(&level_values(&epi_profiles, i, |p| &p.radius), n_phi)?;
            let endo = angular_profile(&level_values(&endo_profiles, i, |p| &p.radius), n_phi)?;
            Ok((epi, endo))
        })
        .collect::<Result<Vec<_>>>()?;

    let psi = linspace(0.0, PSI_VOLUME_MAX, n_psi);
    let gammas = config.gammas();
    let gamma_span = config.gamma_1 - config.gamma_0;

    // The z term of every fiber uses the heights of the first level built
    let z_reference = level_heights(&z_max, h, gammas[0], psi[0], n_phi)?.values;

    let slabs: Vec<(Vec<Point3D>, Vec<Vector3D>)> = (0..gammas.len() * n_psi)
        .into_par_iter()
        .map(|slot| -> Result<(Vec<Point3D>, Vec<Vector3D>)> {
            let gamma = gammas[slot / n_psi];
            let i = slot % n_psi;
            let heights = level_heights(&z_max, h, gamma, psi[i], n_phi)?;
            let level = LevelInput {
                gamma,
                gamma_span,
                psi: psi[i],
                h,
                current: &wall_levels[i],
                neighbour: &wall_levels[psi_neighbour(i, n_psi)],
                heights: &heights.values,
                z_reference: &z_reference,
                n_psi,
            };
            Ok(level.build())
        })
        .collect::<Result<Vec<_>>>()?;

    let mut points = Vec::with_capacity(slabs.len() * n_phi);
    let mut fibers = Vec::with_capacity(slabs.len() * n_phi);
    for (p, f) in slabs {
        points.extend(p);
        fibers.extend(f);
    }

    log::info!("  Volume mesh: {} points with fibers", points.len());
    Ok(FiberMesh::new(points, fibers)?)
}

/// Level used for the ψ difference; the last level looks back instead of forward
pub fn psi_neighbour(i: usize, n_psi: usize) -> usize {
    if i + 1 < n_psi {
        i + 1
    } else {
        i.saturating_sub(1)
    }
}

struct LevelInput<'a> {
    gamma: f64,
    gamma_span: f64,
    psi: f64,
    h: f64,
    current: &'a (AngularProfile, AngularProfile),
    neighbour: &'a (AngularProfile, AngularProfile),
    heights: &'a [f64],
    z_reference: &'a [f64],
    n_psi: usize,
}

impl LevelInput<'_> {
    fn build(&self) -> (Vec<Point3D>, Vec<Vector3D>) {
        let (epi, endo) = self.current;
        let (epi_next, endo_next) = self.neighbour;
        let phi = &endo.phi;
        let n_phi = phi.len();
        let gamma = self.gamma;

        let radius = blend(&epi.values, &endo.values, gamma);
        let radius_next = blend(&epi_next.values, &endo_next.values, gamma);

        let d_psi = FRAC_PI_2 / self.n_psi as f64;
        let d_phi = 2.0 * PI / n_phi as f64;

        let ph = PI * gamma;
        let (sin_ph, cos_ph) = ph.sin_cos();
        let (sin_psi, cos_psi) = self.psi.sin_cos();

        let mut points = Vec::with_capacity(n_phi);
        let mut fibers = Vec::with_capacity(n_phi);

        for k in 0..n_phi {
            let (sin_phi, cos_phi) = phi[k].sin_cos();
            let x = radius[k] * cos_phi;
            let y = radius[k] * sin_phi;
            points.push(Point3D::new(x, y, self.heights[k]));

            let dr_dgamma = endo.values[k] - epi.values[k];
            let dr_dpsi = (radius_next[k] - radius[k]) / d_psi;
            // Circular shift: the previous φ sample of k = 0 is the last one
            let dr_dphi = (radius[k] - radius[(k + n_phi - 1) % n_phi]) / d_phi;
            let tangential = dr_dgamma + dr_dphi * PHI_MAX;

            let fx = sin_ph / ((PI - 2.0 * self.psi) * self.gamma_span)
                * (y * PHI_MAX - tangential * cos_phi)
                - cos_phi * dr_dpsi * FRAC_PI_2 * cos_ph;
            let fy = sin_ph / ((2.0 * self.psi - PI) * self.gamma_span)
                * (x * PHI_MAX - tangential * sin_phi)
                - sin_phi * dr_dpsi * FRAC_PI_2 * cos_ph;
            let fz = (self.h * sin_ph * sin_psi) / ((2.0 * self.psi - PI) * self.gamma_span)
                + (self.z_reference[k] - self.h * gamma) * cos_psi * FRAC_PI_2 * cos_ph;

            fibers.push(normalize_or_zero(Vector3D::new(fx, fy, fz)));
        }

        (points, fibers)
    }
}
