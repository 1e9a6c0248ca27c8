use super::{CubicSpline, EndCondition, SplineError};
use crate::geometry::linspace;
use std::f64::consts::FRAC_PI_2;

/// Radius and height sampled evenly over ψ ∈ [0, π/2]
#[derive(Debug, Clone, PartialEq)]
pub struct RadialProfile {
    pub psi: Vec<f64>,
    pub radius: Vec<f64>,
    pub height: Vec<f64>,
}

impl RadialProfile {
    pub fn len(&self) -> usize {
        self.psi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.psi.is_empty()
    }
}

/// Wall radius as a cubic spline of the meridian angle ψ.
///
/// Heights are mapped to ψ through
/// `ψ = asin((Zmax − z) / (Zmax − h·γ))`, so ψ = 0 is the basal plane
/// (z = Zmax) and ψ = π/2 is the apex (z = h·γ).
#[derive(Debug, Clone)]
pub struct RadialWallSpline {
    curve: CubicSpline,
    z_max: f64,
    depth: f64,
}

impl RadialWallSpline {
    /// Fit radius vs. ψ for one wall contour at wall depth `gamma`
    pub fn fit(ro: &[f64], z: &[f64], z_max: f64, h: f64, gamma: f64) -> Result<Self, SplineError> {
        if ro.len() != z.len() {
            return Err(SplineError::LengthMismatch {
                knots: z.len(),
                values: ro.len(),
            });
        }

        let depth = z_max - h * gamma;
        if depth.abs() < f64::EPSILON * z_max.abs().max(1.0) {
            return Err(SplineError::DegenerateDepth { z_max, h, gamma });
        }

        let mut samples: Vec<(f64, f64)> = z
            .iter()
            .zip(ro)
            .map(|(&zi, &ri)| (psi_from_height(zi, z_max, depth), ri))
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (knots, values) = merge_equal_knots(&samples);
        let curve = CubicSpline::fit(&knots, &values, EndCondition::NotAKnot)?;

        Ok(Self { curve, z_max, depth })
    }

    /// Radius at meridian angle `psi`
    pub fn radius_at(&self, psi: f64) -> f64 {
        self.curve.value_at(psi)
    }

    /// Height at meridian angle `psi`
    pub fn height_at(&self, psi: f64) -> f64 {
        self.z_max - self.depth * psi.sin()
    }

    /// Sample `n_samples` evenly spaced ψ over [0, π/2]
    pub fn evaluate(&self, n_samples: usize) -> RadialProfile {
        let psi = linspace(0.0, FRAC_PI_2, n_samples);
        let radius = psi.iter().map(|&p| self.radius_at(p)).collect();
        let height = psi.iter().map(|&p| self.height_at(p)).collect();
        RadialProfile { psi, radius, height }
    }
}

/// ψ for a sample height; the asin argument is clamped against overshoot
pub fn psi_from_height(z: f64, z_max: f64, depth: f64) -> f64 {
    let arg = ((z_max - z) / depth).clamp(-1.0, 1.0);
    arg.asin()
}

/// Height of the level at meridian angle `psi` for wall depth `gamma`
pub fn height_at_level(z_max: f64, h: f64, gamma: f64, psi: f64) -> f64 {
    z_max - (z_max - h * gamma) * psi.sin()
}

// Several heights can clamp onto the same ψ; average their radii so the
// knot vector stays strictly increasing.
fn merge_equal_knots(samples: &[(f64, f64)]) -> (Vec<f64>, Vec<f64>) {
    const KNOT_EPS: f64 = 1e-12;

    let mut knots: Vec<f64> = Vec::with_capacity(samples.len());
    let mut values: Vec<f64> = Vec::with_capacity(samples.len());
    let mut counts: Vec<usize> = Vec::with_capacity(samples.len());

    for &(psi, ro) in samples {
        match knots.last() {
            Some(&last) if (psi - last).abs() <= KNOT_EPS => {
                let i = knots.len() - 1;
                values[i] = (values[i] * counts[i] as f64 + ro) / (counts[i] + 1) as f64;
                counts[i] += 1;
            }
            _ => {
                knots.push(psi);
                values.push(ro);
                counts.push(1);
            }
        }
    }

    (knots, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psi_mapping() {
        // Zmax=10, h=2, gamma=0 → depth 10
        let spline = RadialWallSpline::fit(&[10.0, 12.0, 10.0], &[0.0, 5.0, 10.0], 10.0, 2.0, 0.0).unwrap();
        assert!((spline.radius_at(FRAC_PI_2) - 10.0).abs() < 1e-10);
        assert!((spline.radius_at(std::f64::consts::FRAC_PI_6) - 12.0).abs() < 1e-10);
        assert!((spline.radius_at(0.0) - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_clamps_overshoot() {
        // gamma=1 → depth 8; z=0 gives arg 1.25 which must clamp to ψ=π/2
        assert!((psi_from_height(0.0, 10.0, 8.0) - FRAC_PI_2).abs() < 1e-12);
        let spline = RadialWallSpline::fit(&[10.0, 12.0, 10.0], &[0.0, 5.0, 10.0], 10.0, 2.0, 1.0).unwrap();
        let profile = spline.evaluate(7);
        assert!(profile.radius.iter().all(|r| r.is_finite()));
    }

    #[test]
    fn test_heights_follow_level_formula() {
        let spline = RadialWallSpline::fit(&[8.0, 6.0, 0.0], &[10.0, 6.0, 2.0], 10.0, 2.0, 1.0).unwrap();
        let profile = spline.evaluate(5);
        assert_eq!(profile.len(), 5);
        assert!((profile.height[0] - 10.0).abs() < 1e-12);
        assert!((profile.height[4] - 2.0).abs() < 1e-12);
        for (psi, z) in profile.psi.iter().zip(&profile.height) {
            assert!((height_at_level(10.0, 2.0, 1.0, *psi) - z).abs() < 1e-12);
        }
    }

    #[test]
    fn test_clamped_duplicates_are_merged() {
        // Both z=0 and z=1 clamp to ψ=π/2 at depth 8
        let spline = RadialWallSpline::fit(&[1.0, 3.0, 6.0, 8.0], &[0.0, 1.0, 6.0, 10.0], 10.0, 2.0, 1.0).unwrap();
        assert!((spline.radius_at(FRAC_PI_2) - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_degenerate_depth() {
        let err = RadialWallSpline::fit(&[1.0, 2.0], &[0.0, 1.0], 2.0, 2.0, 1.0).unwrap_err();
        assert!(matches!(err, SplineError::DegenerateDepth { .. }));
    }
}
