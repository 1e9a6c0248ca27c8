use super::{CubicSpline, SplineError};
use crate::geometry::linspace;
use std::f64::consts::PI;

/// Minimum knots for an azimuthal fit (one per meridian)
pub const MIN_ANGULAR_KNOTS: usize = 4;

/// Values sampled evenly over φ ∈ [0, 2π]; the first and last samples
/// sit on the seam and coincide.
#[derive(Debug, Clone, PartialEq)]
pub struct AngularProfile {
    pub phi: Vec<f64>,
    pub values: Vec<f64>,
}

impl AngularProfile {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Periodic cubic spline over the azimuth, C² across the 0/2π seam
#[derive(Debug, Clone)]
pub struct PeriodicAngularSpline {
    curve: CubicSpline,
}

impl PeriodicAngularSpline {
    /// Fit through `values` at `angles` ⊂ [0, 2π).
    ///
    /// The first value is repeated at 2π to close the curve.
    pub fn fit(angles: &[f64], values: &[f64]) -> Result<Self, SplineError> {
        if angles.len() < MIN_ANGULAR_KNOTS {
            return Err(SplineError::TooFewKnots {
                required: MIN_ANGULAR_KNOTS,
                got: angles.len(),
            });
        }
        let curve = CubicSpline::fit_periodic(angles, values, 2.0 * PI)?;
        Ok(Self { curve })
    }

    /// Fit through values at evenly spaced angles `i·2π/n`, one per meridian
    pub fn fit_evenly(values: &[f64]) -> Result<Self, SplineError> {
        Self::fit(&meridian_angles(values.len()), values)
    }

    pub fn value_at(&self, phi: f64) -> f64 {
        self.curve.value_at(phi)
    }

    /// Sample `n_samples` evenly spaced angles over [0, 2π]
    pub fn evaluate(&self, n_samples: usize) -> AngularProfile {
        let phi = linspace(0.0, 2.0 * PI, n_samples);
        let values = phi.iter().map(|&p| self.curve.value_at(p)).collect();
        AngularProfile { phi, values }
    }

    pub fn curve(&self) -> &CubicSpline {
        &self.curve
    }
}

/// Azimuth of each meridian: `i·2π/n` for i in 0..n
pub fn meridian_angles(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64 * 2.0 * PI / n as f64).collect()
}
