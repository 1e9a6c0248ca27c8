// Cubic spline interpolation in moment (second-derivative) form
//
// Two flavours are built on the same core:
// - periodic over the azimuth φ (closed at 2π), see `periodic`
// - non-periodic over the meridian angle ψ ∈ [0, π/2], see `radial`
//
// Every fit returns a fresh immutable curve; nothing is cached between fits.

pub mod periodic;
pub mod radial;

pub use periodic::{AngularProfile, PeriodicAngularSpline};
pub use radial::{RadialProfile, RadialWallSpline};

use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplineError {
    #[error("Spline needs at least {required} knots, got {got}")]
    TooFewKnots { required: usize, got: usize },

    #[error("Knot count {knots} does not match value count {values}")]
    LengthMismatch { knots: usize, values: usize },

    #[error("Knots must be strictly increasing (violated at index {0})")]
    NonIncreasingKnots(usize),

    #[error("Knot or value is not finite at index {0}")]
    NonFinite(usize),

    #[error("Spline system is singular")]
    Singular,

    #[error("Wall depth denominator Zmax - h*gamma is zero (Zmax={z_max}, h={h}, gamma={gamma})")]
    DegenerateDepth { z_max: f64, h: f64, gamma: f64 },
}

/// Boundary treatment at the two ends of a non-periodic spline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndCondition {
    /// Third derivative continuous across the second and penultimate knots
    NotAKnot,

    /// Zero second derivative at both ends
    Natural,
}

/// Fitted cubic spline curve.
///
/// For a periodic curve the last knot is the closing knot (first knot plus
/// the period) and carries the first value and moment.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    knots: Vec<f64>,
    values: Vec<f64>,
    moments: Vec<f64>,
    periodic: bool,
}

impl CubicSpline {
    /// Fit a non-periodic interpolating spline.
    ///
    /// Not-a-knot needs 4 knots; with 3 knots it degrades to the
    /// interpolating parabola and with 2 to a straight line.
    pub fn fit(knots: &[f64], values: &[f64], end: EndCondition) -> Result<Self, SplineError> {
        check_knots(knots, values, 2)?;
        let n = knots.len();
        let h: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();

        let moments = if n == 2 {
            vec![0.0, 0.0]
        } else {
            let mut a = DMatrix::<f64>::zeros(n, n);
            let mut rhs = DVector::<f64>::zeros(n);

            for i in 1..n - 1 {
                a[(i, i - 1)] = h[i - 1];
                a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
                a[(i, i + 1)] = h[i];
                rhs[i] = 6.0 * ((values[i + 1] - values[i]) / h[i]
                    - (values[i] - values[i - 1]) / h[i - 1]);
            }

            match (end, n) {
                (EndCondition::Natural, _) => {
                    a[(0, 0)] = 1.0;
                    a[(n - 1, n - 1)] = 1.0;
                }
                (EndCondition::NotAKnot, 3) => {
                    // Single parabola: constant second derivative
                    a[(0, 0)] = 1.0;
                    a[(0, 1)] = -1.0;
                    a[(2, 1)] = -1.0;
                    a[(2, 2)] = 1.0;
                }
                (EndCondition::NotAKnot, _) => {
                    a[(0, 0)] = h[1];
                    a[(0, 1)] = -(h[0] + h[1]);
                    a[(0, 2)] = h[0];
                    a[(n - 1, n - 3)] = h[n - 2];
                    a[(n - 1, n - 2)] = -(h[n - 3] + h[n - 2]);
                    a[(n - 1, n - 1)] = h[n - 3];
                }
            }

            let solution = a.lu().solve(&rhs).ok_or(SplineError::Singular)?;
            solution.iter().copied().collect()
        };

        Ok(Self {
            knots: knots.to_vec(),
            values: values.to_vec(),
            moments,
            periodic: false,
        })
    }

    /// Fit a periodic interpolating spline with the given period.
    ///
    /// `knots` must lie within one period and must not repeat the first
    /// knot; the closing knot is added here.
    pub fn fit_periodic(knots: &[f64], values: &[f64], period: f64) -> Result<Self, SplineError> {
        check_knots(knots, values, 3)?;
        let n = knots.len();
        let closing = knots[0] + period;
        if closing <= knots[n - 1] {
            return Err(SplineError::NonIncreasingKnots(n));
        }

        let mut closed_knots = knots.to_vec();
        closed_knots.push(closing);
        let mut closed_values = values.to_vec();
        closed_values.push(values[0]);

        let h: Vec<f64> = closed_knots.windows(2).map(|w| w[1] - w[0]).collect();

        // Cyclic tridiagonal system in M_0..M_{n-1}
        let mut a = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DVector::<f64>::zeros(n);
        for i in 0..n {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            let h_prev = h[prev];
            let h_cur = h[i];

            a[(i, prev)] += h_prev;
            a[(i, i)] += 2.0 * (h_prev + h_cur);
            a[(i, next)] += h_cur;

            let y_prev = closed_values[prev];
            let y_next = closed_values[i + 1];
            rhs[i] = 6.0 * ((y_next - closed_values[i]) / h_cur - (closed_values[i] - y_prev) / h_prev);
        }

        let solution = a.lu().solve(&rhs).ok_or(SplineError::Singular)?;
        let mut moments: Vec<f64> = solution.iter().copied().collect();
        moments.push(moments[0]);

        Ok(Self {
            knots: closed_knots,
            values: closed_values,
            moments,
            periodic: true,
        })
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// Knot coordinates (including the closing knot for periodic curves)
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// (first knot, last knot)
    pub fn domain(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    /// Evaluate the curve at `x`.
    ///
    /// Periodic curves wrap `x` into their period; non-periodic curves
    /// extrapolate with the end polynomials.
    pub fn value_at(&self, x: f64) -> f64 {
        let (x0, x1) = self.domain();
        let x = if self.periodic {
            (x - x0).rem_euclid(x1 - x0) + x0
        } else {
            x
        };

        let n = self.knots.len();
        let k = self.knots.partition_point(|&knot| knot <= x).clamp(1, n - 1) - 1;

        let (xa, xb) = (self.knots[k], self.knots[k + 1]);
        let (ya, yb) = (self.values[k], self.values[k + 1]);
        let (ma, mb) = (self.moments[k], self.moments[k + 1]);
        let h = xb - xa;
        let a = xb - x;
        let b = x - xa;

        ma * a.powi(3) / (6.0 * h)
            + mb * b.powi(3) / (6.0 * h)
            + (ya - ma * h * h / 6.0) * a / h
            + (yb - mb * h * h / 6.0) * b / h
    }
}

fn check_knots(knots: &[f64], values: &[f64], required: usize) -> Result<(), SplineError> {
    if knots.len() != values.len() {
        return Err(SplineError::LengthMismatch {
            knots: knots.len(),
            values: values.len(),
        });
    }
    if knots.len() < required {
        return Err(SplineError::TooFewKnots {
            required,
            got: knots.len(),
        });
    }
    for (i, (k, v)) in knots.iter().zip(values).enumerate() {
        if !k.is_finite() || !v.is_finite() {
            return Err(SplineError::NonFinite(i));
        }
    }
    for i in 1..knots.len() {
        if knots[i] <= knots[i - 1] {
            return Err(SplineError::NonIncreasingKnots(i));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_interpolates_knots() {
        let xs = [0.0, 1.0, 2.5, 3.0, 4.0];
        let ys = [1.0, -2.0, 0.5, 3.0, 2.0];
        let spline = CubicSpline::fit(&xs, &ys, EndCondition::NotAKnot).unwrap();
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert!((spline.value_at(*x) - y).abs() < 1e-10);
        }
    }

    #[test]
    fn test_not_a_knot_reproduces_cubic() {
        let f = |x: f64| 0.5 * x.powi(3) - x * x + 2.0;
        let xs = [0.0, 0.7, 1.5, 2.0, 3.1];
        let ys: Vec<f64> = xs.iter().map(|&x| f(x)).collect();
        let spline = CubicSpline::fit(&xs, &ys, EndCondition::NotAKnot).unwrap();
        for x in [0.2, 1.1, 1.9, 2.9] {
            assert!((spline.value_at(x) - f(x)).abs() < 1e-9, "x={}", x);
        }
    }

    #[test]
    fn test_three_knots_is_parabola() {
        let f = |x: f64| 2.0 * x * x - 3.0 * x + 1.0;
        let xs = [0.0, 1.0, 3.0];
        let ys: Vec<f64> = xs.iter().map(|&x| f(x)).collect();
        let spline = CubicSpline::fit(&xs, &ys, EndCondition::NotAKnot).unwrap();
        assert!((spline.value_at(2.0) - f(2.0)).abs() < 1e-10);
    }

    #[test]
    fn test_two_knots_is_linear() {
        let spline = CubicSpline::fit(&[0.0, 2.0], &[1.0, 5.0], EndCondition::NotAKnot).unwrap();
        assert!((spline.value_at(0.5) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_knots() {
        assert_eq!(
            CubicSpline::fit(&[0.0, 0.0, 1.0], &[1.0, 2.0, 3.0], EndCondition::Natural).unwrap_err(),
            SplineError::NonIncreasingKnots(1)
        );
        assert_eq!(
            CubicSpline::fit(&[0.0], &[1.0], EndCondition::Natural).unwrap_err(),
            SplineError::TooFewKnots { required: 2, got: 1 }
        );
    }

    #[test]
    fn test_periodic_reproduces_cosine() {
        let n = 24;
        let xs: Vec<f64> = (0..n).map(|i| i as f64 * 2.0 * PI / n as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| x.cos()).collect();
        let spline = CubicSpline::fit_periodic(&xs, &ys, 2.0 * PI).unwrap();
        for x in [0.1, 1.3, 3.0, 5.9] {
            assert!((spline.value_at(x) - x.cos()).abs() < 1e-4);
        }
        // Wraps past one period
        assert!((spline.value_at(0.1 + 2.0 * PI) - spline.value_at(0.1)).abs() < 1e-10);
    }
}
