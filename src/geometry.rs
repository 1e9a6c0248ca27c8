use nalgebra::{Point2, Point3, Vector3};

/// 3D point type
pub type Point3D = Point3<f64>;

/// 3D vector type
pub type Vector3D = Vector3<f64>;

/// 2D point type (projected plane)
pub type Point2D = Point2<f64>;

/// Below this norm a vector is treated as zero-length
pub const DEGENERATE_NORM: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Degenerate vector: cannot normalize {0:?}")]
    DegenerateVector([f64; 3]),
}

/// Normalize a vector, failing on zero-length or non-finite input
pub fn try_normalize(v: &Vector3D) -> Result<Vector3D, GeometryError> {
    let norm = v.norm();
    if norm < DEGENERATE_NORM || !norm.is_finite() {
        return Err(GeometryError::DegenerateVector([v.x, v.y, v.z]));
    }
    Ok(v / norm)
}

/// Normalize a vector; a degenerate vector is logged and replaced by zero.
pub fn normalize_or_zero(v: Vector3D) -> Vector3D {
    match try_normalize(&v) {
        Ok(unit) => unit,
        Err(e) => {
            log::warn!("{}", e);
            Vector3D::zeros()
        }
    }
}

/// Angle between two vectors in radians, in [0, π].
///
/// Computed as atan2(|a × b|, a · b), so a zero-length operand yields 0.
pub fn angle_between(a: &Vector3D, b: &Vector3D) -> f64 {
    a.cross(b).norm().atan2(a.dot(b))
}

/// `n` evenly spaced values over [start, end] inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Axis-aligned bounds of a point set, or None when empty
pub fn bounds(points: &[Point3D]) -> Option<(Point3D, Point3D)> {
    if points.is_empty() {
        return None;
    }

    let mut min = Point3D::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
    let mut max = Point3D::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);

    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        min.z = min.z.min(p.z);

        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
        max.z = max.z.max(p.z);
    }

    Some((min, max))
}

/// Twice the signed area of the 2D triangle (a, b, c).
/// Positive = counter-clockwise.
pub fn orient_2d(a: &Point2D, b: &Point2D, c: &Point2D) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Even-odd point-in-polygon test for a closed 2D ring.
/// The ring may repeat its first vertex at the end.
pub fn point_in_polygon_2d(p: &Point2D, ring: &[Point2D]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&ring[i], &ring[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_try_normalize() {
        let v = try_normalize(&Vector3D::new(3.0, 0.0, 4.0)).unwrap();
        assert!((v.norm() - 1.0).abs() < 1e-12);
        assert!((v.x - 0.6).abs() < 1e-12);

        let err = try_normalize(&Vector3D::zeros());
        assert_eq!(err, Err(GeometryError::DegenerateVector([0.0, 0.0, 0.0])));
    }

    #[test]
    fn test_normalize_or_zero() {
        assert_eq!(normalize_or_zero(Vector3D::zeros()), Vector3D::zeros());
        assert_eq!(normalize_or_zero(Vector3D::new(1e-14, 0.0, 0.0)), Vector3D::zeros());
    }

    #[test]
    fn test_angle_between() {
        let x = Vector3D::new(1.0, 0.0, 0.0);
        let y = Vector3D::new(0.0, 2.0, 0.0);
        assert!((angle_between(&x, &y) - PI / 2.0).abs() < 1e-12);
        assert!((angle_between(&x, &-x) - PI).abs() < 1e-12);
        assert_eq!(angle_between(&x, &Vector3D::zeros()), 0.0);
    }

    #[test]
    fn test_linspace_endpoints() {
        let v = linspace(0.0, 2.0 * PI, 9);
        assert_eq!(v.len(), 9);
        assert_eq!(v[0], 0.0);
        assert_eq!(v[8], 2.0 * PI);
        assert!((v[4] - PI).abs() < 1e-12);
        assert_eq!(linspace(3.0, 5.0, 1), vec![3.0]);
    }

    #[test]
    fn test_point_in_polygon() {
        let square = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(4.0, 0.0),
            Point2D::new(4.0, 4.0),
            Point2D::new(0.0, 4.0),
        ];
        assert!(point_in_polygon_2d(&Point2D::new(2.0, 2.0), &square));
        assert!(!point_in_polygon_2d(&Point2D::new(5.0, 2.0), &square));
    }

    #[test]
    fn test_bounds() {
        let pts = vec![Point3D::new(0.0, 5.0, -1.0), Point3D::new(2.0, -3.0, 4.0)];
        let (min, max) = bounds(&pts).unwrap();
        assert_eq!(min, Point3D::new(0.0, -3.0, -1.0));
        assert_eq!(max, Point3D::new(2.0, 5.0, 4.0));
        assert!(bounds(&[]).is_none());
    }
}
