use crate::geometry::{bounds, try_normalize, Point3D, Vector3D};

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("Empty mesh")]
    EmptyMesh,

    #[error("Triangle {triangle} references vertex {vertex}, mesh has {num_points} points")]
    IndexOutOfRange {
        triangle: usize,
        vertex: usize,
        num_points: usize,
    },

    #[error("Fiber count {fibers} does not match point count {points}")]
    FiberCountMismatch { points: usize, fibers: usize },
}

/// Point cloud where every point is its own cell, carrying a unit fiber
/// vector per point. This is the native output of the reconstruction.
#[derive(Debug, Clone, Default)]
pub struct FiberMesh {
    pub points: Vec<Point3D>,
    pub fibers: Vec<Vector3D>,
}

impl FiberMesh {
    pub fn new(points: Vec<Point3D>, fibers: Vec<Vector3D>) -> Result<Self, MeshError> {
        if points.len() != fibers.len() {
            return Err(MeshError::FiberCountMismatch {
                points: points.len(),
                fibers: fibers.len(),
            });
        }
        Ok(Self { points, fibers })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Triangulated surface: ordered point list plus triangles indexing into it
#[derive(Debug, Clone, Default)]
pub struct PolygonalSurface {
    pub points: Vec<Point3D>,
    pub triangles: Vec<[usize; 3]>,
}

impl PolygonalSurface {
    /// Create a surface, checking every triangle index
    pub fn new(points: Vec<Point3D>, triangles: Vec<[usize; 3]>) -> Result<Self, MeshError> {
        if points.is_empty() {
            return Err(MeshError::EmptyMesh);
        }

        for (ti, tri) in triangles.iter().enumerate() {
            for &vertex in tri {
                if vertex >= points.len() {
                    return Err(MeshError::IndexOutOfRange {
                        triangle: ti,
                        vertex,
                        num_points: points.len(),
                    });
                }
            }
        }

        Ok(Self { points, triangles })
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Bounding box (min, max), None for an empty surface
    pub fn bounds(&self) -> Option<(Point3D, Point3D)> {
        bounds(&self.points)
    }

    /// Unnormalized face normal (length = 2 × area)
    pub fn face_normal(&self, triangle: usize) -> Vector3D {
        let [a, b, c] = self.triangles[triangle];
        let e1 = self.points[b] - self.points[a];
        let e2 = self.points[c] - self.points[a];
        e1.cross(&e2)
    }

    /// Total surface area
    pub fn area(&self) -> f64 {
        (0..self.triangles.len())
            .map(|t| self.face_normal(t).norm() / 2.0)
            .sum()
    }

    /// Area-weighted vertex normals following triangle winding.
    ///
    /// Vertices not referenced by any triangle get `None`.
    pub fn vertex_normals(&self) -> Vec<Option<Vector3D>> {
        let mut sums = vec![Vector3D::zeros(); self.points.len()];
        let mut referenced = vec![false; self.points.len()];

        for (ti, tri) in self.triangles.iter().enumerate() {
            let n = self.face_normal(ti);
            for &v in tri {
                sums[v] += n;
                referenced[v] = true;
            }
        }

        sums.into_iter()
            .zip(referenced)
            .map(|(sum, used)| if used { try_normalize(&sum).ok() } else { None })
            .collect()
    }

    /// Reverse the winding of every triangle
    pub fn flip(&mut self) {
        for tri in &mut self.triangles {
            tri.swap(1, 2);
        }
    }
}
