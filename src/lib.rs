// Core modules for LV reconstruction and voxelization
pub mod geometry;
pub mod mesh;
pub mod contour;
pub mod spline;
pub mod spatial;
pub mod reconstruction;
pub mod assembly;
pub mod voxelizer;
pub mod fibrosis;
pub mod codec;
pub mod pipeline;

// Re-export commonly used types
pub use geometry::{GeometryError, Point3D, Vector3D};
pub use mesh::{FiberMesh, MeshError, PolygonalSurface};
pub use contour::{ContourData, Meridian, Wall, WallContour};
pub use spline::{PeriodicAngularSpline, RadialWallSpline, SplineError};
pub use reconstruction::{AnatomicalSurfaces, Reconstruction, ReconstructionConfig, SurfaceReconstructor};
pub use assembly::{assemble_lv, merge, AssembledSurfaces, AssemblyConfig, AssemblyParams, SurfaceAssembler};
pub use voxelizer::{FiberGrid, GridParams, ReferenceSurfaces, VoxelGrid, Voxelizer};
pub use fibrosis::{FibrosisConfig, FibrosisInjector, FibrosisReport};
pub use pipeline::{run_pipeline, PipelineConfig, PipelineResult, PipelineStats};

/// Main result type for the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for reconstruction and voxelization
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Not reconstructed: {0}")]
    NotReconstructed(String),

    #[error("Triangulation error: {0}")]
    Triangulation(String),

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// A spline that cannot be fitted means the contours are unusable
impl From<SplineError> for Error {
    fn from(e: SplineError) -> Self {
        Error::MalformedInput(e.to_string())
    }
}
