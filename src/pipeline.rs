// Complete contour-to-grid pipeline
//
// Step 1: spline reconstruction of surfaces and fiber mesh
// Step 2: polygonal assembly of epi, endo and base
// Step 3: voxelization against the three reference surfaces
// Step 4: optional fibrosis injection
// Step 5: heart.bin / fibers.bin output

use crate::assembly::{assemble_lv, AssembledSurfaces, AssemblyConfig};
use crate::codec::write_bin_files;
use crate::contour::ContourData;
use crate::fibrosis::{FibrosisConfig, FibrosisReport};
use crate::reconstruction::{Reconstruction, ReconstructionConfig, SurfaceReconstructor};
use crate::voxelizer::{FiberGrid, GridParams, ReferenceSurfaces, VoxelGrid, Voxelizer};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings of every pipeline stage; missing JSON fields take defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub reconstruction: ReconstructionConfig,
    pub assembly: AssemblyConfig,
    pub grid: GridParams,
    pub fibrosis: FibrosisConfig,
}

impl PipelineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.reconstruction.validate()?;
        self.assembly.validate()?;
        self.grid.validate()?;
        self.fibrosis.validate()
    }
}

/// Everything produced by one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub reconstruction: Reconstruction,
    pub assembled: AssembledSurfaces,
    pub voxels: VoxelGrid,
    pub fibers: FiberGrid,

    /// Present when fibrosis was injected
    pub fibrosis: Option<FibrosisReport>,

    /// heart.bin and fibers.bin, when an output directory was given
    pub files: Option<(PathBuf, PathBuf)>,
}

impl PipelineResult {
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            mesh_points: self.reconstruction.mesh.len(),
            surface_points: self.assembled.merged.points.len(),
            surface_triangles: self.assembled.merged.surface.num_triangles(),
            tissue_voxels: self.voxels.tissue_count(),
            fibrotic_voxels: self.fibrosis.map_or(0, |r| r.fibrotic_voxels),
        }
    }
}

/// Statistics from the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub mesh_points: usize,
    pub surface_points: usize,
    pub surface_triangles: usize,
    pub tissue_voxels: usize,
    pub fibrotic_voxels: usize,
}

/// Run every stage on `contours`; files are written only when `out_dir` is set
pub fn run_pipeline(contours: &ContourData, config: &PipelineConfig, out_dir: Option<&Path>) -> Result<PipelineResult> {
    log::info!("=== LV Voxelization Pipeline Started ===");
    config.validate()?;

    log::info!("Step 1/5: Reconstructing surfaces and fiber mesh...");
    let reconstruction = SurfaceReconstructor::new(config.reconstruction.clone()).reconstruct(contours)?;
    log::info!("  → {} mesh points", reconstruction.mesh.len());

    log::info!("Step 2/5: Assembling polygonal surfaces...");
    let assembled = assemble_lv(&reconstruction.surfaces, &config.assembly)?;
    log::info!("  → {} triangles", assembled.merged.surface.num_triangles());

    log::info!("Step 3/5: Voxelizing...");
    let references = ReferenceSurfaces::from_assembled(&assembled)?;
    let (mut voxels, mut fibers) = Voxelizer::new(config.grid.clone()).generate(&reconstruction.mesh, &references)?;

    let fibrosis = if config.fibrosis.is_enabled() {
        log::info!("Step 4/5: Injecting {}% fibrosis...", config.fibrosis.percent);
        Some(config.fibrosis.injector().inject(&mut voxels, &mut fibers)?)
    } else {
        log::info!("Step 4/5: Fibrosis disabled, skipping");
        None
    };

    let files = match out_dir {
        Some(dir) => {
            log::info!("Step 5/5: Writing binary grids to {}...", dir.display());
            Some(write_bin_files(dir, &voxels, &fibers)?)
        }
        None => {
            log::info!("Step 5/5: No output directory, skipping file output");
            None
        }
    };

    let result = PipelineResult { reconstruction, assembled, voxels, fibers, fibrosis, files };
    let stats = result.stats();
    log::info!("=== Pipeline Complete: {} tissue voxels, {} fibrotic ===",
        stats.tissue_voxels, stats.fibrotic_voxels);

    Ok(result)
}
