// Example: voxelize a synthetic thick-walled hemispherical LV

use lv_reconstruct::*;
use std::f64::consts::FRAC_PI_2;
use std::path::PathBuf;

/// Meridian samples of a half-ellipsoid with its equator at z_max
fn wall(radius: f64, z_max: f64, apex_z: f64, samples: usize) -> WallContour {
    let psi: Vec<f64> = (0..samples)
        .map(|i| FRAC_PI_2 * i as f64 / (samples - 1) as f64)
        .collect();
    WallContour::new(
        psi.iter().map(|p| radius * p.cos()).collect(),
        psi.iter().map(|p| z_max - (z_max - apex_z) * p.sin()).collect(),
        z_max,
    )
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("LV Reconstruct - Synthetic Hemisphere");
    log::info!("=====================================\n");

    // Half-ellipsoids: epi apex at z = 0, endo apex at z = h
    let meridian = Meridian {
        epi: wall(30.0, 40.0, 0.0, 15),
        endo: wall(22.0, 40.0, 18.0, 15),
    };
    let contours = ContourData::new(vec![meridian; 12], 18.0);

    let config = PipelineConfig {
        grid: GridParams {
            n_side: 64,
            origin: Point3D::new(-32.0, -32.0, -2.0),
            dr: 1.0,
        },
        fibrosis: FibrosisConfig { percent: 10.0, seed: Some(42) },
        ..Default::default()
    };

    let out_dir = PathBuf::from("synthetic_lv_output");
    let result = run_pipeline(&contours, &config, Some(out_dir.as_path()))?;

    let stats = result.stats();
    log::info!("\nSummary:");
    log::info!("  Mesh points: {}", stats.mesh_points);
    log::info!("  Surface points: {} ({} triangles)", stats.surface_points, stats.surface_triangles);
    log::info!("  Tissue voxels: {} ({} fibrotic)", stats.tissue_voxels, stats.fibrotic_voxels);
    log::info!("  Output: {:?}", out_dir);

    Ok(())
}
