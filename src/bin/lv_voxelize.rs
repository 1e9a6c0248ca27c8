// Command-line entry point: contours JSON in, heart.bin / fibers.bin out
//
// Usage: lv_voxelize <contours.json> [config.json] [out_dir]

use lv_reconstruct::{run_pipeline, ContourData, PipelineConfig};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args.len() > 4 {
        eprintln!("Usage: {} <contours.json> [config.json] [out_dir]", args[0]);
        return ExitCode::from(2);
    }

    match run(&args[1..]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> lv_reconstruct::Result<()> {
    let contours_path = PathBuf::from(&args[0]);
    log::info!("Loading contours from {:?}", contours_path);
    let contours = ContourData::from_json_file(&contours_path)?;
    log::info!("  Meridians: {}", contours.num_meridians());

    let config = match args.get(1) {
        Some(path) => {
            log::info!("Loading configuration from {:?}", path);
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };

    let out_dir = args.get(2).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let result = run_pipeline(&contours, &config, Some(out_dir.as_path()))?;

    let stats = result.stats();
    log::info!("Mesh points:       {}", stats.mesh_points);
    log::info!("Surface triangles: {}", stats.surface_triangles);
    log::info!("Tissue voxels:     {}", stats.tissue_voxels);
    log::info!("Fibrotic voxels:   {}", stats.fibrotic_voxels);
    Ok(())
}
