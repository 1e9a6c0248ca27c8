// Binary grid files for the electrophysiology solver
//
// heart.bin:  n³ bytes, 1 for tissue (healthy or fibrotic), 0 for empty
// fibers.bin: 3·n³ signed bytes, channel-major (all x, then all y, then all z)
//
// Both use the voxel flattening (i·n + j)·n + k. Every value is one byte, so
// the files have no byte order.

use crate::voxelizer::{FiberGrid, VoxelGrid, LABEL_EMPTY};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Fixed-point scale of fiber components
pub const FIBER_SCALE: f64 = 127.0;

pub const HEART_FILE: &str = "heart.bin";
pub const FIBERS_FILE: &str = "fibers.bin";

/// Fiber component in [-1, 1] to a signed byte, round(c·127)
pub fn encode_component(c: f64) -> i8 {
    if !c.is_finite() {
        return 0;
    }
    (c * FIBER_SCALE).round().clamp(-FIBER_SCALE, FIBER_SCALE) as i8
}

/// Signed byte back to a fiber component, b/127
pub fn decode_component(b: i8) -> f64 {
    b as f64 / FIBER_SCALE
}

/// Label bytes as written to heart.bin; fibrosis collapses to tissue
pub fn encode_labels(grid: &VoxelGrid) -> Vec<u8> {
    grid.labels
        .iter()
        .map(|&label| u8::from(label != LABEL_EMPTY))
        .collect()
}

/// Fiber bytes as written to fibers.bin
pub fn encode_fibers(fibers: &FiberGrid) -> Vec<u8> {
    fibers.data.iter().map(|&v| v as u8).collect()
}

pub fn write_labels<P: AsRef<Path>>(path: P, grid: &VoxelGrid) -> Result<()> {
    write_bytes(path.as_ref(), &encode_labels(grid))
}

pub fn write_fibers<P: AsRef<Path>>(path: P, fibers: &FiberGrid) -> Result<()> {
    write_bytes(path.as_ref(), &encode_fibers(fibers))
}

/// Read heart.bin for a grid of side `n_side`
pub fn read_labels<P: AsRef<Path>>(path: P, n_side: usize) -> Result<VoxelGrid> {
    let labels = read_exact_size(path.as_ref(), n_side * n_side * n_side)?;
    Ok(VoxelGrid { n_side, labels })
}

/// Read fibers.bin for a grid of side `n_side`
pub fn read_fibers<P: AsRef<Path>>(path: P, n_side: usize) -> Result<FiberGrid> {
    let bytes = read_exact_size(path.as_ref(), 3 * n_side * n_side * n_side)?;
    let data = bytes.into_iter().map(|b| b as i8).collect();
    Ok(FiberGrid { n_side, data })
}

/// Write heart.bin and fibers.bin into `dir`; returns both paths
pub fn write_bin_files<P: AsRef<Path>>(dir: P, grid: &VoxelGrid, fibers: &FiberGrid) -> Result<(PathBuf, PathBuf)> {
    if grid.n_side != fibers.n_side {
        return Err(Error::InvalidParameter(format!(
            "label grid side {} does not match fiber grid side {}", grid.n_side, fibers.n_side
        )));
    }

    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let heart = dir.join(HEART_FILE);
    let fiber = dir.join(FIBERS_FILE);

    write_labels(&heart, grid)?;
    write_fibers(&fiber, fibers)?;

    log::info!("  Wrote {} and {} ({}^3 voxels)", heart.display(), fiber.display(), grid.n_side);
    Ok((heart, fiber))
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}

fn read_exact_size(path: &Path, expected: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(expected);
    File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.len() != expected {
        return Err(Error::MalformedInput(format!(
            "{}: expected {} bytes, found {}", path.display(), expected, bytes.len()
        )));
    }
    Ok(bytes)
}
