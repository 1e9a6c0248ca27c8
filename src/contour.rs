// Contour input: meridian profiles traced on the epi- and endocardial walls
//
// Each meridian holds (ro, z) samples of both walls at one azimuth. Meridians
// are evenly spaced over [0, 2π) in list order.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minimum meridian count for a periodic fit in φ
pub const MIN_MERIDIANS: usize = 4;

/// Minimum (ro, z) samples per wall contour
pub const MIN_WALL_SAMPLES: usize = 2;

/// (radial distance, height) samples of one wall along a meridian
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallContour {
    pub ro: Vec<f64>,
    pub z: Vec<f64>,

    /// Height of the basal plane for this wall
    #[serde(rename = "Zmax")]
    pub z_max: f64,
}

impl WallContour {
    pub fn new(ro: Vec<f64>, z: Vec<f64>, z_max: f64) -> Self {
        Self { ro, z, z_max }
    }

    fn validate(&self, meridian: usize, wall: Wall) -> Result<()> {
        if self.ro.len() != self.z.len() {
            return Err(Error::MalformedInput(format!(
                "meridian {} {}: {} ro samples but {} z samples",
                meridian, wall, self.ro.len(), self.z.len()
            )));
        }
        if self.ro.len() < MIN_WALL_SAMPLES {
            return Err(Error::MalformedInput(format!(
                "meridian {} {}: need at least {} samples, got {}",
                meridian, wall, MIN_WALL_SAMPLES, self.ro.len()
            )));
        }
        let finite = self.ro.iter().chain(self.z.iter()).all(|v| v.is_finite());
        if !finite || !self.z_max.is_finite() {
            return Err(Error::MalformedInput(format!(
                "meridian {} {}: non-finite sample", meridian, wall
            )));
        }
        Ok(())
    }
}

/// Which wall of the ventricle a contour describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wall {
    Epi,
    Endo,
}

impl std::fmt::Display for Wall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Wall::Epi => write!(f, "epi"),
            Wall::Endo => write!(f, "endo"),
        }
    }
}

/// One anatomical radial cross-section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meridian {
    pub epi: WallContour,
    pub endo: WallContour,
}

impl Meridian {
    pub fn wall(&self, wall: Wall) -> &WallContour {
        match wall {
            Wall::Epi => &self.epi,
            Wall::Endo => &self.endo,
        }
    }
}

/// Values shared by every meridian
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommonParams {
    /// Wall-depth reference height
    pub h: f64,
}

/// Complete reconstruction input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourData {
    pub meridians: Vec<Meridian>,
    pub common: CommonParams,
}

impl ContourData {
    pub fn new(meridians: Vec<Meridian>, h: f64) -> Self {
        Self {
            meridians,
            common: CommonParams { h },
        }
    }

    /// Load contour data from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let data: ContourData = serde_json::from_str(&text)?;
        Ok(data)
    }

    pub fn num_meridians(&self) -> usize {
        self.meridians.len()
    }

    pub fn h(&self) -> f64 {
        self.common.h
    }

    /// Basal heights of one wall, in meridian order
    pub fn z_max_list(&self, wall: Wall) -> Vec<f64> {
        self.meridians.iter().map(|m| m.wall(wall).z_max).collect()
    }

    /// Check the input shape before any fitting happens
    pub fn validate(&self) -> Result<()> {
        if self.meridians.len() < MIN_MERIDIANS {
            return Err(Error::MalformedInput(format!(
                "need at least {} meridians, got {}",
                MIN_MERIDIANS,
                self.meridians.len()
            )));
        }
        if !self.common.h.is_finite() {
            return Err(Error::MalformedInput("h is not finite".to_string()));
        }
        for (i, meridian) in self.meridians.iter().enumerate() {
            meridian.epi.validate(i, Wall::Epi)?;
            meridian.endo.validate(i, Wall::Endo)?;
        }
        Ok(())
    }
}
