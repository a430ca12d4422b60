use serde::{Deserialize, Serialize};

use crate::atmosphere::{self, MAX_ALTITUDE_M, MIN_ALTITUDE_M};
use crate::error::{ProfileError, Result};

/// One cell of the output vertical grid. A pressure `p` belongs to the level
/// when `lower_bound_pa < p <= upper_bound_pa`, i.e. the altitude interval
/// `[bottom_altitude_m, top_altitude_m)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureLevel {
    pub lower_bound_pa: f64,
    pub upper_bound_pa: f64,
    pub center_pa: f64,
    pub bottom_altitude_m: f64,
    pub top_altitude_m: f64,
}

impl PressureLevel {
    pub fn contains(&self, pressure_pa: f64) -> bool {
        pressure_pa > self.lower_bound_pa && pressure_pa <= self.upper_bound_pa
    }
}

/// Fixed grid built once per importer. Level index increases with altitude,
/// so pressure decreases with index.
#[derive(Debug, Clone, PartialEq)]
pub struct PressureGrid {
    start_m: f64,
    bin_width_m: f64,
    levels: Vec<PressureLevel>,
}

impl PressureGrid {
    pub const COORDINATE_ORDER: &'static str = "decreasing";

    pub fn from_altitude_bins(start_m: f64, bin_width_m: f64, level_count: usize) -> Result<Self> {
        if !(bin_width_m.is_finite() && bin_width_m > 0.0) {
            return Err(ProfileError::Config(format!(
                "bin width must be positive, got {bin_width_m}"
            )));
        }
        if level_count == 0 {
            return Err(ProfileError::Config("grid needs at least one level".to_string()));
        }
        let top_m = start_m + bin_width_m * level_count as f64;
        if !(start_m.is_finite() && start_m >= MIN_ALTITUDE_M && top_m <= MAX_ALTITUDE_M) {
            return Err(ProfileError::Config(format!(
                "grid {start_m} m .. {top_m} m exceeds the supported altitude range \
                 {MIN_ALTITUDE_M} m .. {MAX_ALTITUDE_M} m"
            )));
        }

        let pressure = |altitude: f64| {
            atmosphere::pressure_of(altitude).ok_or_else(|| {
                ProfileError::Config(format!("no standard pressure for altitude {altitude} m"))
            })
        };

        let mut levels = Vec::with_capacity(level_count);
        for idx in 0..level_count {
            let bottom = start_m + bin_width_m * idx as f64;
            let top = start_m + bin_width_m * (idx + 1) as f64;
            levels.push(PressureLevel {
                lower_bound_pa: pressure(top)?,
                upper_bound_pa: pressure(bottom)?,
                center_pa: pressure(bottom + bin_width_m / 2.0)?,
                bottom_altitude_m: bottom,
                top_altitude_m: top,
            });
        }

        Ok(Self {
            start_m,
            bin_width_m,
            levels,
        })
    }

    pub fn levels(&self) -> &[PressureLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn start_m(&self) -> f64 {
        self.start_m
    }

    pub fn bin_width_m(&self) -> f64 {
        self.bin_width_m
    }

    pub fn centers_pa(&self) -> Vec<f64> {
        self.levels.iter().map(|level| level.center_pa).collect()
    }

    /// Index of the level containing `pressure_pa`.
    pub fn locate_pressure(&self, pressure_pa: f64) -> Option<usize> {
        let idx = self
            .levels
            .partition_point(|level| level.lower_bound_pa >= pressure_pa);
        self.levels
            .get(idx)
            .filter(|level| level.contains(pressure_pa))
            .map(|_| idx)
    }

    /// Index of the level whose altitude interval contains `altitude_m`.
    pub fn locate_altitude(&self, altitude_m: f64) -> Option<usize> {
        let offset = (altitude_m - self.start_m) / self.bin_width_m;
        if !offset.is_finite() || offset < 0.0 {
            return None;
        }
        let idx = offset.floor() as usize;
        (idx < self.levels.len()).then_some(idx)
    }
}
