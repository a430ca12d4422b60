use std::collections::HashSet;
use std::fs;
use std::path::Path;

use obsprofile_parser::HeaderLayout;
use serde::{Deserialize, Serialize};

use crate::binning::{BinningMode, BinningOptions, SubThresholdPolicy};
use crate::error::{ProfileError, Result};
use crate::grid::PressureGrid;
use crate::stats::StatisticSet;
use crate::units::CanonicalUnit;

/// Everything one dataset importer needs: provenance strings, the header
/// layout of its source files, the variables to extract and the vertical grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterConfig {
    pub name: String,
    pub tier: u8,
    pub source: String,
    pub reference: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub input: InputConfig,
    pub layout: HeaderLayout,
    pub variables: Vec<VariableConfig>,
    pub grid: GridConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
        }
    }
}

fn default_pattern() -> String {
    "*".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableConfig {
    /// Column name in the source schema.
    pub column: String,
    /// Canonical output variable name.
    pub short_name: String,
    pub canonical_unit: String,
    #[serde(default)]
    pub long_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default)]
    pub start_m: f64,
    pub bin_width_m: f64,
    pub level_count: usize,
    #[serde(default)]
    pub floor_altitude_m: Option<f64>,
    #[serde(default = "default_min_samples")]
    pub min_samples_per_level: usize,
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
    #[serde(default)]
    pub sub_threshold: SubThresholdPolicy,
    #[serde(default)]
    pub binning: BinningMode,
    #[serde(default)]
    pub require_integral_altitude: bool,
}

fn default_min_samples() -> usize {
    1
}

fn default_percentiles() -> Vec<f64> {
    vec![5.0, 25.0, 50.0, 75.0, 95.0]
}

impl GridConfig {
    pub fn build_grid(&self) -> Result<PressureGrid> {
        PressureGrid::from_altitude_bins(self.start_m, self.bin_width_m, self.level_count)
    }

    pub fn binning_options(&self) -> BinningOptions {
        BinningOptions {
            min_samples_per_level: self.min_samples_per_level,
            floor_altitude_m: self.floor_altitude_m,
            sub_threshold: self.sub_threshold,
            require_integral_altitude: self.require_integral_altitude,
            statistics: StatisticSet::with_percentiles(&self.percentiles),
        }
    }
}

impl ImporterConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: ImporterConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(ProfileError::Config(format!("{}: {message}", self.name)));

        if self.name.trim().is_empty() {
            return invalid("importer name is empty".to_string());
        }
        if !(1..=3).contains(&self.tier) {
            return invalid(format!("tier must be 1, 2 or 3, got {}", self.tier));
        }
        if self.variables.is_empty() {
            return invalid("no variables configured".to_string());
        }

        let mut seen = HashSet::new();
        for variable in &self.variables {
            if !seen.insert(variable.short_name.as_str()) {
                return invalid(format!("duplicate variable '{}'", variable.short_name));
            }
            if CanonicalUnit::parse(&variable.canonical_unit).is_none() {
                return invalid(format!(
                    "variable '{}' has unsupported canonical unit '{}'",
                    variable.short_name, variable.canonical_unit
                ));
            }
        }

        let grid = &self.grid;
        if grid.min_samples_per_level == 0 {
            return invalid("min_samples_per_level must be at least 1".to_string());
        }
        if grid.floor_altitude_m.is_some_and(|floor| !floor.is_finite()) {
            return invalid("floor_altitude_m must be finite".to_string());
        }
        if grid.percentiles.iter().any(|p| !(0.0..=100.0).contains(p)) {
            return invalid(format!("percentiles {:?} outside 0..=100", grid.percentiles));
        }
        if grid.percentiles.windows(2).any(|pair| pair[0] >= pair[1]) {
            return invalid(format!(
                "percentiles {:?} must be strictly increasing",
                grid.percentiles
            ));
        }
        grid.build_grid()?;

        Ok(())
    }
}
