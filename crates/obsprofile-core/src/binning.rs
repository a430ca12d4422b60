use obsprofile_parser::RawRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::atmosphere;
use crate::error::{ProfileError, Result};
use crate::grid::PressureGrid;
use crate::stats::{StatisticRow, StatisticSet, StatisticTable};

/// What a level below `min_samples_per_level` reports in its count column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubThresholdPolicy {
    /// Keep the true (non-zero) tally; every other statistic is missing.
    #[default]
    KeepCount,
    /// Report the count as missing too.
    DropCount,
}

impl SubThresholdPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubThresholdPolicy::KeepCount => "keep_count",
            SubThresholdPolicy::DropCount => "drop_count",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinningMode {
    /// Search the pressure intervals of the grid.
    #[default]
    Pressure,
    /// Discretise altitude directly into bin indices.
    AltitudeIndex,
}

impl BinningMode {
    pub fn assigner(&self) -> &'static dyn LevelAssigner {
        match self {
            BinningMode::Pressure => &PressureAssigner,
            BinningMode::AltitudeIndex => &AltitudeIndexAssigner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Level(usize),
    OutsideGrid,
}

pub trait LevelAssigner: Send + Sync {
    fn assign(&self, grid: &PressureGrid, altitude_m: f64, pressure_pa: f64) -> Assignment;
}

pub struct PressureAssigner;

impl LevelAssigner for PressureAssigner {
    fn assign(&self, grid: &PressureGrid, _altitude_m: f64, pressure_pa: f64) -> Assignment {
        grid.locate_pressure(pressure_pa)
            .map_or(Assignment::OutsideGrid, Assignment::Level)
    }
}

pub struct AltitudeIndexAssigner;

impl LevelAssigner for AltitudeIndexAssigner {
    fn assign(&self, grid: &PressureGrid, altitude_m: f64, _pressure_pa: f64) -> Assignment {
        grid.locate_altitude(altitude_m)
            .map_or(Assignment::OutsideGrid, Assignment::Level)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinningOptions {
    pub min_samples_per_level: usize,
    pub floor_altitude_m: Option<f64>,
    pub sub_threshold: SubThresholdPolicy,
    pub require_integral_altitude: bool,
    pub statistics: StatisticSet,
}

/// Where every input record went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BinTally {
    pub total: usize,
    pub excluded_floor: usize,
    pub excluded_invalid: usize,
    pub excluded_missing_value: usize,
    pub excluded_outside_grid: usize,
    pub included: usize,
    pub dropped_subthreshold: usize,
}

impl BinTally {
    pub fn accounted(&self) -> usize {
        self.excluded_floor
            + self.excluded_invalid
            + self.excluded_missing_value
            + self.excluded_outside_grid
            + self.included
            + self.dropped_subthreshold
    }

    pub fn excluded(&self) -> usize {
        self.accounted() - self.included
    }

    pub fn verify(&self) -> Result<()> {
        let accounted = self.accounted();
        if accounted == self.total {
            return Ok(());
        }
        Err(ProfileError::DataLoss {
            total: self.total,
            accounted,
            detail: format!("{self:?}"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct BinnedProfile {
    pub table: StatisticTable,
    pub tally: BinTally,
}

pub struct BinningEngine<'a> {
    grid: &'a PressureGrid,
    options: &'a BinningOptions,
    assigner: &'a dyn LevelAssigner,
}

impl<'a> BinningEngine<'a> {
    pub fn new(
        grid: &'a PressureGrid,
        options: &'a BinningOptions,
        assigner: &'a dyn LevelAssigner,
    ) -> Self {
        Self {
            grid,
            options,
            assigner,
        }
    }

    pub fn bin(&self, records: &[RawRecord]) -> Result<BinnedProfile> {
        if self.options.require_integral_altitude {
            check_integral_altitudes(records)?;
        }

        let mut tally = BinTally {
            total: records.len(),
            ..BinTally::default()
        };
        let mut accumulators: Vec<Vec<f64>> = vec![Vec::new(); self.grid.len()];

        for record in records {
            let Some(altitude) = record.altitude_m.filter(|a| a.is_finite()) else {
                tally.excluded_invalid += 1;
                continue;
            };
            if self
                .options
                .floor_altitude_m
                .is_some_and(|floor| altitude < floor)
            {
                tally.excluded_floor += 1;
                continue;
            }
            let Some(pressure) = atmosphere::pressure_of(altitude) else {
                tally.excluded_invalid += 1;
                continue;
            };
            let Some(value) = record.value else {
                tally.excluded_missing_value += 1;
                continue;
            };

            match self.assigner.assign(self.grid, altitude, pressure) {
                Assignment::Level(idx) => {
                    // An index past the grid is caught by the tally check.
                    if let Some(accumulator) = accumulators.get_mut(idx) {
                        accumulator.push(value);
                    }
                }
                Assignment::OutsideGrid => tally.excluded_outside_grid += 1,
            }
        }

        let statistics = &self.options.statistics;
        let threshold = self.options.min_samples_per_level.max(1);
        let mut rows = Vec::with_capacity(accumulators.len());

        for mut values in accumulators {
            let n = values.len();
            if n >= threshold {
                tally.included += n;
                rows.push(statistics.summarize(&mut values));
            } else {
                tally.dropped_subthreshold += n;
                let count = match self.options.sub_threshold {
                    SubThresholdPolicy::KeepCount if n > 0 => Some(n as u64),
                    _ => None,
                };
                rows.push(StatisticRow::missing(statistics.percentiles().len(), count));
            }
        }

        tally.verify()?;
        debug!(
            total = tally.total,
            included = tally.included,
            excluded_floor = tally.excluded_floor,
            excluded_invalid = tally.excluded_invalid,
            excluded_missing_value = tally.excluded_missing_value,
            excluded_outside_grid = tally.excluded_outside_grid,
            dropped_subthreshold = tally.dropped_subthreshold,
            "Binned records"
        );

        Ok(BinnedProfile {
            table: StatisticTable {
                set: statistics.clone(),
                rows,
            },
            tally,
        })
    }
}

fn check_integral_altitudes(records: &[RawRecord]) -> Result<()> {
    for (record_index, record) in records.iter().enumerate() {
        if let Some(altitude) = record.altitude_m {
            if altitude.is_finite() && altitude.fract() != 0.0 {
                return Err(ProfileError::InvalidAltitude {
                    record_index,
                    altitude,
                    reason: "altitude must be a whole number of meters".to_string(),
                });
            }
        }
    }
    Ok(())
}
