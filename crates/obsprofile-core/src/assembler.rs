use std::collections::BTreeMap;
use std::env;

use chrono::{DateTime, SecondsFormat, Utc};
use obsprofile_parser::SourceHeader;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::binning::SubThresholdPolicy;
use crate::config::{ImporterConfig, VariableConfig};
use crate::error::{ProfileError, Result};
use crate::grid::{PressureGrid, PressureLevel};
use crate::stats::{StatisticColumn, StatisticRow, StatisticTable};

/// Environment facts stamped onto every output. The core records them; it
/// never derives them itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub host: String,
    pub user: String,
    pub created_at: DateTime<Utc>,
}

impl Provenance {
    pub fn detect() -> Self {
        let lookup = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| env::var(key).ok().filter(|value| !value.is_empty()))
                .unwrap_or_else(|| "unknown".to_string())
        };
        Self {
            host: lookup(&["HOSTNAME", "COMPUTERNAME"]),
            user: lookup(&["USER", "USERNAME"]),
            created_at: Utc::now(),
        }
    }
}

/// Importer-level attributes shared by every dataset the importer emits.
#[derive(Debug, Clone, PartialEq)]
pub struct ImporterAttributes {
    pub importer: String,
    pub tier: u8,
    pub source: String,
    pub reference: String,
    pub comment: Option<String>,
    pub sub_threshold: SubThresholdPolicy,
    pub min_samples_per_level: usize,
}

impl From<&ImporterConfig> for ImporterAttributes {
    fn from(config: &ImporterConfig) -> Self {
        Self {
            importer: config.name.clone(),
            tier: config.tier,
            source: config.source.clone(),
            reference: config.reference.clone(),
            comment: config.comment.clone(),
            sub_threshold: config.grid.sub_threshold,
            min_samples_per_level: config.grid.min_samples_per_level,
        }
    }
}

/// The source file a dataset was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub blake3: String,
}

/// Output unit for one (file, variable) pair: statistics on the fixed
/// pressure grid plus global attributes. Immutable once assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDataset {
    identity: String,
    variable: String,
    units: String,
    levels: Vec<PressureLevel>,
    columns: Vec<StatisticColumn>,
    rows: Vec<StatisticRow>,
    attributes: BTreeMap<String, String>,
}

impl ProfileDataset {
    pub(crate) fn from_parts(
        identity: String,
        variable: String,
        units: String,
        levels: Vec<PressureLevel>,
        columns: Vec<StatisticColumn>,
        rows: Vec<StatisticRow>,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            identity,
            variable,
            units,
            levels,
            columns,
            rows,
            attributes,
        }
    }

    /// Deterministic output name derived from tier, importer, variable,
    /// campaign and period.
    pub fn output_identity(&self) -> &str {
        &self.identity
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn levels(&self) -> &[PressureLevel] {
        &self.levels
    }

    pub fn columns(&self) -> &[StatisticColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[StatisticRow] {
        &self.rows
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Value of one statistic at one level.
    pub fn cell(&self, level: usize, column: StatisticColumn) -> Option<f64> {
        let column_idx = self.columns.iter().position(|c| *c == column)?;
        self.rows.get(level)?.values().get(column_idx).copied().flatten()
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = vec![
            Series::new(
                "plev".into(),
                self.levels.iter().map(|l| l.center_pa).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "plev_lower".into(),
                self.levels.iter().map(|l| l.lower_bound_pa).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "plev_upper".into(),
                self.levels.iter().map(|l| l.upper_bound_pa).collect::<Vec<_>>(),
            )
            .into(),
        ];

        for (idx, column) in self.columns.iter().enumerate() {
            let name = column.name();
            let series = if column.is_dimensionless() {
                let counts: Vec<Option<u64>> = self.rows.iter().map(|row| row.count).collect();
                Series::new(name.as_str().into(), counts)
            } else {
                let values: Vec<Option<f64>> =
                    self.rows.iter().map(|row| row.values()[idx]).collect();
                Series::new(name.as_str().into(), values)
            };
            columns.push(series.into());
        }

        DataFrame::new(columns)
    }
}

pub struct ProfileAssembler<'a> {
    grid: &'a PressureGrid,
    importer: &'a ImporterAttributes,
}

impl<'a> ProfileAssembler<'a> {
    pub fn new(grid: &'a PressureGrid, importer: &'a ImporterAttributes) -> Self {
        Self { grid, importer }
    }

    /// Structures already-computed statistics into a dataset and stamps the
    /// global attributes. The table must have one row per grid level.
    pub fn assemble(
        &self,
        table: StatisticTable,
        variable: &VariableConfig,
        header: &SourceHeader,
        source: &SourceFile,
        provenance: &Provenance,
    ) -> Result<ProfileDataset> {
        if table.len() != self.grid.len() {
            return Err(ProfileError::GridMismatch {
                expected: self.grid.len(),
                found: table.len(),
            });
        }

        let importer = self.importer;
        let identity = sanitize_identity(&format!(
            "OBS_{}_{}_{}_{}_{}",
            importer.tier,
            importer.importer,
            variable.short_name,
            header.campaign,
            header.period.compact_range()
        ));

        let region = &header.region;
        let (lon_min, lon_max) = region.normalized_lon_bounds();
        let columns = table.set.columns();

        let mut attributes = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            attributes.insert(key.to_string(), value);
        };
        put("tier", importer.tier.to_string());
        put("source", importer.source.clone());
        put("reference", importer.reference.clone());
        put("comment", importer.comment.clone().unwrap_or_default());
        put("importer", importer.importer.clone());
        put("campaign", header.campaign.clone());
        put("period", header.period.iso_range());
        put("start_date", header.period.start.format("%Y-%m-%d").to_string());
        put("end_date", header.period.end.format("%Y-%m-%d").to_string());
        put("geospatial_lat_min", region.min_lat.to_string());
        put("geospatial_lat_max", region.max_lat.to_string());
        put("geospatial_lon_min", lon_min.to_string());
        put("geospatial_lon_max", lon_max.to_string());
        put("variable", variable.short_name.clone());
        put(
            "long_name",
            variable
                .long_name
                .clone()
                .unwrap_or_else(|| variable.short_name.clone()),
        );
        put("units", variable.canonical_unit.clone());
        put("source_units", header.declared_unit.clone());
        put("source_column", variable.column.clone());
        put("vertical_coordinate", "plev [Pa]".to_string());
        put(
            "vertical_coordinate_order",
            PressureGrid::COORDINATE_ORDER.to_string(),
        );
        put(
            "statistics",
            columns
                .iter()
                .map(StatisticColumn::name)
                .collect::<Vec<_>>()
                .join(","),
        );
        put(
            "sub_threshold_policy",
            importer.sub_threshold.as_str().to_string(),
        );
        put(
            "min_samples_per_level",
            importer.min_samples_per_level.to_string(),
        );
        put("source_file", source.path.clone());
        put("source_blake3", source.blake3.clone());
        put(
            "creation_date",
            provenance
                .created_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        put("host", provenance.host.clone());
        put("user", provenance.user.clone());

        Ok(ProfileDataset {
            identity,
            variable: variable.short_name.clone(),
            units: variable.canonical_unit.clone(),
            levels: self.grid.levels().to_vec(),
            columns,
            rows: table.rows,
            attributes,
        })
    }
}

fn sanitize_identity(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
