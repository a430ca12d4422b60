use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StatisticColumn {
    Count,
    Min,
    Max,
    Mean,
    StdDev,
    Percentile(f64),
}

impl StatisticColumn {
    pub fn name(&self) -> String {
        match self {
            StatisticColumn::Count => "count".to_string(),
            StatisticColumn::Min => "min".to_string(),
            StatisticColumn::Max => "max".to_string(),
            StatisticColumn::Mean => "mean".to_string(),
            StatisticColumn::StdDev => "std".to_string(),
            StatisticColumn::Percentile(p) if p.fract() == 0.0 => format!("p{:02}", *p as u32),
            StatisticColumn::Percentile(p) => format!("p{}", p.to_string().replace('.', "_")),
        }
    }

    pub fn is_dimensionless(&self) -> bool {
        matches!(self, StatisticColumn::Count)
    }
}

impl fmt::Display for StatisticColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Ordered statistic columns: the five fixed moments followed by the
/// importer's percentiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticSet {
    percentiles: Vec<f64>,
}

impl StatisticSet {
    pub fn with_percentiles(percentiles: &[f64]) -> Self {
        Self {
            percentiles: percentiles.to_vec(),
        }
    }

    pub fn percentiles(&self) -> &[f64] {
        &self.percentiles
    }

    pub fn columns(&self) -> Vec<StatisticColumn> {
        let mut columns = vec![
            StatisticColumn::Count,
            StatisticColumn::Min,
            StatisticColumn::Max,
            StatisticColumn::Mean,
            StatisticColumn::StdDev,
        ];
        columns.extend(self.percentiles.iter().map(|p| StatisticColumn::Percentile(*p)));
        columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(StatisticColumn::name).collect()
    }

    /// Computes a full row from the valid values of one level.
    pub fn summarize(&self, values: &mut [f64]) -> StatisticRow {
        if values.is_empty() {
            return StatisticRow::missing(self.percentiles.len(), None);
        }
        values.sort_by(f64::total_cmp);

        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let stddev = (n >= 2).then(|| {
            let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (sum_sq / (n - 1) as f64).sqrt()
        });

        StatisticRow {
            count: Some(n as u64),
            min: values.first().copied(),
            max: values.last().copied(),
            mean: Some(mean),
            stddev,
            percentiles: self
                .percentiles
                .iter()
                .map(|p| percentile_sorted(values, *p))
                .collect(),
        }
    }
}

/// Linear interpolation between order statistics at rank `p/100 * (n - 1)`.
/// `None` for an empty slice or `p` outside `[0, 100]`.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        Some(sorted[lo])
    } else {
        Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
    }
}

/// Statistics of one level. The sample count is kept apart from the
/// unit-bearing values so unit conversion can never touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticRow {
    pub count: Option<u64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
    pub percentiles: Vec<Option<f64>>,
}

impl StatisticRow {
    pub fn missing(percentile_count: usize, count: Option<u64>) -> Self {
        Self {
            count,
            min: None,
            max: None,
            mean: None,
            stddev: None,
            percentiles: vec![None; percentile_count],
        }
    }

    /// True when every unit-bearing statistic is missing.
    pub fn is_missing(&self) -> bool {
        self.min.is_none()
            && self.max.is_none()
            && self.mean.is_none()
            && self.stddev.is_none()
            && self.percentiles.iter().all(Option::is_none)
    }

    /// Values in [`StatisticSet::columns`] order.
    pub fn values(&self) -> Vec<Option<f64>> {
        let mut values = vec![
            self.count.map(|count| count as f64),
            self.min,
            self.max,
            self.mean,
            self.stddev,
        ];
        values.extend(self.percentiles.iter().copied());
        values
    }

    pub fn rescale(&mut self, factor: f64) {
        let scale = |value: &mut Option<f64>| {
            if let Some(v) = value.as_mut() {
                *v *= factor;
            }
        };
        scale(&mut self.min);
        scale(&mut self.max);
        scale(&mut self.mean);
        self.stddev = self.stddev.map(|v| v * factor.abs());
        self.percentiles.iter_mut().for_each(scale);
    }
}

/// One row per grid level, in grid order.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticTable {
    pub set: StatisticSet,
    pub rows: Vec<StatisticRow>,
}

impl StatisticTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Applies a unit conversion factor to every column except `count`.
    pub fn rescale(&mut self, factor: f64) {
        for row in &mut self.rows {
            row.rescale(factor);
        }
    }
}
