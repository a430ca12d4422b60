use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use polars::io::parquet::write::{ParquetCompression, StatisticsOptions};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use ::zip::write::FileOptions;
use ::zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::assembler::ProfileDataset;
use crate::error::{ProfileError, Result};
use crate::grid::PressureLevel;
use crate::stats::{StatisticColumn, StatisticRow};

const MANIFEST_PATH: &str = "manifest.json";
const DATA_PATH: &str = "profile.parquet";

/// Persists finished datasets. Implementations must be safe to call from
/// several workers at once.
pub trait DatasetSink: Send + Sync {
    fn write(&self, dataset: &ProfileDataset) -> anyhow::Result<PathBuf>;
}

/// Writes each dataset to `<output_dir>/<identity>.zip`, going through a
/// `.partial` file that is renamed into place once complete.
#[derive(Debug, Clone)]
pub struct ArchiveSink {
    output_dir: PathBuf,
}

impl ArchiveSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn path_for(&self, identity: &str) -> PathBuf {
        self.output_dir.join(format!("{identity}.zip"))
    }
}

impl DatasetSink for ArchiveSink {
    fn write(&self, dataset: &ProfileDataset) -> anyhow::Result<PathBuf> {
        let bytes = to_zip_archive(dataset).context("failed to build profile archive")?;
        let final_path = self.path_for(dataset.output_identity());
        let partial_path = final_path.with_extension("zip.partial");

        fs::write(&partial_path, &bytes)
            .with_context(|| format!("failed to write {}", partial_path.display()))?;
        fs::rename(&partial_path, &final_path).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                partial_path.display(),
                final_path.display()
            )
        })?;

        Ok(final_path)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    identity: String,
    variable: String,
    units: String,
    columns: Vec<StatisticColumn>,
    levels: Vec<PressureLevel>,
    attributes: BTreeMap<String, String>,
    data_path: String,
}

pub fn to_zip_archive(dataset: &ProfileDataset) -> Result<Vec<u8>> {
    let manifest = Manifest {
        identity: dataset.output_identity().to_string(),
        variable: dataset.variable().to_string(),
        units: dataset.units().to_string(),
        columns: dataset.columns().to_vec(),
        levels: dataset.levels().to_vec(),
        attributes: dataset.attributes().clone(),
        data_path: DATA_PATH.to_string(),
    };
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;

    let mut df = dataset.to_dataframe()?;
    let mut parquet_bytes = Vec::new();
    ParquetWriter::new(&mut parquet_bytes)
        .with_compression(ParquetCompression::Zstd(None))
        .with_statistics(StatisticsOptions::default())
        .finish(&mut df)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_PATH, options)?;
    zip.write_all(&manifest_bytes)?;
    zip.start_file(DATA_PATH, options)?;
    zip.write_all(&parquet_bytes)?;

    Ok(zip.finish()?.into_inner())
}

pub fn read_archive(zip_bytes: &[u8]) -> Result<ProfileDataset> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))?;

    let manifest: Manifest = {
        let mut file = archive.by_name(MANIFEST_PATH)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        serde_json::from_slice(&bytes)?
    };

    let df = {
        let mut file = archive.by_name(&manifest.data_path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        ParquetReader::new(Cursor::new(bytes)).finish()?
    };

    if df.height() != manifest.levels.len() {
        return Err(ProfileError::GridMismatch {
            expected: manifest.levels.len(),
            found: df.height(),
        });
    }

    let counts: Vec<Option<u64>> = df.column("count")?.u64()?.into_iter().collect();
    let mut value_columns: Vec<Vec<Option<f64>>> = Vec::new();
    for column in manifest.columns.iter().filter(|c| !c.is_dimensionless()) {
        let values = df.column(&column.name())?.f64()?.into_iter().collect();
        value_columns.push(values);
    }

    let rows = (0..df.height())
        .map(|idx| {
            let mut values = value_columns.iter().map(|column| column[idx]);
            StatisticRow {
                count: counts[idx],
                min: values.next().flatten(),
                max: values.next().flatten(),
                mean: values.next().flatten(),
                stddev: values.next().flatten(),
                percentiles: values.collect(),
            }
        })
        .collect();

    Ok(ProfileDataset::from_parts(
        manifest.identity,
        manifest.variable,
        manifest.units,
        manifest.levels,
        manifest.columns,
        rows,
        manifest.attributes,
    ))
}

pub fn read_archive_file(path: impl AsRef<Path>) -> Result<ProfileDataset> {
    let bytes = fs::read(path)?;
    read_archive(&bytes)
}
