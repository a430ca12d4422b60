use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use obsprofile_parser::{compute_hash, parse_source_file, ParsedSourceFile, ParserError};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::assembler::{ImporterAttributes, ProfileAssembler, Provenance, SourceFile};
use crate::binning::{BinTally, BinnedProfile, BinningEngine, BinningOptions};
use crate::config::{ImporterConfig, VariableConfig};
use crate::error::{ProfileError, Result};
use crate::grid::PressureGrid;
use crate::sink::DatasetSink;
use crate::units::UnitNormalizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariableStatus {
    Written,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariableOutcome {
    pub variable: String,
    pub status: VariableStatus,
    pub output: Option<PathBuf>,
    pub tally: Option<BinTally>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileStatus {
    Processed,
    Duplicate,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub hash: Option<String>,
    pub status: FileStatus,
    pub message: Option<String>,
    pub variables: Vec<VariableOutcome>,
}

impl FileReport {
    fn failed(path: &str, hash: Option<String>, message: String) -> Self {
        Self {
            path: path.to_string(),
            hash,
            status: FileStatus::Failed,
            message: Some(message),
            variables: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct BatchSummary {
    pub reports: Vec<FileReport>,
}

impl BatchSummary {
    pub fn written(&self) -> usize {
        self.count_variables(VariableStatus::Written)
    }

    pub fn skipped(&self) -> usize {
        self.count_variables(VariableStatus::Skipped)
    }

    pub fn failed_files(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| report.status == FileStatus::Failed)
            .count()
    }

    pub fn report_for(&self, path: &str) -> Option<&FileReport> {
        self.reports.iter().find(|report| report.path == path)
    }

    fn count_variables(&self, status: VariableStatus) -> usize {
        self.reports
            .iter()
            .flat_map(|report| &report.variables)
            .filter(|outcome| outcome.status == status)
            .count()
    }
}

/// Output identities claimed during one batch. Two distinct sources mapping
/// to the same identity is a configuration error, never an overwrite.
#[derive(Debug, Default)]
pub struct OutputRegistry {
    claims: Mutex<HashMap<String, String>>,
}

impl OutputRegistry {
    pub fn claim(&self, identity: &str, source_path: &str) -> Result<()> {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        match claims.get(identity) {
            Some(claimed_by) if claimed_by != source_path => Err(ProfileError::OutputCollision {
                identity: identity.to_string(),
                path: source_path.to_string(),
                claimed_by: claimed_by.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                claims.insert(identity.to_string(), source_path.to_string());
                Ok(())
            }
        }
    }
}

/// One configured importer. The grid, binning options and unit tables are
/// built once and shared read-only by every unit of work.
pub struct Importer {
    config: ImporterConfig,
    grid: PressureGrid,
    options: BinningOptions,
    attributes: ImporterAttributes,
    normalizer: UnitNormalizer,
}

impl Importer {
    pub fn new(config: ImporterConfig) -> Result<Self> {
        config.validate()?;
        let grid = config.grid.build_grid()?;
        let options = config.grid.binning_options();
        let attributes = ImporterAttributes::from(&config);
        Ok(Self {
            config,
            grid,
            options,
            attributes,
            normalizer: UnitNormalizer,
        })
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    pub fn grid(&self) -> &PressureGrid {
        &self.grid
    }

    /// Input files in `dir` matching the configured pattern, sorted by path.
    pub fn discover(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let pattern = dir.as_ref().join(&self.config.input.pattern);
        let mut paths: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!(reason = %err, "Skipping unreadable input entry");
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Processes every file on the rayon pool. Per-file errors are logged and
    /// reported; they never stop the rest of the batch.
    pub fn run_batch(&self, paths: &[PathBuf], sink: &dyn DatasetSink) -> BatchSummary {
        let registry = OutputRegistry::default();
        let seen_hashes: Mutex<HashMap<String, String>> = Mutex::new(HashMap::new());
        let provenance = Provenance::detect();

        let reports = paths
            .par_iter()
            .map(|path| {
                let display_path = path.display().to_string();
                let bytes = match fs::read(path) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        error!(path = %display_path, reason = %err, "Failed to read source file");
                        return FileReport::failed(&display_path, None, err.to_string());
                    }
                };

                let hash = compute_hash(&bytes);
                {
                    let mut seen = seen_hashes.lock().unwrap_or_else(PoisonError::into_inner);
                    if let Some(first) = seen.get(&hash) {
                        warn!(path = %display_path, duplicate_of = %first, "Skipping duplicate source file");
                        return FileReport {
                            path: display_path,
                            hash: Some(hash),
                            status: FileStatus::Duplicate,
                            message: Some(format!("identical to {first}")),
                            variables: Vec::new(),
                        };
                    }
                    seen.insert(hash.clone(), display_path.clone());
                }

                self.process_bytes(&display_path, &bytes, sink, &registry, &provenance)
            })
            .collect();

        BatchSummary { reports }
    }

    pub fn process_file(
        &self,
        path: impl AsRef<Path>,
        sink: &dyn DatasetSink,
        registry: &OutputRegistry,
        provenance: &Provenance,
    ) -> FileReport {
        let display_path = path.as_ref().display().to_string();
        match fs::read(path.as_ref()) {
            Ok(bytes) => self.process_bytes(&display_path, &bytes, sink, registry, provenance),
            Err(err) => {
                error!(path = %display_path, reason = %err, "Failed to read source file");
                FileReport::failed(&display_path, None, err.to_string())
            }
        }
    }

    fn process_bytes(
        &self,
        path: &str,
        bytes: &[u8],
        sink: &dyn DatasetSink,
        registry: &OutputRegistry,
        provenance: &Provenance,
    ) -> FileReport {
        let hash = compute_hash(bytes);
        let Ok(content) = std::str::from_utf8(bytes) else {
            error!(path, "Source file is not valid UTF-8");
            return FileReport::failed(path, Some(hash), "file contents were not valid UTF-8".to_string());
        };

        let parsed = match parse_source_file(content, &self.config.layout) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!(path, reason = %err, "Failed to parse source file");
                return FileReport::failed(path, Some(hash), err.to_string());
            }
        };

        let mut status = FileStatus::Processed;
        let mut message = None;
        let mut variables = Vec::with_capacity(self.config.variables.len());

        for variable in &self.config.variables {
            match self.process_variable(path, &parsed, variable, sink, registry, provenance) {
                Ok((output, tally)) => {
                    info!(
                        path,
                        variable = %variable.short_name,
                        output = %output.display(),
                        included = tally.included,
                        excluded = tally.excluded(),
                        "Wrote profile dataset"
                    );
                    variables.push(VariableOutcome {
                        variable: variable.short_name.clone(),
                        status: VariableStatus::Written,
                        output: Some(output),
                        tally: Some(tally),
                        message: None,
                    });
                }
                Err(err) if err.is_skippable() => {
                    warn!(path, variable = %variable.short_name, reason = %err, "Skipping variable");
                    variables.push(VariableOutcome {
                        variable: variable.short_name.clone(),
                        status: VariableStatus::Skipped,
                        output: None,
                        tally: None,
                        message: Some(err.to_string()),
                    });
                }
                Err(err) => {
                    error!(path, variable = %variable.short_name, reason = %err, "Aborting source file");
                    variables.push(VariableOutcome {
                        variable: variable.short_name.clone(),
                        status: VariableStatus::Failed,
                        output: None,
                        tally: None,
                        message: Some(err.to_string()),
                    });
                    status = FileStatus::Failed;
                    message = Some(err.to_string());
                    break;
                }
            }
        }

        FileReport {
            path: path.to_string(),
            hash: Some(hash),
            status,
            message,
            variables,
        }
    }

    fn process_variable(
        &self,
        path: &str,
        parsed: &ParsedSourceFile,
        variable: &VariableConfig,
        sink: &dyn DatasetSink,
        registry: &OutputRegistry,
        provenance: &Provenance,
    ) -> Result<(PathBuf, BinTally)> {
        let records = parsed.records_for(&variable.column).map_err(|err| match err {
            ParserError::MissingColumn { column, available } => {
                ProfileError::MissingVariableColumn {
                    variable: column,
                    available,
                }
            }
            other => ProfileError::Parse(other),
        })?;

        let factor = self
            .normalizer
            .factor_for(&parsed.header.declared_unit, &variable.canonical_unit)?;

        let engine = BinningEngine::new(
            &self.grid,
            &self.options,
            self.config.grid.binning.assigner(),
        );
        let BinnedProfile { mut table, tally } = engine.bin(&records)?;
        table.rescale(factor);

        let source = SourceFile {
            path: path.to_string(),
            blake3: parsed.file_hash.clone(),
        };
        let dataset = ProfileAssembler::new(&self.grid, &self.attributes).assemble(
            table,
            variable,
            &parsed.header,
            &source,
            provenance,
        )?;

        registry.claim(dataset.output_identity(), path)?;
        let output = sink.write(&dataset)?;
        Ok((output, tally))
    }
}
