pub mod assembler;
pub mod atmosphere;
pub mod binning;
pub mod config;
pub mod error;
pub mod grid;
pub mod importer;
pub mod sink;
pub mod stats;
pub mod units;

pub use assembler::{ImporterAttributes, ProfileAssembler, ProfileDataset, Provenance, SourceFile};
pub use binning::{BinTally, BinningEngine, BinningMode, BinningOptions, SubThresholdPolicy};
pub use config::{GridConfig, ImporterConfig, VariableConfig};
pub use error::{ProfileError, Result};
pub use grid::{PressureGrid, PressureLevel};
pub use importer::{BatchSummary, FileReport, FileStatus, Importer, OutputRegistry};
pub use sink::{ArchiveSink, DatasetSink};
pub use stats::{StatisticColumn, StatisticRow, StatisticSet, StatisticTable};
pub use units::UnitNormalizer;
