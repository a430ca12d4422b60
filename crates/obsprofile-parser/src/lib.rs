pub mod errors;
pub mod header;
pub mod layout;
pub mod model;
mod registry;
mod table;

pub use errors::{LayoutAttempt, ParserError};
pub use header::{parse_header, split_header};
pub use layout::{
    Delimiter, FieldRule, HeaderBlock, HeaderLayout, LineSelector, PeriodRule, RegionRule,
    SchemaRule,
};
pub use model::{
    normalize_longitude, ParsedSourceFile, Period, RawRecord, Region, SourceHeader,
};
pub use registry::{compute_hash, parse_source_file, parse_with_layouts};

#[cfg(test)]
mod tests;
