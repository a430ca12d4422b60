use serde::{Deserialize, Serialize};

/// Declarative description of one dataset's header and body conventions.
///
/// Every field position and marker lives here so that a single generic parser
/// can read all importer formats. Layouts are normally deserialised from the
/// importer's TOML configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderLayout {
    pub name: String,
    pub header: HeaderBlock,
    /// Characters trimmed from both ends of header lines before fields are read.
    #[serde(default = "default_comment_chars")]
    pub comment_chars: String,
    pub campaign: FieldRule,
    pub unit: FieldRule,
    pub period: PeriodRule,
    pub region: RegionRule,
    pub schema: SchemaRule,
    #[serde(default)]
    pub data_delimiter: Delimiter,
    #[serde(default = "default_missing_values")]
    pub missing_values: Vec<String>,
    pub altitude_column: String,
}

fn default_comment_chars() -> String {
    "#".to_string()
}

fn default_missing_values() -> Vec<String> {
    vec![
        "nan".to_string(),
        "-999".to_string(),
        "-9999".to_string(),
        "-99999".to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeaderBlock {
    /// All leading lines starting with `prefix`.
    Prefixed { prefix: String },
    /// A fixed number of leading lines.
    Fixed { lines: usize },
    /// Header length is declared by token `token` of line `line`.
    Counted { line: usize, token: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSelector {
    Index(usize),
    FromEnd(usize),
    Containing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FieldRule {
    /// The `index`th whitespace-separated token of the line.
    Token { line: LineSelector, index: usize },
    /// Text following `marker` up to the next whitespace.
    AfterMarker { line: LineSelector, marker: String },
    /// Everything after `marker` (or the whole line) to the end of the line.
    RestOfLine {
        line: LineSelector,
        #[serde(default)]
        marker: Option<String>,
    },
    Fixed { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRule {
    pub field: FieldRule,
    #[serde(default = "default_range_separator")]
    pub range_separator: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_range_separator() -> String {
    "-".to_string()
}

fn default_date_format() -> String {
    "%Y%m%d".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRule {
    pub line: LineSelector,
    #[serde(default = "default_lat_marker")]
    pub lat_marker: String,
    #[serde(default = "default_lon_marker")]
    pub lon_marker: String,
    #[serde(default = "default_pair_separator")]
    pub pair_separator: String,
}

fn default_lat_marker() -> String {
    "LAT=".to_string()
}

fn default_lon_marker() -> String {
    "LON=".to_string()
}

fn default_pair_separator() -> String {
    ",".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRule {
    pub line: LineSelector,
    #[serde(default)]
    pub delimiter: Delimiter,
    /// Marker characters stripped from each column token (brackets, quotes, ...).
    #[serde(default)]
    pub strip_chars: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    #[default]
    Whitespace,
    Comma,
    Semicolon,
    Tab,
}

impl Delimiter {
    pub fn as_byte(&self) -> Option<u8> {
        match self {
            Delimiter::Whitespace => None,
            Delimiter::Comma => Some(b','),
            Delimiter::Semicolon => Some(b';'),
            Delimiter::Tab => Some(b'\t'),
        }
    }

    pub fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self.as_byte() {
            None => line.split_whitespace().collect(),
            Some(byte) => line.split(byte as char).map(str::trim).collect(),
        }
    }
}

impl HeaderLayout {
    pub(crate) fn missing_matcher(&self) -> MissingMatcher<'_> {
        MissingMatcher {
            tokens: &self.missing_values,
            numbers: self
                .missing_values
                .iter()
                .filter_map(|missing| missing.trim().parse::<f64>().ok())
                .filter(|number| number.is_finite())
                .collect(),
        }
    }
}

/// Configured missing-value sentinels. Numeric sentinels match by value, so
/// `-999` also covers `-999.0`; the rest match as case-insensitive text.
pub(crate) struct MissingMatcher<'a> {
    tokens: &'a [String],
    numbers: Vec<f64>,
}

impl MissingMatcher<'_> {
    pub(crate) fn is_missing(&self, token: &str, parsed: Option<f64>) -> bool {
        parsed.is_some_and(|value| self.numbers.contains(&value))
            || self
                .tokens
                .iter()
                .any(|missing| missing.eq_ignore_ascii_case(token))
    }
}
