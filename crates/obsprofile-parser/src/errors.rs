use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct LayoutAttempt {
    pub layout: String,
    pub message: String,
}

impl LayoutAttempt {
    pub fn new(layout: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            layout: layout.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LayoutAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.layout, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{layout} format mismatch: {reason}")]
    FormatMismatch { layout: String, reason: String },

    #[error("{layout} header line {line_index} invalid: {message}")]
    InvalidHeader {
        layout: String,
        line_index: usize,
        message: String,
    },

    #[error("{layout} header field '{field}' not found: {message}")]
    MissingField {
        layout: String,
        field: &'static str,
        message: String,
    },

    #[error("{layout} CSV error: {source}")]
    Csv {
        layout: String,
        #[source]
        source: csv::Error,
    },

    #[error("{layout} data line {line_index} has {found} fields, schema declares {expected}")]
    ColumnCountMismatch {
        layout: String,
        line_index: usize,
        expected: usize,
        found: usize,
    },

    #[error("{layout} validation error: {message}")]
    Validation { layout: String, message: String },

    #[error("{layout} file did not contain any data rows")]
    EmptyData { layout: String },

    #[error("column '{column}' not present in schema {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("no layout recognized this file; attempts: {attempts:?}")]
    NoMatchingLayout { attempts: Vec<LayoutAttempt> },
}
