use polars::prelude::*;

use crate::errors::ParserError;
use crate::header::NumberedLine;
use crate::layout::{HeaderBlock, HeaderLayout, MissingMatcher};

struct BodyRow {
    line_index: usize,
    fields: Vec<String>,
}

/// Parses the data rows that follow the header into a frame of nullable
/// `f64` columns named after the schema.
pub(crate) fn parse_body(
    layout: &HeaderLayout,
    schema: &[String],
    body: &[NumberedLine<'_>],
) -> Result<DataFrame, ParserError> {
    let rows = tokenize_rows(layout, body)?;
    if rows.is_empty() {
        return Err(ParserError::EmptyData {
            layout: layout.name.clone(),
        });
    }

    let mut columns: Vec<Vec<Option<f64>>> = schema
        .iter()
        .map(|_| Vec::with_capacity(rows.len()))
        .collect();

    let missing = layout.missing_matcher();
    for row in rows {
        if row.fields.len() != schema.len() {
            return Err(ParserError::ColumnCountMismatch {
                layout: layout.name.clone(),
                line_index: row.line_index,
                expected: schema.len(),
                found: row.fields.len(),
            });
        }
        for (column, token) in columns.iter_mut().zip(&row.fields) {
            column.push(parse_optional_f64(&missing, token));
        }
    }

    let series: Vec<Column> = schema
        .iter()
        .zip(columns)
        .map(|(name, values)| Series::new(name.as_str().into(), values).into())
        .collect();

    DataFrame::new(series).map_err(|err| ParserError::Validation {
        layout: layout.name.clone(),
        message: format!("failed to build data frame: {err}"),
    })
}

fn tokenize_rows(
    layout: &HeaderLayout,
    body: &[NumberedLine<'_>],
) -> Result<Vec<BodyRow>, ParserError> {
    let comment_prefix = match &layout.header {
        HeaderBlock::Prefixed { prefix } => Some(prefix.as_str()),
        _ => None,
    };
    let lines: Vec<NumberedLine<'_>> = body
        .iter()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter(|(_, line)| {
            comment_prefix.map_or(true, |prefix| !line.trim_start().starts_with(prefix))
        })
        .copied()
        .collect();

    let Some(delimiter) = layout.data_delimiter.as_byte() else {
        return Ok(lines
            .into_iter()
            .map(|(line_index, line)| BodyRow {
                line_index,
                fields: line.split_whitespace().map(str::to_string).collect(),
            })
            .collect());
    };

    let joined = lines
        .iter()
        .map(|(_, line)| *line)
        .collect::<Vec<_>>()
        .join("\n");
    // Quote characters are data here; one stray `"` must not merge lines.
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(joined.as_bytes());

    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ParserError::Csv {
            layout: layout.name.clone(),
            source: err,
        })?;
    if records.len() != lines.len() {
        return Err(ParserError::Validation {
            layout: layout.name.clone(),
            message: format!(
                "{} data lines produced {} records",
                lines.len(),
                records.len()
            ),
        });
    }

    Ok(records
        .iter()
        .zip(&lines)
        .map(|(record, (line_index, _))| BodyRow {
            line_index: *line_index,
            fields: record.iter().map(str::to_string).collect(),
        })
        .collect())
}

/// Non-numeric tokens and configured missing markers both read as null.
fn parse_optional_f64(missing: &MissingMatcher<'_>, value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = trimmed.parse::<f64>().ok();
    if missing.is_missing(trimmed, parsed) {
        return None;
    }
    parsed.filter(|number| number.is_finite())
}
