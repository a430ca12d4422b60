use chrono::NaiveDate;

use crate::errors::ParserError;
use crate::layout::{FieldRule, HeaderBlock, HeaderLayout, LineSelector, PeriodRule, RegionRule};
use crate::model::{Period, Region, SourceHeader};

/// A line of the source file together with its 1-based line number.
pub type NumberedLine<'a> = (usize, &'a str);

/// Splits raw content into header lines and body lines according to the
/// layout's header block rule.
pub fn split_header<'a>(
    content: &'a str,
    layout: &HeaderLayout,
) -> Result<(Vec<&'a str>, Vec<NumberedLine<'a>>), ParserError> {
    let lines: Vec<&str> = content.lines().collect();

    let header_len = match &layout.header {
        HeaderBlock::Prefixed { prefix } => lines
            .iter()
            .take_while(|line| line.trim_start().starts_with(prefix.as_str()))
            .count(),
        HeaderBlock::Fixed { lines: count } => *count,
        HeaderBlock::Counted { line, token } => {
            let declared = lines.get(*line).ok_or_else(|| ParserError::FormatMismatch {
                layout: layout.name.clone(),
                reason: format!("file has no line {} declaring the header length", line + 1),
            })?;
            let count = declared
                .split_whitespace()
                .nth(*token)
                .and_then(|value| value.parse::<usize>().ok())
                .ok_or_else(|| ParserError::FormatMismatch {
                    layout: layout.name.clone(),
                    reason: format!(
                        "line {} does not declare a header length at token {token}",
                        line + 1
                    ),
                })?;
            if count <= *line {
                return Err(ParserError::InvalidHeader {
                    layout: layout.name.clone(),
                    line_index: line + 1,
                    message: format!("declared header length {count} is shorter than the declaration line"),
                });
            }
            count
        }
    };

    if header_len == 0 {
        return Err(ParserError::FormatMismatch {
            layout: layout.name.clone(),
            reason: "file has no header block".to_string(),
        });
    }
    if header_len > lines.len() {
        return Err(ParserError::FormatMismatch {
            layout: layout.name.clone(),
            reason: format!(
                "header block needs {header_len} lines but file has {}",
                lines.len()
            ),
        });
    }

    let header = lines[..header_len].to_vec();
    let body = lines[header_len..]
        .iter()
        .enumerate()
        .map(|(offset, line)| (header_len + offset + 1, *line))
        .collect();
    Ok((header, body))
}

/// Extracts campaign, period, region, declared unit and column schema from
/// the header block.
pub fn parse_header(
    header_lines: &[&str],
    layout: &HeaderLayout,
) -> Result<SourceHeader, ParserError> {
    let reader = HeaderReader {
        lines: header_lines,
        layout,
    };

    let campaign = reader.field("campaign", &layout.campaign)?;
    let declared_unit = reader.field("unit", &layout.unit)?;
    let period = reader.period(&layout.period)?;
    let region = reader.region(&layout.region)?;
    let column_schema = reader.schema()?;

    Ok(SourceHeader {
        campaign,
        period,
        region,
        declared_unit,
        column_schema,
    })
}

struct HeaderReader<'a> {
    lines: &'a [&'a str],
    layout: &'a HeaderLayout,
}

impl<'a> HeaderReader<'a> {
    fn select(
        &self,
        field: &'static str,
        selector: &LineSelector,
    ) -> Result<(usize, &'a str), ParserError> {
        let found = match selector {
            LineSelector::Index(idx) => self.lines.get(*idx).map(|line| (*idx, *line)),
            LineSelector::FromEnd(offset) => self
                .lines
                .len()
                .checked_sub(offset + 1)
                .map(|idx| (idx, self.lines[idx])),
            LineSelector::Containing(marker) => self
                .lines
                .iter()
                .enumerate()
                .find(|(_, line)| line.contains(marker.as_str()))
                .map(|(idx, line)| (idx, *line)),
        };

        found
            .map(|(idx, line)| (idx + 1, self.clean(line)))
            .ok_or_else(|| ParserError::MissingField {
                layout: self.layout.name.clone(),
                field,
                message: format!("no header line matches {selector:?}"),
            })
    }

    fn clean(&self, line: &'a str) -> &'a str {
        let comment = self.layout.comment_chars.as_str();
        line.trim_matches(|c: char| c.is_whitespace() || comment.contains(c))
    }

    fn field(&self, field: &'static str, rule: &FieldRule) -> Result<String, ParserError> {
        self.located_field(field, rule).map(|(_, value)| value)
    }

    /// Field value with the 1-based header line it was read from; 0 for
    /// fixed values that come from no line.
    fn located_field(
        &self,
        field: &'static str,
        rule: &FieldRule,
    ) -> Result<(usize, String), ParserError> {
        let missing = |message: String| ParserError::MissingField {
            layout: self.layout.name.clone(),
            field,
            message,
        };

        let (line_index, value) = match rule {
            FieldRule::Fixed { value } => (0, value.clone()),
            FieldRule::Token { line, index } => {
                let (line_index, text) = self.select(field, line)?;
                let value = text
                    .split_whitespace()
                    .nth(*index)
                    .map(str::to_string)
                    .ok_or_else(|| missing(format!("line {line_index} has no token {index}")))?;
                (line_index, value)
            }
            FieldRule::AfterMarker { line, marker } => {
                let (line_index, text) = self.select(field, line)?;
                let value = after_marker(text, marker)
                    .and_then(|rest| rest.split_whitespace().next())
                    .map(str::to_string)
                    .ok_or_else(|| missing(format!("marker '{marker}' not found on line {line_index}")))?;
                (line_index, value)
            }
            FieldRule::RestOfLine { line, marker } => {
                let (line_index, text) = self.select(field, line)?;
                let value = match marker {
                    Some(marker) => after_marker(text, marker)
                        .map(|rest| rest.trim().to_string())
                        .ok_or_else(|| {
                            missing(format!("marker '{marker}' not found on line {line_index}"))
                        })?,
                    None => text.trim().to_string(),
                };
                (line_index, value)
            }
        };

        if value.is_empty() {
            return Err(missing("field is empty".to_string()));
        }
        Ok((line_index, value))
    }

    fn period(&self, rule: &PeriodRule) -> Result<Period, ParserError> {
        let (line_index, token) = self.located_field("period", &rule.field)?;
        let (start, end) = split_range(&token, &rule.range_separator).ok_or_else(|| {
            ParserError::InvalidHeader {
                layout: self.layout.name.clone(),
                line_index,
                message: format!(
                    "period '{token}' cannot be split on '{}'",
                    rule.range_separator
                ),
            }
        })?;

        let start = self.date(line_index, start, &rule.date_format)?;
        let end = self.date(line_index, end, &rule.date_format)?;
        if end < start {
            return Err(ParserError::InvalidHeader {
                layout: self.layout.name.clone(),
                line_index,
                message: format!("period end {end} precedes start {start}"),
            });
        }
        Ok(Period::new(start, end))
    }

    fn date(&self, line_index: usize, text: &str, format: &str) -> Result<NaiveDate, ParserError> {
        NaiveDate::parse_from_str(text.trim(), format).map_err(|err| ParserError::InvalidHeader {
            layout: self.layout.name.clone(),
            line_index,
            message: format!("invalid date '{}' for format '{format}': {err}", text.trim()),
        })
    }

    fn region(&self, rule: &RegionRule) -> Result<Region, ParserError> {
        let (line_index, text) = self.select("region", &rule.line)?;
        let invalid = |message: String| ParserError::InvalidHeader {
            layout: self.layout.name.clone(),
            line_index,
            message,
        };

        let lat_text = marked_value(text, &rule.lat_marker)
            .ok_or_else(|| invalid(format!("latitude marker '{}' not found", rule.lat_marker)))?;
        let lon_text = marked_value(text, &rule.lon_marker)
            .ok_or_else(|| invalid(format!("longitude marker '{}' not found", rule.lon_marker)))?;

        let (lat_a, lat_b) = parse_bounds(lat_text, &rule.pair_separator)
            .map_err(|message| invalid(format!("latitude: {message}")))?;
        let (min_lat, max_lat) = (lat_a.min(lat_b), lat_a.max(lat_b));
        // Longitudes stay west-to-east as written so boxes crossing 180° survive.
        let (min_lon, max_lon) = parse_bounds(lon_text, &rule.pair_separator)
            .map_err(|message| invalid(format!("longitude: {message}")))?;

        if !(-90.0..=90.0).contains(&min_lat) || !(-90.0..=90.0).contains(&max_lat) {
            return Err(invalid(format!("latitude {min_lat}..{max_lat} out of range")));
        }
        if !(-180.0..=360.0).contains(&min_lon) || !(-180.0..=360.0).contains(&max_lon) {
            return Err(invalid(format!("longitude {min_lon}..{max_lon} out of range")));
        }

        Ok(Region {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    fn schema(&self) -> Result<Vec<String>, ParserError> {
        let rule = &self.layout.schema;
        let (line_index, text) = self.select("schema", &rule.line)?;
        let strip = rule.strip_chars.as_str();

        let columns: Vec<String> = rule
            .delimiter
            .split(text)
            .into_iter()
            .map(|token| token.trim_matches(|c: char| c.is_whitespace() || strip.contains(c)))
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();

        if columns.is_empty() {
            return Err(ParserError::InvalidHeader {
                layout: self.layout.name.clone(),
                line_index,
                message: "column schema line is empty".to_string(),
            });
        }

        for (idx, column) in columns.iter().enumerate() {
            if columns[..idx]
                .iter()
                .any(|other| other.eq_ignore_ascii_case(column))
            {
                return Err(ParserError::InvalidHeader {
                    layout: self.layout.name.clone(),
                    line_index,
                    message: format!("duplicate column name '{column}'"),
                });
            }
        }

        Ok(columns)
    }
}

fn after_marker<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    text.find(marker).map(|pos| &text[pos + marker.len()..])
}

/// Value following a marker: a bracketed group (which may contain spaces) or
/// a single whitespace-delimited token.
fn marked_value<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let rest = after_marker(text, marker)?.trim_start();
    let close = match rest.chars().next()? {
        '[' => Some(']'),
        '(' => Some(')'),
        _ => None,
    };
    let value = match close {
        Some(close) => {
            let end = rest.find(close)?;
            &rest[..=end]
        }
        None => rest.split_whitespace().next()?,
    };
    Some(value)
}

fn parse_bounds(text: &str, separator: &str) -> Result<(f64, f64), String> {
    let inner = text.trim_matches(|c: char| matches!(c, '[' | ']' | '(' | ')') || c.is_whitespace());
    let values = inner
        .split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f64>()
                .map_err(|err| format!("'{part}' is not a number: {err}"))
        })
        .collect::<Result<Vec<f64>, String>>()?;

    match values.as_slice() {
        [point] => Ok((*point, *point)),
        [a, b] => Ok((*a, *b)),
        other => Err(format!("expected one or two values, found {}", other.len())),
    }
}

/// Splits a date-range token on the separator occurrence that leaves two
/// halves, so separators repeated inside the dates are tolerated. A token
/// with no separator is a single-day period.
pub(crate) fn split_range<'a>(token: &'a str, separator: &str) -> Option<(&'a str, &'a str)> {
    if separator.is_empty() {
        return None;
    }
    let positions: Vec<usize> = token.match_indices(separator).map(|(idx, _)| idx).collect();
    if positions.is_empty() {
        return Some((token, token));
    }
    if positions.len() % 2 == 0 {
        return None;
    }
    let mid = positions[positions.len() / 2];
    Some((&token[..mid], &token[mid + separator.len()..]))
}
