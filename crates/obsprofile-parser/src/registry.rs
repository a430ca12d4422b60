use blake3::Hasher;

use crate::errors::{LayoutAttempt, ParserError};
use crate::header::{parse_header, split_header};
use crate::layout::HeaderLayout;
use crate::model::ParsedSourceFile;
use crate::table::parse_body;

/// Parses one source file with a single layout.
pub fn parse_source_file(
    content: &str,
    layout: &HeaderLayout,
) -> Result<ParsedSourceFile, ParserError> {
    let (header_lines, body) = split_header(content, layout)?;
    let header = parse_header(&header_lines, layout)?;

    if header.column_index(&layout.altitude_column).is_none() {
        return Err(ParserError::FormatMismatch {
            layout: layout.name.clone(),
            reason: format!(
                "schema {:?} lacks altitude column '{}'",
                header.column_schema, layout.altitude_column
            ),
        });
    }

    let table = parse_body(layout, &header.column_schema, &body)?;

    Ok(ParsedSourceFile {
        file_hash: compute_hash(content.as_bytes()),
        layout_name: layout.name.clone(),
        header,
        altitude_column: layout.altitude_column.clone(),
        table,
    })
}

/// Tries each layout in order. Format mismatches fall through to the next
/// layout; any other error is final for the file.
pub fn parse_with_layouts(
    content: &str,
    layouts: &[&HeaderLayout],
) -> Result<ParsedSourceFile, ParserError> {
    let mut attempts = Vec::new();

    for layout in layouts {
        match parse_source_file(content, layout) {
            Ok(parsed) => return Ok(parsed),
            Err(ParserError::FormatMismatch { reason, .. }) => {
                attempts.push(LayoutAttempt::new(layout.name.as_str(), reason));
            }
            Err(err) => return Err(err),
        }
    }

    Err(ParserError::NoMatchingLayout { attempts })
}

pub fn compute_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}
