use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::errors::ParserError;
use crate::header::{parse_header, split_header, split_range};
use crate::layout::HeaderLayout;
use crate::{parse_source_file, parse_with_layouts};

fn fixture(path: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let full_path = base.join("tests/data").join(path);
    fs::read_to_string(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

fn layout(path: &str) -> HeaderLayout {
    toml::from_str(&fixture(path)).expect("layout fixture should deserialize")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn parses_prefixed_aircraft_header() {
    let content = fixture("barbados_2014_aircraft.txt");
    let parsed = parse_source_file(&content, &layout("hash_layout.toml"))
        .expect("aircraft file should parse");

    let header = &parsed.header;
    assert_eq!(header.campaign, "BARBADOS_2014");
    assert_eq!(header.declared_unit, "ppbv");
    assert_eq!(header.period.start, date(2014, 8, 1));
    assert_eq!(header.period.end, date(2014, 8, 30));
    assert_eq!(header.column_schema, vec!["ALT_m", "CO_ppb", "O3_ppb"]);
    assert!(header.region.is_point());
    assert_eq!(header.region.min_lat, 13.14);
    assert_eq!(header.region.max_lat, 13.14);
    assert_eq!(header.region.min_lon, 300.38);
    assert_eq!(header.region.max_lon, 300.38);
    assert_eq!(header.region.normalized_lon_bounds(), (300.38, 300.38));
    assert_eq!(parsed.row_count(), 5);
    assert_eq!(parsed.file_hash.len(), 64);
}

#[test]
fn records_keep_missing_values_as_none() {
    let content = fixture("barbados_2014_aircraft.txt");
    let parsed = parse_source_file(&content, &layout("hash_layout.toml")).unwrap();

    let co = parsed.records_for("co_ppb").expect("column lookup is case-insensitive");
    assert_eq!(co.len(), 5);
    assert_eq!(co[0].altitude_m, Some(100.0));
    assert_eq!(co[0].value, Some(95.1));
    assert_eq!(co[3].value, None);
    assert_eq!(&*co[0].column_name, "CO_ppb");

    let o3 = parsed.records_for("O3_ppb").unwrap();
    assert_eq!(o3[2].value, None, "-999 is a configured missing marker");
    assert_eq!(o3[4].value, Some(34.9));
}

#[test]
fn negative_longitude_is_kept_raw_and_normalized_on_request() {
    let content = "# CAMPAIGN: X\n# PERIOD=20140801-20140830\n# LAT=13.14 LON=-59.62 #\n# UNIT: ppbv\n# ALT_m CO\n100 1.0\n";
    let parsed = parse_source_file(content, &layout("hash_layout.toml")).unwrap();

    assert_eq!(parsed.header.region.min_lon, -59.62);
    let (min_lon, max_lon) = parsed.header.region.normalized_lon_bounds();
    assert!((min_lon - 300.38).abs() < 1e-9);
    assert!((max_lon - 300.38).abs() < 1e-9);
}

#[test]
fn parses_counted_comma_layout_with_bracketed_region() {
    let content = fixture("arctas_b_ames.csv");
    let parsed = parse_source_file(&content, &layout("ames_layout.toml"))
        .expect("ames file should parse");

    let header = &parsed.header;
    assert_eq!(header.campaign, "ARCTAS-B");
    assert_eq!(header.declared_unit, "ppmv");
    assert_eq!(header.period.start, date(2008, 6, 29));
    assert_eq!(header.period.end, date(2008, 7, 13));
    assert_eq!(header.column_schema, vec!["Time", "Altitude", "CO2", "CH4"]);
    assert_eq!(header.region.min_lat, 55.0);
    assert_eq!(header.region.max_lat, 75.0);
    assert_eq!(header.region.min_lon, -130.0);
    assert_eq!(header.region.normalized_lon_bounds(), (230.0, 300.0));

    let co2 = parsed.records_for("CO2").unwrap();
    assert_eq!(co2.len(), 4);
    assert_eq!(co2[2].value, None);
    assert_eq!(co2[3].altitude_m, Some(1800.0));

    let ch4 = parsed.records_for("CH4").unwrap();
    assert_eq!(ch4[1].value, None);
}

#[test]
fn short_data_row_is_a_structural_error() {
    let content = fixture("truncated_row.txt");
    let err = parse_source_file(&content, &layout("hash_layout.toml")).unwrap_err();

    match err {
        ParserError::ColumnCountMismatch {
            line_index,
            expected,
            found,
            ..
        } => {
            assert_eq!(line_index, 7);
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_variable_column_is_reported() {
    let content = fixture("barbados_2014_aircraft.txt");
    let parsed = parse_source_file(&content, &layout("hash_layout.toml")).unwrap();

    let err = parsed.records_for("CH4").unwrap_err();
    assert!(matches!(err, ParserError::MissingColumn { ref column, .. } if column == "CH4"));
}

#[test]
fn header_without_body_is_empty_data() {
    let content = "# CAMPAIGN: X\n# PERIOD=20140801\n# LAT=1 LON=2\n# UNIT: ppbv\n# ALT_m CO\n\n";
    let err = parse_source_file(content, &layout("hash_layout.toml")).unwrap_err();
    assert!(matches!(err, ParserError::EmptyData { .. }));
}

#[test]
fn single_date_period_spans_one_day() {
    let content = "# CAMPAIGN: X\n# PERIOD=20140801\n# LAT=1 LON=2\n# UNIT: ppbv\n# ALT_m CO\n10 1\n";
    let parsed = parse_source_file(content, &layout("hash_layout.toml")).unwrap();
    assert_eq!(parsed.header.period.start, parsed.header.period.end);
    assert_eq!(parsed.header.period.compact_range(), "20140801-20140801");
}

#[test]
fn layouts_fall_through_on_format_mismatch() {
    let hash = layout("hash_layout.toml");
    let ames = layout("ames_layout.toml");

    let parsed = parse_with_layouts(&fixture("barbados_2014_aircraft.txt"), &[&ames, &hash])
        .expect("second layout should match");
    assert_eq!(parsed.layout_name, "aircraft_hash");

    let parsed = parse_with_layouts(&fixture("arctas_b_ames.csv"), &[&hash, &ames])
        .expect("second layout should match");
    assert_eq!(parsed.layout_name, "ames_counted");

    let err = parse_with_layouts("free text\nwith no header", &[&hash, &ames]).unwrap_err();
    match err {
        ParserError::NoMatchingLayout { attempts } => assert_eq!(attempts.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn schema_tokens_are_stripped_of_marker_characters() {
    let mut layout = layout("hash_layout.toml");
    layout.schema.strip_chars = "[]".to_string();
    let lines = [
        "# CAMPAIGN: X",
        "# PERIOD=20140801-20140802",
        "# LAT=[10.0,20.0] LON=[350,10]",
        "# UNIT: ppb",
        "# [ALT_m] [CO] [O3] #",
    ];

    let header = parse_header(&lines, &layout).unwrap();
    assert_eq!(header.column_schema, vec!["ALT_m", "CO", "O3"]);
    assert_eq!(header.region.min_lat, 10.0);
    assert_eq!(header.region.max_lat, 20.0);
    assert_eq!(header.region.min_lon, 350.0);
    assert_eq!(header.region.max_lon, 10.0);
    assert_eq!(header.region.normalized_lon_bounds(), (350.0, 10.0));
}

#[test]
fn missing_region_marker_is_an_invalid_header() {
    let layout = layout("hash_layout.toml");
    let lines = [
        "# CAMPAIGN: X",
        "# PERIOD=20140801-20140802",
        "# LAT=10.0 #",
        "# UNIT: ppb",
        "# ALT_m CO",
    ];
    let err = parse_header(&lines, &layout).unwrap_err();
    assert!(matches!(err, ParserError::InvalidHeader { line_index: 3, .. }));
}

#[test]
fn split_header_numbers_body_lines_from_one() {
    let layout = layout("hash_layout.toml");
    let (header, body) = split_header("# a\n# b\n1 2\n3 4", &layout).unwrap();
    assert_eq!(header.len(), 2);
    assert_eq!(body, vec![(3, "1 2"), (4, "3 4")]);
}

#[test]
fn range_split_tolerates_separator_inside_dates() {
    assert_eq!(
        split_range("2008-06-29-2008-07-13", "-"),
        Some(("2008-06-29", "2008-07-13"))
    );
    assert_eq!(split_range("20140801-20140830", "-"), Some(("20140801", "20140830")));
    assert_eq!(split_range("2014/08/01 to 2014/08/30", " to "), Some(("2014/08/01", "2014/08/30")));
    assert_eq!(split_range("20140801", "-"), Some(("20140801", "20140801")));
    assert_eq!(split_range("2014-08-01", "-"), None);
}

#[test]
fn stray_quote_in_comma_row_keeps_every_line() {
    let content = fixture("arctas_b_ames.csv")
        .replace("43260,650,386.0,-9999", "43260,650,386.0,\"1.8");
    let parsed = parse_source_file(&content, &layout("ames_layout.toml"))
        .expect("quoted token should not break the file");

    assert_eq!(parsed.row_count(), 4);
    let ch4 = parsed.records_for("CH4").unwrap();
    assert_eq!(ch4[1].value, None);
    assert_eq!(ch4[2].value, Some(1.79));
    assert_eq!(ch4[3].altitude_m, Some(1800.0));
}

#[test]
fn numeric_sentinels_match_by_value() {
    let content = "# CAMPAIGN: X\n# PERIOD=20140801\n# LAT=1 LON=2\n# UNIT: ppbv\n# ALT_m CO\n\
                   100 -999.0\n200 -999.00\n300 -998.5\n400 NaN\n";
    let parsed = parse_source_file(content, &layout("hash_layout.toml")).unwrap();

    let values: Vec<Option<f64>> = parsed
        .records_for("CO")
        .unwrap()
        .iter()
        .map(|record| record.value)
        .collect();
    assert_eq!(values, vec![None, None, Some(-998.5), None]);
}

#[test]
fn period_errors_point_at_the_period_line() {
    let layout = layout("hash_layout.toml");
    let lines = [
        "# CAMPAIGN: X",
        "# PERIOD=20140830-20140801",
        "# LAT=10.0 LON=20.0 #",
        "# UNIT: ppb",
        "# ALT_m CO",
    ];
    let err = parse_header(&lines, &layout).unwrap_err();
    assert!(matches!(err, ParserError::InvalidHeader { line_index: 2, .. }));

    let lines = [
        "# CAMPAIGN: X",
        "# UNIT: ppb",
        "# PERIOD=20141301-20141302",
        "# LAT=10.0 LON=20.0 #",
        "# ALT_m CO",
    ];
    let err = parse_header(&lines, &layout).unwrap_err();
    assert!(matches!(err, ParserError::InvalidHeader { line_index: 3, .. }));
}
