use chrono::{TimeZone, Utc};
use obsprofile_core::{
    BinningEngine, ImporterAttributes, ImporterConfig, ProfileAssembler, ProfileError,
    Provenance, SourceFile, StatisticColumn,
};
use obsprofile_parser::{parse_source_file, ParsedSourceFile};

fn fixture(path: &str) -> String {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(path);
    std::fs::read_to_string(path).expect("read fixture")
}

fn config() -> ImporterConfig {
    ImporterConfig::from_toml_str(&fixture("tests/data/aircraft_importer.toml"))
        .expect("importer config should load")
}

fn parsed(config: &ImporterConfig) -> ParsedSourceFile {
    parse_source_file(
        &fixture("../obsprofile-parser/tests/data/barbados_2014_aircraft.txt"),
        &config.layout,
    )
    .expect("fixture should parse")
}

fn provenance() -> Provenance {
    Provenance {
        host: "station-7".to_string(),
        user: "obs".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
    }
}

#[test]
fn assembled_dataset_carries_identity_and_attributes() {
    let config = config();
    let parsed = parsed(&config);
    let grid = config.grid.build_grid().unwrap();
    let options = config.grid.binning_options();
    let attributes = ImporterAttributes::from(&config);
    let variable = &config.variables[0];

    let records = parsed.records_for(&variable.column).unwrap();
    let binned = BinningEngine::new(&grid, &options, config.grid.binning.assigner())
        .bin(&records)
        .unwrap();
    let source = SourceFile {
        path: "incoming/barbados_2014_aircraft.txt".to_string(),
        blake3: parsed.file_hash.clone(),
    };

    let dataset = ProfileAssembler::new(&grid, &attributes)
        .assemble(binned.table, variable, &parsed.header, &source, &provenance())
        .unwrap();

    assert_eq!(
        dataset.output_identity(),
        "OBS_2_aircraft_co_BARBADOS_2014_20140801-20140830"
    );
    assert_eq!(dataset.variable(), "co");
    assert_eq!(dataset.units(), "1e-9");
    assert_eq!(dataset.levels().len(), 6);

    assert_eq!(dataset.attribute("campaign"), Some("BARBADOS_2014"));
    assert_eq!(dataset.attribute("period"), Some("2014-08-01/2014-08-30"));
    assert_eq!(dataset.attribute("source_units"), Some("ppbv"));
    assert_eq!(dataset.attribute("long_name"), Some("carbon monoxide mole fraction"));
    assert_eq!(dataset.attribute("vertical_coordinate_order"), Some("decreasing"));
    assert_eq!(dataset.attribute("geospatial_lon_min"), Some("300.38"));
    assert_eq!(dataset.attribute("creation_date"), Some("2024-03-01T12:30:00Z"));
    assert_eq!(dataset.attribute("host"), Some("station-7"));
    assert_eq!(dataset.attribute("sub_threshold_policy"), Some("keep_count"));
    assert_eq!(
        dataset.attribute("statistics"),
        Some("count,min,max,mean,std,p05,p25,p50,p75,p95")
    );
    assert_eq!(dataset.attribute("source_blake3"), Some(parsed.file_hash.as_str()));

    assert_eq!(dataset.cell(0, StatisticColumn::Mean), Some(95.1));
    assert_eq!(dataset.cell(3, StatisticColumn::Count), None);
    assert_eq!(dataset.cell(4, StatisticColumn::Count), Some(1.0));
}

#[test]
fn dataframe_has_pressure_coordinates_and_statistics() {
    let config = config();
    let parsed = parsed(&config);
    let grid = config.grid.build_grid().unwrap();
    let options = config.grid.binning_options();
    let attributes = ImporterAttributes::from(&config);
    let variable = &config.variables[1];

    let records = parsed.records_for(&variable.column).unwrap();
    let binned = BinningEngine::new(&grid, &options, config.grid.binning.assigner())
        .bin(&records)
        .unwrap();
    let source = SourceFile {
        path: "barbados_2014_aircraft.txt".to_string(),
        blake3: parsed.file_hash.clone(),
    };
    let dataset = ProfileAssembler::new(&grid, &attributes)
        .assemble(binned.table, variable, &parsed.header, &source, &provenance())
        .unwrap();

    let df = dataset.to_dataframe().unwrap();
    assert_eq!(df.height(), 6);
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "plev", "plev_lower", "plev_upper", "count", "min", "max", "mean", "std", "p05",
            "p25", "p50", "p75", "p95"
        ]
    );

    let plev = df.column("plev").unwrap().f64().unwrap();
    assert_eq!(plev.get(0), Some(grid.levels()[0].center_pa));
    let count = df.column("count").unwrap().u64().unwrap();
    assert_eq!(count.get(2), None);
    assert_eq!(count.get(3), Some(1));
}

#[test]
fn table_of_the_wrong_length_is_rejected() {
    let config = config();
    let parsed = parsed(&config);
    let grid = config.grid.build_grid().unwrap();
    let options = config.grid.binning_options();
    let attributes = ImporterAttributes::from(&config);
    let variable = &config.variables[0];

    let records = parsed.records_for(&variable.column).unwrap();
    let mut table = BinningEngine::new(&grid, &options, config.grid.binning.assigner())
        .bin(&records)
        .unwrap()
        .table;
    table.rows.pop();

    let source = SourceFile {
        path: "barbados_2014_aircraft.txt".to_string(),
        blake3: parsed.file_hash.clone(),
    };
    let err = ProfileAssembler::new(&grid, &attributes)
        .assemble(table, variable, &parsed.header, &source, &provenance())
        .unwrap_err();
    assert!(matches!(
        err,
        ProfileError::GridMismatch {
            expected: 6,
            found: 5
        }
    ));
}
