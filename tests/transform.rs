use covid_etl::{
    persist::read_csv,
    pipeline::{read_processed, run_transform, ProcessedTable},
    table::{Country, Location},
    Config, EtlError,
};
use std::{fs, path::Path};
use tempfile::{tempdir, TempDir};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,covid_etl=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn workspace() -> (TempDir, Config) {
    let dir = tempdir().unwrap();
    let config = Config {
        raw_dir: dir.path().join("raw"),
        processed_dir: dir.path().join("processed"),
        ..Config::default()
    };
    fs::create_dir_all(&config.raw_dir).unwrap();
    (dir, config)
}

fn write_raw(config: &Config, name: &str, body: &str) {
    fs::write(config.raw_dir.join(name), body).unwrap();
}

fn lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn two_countries_end_to_end() {
    init_test_logging();
    let (_dir, config) = workspace();
    write_raw(
        &config,
        "confirmed_20200124T000000Z.csv",
        "Country/Region,Lat,Long,1/22/20,1/23/20\nA,1.0,2.0,0,5\nB,3.0,4.0,2,2\n",
    );
    write_raw(
        &config,
        "deaths_20200124T000000Z.csv",
        "Country/Region,Lat,Long,1/22/20,1/23/20\nA,1.0,2.0,0,0\nB,3.0,4.0,0,0\n",
    );

    let out = run_transform(&config).unwrap();
    assert_eq!(out.rows, 4);
    assert_eq!(out.csv_path, config.processed_path());
    assert_eq!(
        lines(&out.csv_path),
        vec![
            "Country/Region,Date,Confirmed,Deaths",
            "A,2020-01-22,0,0",
            "A,2020-01-23,5,0",
            "B,2020-01-22,2,0",
            "B,2020-01-23,2,0",
        ]
    );
}

#[test]
fn latest_raw_file_wins() {
    let (_dir, config) = workspace();
    write_raw(
        &config,
        "confirmed_20200101T000000Z.csv",
        "Country/Region,1/22/20\nOld,99\n",
    );
    write_raw(
        &config,
        "confirmed_20200201T000000Z.csv",
        "Country/Region,1/22/20\nNew,1\n",
    );
    write_raw(
        &config,
        "deaths_20200201T000000Z.csv",
        "Country/Region,1/22/20\nNew,0\n",
    );

    let out = run_transform(&config).unwrap();
    let table = read_csv::<Country>(&out.csv_path).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.rows[0].key, Country("New".into()));
}

#[test]
fn provinces_are_summed_and_gaps_filled() {
    let (_dir, config) = workspace();
    write_raw(
        &config,
        "confirmed_20200301T000000Z.csv",
        "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20\n\
         NSW,Australia,-33.8,151.2,1,,4\n\
         VIC,Australia,-37.8,144.9,0,2,\n\
         ,Chile,-35.6,-71.5,,,3\n",
    );
    write_raw(
        &config,
        "deaths_20200301T000000Z.csv",
        "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20\n\
         NSW,Australia,-33.8,151.2,0,0,1\n\
         VIC,Australia,-37.8,144.9,0,0,0\n\
         ,Chile,-35.6,-71.5,,,0\n",
    );

    let out = run_transform(&config).unwrap();
    assert_eq!(
        lines(&out.csv_path),
        vec![
            "Country/Region,Date,Confirmed,Deaths",
            "Australia,2020-01-22,1,0",
            "Australia,2020-01-23,2,0",
            "Australia,2020-01-24,4,1",
            "Chile,2020-01-22,0,0",
            "Chile,2020-01-23,0,0",
            "Chile,2020-01-24,3,0",
        ]
    );
}

#[test]
fn province_level_output_when_not_aggregating() {
    let (_dir, mut config) = workspace();
    config.aggregate_by_country = false;
    config.write_parquet = true;
    write_raw(
        &config,
        "confirmed_20200301T000000Z.csv",
        "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20\n\
         NSW,Australia,-33.8,151.2,1,\n\
         VIC,Australia,-37.8,144.9,0,2\n",
    );
    write_raw(
        &config,
        "deaths_20200301T000000Z.csv",
        "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20\n\
         NSW,Australia,-33.8,151.2,0,0\n\
         VIC,Australia,-37.8,144.9,0,0\n",
    );

    let out = run_transform(&config).unwrap();
    let table = read_csv::<Location>(&out.csv_path).unwrap();
    assert_eq!(table.len(), 4);
    let nsw: Vec<u64> = table
        .rows
        .iter()
        .filter(|r| r.key.province.as_deref() == Some("NSW"))
        .map(|r| r.confirmed)
        .collect();
    assert_eq!(nsw, vec![1, 1]);
    assert!(out.parquet_path.unwrap().exists());
}

#[test]
fn empty_raw_dir_is_not_found_before_any_output() {
    let (_dir, config) = workspace();
    let err = run_transform(&config).unwrap_err();
    assert!(matches!(err, EtlError::NotFound { ref prefix, .. } if prefix == "confirmed"));
    assert!(!config.processed_dir.exists());
}

#[test]
fn malformed_date_header_aborts() {
    let (_dir, config) = workspace();
    let body = "Country/Region,Lat,Long,2020-01-22\nA,1,1,0\n";
    write_raw(&config, "confirmed_20200301T000000Z.csv", body);
    write_raw(&config, "deaths_20200301T000000Z.csv", body);

    let err = run_transform(&config).unwrap_err();
    assert!(matches!(err, EtlError::DateParse { ref header } if header == "2020-01-22"));
    assert!(!config.processed_path().exists());
}

#[test]
fn processed_file_is_read_back_with_the_configured_key() {
    let (_dir, mut config) = workspace();
    let body = "Province/State,Country/Region,Lat,Long,1/22/20\nNSW,Australia,-33.8,151.2,1\n";
    write_raw(&config, "confirmed_20200301T000000Z.csv", body);
    write_raw(&config, "deaths_20200301T000000Z.csv", body);

    run_transform(&config).unwrap();
    match read_processed(&config).unwrap() {
        ProcessedTable::Country(t) => assert_eq!(t.rows[0].key, Country("Australia".into())),
        other => panic!("expected country rows, got {other:?}"),
    }

    // the national file does not parse as province rows
    config.aggregate_by_country = false;
    assert!(matches!(read_processed(&config), Err(EtlError::Schema(_))));

    run_transform(&config).unwrap();
    match read_processed(&config).unwrap() {
        ProcessedTable::Location(t) => {
            assert_eq!(t.len(), 1);
            assert_eq!(t.rows[0].key.province.as_deref(), Some("NSW"));
        }
        other => panic!("expected province rows, got {other:?}"),
    }
}
