/// Integration tests for the climate API against a live PostgreSQL store
///
/// Each test seeds its own throwaway schema with `station` and `measurement`
/// tables, points a `DataSource` at it and exercises the queries and the
/// HTTP layer end to end. The schema is dropped when the test finishes.
///
/// Prerequisites:
/// - PostgreSQL running
/// - DATABASE_URL set (environment or .env) for a role that may create schemas
///
/// Run with: cargo test --test api_integration -- --ignored

use chrono::NaiveDate;
use climate_api::config::{AnchorPolicy, TemperatureWindow};
use climate_api::db::{self, DataSource, DbConfigError};
use climate_api::endpoint::Api;
use climate_api::model::{Measurement, Station};
use climate_api::query;
use postgres::{Client, NoTls};
use serde_json::{json, Value};
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

static SCHEMA_COUNTER: AtomicUsize = AtomicUsize::new(0);

struct TestStore {
    admin: Client,
    schema: String,
    source: DataSource,
}

impl TestStore {
    fn new(stations: &[Station], measurements: &[Measurement]) -> Self {
        Self::with_tobs_type(stations, measurements, "DOUBLE PRECISION")
    }

    /// Seed a store whose `tobs` column has the given SQL type.
    fn with_tobs_type(stations: &[Station], measurements: &[Measurement], tobs_type: &str) -> Self {
        dotenv::dotenv().ok();
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let mut admin =
            Client::connect(&database_url, NoTls).expect("Failed to connect to test database");

        let schema = format!(
            "climate_test_{}_{}",
            std::process::id(),
            SCHEMA_COUNTER.fetch_add(1, Ordering::SeqCst)
        );

        admin
            .batch_execute(&format!(
                "CREATE SCHEMA {schema};
                 CREATE TABLE {schema}.station (
                     id SERIAL PRIMARY KEY,
                     station TEXT NOT NULL,
                     name TEXT NOT NULL
                 );
                 CREATE TABLE {schema}.measurement (
                     id SERIAL PRIMARY KEY,
                     station TEXT NOT NULL,
                     date TEXT NOT NULL,
                     prcp DOUBLE PRECISION,
                     tobs {tobs_type} NOT NULL
                 );"
            ))
            .expect("Failed to create test schema");

        for s in stations {
            admin
                .execute(
                    &format!("INSERT INTO {schema}.station (station, name) VALUES ($1, $2)"),
                    &[&s.station, &s.name],
                )
                .expect("Insert station should succeed");
        }

        for m in measurements {
            admin
                .execute(
                    &format!(
                        "INSERT INTO {schema}.measurement (station, date, prcp, tobs)
                         VALUES ($1, $2, $3::float8, $4::float8)"
                    ),
                    &[&m.station, &m.date, &m.prcp, &m.tobs],
                )
                .expect("Insert measurement should succeed");
        }

        let source = DataSource::new(database_url, Some(schema.clone()))
            .expect("DATABASE_URL should be a postgres URL");

        Self {
            admin,
            schema,
            source,
        }
    }

    fn session(&self) -> Client {
        self.source.session().expect("Session should open")
    }

    fn api(&self, anchor: AnchorPolicy) -> Api {
        Api::new(self.source.clone(), anchor, TemperatureWindow::default())
    }

    /// GET `path` and parse the JSON body, asserting a 200.
    fn get_json(&self, path: &str) -> Value {
        let reply = self.api(AnchorPolicy::Latest).respond("GET", path);
        assert_eq!(reply.status, 200, "GET {} failed: {}", path, reply.body);
        serde_json::from_str(&reply.body).expect("Body should be JSON")
    }
}

impl Drop for TestStore {
    fn drop(&mut self) {
        let _ = self
            .admin
            .batch_execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema));
    }
}

fn station(code: &str, name: &str) -> Station {
    Station {
        station: code.to_string(),
        name: name.to_string(),
    }
}

fn measurement(code: &str, date: &str, prcp: Option<f64>, tobs: f64) -> Measurement {
    Measurement {
        station: code.to_string(),
        date: date.to_string(),
        prcp,
        tobs,
    }
}

fn hawaii_stations() -> Vec<Station> {
    vec![
        station("USC00519397", "WAIKIKI 717.2, HI US"),
        station("USC00513117", "KANEOHE 838.1, HI US"),
        station("USC00519281", "WAIHEE 837.5, HI US"),
    ]
}

/// Several stations, overlapping dates, a year boundary and a missing prcp.
fn hawaii_measurements() -> Vec<Measurement> {
    vec![
        measurement("USC00519397", "2015-12-31", Some(0.0), 65.0),
        measurement("USC00519397", "2016-06-06", Some(0.1), 70.0),
        measurement("USC00513117", "2016-06-06", None, 76.0),
        measurement("USC00519281", "2016-06-06", Some(0.3), 73.0),
        measurement("USC00519281", "2016-06-07", Some(0.0), 72.0),
        measurement("USC00519281", "2016-08-22", Some(0.5), 74.0),
        measurement("USC00519281", "2016-08-23", Some(0.7), 77.0),
        measurement("USC00519281", "2017-01-01", None, 66.0),
        measurement("USC00513117", "2017-08-23", Some(0.0), 81.0),
    ]
}

// ---------------------------------------------------------------------------
// 1. Daily Aggregates
// ---------------------------------------------------------------------------

#[test]
#[ignore] // Only run when database is available
fn test_start_route_single_station_scenario() {
    let store = TestStore::with_tobs_type(
        &[station("USC1", "TEST STATION")],
        &[
            measurement("USC1", "2016-06-06", Some(0.1), 70.0),
            measurement("USC1", "2016-06-07", Some(0.0), 72.0),
        ],
        "INTEGER",
    );

    // Integer min/max come back as integers, the average as a float
    let reply = store.api(AnchorPolicy::Latest).respond("GET", "/api/v1.0/2016-06-06");
    assert_eq!(reply.status, 200);
    let body: Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(
        body,
        json!([["2016-06-06", 70, 70.0, 70], ["2016-06-07", 72, 72.0, 72]])
    );
    let compact = serde_json::to_string(&body).unwrap();
    assert_eq!(compact, r#"[["2016-06-06",70,70.0,70],["2016-06-07",72,72.0,72]]"#);
}

#[test]
#[ignore]
fn test_float_store_keeps_float_values() {
    let store = TestStore::new(
        &[station("USC1", "TEST STATION")],
        &[
            measurement("USC1", "2016-06-06", Some(0.1), 70.0),
            measurement("USC1", "2016-06-07", Some(0.0), 72.0),
        ],
    );

    let body = store.get_json("/api/v1.0/2016-06-06");
    assert_eq!(
        body,
        json!([["2016-06-06", 70.0, 70.0, 70.0], ["2016-06-07", 72.0, 72.0, 72.0]])
    );
}

#[test]
#[ignore]
fn test_integer_store_tobs_listing() {
    let store = TestStore::with_tobs_type(
        &[station("USC1", "TEST STATION")],
        &[measurement("USC1", "2016-06-06", None, 70.0)],
        "INTEGER",
    );

    let body = store.get_json("/api/v1.0/tobs");
    assert_eq!(
        body,
        json!([{"Station Name": "TEST STATION", "Temp observation": 70, "Date": "2016-06-06"}])
    );
}

#[test]
#[ignore]
fn test_end_before_start_is_empty() {
    let store = TestStore::new(
        &[station("USC1", "TEST STATION")],
        &[
            measurement("USC1", "2016-06-06", Some(0.1), 70.0),
            measurement("USC1", "2016-06-07", Some(0.0), 72.0),
        ],
    );

    let body = store.get_json("/api/v1.0/2016-06-07/2016-06-06");
    assert_eq!(body, json!([]));
}

#[test]
#[ignore]
fn test_start_aggregate_has_one_row_per_date() {
    let store = TestStore::new(&hawaii_stations(), &hawaii_measurements());
    let mut client = store.session();

    let rows = query::daily_aggregates_from(&mut client, "2016-06-06").unwrap();
    let dates: Vec<&str> = rows.iter().map(|r| r.0.as_str()).collect();
    assert_eq!(
        dates,
        vec!["2016-06-06", "2016-06-07", "2016-08-22", "2016-08-23", "2017-01-01", "2017-08-23"]
    );

    // Three stations reported on 2016-06-06: 70, 76, 73
    let (_, min, avg, max) = &rows[0];
    assert_eq!(min.as_f64(), Some(70.0));
    assert!((avg - 73.0).abs() < 1e-9);
    assert_eq!(max.as_f64(), Some(76.0));
}

#[test]
#[ignore]
fn test_range_equals_start_result_filtered_by_end() {
    let store = TestStore::new(&hawaii_stations(), &hawaii_measurements());
    let mut client = store.session();

    let from = query::daily_aggregates_from(&mut client, "2016-06-06").unwrap();
    let between =
        query::daily_aggregates_between(&mut client, "2016-06-06", "2016-08-22").unwrap();

    let expected: Vec<_> = from
        .into_iter()
        .filter(|r| r.0.as_str() <= "2016-08-22")
        .collect();
    assert_eq!(between, expected);
    assert_eq!(between.len(), 3);
}

#[test]
#[ignore]
fn test_range_bounds_are_inclusive() {
    let store = TestStore::new(&hawaii_stations(), &hawaii_measurements());

    let body = store.get_json("/api/v1.0/2016-06-07/2016-06-07");
    assert_eq!(body, json!([["2016-06-07", 72.0, 72.0, 72.0]]));
}

#[test]
#[ignore]
fn test_malformed_date_passes_through() {
    let store = TestStore::new(&hawaii_stations(), &hawaii_measurements());

    // Letters sort after digits, so nothing is >= "garbage"
    let body = store.get_json("/api/v1.0/garbage");
    assert_eq!(body, json!([]));

    // Every ISO date sorts after "2", so everything matches
    let body = store.get_json("/api/v1.0/2");
    assert_eq!(body.as_array().unwrap().len(), 7);
}

// ---------------------------------------------------------------------------
// 2. Precipitation
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_precipitation_window_from_latest_date() {
    let store = TestStore::new(&hawaii_stations(), &hawaii_measurements());

    // Latest date is 2017-08-23, so the window starts at 2016-08-23
    let body = store.get_json("/api/v1.0/precipitation");
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    for row in rows {
        assert!(row["date"].as_str().unwrap() >= "2016-08-23", "row outside window: {}", row);
    }

    let missing = rows.iter().find(|r| r["date"] == "2017-01-01").unwrap();
    assert_eq!(missing["prcp"], Value::Null);
}

#[test]
#[ignore]
fn test_precipitation_with_fixed_anchor() {
    let store = TestStore::new(&hawaii_stations(), &hawaii_measurements());
    let mut client = store.session();

    let anchor = NaiveDate::from_ymd_opt(2017, 6, 6).unwrap();
    let rows = query::precipitation(&mut client, AnchorPolicy::Fixed(anchor)).unwrap();

    // Window starts 2016-06-06; no upper bound is applied
    let mut dates: Vec<&str> = rows.iter().map(|r| r.0.as_str()).collect();
    dates.sort();
    assert_eq!(dates.first(), Some(&"2016-06-06"));
    assert_eq!(dates.last(), Some(&"2017-08-23"));
    assert_eq!(dates.len(), 8);
}

#[test]
#[ignore]
fn test_precipitation_on_empty_store() {
    let store = TestStore::new(&hawaii_stations(), &[]);

    let body = store.get_json("/api/v1.0/precipitation");
    assert_eq!(body, json!([]));
}

// ---------------------------------------------------------------------------
// 3. Stations
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_stations_one_record_per_station() {
    let store = TestStore::new(&hawaii_stations(), &hawaii_measurements());

    let body = store.get_json("/api/v1.0/stations");
    let mut codes: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["station"].as_str().unwrap())
        .collect();
    codes.sort();
    assert_eq!(codes, vec!["USC00513117", "USC00519281", "USC00519397"]);

    let waikiki = body
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["station"] == "USC00519397")
        .unwrap();
    assert_eq!(waikiki["name"], "WAIKIKI 717.2, HI US");
}

// ---------------------------------------------------------------------------
// 4. Temperature Observations
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_tobs_uses_most_active_station_in_2016() {
    let store = TestStore::new(&hawaii_stations(), &hawaii_measurements());

    assert_eq!(
        query::most_active_station(&mut store.session()).unwrap().as_deref(),
        Some("USC00519281")
    );

    let body = store.get_json("/api/v1.0/tobs");
    let mut rows = body.as_array().unwrap().clone();
    rows.sort_by(|a, b| a["Date"].as_str().cmp(&b["Date"].as_str()));

    // 2017-01-01 is outside the 2016 window
    assert_eq!(
        Value::Array(rows),
        json!([
            {"Station Name": "WAIHEE 837.5, HI US", "Temp observation": 73.0, "Date": "2016-06-06"},
            {"Station Name": "WAIHEE 837.5, HI US", "Temp observation": 72.0, "Date": "2016-06-07"},
            {"Station Name": "WAIHEE 837.5, HI US", "Temp observation": 74.0, "Date": "2016-08-22"},
            {"Station Name": "WAIHEE 837.5, HI US", "Temp observation": 77.0, "Date": "2016-08-23"}
        ])
    );
}

#[test]
#[ignore]
fn test_most_active_tie_goes_to_lowest_code() {
    let store = TestStore::new(
        &[station("B", "BRAVO"), station("A", "ALPHA")],
        &[
            measurement("B", "2016-01-01", None, 60.0),
            measurement("A", "2016-01-01", None, 61.0),
        ],
    );

    let busiest = query::most_active_station(&mut store.session()).unwrap();
    assert_eq!(busiest.as_deref(), Some("A"));
}

#[test]
#[ignore]
fn test_tobs_on_empty_store() {
    let store = TestStore::new(&hawaii_stations(), &[]);

    assert_eq!(query::most_active_station(&mut store.session()).unwrap(), None);
    let body = store.get_json("/api/v1.0/tobs");
    assert_eq!(body, json!([]));
}

// ---------------------------------------------------------------------------
// 5. Table Verification
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_verify_tables_accepts_seeded_schema() {
    let store = TestStore::new(&hawaii_stations(), &hawaii_measurements());
    let result = db::verify_tables(&mut store.session());
    assert!(result.is_ok(), "Verification failed: {:?}", result.err());
}

#[test]
#[ignore]
fn test_verify_tables_reports_missing_table() {
    let mut store = TestStore::new(&[], &[]);
    store
        .admin
        .batch_execute(&format!("DROP TABLE {}.measurement", store.schema))
        .unwrap();

    let result = db::verify_tables(&mut store.session());
    match result {
        Err(DbConfigError::MissingTable(table)) => assert_eq!(table, "measurement"),
        other => panic!("Expected missing table error, got {:?}", other),
    }
}
