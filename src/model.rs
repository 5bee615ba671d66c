//! Shared data types for the climate API.
//!
//! The two source tables are declared here rather than discovered from the
//! live database: `station` holds one row per observation site and
//! `measurement` holds one row per (station, date) observation. This service
//! never writes to either table.
//!
//! The response records are the JSON contract of the HTTP API. Field labels
//! differ per endpoint and the daily aggregates are plain arrays; existing
//! callers depend on both.

use serde::Serialize;
use serde_json::Number;

// ---------------------------------------------------------------------------
// Source Tables
// ---------------------------------------------------------------------------

/// Table holding the observation sites.
pub const STATION_TABLE: &str = "station";

/// Table holding the daily observations.
pub const MEASUREMENT_TABLE: &str = "measurement";

/// Columns that `station` must expose.
pub const STATION_COLUMNS: &[&str] = &["station", "name"];

/// Columns that `measurement` must expose.
pub const MEASUREMENT_COLUMNS: &[&str] = &["station", "date", "prcp", "tobs"];

/// A fixed weather-observation site.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// Station code, e.g. `USC00519281`.
    pub station: String,
    pub name: String,
}

/// A single day's observation at a station.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Code of the observing station (references `Station::station`).
    pub station: String,
    /// ISO calendar date (`YYYY-MM-DD`), compared as text.
    pub date: String,
    /// Precipitation; absent on days without a reading.
    pub prcp: Option<f64>,
    /// Temperature observation.
    pub tobs: f64,
}

// ---------------------------------------------------------------------------
// Response Records
// ---------------------------------------------------------------------------

// Stored numbers are carried as `serde_json::Number` so an INTEGER column
// serializes as `70` and a float column as `70.0`.

/// `/api/v1.0/precipitation` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecipitationRecord {
    pub date: String,
    pub prcp: Option<Number>,
}

/// `/api/v1.0/stations` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationRecord {
    pub station: String,
    pub name: String,
}

/// `/api/v1.0/tobs` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureRecord {
    #[serde(rename = "Station Name")]
    pub station_name: String,
    #[serde(rename = "Temp observation")]
    pub temp_observation: Number,
    #[serde(rename = "Date")]
    pub date: String,
}

/// Per-day temperature summary: `(date, min, avg, max)`.
///
/// A tuple struct so it serializes as `["2016-06-06", 70, 70.0, 70]`. Min and
/// max keep the column's type; the average is always a float.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAggregate(pub String, pub Number, pub f64, pub Number);
