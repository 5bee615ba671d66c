//! Query builder for the station/measurement store.
//!
//! Each function issues its read(s) on a session owned by the caller and
//! returns the raw row tuples; `response` turns them into records.
//!
//! Numeric columns are read in their stored type: INTEGER stays an integer,
//! REAL/DOUBLE PRECISION stays a float, NUMERIC goes through `rust_decimal`.
//! Only the daily average is forced to a float.
//!
//! Date inputs are not validated. They are bound as text and compared with
//! `date::text`, so a malformed date behaves like any other string under
//! text ordering (usually an empty result).

use chrono::{Duration, NaiveDate};
use postgres::types::Type;
use postgres::{Client, Row};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Number;
use tracing::debug;

use crate::config::{AnchorPolicy, TemperatureWindow};
use crate::error::{ApiError, Result};
use crate::model::MEASUREMENT_TABLE;

/// Length of the precipitation window ending at the anchor.
pub const PRECIPITATION_WINDOW_DAYS: i64 = 365;

pub type PrecipitationRow = (String, Option<Number>);
pub type StationRow = (String, String);
pub type TemperatureRow = (String, Number, String);
pub type AggregateRow = (String, Number, f64, Number);

// ---------------------------------------------------------------------------
// Numeric Decoding
// ---------------------------------------------------------------------------

/// Decode a nullable numeric column according to its Postgres type.
fn number_at(row: &Row, idx: usize) -> Result<Option<Number>> {
    let ty = row.columns()[idx].type_();

    let number = if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(Number::from)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(Number::from)
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Number::from)
    } else if *ty == Type::FLOAT4 {
        match row.try_get::<_, Option<f32>>(idx)? {
            Some(v) => Some(float_to_number(f64::from(v))?),
            None => None,
        }
    } else if *ty == Type::FLOAT8 {
        match row.try_get::<_, Option<f64>>(idx)? {
            Some(v) => Some(float_to_number(v)?),
            None => None,
        }
    } else if *ty == Type::NUMERIC {
        match row.try_get::<_, Option<Decimal>>(idx)? {
            Some(d) => Some(decimal_to_number(d).ok_or_else(|| {
                ApiError::data(MEASUREMENT_TABLE, format!("NUMERIC {} out of range", d))
            })?),
            None => None,
        }
    } else {
        return Err(ApiError::data(
            MEASUREMENT_TABLE,
            format!("column {} has non-numeric type {}", row.columns()[idx].name(), ty),
        ));
    };

    Ok(number)
}

/// Decode a numeric column that must not be NULL.
fn required_number_at(row: &Row, idx: usize) -> Result<Number> {
    number_at(row, idx)?.ok_or_else(|| {
        ApiError::data(
            MEASUREMENT_TABLE,
            format!("unexpected NULL in {}", row.columns()[idx].name()),
        )
    })
}

fn float_to_number(value: f64) -> Result<Number> {
    Number::from_f64(value)
        .ok_or_else(|| ApiError::data(MEASUREMENT_TABLE, format!("{} is not a finite number", value)))
}

/// Whole NUMERIC values become integers, fractional ones floats.
pub fn decimal_to_number(value: Decimal) -> Option<Number> {
    if value.scale() == 0 {
        value.to_i64().map(Number::from)
    } else {
        value.to_f64().and_then(Number::from_f64)
    }
}

// ---------------------------------------------------------------------------
// Precipitation
// ---------------------------------------------------------------------------

/// First date of the precipitation window ending at `anchor`.
pub fn window_start(anchor: NaiveDate) -> NaiveDate {
    anchor - Duration::days(PRECIPITATION_WINDOW_DAYS)
}

/// Latest observation date, `None` when `measurement` is empty.
pub fn latest_date(client: &mut Client) -> Result<Option<NaiveDate>> {
    let row = client.query_one("SELECT MAX(date::text) FROM measurement", &[])?;
    let latest: Option<String> = row.try_get(0)?;

    latest
        .map(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                ApiError::data(
                    MEASUREMENT_TABLE,
                    format!("latest date {:?} is not an ISO date: {}", raw, e),
                )
            })
        })
        .transpose()
}

/// Resolve the window anchor according to `policy`.
pub fn resolve_anchor(client: &mut Client, policy: AnchorPolicy) -> Result<Option<NaiveDate>> {
    match policy {
        AnchorPolicy::Latest => latest_date(client),
        AnchorPolicy::Fixed(date) => Ok(Some(date)),
    }
}

/// `(date, prcp)` for every measurement in the year ending at the anchor.
///
/// Only a lower bound is applied; rows come back in storage order.
pub fn precipitation(client: &mut Client, policy: AnchorPolicy) -> Result<Vec<PrecipitationRow>> {
    let Some(anchor) = resolve_anchor(client, policy)? else {
        debug!("measurement table is empty, no precipitation window");
        return Ok(Vec::new());
    };

    let start = window_start(anchor).format("%Y-%m-%d").to_string();
    debug!(%anchor, %start, "precipitation window");

    let rows = client.query(
        "SELECT date::text, prcp FROM measurement WHERE date::text >= $1",
        &[&start],
    )?;

    rows.iter()
        .map(|row| -> Result<PrecipitationRow> { Ok((row.try_get(0)?, number_at(row, 1)?)) })
        .collect()
}

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

/// Every `(station, name)` pair, unordered.
pub fn stations(client: &mut Client) -> Result<Vec<StationRow>> {
    let rows = client.query("SELECT station::text, name::text FROM station", &[])?;

    rows.iter()
        .map(|row| -> Result<StationRow> { Ok((row.try_get(0)?, row.try_get(1)?)) })
        .collect()
}

// ---------------------------------------------------------------------------
// Temperature Observations
// ---------------------------------------------------------------------------

/// Station with the most measurements. Ties go to the lowest station code.
pub fn most_active_station(client: &mut Client) -> Result<Option<String>> {
    let row = client.query_opt(
        "SELECT station::text
         FROM measurement
         GROUP BY station
         ORDER BY COUNT(*) DESC, station ASC
         LIMIT 1",
        &[],
    )?;

    Ok(match row {
        Some(row) => Some(row.try_get(0)?),
        None => None,
    })
}

/// `(station name, tobs, date)` for the most active station within `window`.
///
/// Empty when there are no measurements at all.
pub fn recent_temperatures(
    client: &mut Client,
    window: &TemperatureWindow,
) -> Result<Vec<TemperatureRow>> {
    let Some(station) = most_active_station(client)? else {
        debug!("no measurements, skipping temperature listing");
        return Ok(Vec::new());
    };
    debug!(%station, start = %window.start, end = %window.end, "temperature listing");

    let rows = client.query(
        "SELECT s.name::text, m.tobs, m.date::text
         FROM measurement m
         JOIN station s ON s.station = m.station
         WHERE m.station::text = $1
           AND m.date::text >= $2
           AND m.date::text <= $3",
        &[&station, &window.start, &window.end],
    )?;

    rows.iter()
        .map(|row| -> Result<TemperatureRow> {
            Ok((row.try_get(0)?, required_number_at(row, 1)?, row.try_get(2)?))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Daily Aggregates
// ---------------------------------------------------------------------------

/// Per-day `(date, min, avg, max)` of `tobs` for every date `>= start`.
pub fn daily_aggregates_from(client: &mut Client, start: &str) -> Result<Vec<AggregateRow>> {
    let rows = client.query(
        "SELECT date::text, MIN(tobs), AVG(tobs)::float8, MAX(tobs)
         FROM measurement
         WHERE date::text >= $1
         GROUP BY date
         ORDER BY date",
        &[&start],
    )?;

    collect_aggregates(&rows)
}

/// Per-day `(date, min, avg, max)` of `tobs` for `start <= date <= end`.
///
/// An `end` before `start` simply matches nothing.
pub fn daily_aggregates_between(
    client: &mut Client,
    start: &str,
    end: &str,
) -> Result<Vec<AggregateRow>> {
    let rows = client.query(
        "SELECT date::text, MIN(tobs), AVG(tobs)::float8, MAX(tobs)
         FROM measurement
         WHERE date::text >= $1 AND date::text <= $2
         GROUP BY date
         ORDER BY date",
        &[&start, &end],
    )?;

    collect_aggregates(&rows)
}

fn collect_aggregates(rows: &[Row]) -> Result<Vec<AggregateRow>> {
    rows.iter()
        .map(|row| -> Result<AggregateRow> {
            Ok((
                row.try_get(0)?,
                required_number_at(row, 1)?,
                row.try_get(2)?,
                required_number_at(row, 3)?,
            ))
        })
        .collect()
}
