/// Response shaping: row tuples → serializable records
///
/// One mapping per endpoint. Order is preserved and values pass through
/// untouched: no rounding, no unit conversion, a missing `prcp` stays `None`.

use crate::model::{
    DailyAggregate, PrecipitationRecord, StationRecord, TemperatureRecord,
};
use crate::query::{AggregateRow, PrecipitationRow, StationRow, TemperatureRow};

pub fn precipitation_records(rows: Vec<PrecipitationRow>) -> Vec<PrecipitationRecord> {
    rows.into_iter()
        .map(|(date, prcp)| PrecipitationRecord { date, prcp })
        .collect()
}

pub fn station_records(rows: Vec<StationRow>) -> Vec<StationRecord> {
    rows.into_iter()
        .map(|(station, name)| StationRecord { station, name })
        .collect()
}

pub fn temperature_records(rows: Vec<TemperatureRow>) -> Vec<TemperatureRecord> {
    rows.into_iter()
        .map(|(station_name, temp_observation, date)| TemperatureRecord {
            station_name,
            temp_observation,
            date,
        })
        .collect()
}

/// Aggregates stay positional; they serialize as `[date, min, avg, max]`.
pub fn daily_aggregates(rows: Vec<AggregateRow>) -> Vec<DailyAggregate> {
    rows.into_iter()
        .map(|(date, min, avg, max)| DailyAggregate(date, min, avg, max))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
