/// climate_api: read-only JSON API over a station/measurement weather store.
///
/// # Module structure
///
/// ```text
/// climate_api
/// ├── model     — declared source tables and response records
/// ├── config    — service configuration loader (climate_api.toml)
/// ├── db        — explicit data source handle, per-request sessions, table checks
/// ├── query     — date-bounded reads and daily temperature aggregates
/// ├── response  — row tuples → endpoint-specific records
/// ├── endpoint  — routing and the tiny_http server
/// └── error     — ApiError and the crate Result alias
/// ```

/// Public modules
pub mod config;
pub mod db;
pub mod endpoint;
pub mod error;
pub mod model;
pub mod query;
pub mod response;
