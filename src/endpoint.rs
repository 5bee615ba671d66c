/// HTTP endpoint for the climate API
///
/// Read-only JSON API over the station/measurement store.
///
/// Endpoints:
/// - GET /                          - Route listing (HTML)
/// - GET /api/v1.0/precipitation    - Last year of precipitation readings
/// - GET /api/v1.0/stations         - All stations
/// - GET /api/v1.0/tobs             - 2016 temperatures of the busiest station
/// - GET /api/v1.0/{start}          - Daily min/avg/max temperature from start
/// - GET /api/v1.0/{start}/{end}    - Daily min/avg/max temperature in range
///
/// Each request runs on a pool worker and opens its own database session,
/// which is dropped before the response is written.

use std::sync::Arc;

use postgres::Client;
use serde::Serialize;
use threadpool::ThreadPool;
use tracing::{debug, error, info, warn};

use crate::config::{AnchorPolicy, ApiConfig, TemperatureWindow};
use crate::db::DataSource;
use crate::error::{ApiError, Result};
use crate::{query, response};

/// Path prefix shared by every JSON route.
pub const API_PREFIX: &str = "/api/v1.0";

const AVAILABLE_ENDPOINTS: &[&str] = &[
    "/",
    "/api/v1.0/precipitation",
    "/api/v1.0/stations",
    "/api/v1.0/tobs",
    "/api/v1.0/{start}",
    "/api/v1.0/{start}/{end}",
];

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// A request path resolved to one of the fixed routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Index,
    Precipitation,
    Stations,
    Tobs,
    Start(String),
    StartEnd(String, String),
    NotFound,
}

impl Route {
    /// Resolve a request URL. The query string is ignored and path segments
    /// are percent-decoded; dates are otherwise taken as-is.
    pub fn parse(url: &str) -> Route {
        let path = url.split('?').next().unwrap_or_default();
        let path = path.trim_end_matches('/');

        if path.is_empty() {
            return Route::Index;
        }

        let Some(rest) = path.strip_prefix(API_PREFIX).and_then(|r| r.strip_prefix('/')) else {
            return Route::NotFound;
        };

        let segments: Vec<&str> = rest.split('/').collect();
        match segments.as_slice() {
            ["precipitation"] => Route::Precipitation,
            ["stations"] => Route::Stations,
            ["tobs"] => Route::Tobs,
            [start] if !start.is_empty() => Route::Start(decode_segment(start)),
            [start, end] if !start.is_empty() && !end.is_empty() => {
                Route::StartEnd(decode_segment(start), decode_segment(end))
            }
            _ => Route::NotFound,
        }
    }
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Transport-independent response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl ApiResponse {
    fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body,
        }
    }

    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(body) => Self {
                status,
                content_type: "application/json",
                body,
            },
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                Self::error(500, "Failed to serialize response")
            }
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: serde_json::json!({ "error": message }).to_string(),
        }
    }
}

/// Route listing served at `/`.
pub fn index_page() -> String {
    [
        "*List of Available Routes:<br/><br/>",
        "*Date and Precipitation.<br/>",
        "  /api/v1.0/precipitation<br/><br/>",
        "*stations.<br/>",
        "  /api/v1.0/stations<br/><br/>",
        "*temperature observations (TOBS) for the previous year.<br/>",
        "  /api/v1.0/tobs<br/><br/>",
        "*the minimum temperature, the average temperature, and the max temperature for a given start range.<br/>",
        "  /api/v1.0/&lt;start_date&gt;<br/><br/>",
        "example: /api/v1.0/2016-06-06<br/><br/>",
        "*the minimum temperature, the average temperature, and the max temperature for a given start-end range.<br/>",
        "  /api/v1.0/&lt;start_date&gt;/&lt;end_date&gt;<br/><br/>",
        "example: /api/v1.0/2016-06-06/2016-07-07<br/><br/>",
    ]
    .concat()
}

// ---------------------------------------------------------------------------
// Request Handling
// ---------------------------------------------------------------------------

/// Everything a request handler needs, passed explicitly.
#[derive(Debug, Clone)]
pub struct Api {
    source: DataSource,
    anchor: AnchorPolicy,
    tobs_window: TemperatureWindow,
}

impl Api {
    pub fn new(source: DataSource, anchor: AnchorPolicy, tobs_window: TemperatureWindow) -> Self {
        Self {
            source,
            anchor,
            tobs_window,
        }
    }

    pub fn from_config(config: &ApiConfig, source: DataSource) -> Self {
        Self::new(source, config.anchor(), config.tobs.clone())
    }

    /// Answer one request.
    pub fn respond(&self, method: &str, url: &str) -> ApiResponse {
        if !method.eq_ignore_ascii_case("GET") && !method.eq_ignore_ascii_case("HEAD") {
            return ApiResponse::error(405, "Method not allowed");
        }

        match Route::parse(url) {
            Route::Index => ApiResponse::html(index_page()),
            Route::Precipitation => self.with_session(|client| {
                query::precipitation(client, self.anchor).map(response::precipitation_records)
            }),
            Route::Stations => self.with_session(|client| {
                query::stations(client).map(response::station_records)
            }),
            Route::Tobs => self.with_session(|client| {
                query::recent_temperatures(client, &self.tobs_window)
                    .map(response::temperature_records)
            }),
            Route::Start(start) => self.with_session(|client| {
                query::daily_aggregates_from(client, &start).map(response::daily_aggregates)
            }),
            Route::StartEnd(start, end) => self.with_session(|client| {
                query::daily_aggregates_between(client, &start, &end)
                    .map(response::daily_aggregates)
            }),
            Route::NotFound => ApiResponse::json(
                404,
                &serde_json::json!({
                    "error": "Not found",
                    "available_endpoints": AVAILABLE_ENDPOINTS,
                }),
            ),
        }
    }

    /// Run `f` on a fresh session. The session is closed before the body is
    /// serialized, on success and failure alike.
    fn with_session<T, F>(&self, f: F) -> ApiResponse
    where
        T: Serialize,
        F: FnOnce(&mut Client) -> Result<T>,
    {
        let result = self
            .source
            .session()
            .map_err(ApiError::from)
            .and_then(|mut client| f(&mut client));

        match result {
            Ok(value) => ApiResponse::json(200, &value),
            Err(e) => {
                error!("Request failed: {}", e);
                ApiResponse::error(500, e.public_message())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start the HTTP server and block serving requests.
pub fn serve(config: &ApiConfig, api: Api) -> Result<()> {
    let addr = config.listen_addr();
    let server = tiny_http::Server::http(&addr)
        .map_err(|e| ApiError::server(format!("Failed to start HTTP server on {}: {}", addr, e)))?;

    info!("HTTP endpoint listening on http://{}", addr);
    info!("Serving {} with {} workers", API_PREFIX, config.workers);

    let pool = ThreadPool::new(config.workers);
    let api = Arc::new(api);

    for request in server.incoming_requests() {
        let api = Arc::clone(&api);
        pool.execute(move || handle_request(&api, request));
    }

    pool.join();
    Ok(())
}

fn handle_request(api: &Api, request: tiny_http::Request) {
    let method = request.method().to_string();
    let url = request.url().to_string();
    debug!(%method, %url, "request received");

    let reply = api.respond(&method, &url);
    if reply.status >= 500 {
        warn!(%method, %url, status = reply.status, "request failed");
    } else {
        info!(%method, %url, status = reply.status, "request served");
    }

    if let Err(e) = request.respond(create_response(reply)) {
        error!("Failed to send response: {}", e);
    }
}

/// Convert an `ApiResponse` into a tiny_http response.
fn create_response(reply: ApiResponse) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let mut response = tiny_http::Response::from_data(reply.body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(reply.status));

    if let Ok(header) =
        tiny_http::Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes())
    {
        response = response.with_header(header);
    }

    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
