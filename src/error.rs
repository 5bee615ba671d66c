//! Error types for the climate API.

use thiserror::Error;

use crate::db::DbConfigError;

/// Errors raised while answering a request or starting the service.
///
/// Empty results are never errors: every query returns an empty vector
/// instead.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The data source could not be reached or configured
    #[error(transparent)]
    DataSource(#[from] DbConfigError),

    /// A query failed inside the database
    #[error("Database query failed: {0}")]
    Database(#[from] postgres::Error),

    /// The database returned a value this service cannot interpret
    #[error("Unexpected data in {table}: {message}")]
    Data { table: String, message: String },

    /// The configuration file is missing values or malformed
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// HTTP server failures (bind, socket)
    #[error("HTTP server error: {message}")]
    Server { message: String },
}

impl ApiError {
    pub fn data<T: Into<String>, M: Into<String>>(table: T, message: M) -> Self {
        Self::Data {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Short message safe to send to HTTP clients. The full error, with
    /// operator hints, only goes to the log.
    pub fn public_message(&self) -> &'static str {
        match self {
            ApiError::DataSource(_) => "Database unavailable",
            ApiError::Database(_) => "Database query failed",
            ApiError::Data { .. } => "Unexpected data in store",
            ApiError::Config { .. } | ApiError::Server { .. } => "Internal server error",
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ApiError>;
