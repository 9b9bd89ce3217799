//! Store errors.
//!
//! This module defines the [`Error`] enum used to represent failures of the
//! backing store drivers. Each variant carries the driver it came from and,
//! when applicable, the source error. External errors from the driver
//! libraries (`mysql`, `redis`, `r2d2`) are converted into this type through
//! the provided `From` implementations.
use std::panic::Location;
use std::sync::Arc;

use super::driver::Driver;

/// A shared, cloneable source error.
pub type DynError = Arc<dyn std::error::Error + Send + Sync>;

/// Store error type encapsulating the failures encountered during store
/// operations.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// The query itself was invalid or improperly formatted, or the driver
    /// rejected it.
    #[error("The {driver} query was malformed: {source}")]
    InvalidQuery { source: DynError, driver: Driver },

    /// A record could not be inserted.
    #[error("Unable to insert record into {driver} store, {location}")]
    InsertFailed {
        location: &'static Location<'static>,
        driver: Driver,
    },

    /// The record to insert already exists.
    #[error("Record already exists in {driver} store, {location}")]
    Duplicate {
        location: &'static Location<'static>,
        driver: Driver,
    },

    /// The record to operate on does not exist.
    #[error("Record not found in {driver} store, {location}")]
    NotFound {
        location: &'static Location<'static>,
        driver: Driver,
    },

    /// The store could not be reached.
    #[error("Failed to connect to {driver} store: {source}")]
    ConnectionError { source: DynError, driver: Driver },

    /// The r2d2 connection pool could not be created or produce a
    /// connection.
    #[error("Failed to use the r2d2 {driver} connection pool: {source}")]
    ConnectionPool {
        source: Arc<r2d2::Error>,
        driver: Driver,
    },
}

impl From<r2d2_mysql::mysql::Error> for Error {
    #[track_caller]
    fn from(err: r2d2_mysql::mysql::Error) -> Self {
        Error::InvalidQuery {
            source: Arc::new(err),
            driver: Driver::MySQL,
        }
    }
}

impl From<r2d2_mysql::mysql::UrlError> for Error {
    #[track_caller]
    fn from(err: r2d2_mysql::mysql::UrlError) -> Self {
        Error::ConnectionError {
            source: Arc::new(err),
            driver: Driver::MySQL,
        }
    }
}

impl From<(r2d2::Error, Driver)> for Error {
    #[track_caller]
    fn from(e: (r2d2::Error, Driver)) -> Self {
        let (err, driver) = e;
        Self::ConnectionPool {
            source: Arc::new(err),
            driver,
        }
    }
}

impl From<redis::RedisError> for Error {
    #[track_caller]
    fn from(err: redis::RedisError) -> Self {
        Error::InvalidQuery {
            source: Arc::new(err),
            driver: Driver::Redis,
        }
    }
}
