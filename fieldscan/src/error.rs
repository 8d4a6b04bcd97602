//! Engine error implementation.
//!
//! Two families, mirroring the runtime policy: [`Error`] aborts startup,
//! [`LinkError`] never escapes the scan loop: affected points decay to
//! NULL samples and the cycle carries on.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Fatal engine errors. Only configuration and schema problems abort the
/// process; everything field-side is recoverable.
#[derive(Debug, Error)]
pub enum Error {
    /// The fleet description was rejected.
    #[error("configuration rejected: {0}")]
    Config(#[from] fieldscan_config::ConfigError),
    /// Two active registers map onto one column name.
    #[error("column `{0}` is produced by more than one active register")]
    DuplicateColumn(String),
    /// The database was unreachable at startup.
    #[error("database connection failed: {0}")]
    Database(#[source] sqlx::Error),
    /// DDL against the target table failed at startup.
    #[error("schema reconciliation failed: {0}")]
    Schema(#[source] sqlx::Error),
}

/// Recoverable field-side failures.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The client could not establish its link.
    #[error("connect to `{endpoint}` failed: {source}")]
    Connect {
        /// Endpoint `src` that refused us.
        endpoint: String,
        /// Underlying transport error.
        source: io::Error,
    },
    /// Transport-level failure on an established link.
    #[error("link i/o failed: {0}")]
    Io(#[from] io::Error),
    /// The device answered with a Modbus exception.
    #[error("modbus exception: {0}")]
    Protocol(String),
    /// The device did not answer inside the configured window.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}
