//! Conversions from external infrastructure errors into domain errors.

use beacon_domain::BeaconError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub BeaconError);

impl From<InfraError> for BeaconError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<BeaconError> for InfraError {
    fn from(value: BeaconError) -> Self {
        InfraError(value)
    }
}

trait IntoBeaconError {
    fn into_beacon(self) -> BeaconError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → BeaconError */
/* -------------------------------------------------------------------------- */

impl IntoBeaconError for SqlError {
    fn into_beacon(self) -> BeaconError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => BeaconError::Storage("database is busy".into()),
                    ErrorCode::DatabaseLocked => BeaconError::Storage("database is locked".into()),
                    ErrorCode::DiskFull => BeaconError::Storage("disk is full".into()),
                    ErrorCode::ReadOnly => BeaconError::Storage("database is read-only".into()),
                    ErrorCode::NotADatabase => {
                        BeaconError::Storage("file is not a SQLite database".into())
                    }
                    _ => BeaconError::Storage(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => BeaconError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                BeaconError::Storage(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                BeaconError::Storage(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => BeaconError::Storage("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidPath(path) => BeaconError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => BeaconError::Storage(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_beacon())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → BeaconError */
/* -------------------------------------------------------------------------- */

impl IntoBeaconError for r2d2::Error {
    fn into_beacon(self) -> BeaconError {
        BeaconError::Storage(format!("connection pool error: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_beacon())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → BeaconError */
/* -------------------------------------------------------------------------- */

impl IntoBeaconError for HttpError {
    fn into_beacon(self) -> BeaconError {
        if self.is_timeout() {
            return BeaconError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return BeaconError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return BeaconError::InvalidInput(format!("invalid HTTP request: {self}"));
        }

        BeaconError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_beacon())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error / serde_json::Error → BeaconError */
/* -------------------------------------------------------------------------- */

impl IntoBeaconError for std::io::Error {
    fn into_beacon(self) -> BeaconError {
        match self.kind() {
            std::io::ErrorKind::NotFound => BeaconError::NotFound(self.to_string()),
            std::io::ErrorKind::TimedOut => BeaconError::Network(self.to_string()),
            _ => BeaconError::Storage(format!("I/O error: {self}")),
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(value.into_beacon())
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(BeaconError::from(value))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
