//! Error types for the crate.
//!
//! Internally, functions return `Res<T>`, which is an `anyhow::Result`. At the public boundary
//! (commands and `Config`) errors are wrapped in `Error`, which carries an `ErrorType` so callers
//! can tell a missing cost centre apart from a failed HTTP request.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The crate-internal result type.
pub(crate) type Res<T> = anyhow::Result<T>;

/// The public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The home directory, `config.json` or the api key could not be used.
    Config,
    /// The SQLite cache failed.
    Database,
    /// A request to the remote accounting service failed.
    Request,
    /// The classification rules file could not be loaded or has no type rules.
    Rules,
    /// A required accounting type, cost centre or contact is missing from the snapshot. Plan
    /// building for the voucher type is aborted.
    Configuration,
    /// Creating or booking vouchers failed.
    Submission,
    /// Anything else.
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// The public error type.
#[derive(Debug)]
pub struct Error {
    error_type: ErrorType,
    inner: anyhow::Error,
}

impl Error {
    pub fn new(error_type: ErrorType, inner: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            inner: inner.into(),
        }
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:#}", self.error_type, self.inner)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::new(ErrorType::Internal, value)
    }
}

/// Converts an internal result into the public `Result`, tagging it with an `ErrorType`.
pub trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_pub_result_tags_error_type() {
        let r: Res<()> = Err(anyhow!("no accounting type named 'Geldtransit'"));
        let e = r.pub_result(ErrorType::Configuration).unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Configuration);
        assert!(e.to_string().starts_with("configuration error:"));
        assert!(e.to_string().contains("Geldtransit"));
    }

    #[test]
    fn test_from_anyhow_is_internal() {
        let e: Error = anyhow!("boom").into();
        assert_eq!(e.error_type(), ErrorType::Internal);
    }
}
