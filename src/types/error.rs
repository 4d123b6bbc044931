//! Error types for the verification service
//!
//! Each module owns a `thiserror` enum for its own failure modes. Every one of
//! them implements [`ErrorResponse`], which gives the HTTP layer a stable
//! machine-readable code, a status class and the JSON body shape.

use hyper::StatusCode;
use serde::{Deserialize, Serialize};

use crate::cache::CacheError;
use crate::cert::CertError;
use crate::keyset::KeysetError;
use crate::passcode::PasscodeError;

/// JSON body returned for every error (and for bare "OK" acknowledgements)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub code: String,
    pub message: String,
}

impl ResponseMessage {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Acknowledgement body for requests with no payload to return
    pub fn ok() -> Self {
        Self::new("N0001", "OK")
    }
}

/// Mapping from a domain error onto the wire
pub trait ErrorResponse: std::error::Error {
    /// Stable machine-readable code, e.g. `A9999`
    fn code(&self) -> &'static str;

    /// HTTP status class for this error
    fn status_code(&self) -> StatusCode;

    /// Body for the HTTP response
    fn message(&self) -> ResponseMessage {
        ResponseMessage::new(self.code(), self.to_string())
    }
}

/// Crate-level error for callers that compose several components
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Keyset(#[from] KeysetError),

    #[error(transparent)]
    Cert(#[from] CertError),

    #[error(transparent)]
    Passcode(#[from] PasscodeError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Request: Signature missing in header")]
    SignatureMissing,

    #[error("Request: Bad request ({0})")]
    BadRequest(String),

    #[error("Request: No route for {0}")]
    RouteNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ErrorResponse for VerifyError {
    fn code(&self) -> &'static str {
        match self {
            Self::Keyset(e) => e.code(),
            Self::Cert(e) => e.code(),
            Self::Passcode(e) => e.code(),
            Self::Cache(e) => e.code(),
            Self::SignatureMissing => "S0010",
            Self::BadRequest(_) => "B0001",
            Self::RouteNotFound(_) => "B0404",
            Self::Internal(_) => "X0002",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Keyset(e) => e.status_code(),
            Self::Cert(e) => e.status_code(),
            Self::Passcode(e) => e.status_code(),
            Self::Cache(e) => e.status_code(),
            Self::SignatureMissing => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl VerifyError {
    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, ResponseMessage) {
        (self.status_code(), self.message())
    }
}

impl From<std::io::Error> for VerifyError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for VerifyError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for VerifyError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, VerifyError>;
