//! Keyset errors

use hyper::StatusCode;

use crate::types::ErrorResponse;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeysetError {
    #[error("Signature: Message Verification Failure.")]
    SignatureVerification,

    #[error("Signature: Signature Decode Error.")]
    SignatureDecode,

    #[error("Keyset: Invalid configuration ({})", .0.join("; "))]
    Config(Vec<String>),
}

impl ErrorResponse for KeysetError {
    fn code(&self) -> &'static str {
        match self {
            Self::SignatureVerification => "A9999",
            Self::SignatureDecode => "A9998",
            Self::Config(_) => "X0001",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::SignatureVerification => StatusCode::UNAUTHORIZED,
            Self::SignatureDecode => StatusCode::BAD_REQUEST,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failures inside a ring-signature primitive
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    #[error("ring is empty")]
    EmptyRing,

    #[error("signer index {index} is outside a ring of {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("secret key does not match ring member {0}")]
    KeyMismatch(usize),

    #[error("malformed encoding: {0}")]
    Malformed(String),
}
