//! Certificate authority errors

use hyper::StatusCode;

use crate::types::ErrorResponse;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CertError {
    // ========================================================================
    // Request errors
    // ========================================================================
    #[error("Cert: Public Key Decode Error.")]
    PubDecode,

    #[error("Cert: Invalid Public Key Format.")]
    PubFormat,

    #[error("Cert: Public Key Not Registered.")]
    PubNotFound,

    #[error("Cert: Certificate Decode Error.")]
    CertDecode,

    #[error("Cert: Certificate Bad Request")]
    CertFormat,

    #[error("Cert: Certificate Not Signed by the Verification Server")]
    CertUnauthorized,

    #[error("Cert: InternalError")]
    CertInternal,

    // ========================================================================
    // CA identity load errors
    // ========================================================================
    #[error("Cert: Cannot read {path}: {reason}")]
    FileRead { path: String, reason: String },

    #[error("Cert: Cannot decode PEM in {path}")]
    PemDecode { path: String },

    #[error("Cert: Expected PEM label {expected} in {path}, found {found}")]
    PemLabel {
        path: String,
        expected: String,
        found: String,
    },

    #[error("Cert: Cannot parse CA private key: {0}")]
    KeyParse(String),

    #[error("Cert: Cannot parse CA certificate: {0}")]
    CertParse(String),

    #[error("Cert: CA private key does not match the CA certificate")]
    KeyMismatch,

    #[error("Cert: Invalid configuration ({})", .0.join("; "))]
    Config(Vec<String>),
}

impl ErrorResponse for CertError {
    fn code(&self) -> &'static str {
        match self {
            Self::PubDecode => "C0001",
            Self::PubFormat => "C0002",
            Self::PubNotFound => "C0003",
            Self::CertDecode => "C0004",
            Self::CertFormat => "C0005",
            Self::CertUnauthorized => "C0006",
            Self::CertInternal => "C0007",
            Self::FileRead { .. } => "C0100",
            Self::PemDecode { .. } => "C0101",
            Self::PemLabel { .. } => "C0102",
            Self::KeyParse(_) => "C0103",
            Self::CertParse(_) => "C0104",
            Self::KeyMismatch => "C0105",
            Self::Config(_) => "C0106",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::PubDecode | Self::PubFormat | Self::CertDecode | Self::CertFormat => {
                StatusCode::BAD_REQUEST
            }
            Self::PubNotFound => StatusCode::NOT_FOUND,
            Self::CertUnauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
