//! Passcode errors

use hyper::StatusCode;

use crate::types::ErrorResponse;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasscodeError {
    #[error("Email: Invalid Account Format.")]
    AccountFormat,

    #[error("Email: Invalid Validation Code Format.")]
    CodeFormat,

    #[error("Email: Duplicated Email. Please resend after the current code expires.")]
    Duplicate,

    #[error("Email: Account is not found or the code is already invalid.")]
    NotFound,

    #[error("Email: Validation Code Mismatch.")]
    Mismatch,

    #[error("Email: Internal Server Error.")]
    Internal,

    #[error("Email: Invalid configuration ({})", .0.join("; "))]
    Config(Vec<String>),
}

impl ErrorResponse for PasscodeError {
    fn code(&self) -> &'static str {
        match self {
            Self::AccountFormat => "E0001",
            Self::CodeFormat => "E0002",
            Self::Duplicate => "E0003",
            Self::NotFound => "E0004",
            Self::Mismatch => "E0005",
            Self::Internal => "E0006",
            Self::Config(_) => "X0001",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::AccountFormat | Self::CodeFormat | Self::Duplicate => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Mismatch => StatusCode::UNAUTHORIZED,
            Self::Internal | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Delivery failure reported by a [`Mailer`](super::Mailer)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);
