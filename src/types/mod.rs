//! Shared types for the verification service

pub mod error;

pub use error::{ErrorResponse, ResponseMessage, Result, VerifyError};
