//! HTTP routes for the verification service
//!
//! Handlers are synchronous: they receive the already-collected request body
//! and call straight into the core components held by [`AppState`].
//!
//! [`AppState`]: crate::server::AppState

pub mod auth;
pub mod cert;
pub mod health;

pub use auth::{handle_email, handle_verify};
pub use cert::{handle_resign, handle_sign, handle_verify_cert};
pub use health::health_check;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::types::{ResponseMessage, VerifyError};

/// Largest request body accepted by any route
pub const MAX_BODY_BYTES: usize = 16 * 1024;

pub type FullBody = Full<Bytes>;

/// Serialize `body` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());

    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// `{"code":"N0001","message":"OK"}`
pub fn ok_response() -> Response<FullBody> {
    json_response(StatusCode::OK, &ResponseMessage::ok())
}

pub fn error_response(err: VerifyError) -> Response<FullBody> {
    let (status, body) = err.into_status_code_and_body();
    debug!(code = %body.code, status = status.as_u16(), "Request failed");
    json_response(status, &body)
}

/// Bind a JSON request body
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, VerifyError> {
    serde_json::from_slice(body).map_err(|e| VerifyError::BadRequest(format!("Invalid JSON: {}", e)))
}
