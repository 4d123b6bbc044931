//! Passcode routes
//!
//! - `POST /auth/email`  - send a passcode to an account
//! - `POST /auth/verify` - exchange a passcode for a ring credential

use hyper::{Response, StatusCode};
use serde::Deserialize;

use super::{json_response, ok_response, parse_json, FullBody};
use crate::server::AppState;
use crate::types::VerifyError;

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub account: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub account: String,
    pub code: String,
}

pub fn handle_email(state: &AppState, body: &[u8]) -> Result<Response<FullBody>, VerifyError> {
    let req: EmailRequest = parse_json(body)?;
    state.passcode.issue(&req.account)?;
    Ok(ok_response())
}

/// A correct passcode is answered with a freshly dispatched credential
pub fn handle_verify(state: &AppState, body: &[u8]) -> Result<Response<FullBody>, VerifyError> {
    let req: VerifyRequest = parse_json(body)?;
    state.passcode.verify(&req.account, &req.code)?;

    let credential = state.keyset.dispatch();
    Ok(json_response(StatusCode::OK, &credential))
}
