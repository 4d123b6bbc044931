//! Certificate routes
//!
//! - `POST /cert/sign`   - first issuance, gated by a ring signature
//! - `POST /cert/resign` - reissue for a registered key
//! - `POST /cert/verify` - check a certificate against this CA
//!
//! The ring signature for `/cert/sign` travels in the `signature` header and
//! covers the canonical request body, i.e. the bound request re-serialized as
//! `{"pub":"<b64>"}`. Clients must sign exactly those bytes.

use hyper::header::HeaderMap;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{json_response, ok_response, parse_json, FullBody};
use crate::keyset::KeysetError;
use crate::server::AppState;
use crate::types::VerifyError;

/// Header carrying the base64 ring signature
pub const SIGNATURE_HEADER: &str = "signature";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertRequest {
    #[serde(rename = "pub")]
    pub pub_key: String,
}

impl CertRequest {
    /// Bytes covered by the ring signature
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, VerifyError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertResponse {
    pub cert: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCertRequest {
    pub cert: String,
}

fn signature_header(headers: &HeaderMap) -> Result<&str, VerifyError> {
    let value = headers
        .get(SIGNATURE_HEADER)
        .ok_or(VerifyError::SignatureMissing)?;
    value.to_str().map_err(|_| {
        warn!("Signature header is not valid ASCII");
        KeysetError::SignatureDecode.into()
    })
}

pub fn handle_sign(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response<FullBody>, VerifyError> {
    let signature = signature_header(headers)?;
    let req: CertRequest = parse_json(body)?;

    state.keyset.verify(&req.canonical_bytes()?, signature)?;
    let cert = state.ca.sign_csr(&req.pub_key)?;

    Ok(json_response(StatusCode::OK, &CertResponse { cert }))
}

pub fn handle_resign(state: &AppState, body: &[u8]) -> Result<Response<FullBody>, VerifyError> {
    let req: CertRequest = parse_json(body)?;
    let cert = state.ca.resign_csr(&req.pub_key)?;
    Ok(json_response(StatusCode::OK, &CertResponse { cert }))
}

pub fn handle_verify_cert(state: &AppState, body: &[u8]) -> Result<Response<FullBody>, VerifyError> {
    let req: VerifyCertRequest = parse_json(body)?;
    state.ca.verify_cert(&req.cert)?;
    Ok(ok_response())
}
