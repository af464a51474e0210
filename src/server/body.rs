//! Request body and header helpers.

use super::ApiError;
use crate::constants::INSTALL_PATH_SUFFIX;
use axum::http::header::HOST;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Parse a JSON body
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] for an empty or undecodable body.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("request body is empty".to_string()));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Known fields go to `inner`, everything else lands in `unknown`
#[derive(Deserialize)]
struct Strict<T> {
    #[serde(flatten)]
    inner: T,
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

/// Parse a JSON body, rejecting fields `T` does not know
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] for an empty or undecodable body, or one
/// carrying an unknown field.
pub fn parse_strict<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let Strict { inner, unknown } = parse_body::<Strict<T>>(body)?;
    match unknown.keys().next() {
        Some(field) => Err(ApiError::BadRequest(format!("unknown field `{field}`"))),
        None => Ok(inner),
    }
}

/// Public base URL the caller reached this API under
///
/// The scheme comes from `X-Forwarded-Proto` and defaults to `http`.
#[must_use]
pub fn public_base_url(headers: &HeaderMap) -> String {
    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}

/// Install URL for a bootstrap token
#[must_use]
pub fn install_url(base_url: &str, token: &str) -> String {
    format!("{base_url}{INSTALL_PATH_SUFFIX}?token={token}")
}
