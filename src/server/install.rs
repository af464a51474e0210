//! Install manifest handler.

use super::body::public_base_url;
use super::{ApiError, AppState};
use crate::install::{self, InstallRequest};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct InstallQuery {
    pub token: Option<String>,
}

/// Serve the agent manifests for a bootstrap token
///
/// Runs with the service's own identity; the token itself is the credential.
pub async fn install_steward(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<InstallQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let token = query.ok().and_then(|Query(q)| q.token);
    let store = state.resolver.service_client().await?;
    let api_url = public_base_url(&headers);
    let request = InstallRequest {
        token: token.as_deref(),
        api_url: &api_url,
        image: &state.config.steward_image,
    };
    let bundle = install::install_steward(store.as_ref(), &request, Utc::now()).await?;
    Ok(Json(bundle))
}
