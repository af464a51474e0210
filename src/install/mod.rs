//! # Install Handshake
//!
//! A new cluster fetches its agent manifests once, authenticated by the
//! bootstrap token stored in the cluster's status instead of a caller
//! credential.
//!
//! ## Flow
//!
//! 1. Find the cluster holding the presented token.
//! 2. Check the token is still valid and unexpired.
//! 3. Pick the service-account token the agent will use.
//! 4. Assemble the manifest bundle.
//! 5. Mark the bootstrap token as used. This write is the single-use commit
//!    point and is retried once on conflict.
//!
//! The bundle is only returned once the commit succeeded. Two concurrent
//! handshakes with the same token can both pass step 2; the one that loses the
//! commit sees the token already consumed after its retry and is rejected.

mod manifests;

pub use manifests::{build_manifests, ManifestParams};

use crate::constants::{SERVICE_ACCOUNT_NAME_ANNOTATION, SERVICE_ACCOUNT_TOKEN_TYPE};
use crate::crd::Cluster;
use crate::observability::metrics;
use crate::store::{retry_once_on_conflict, ResourceStore, StoreError};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Missing or malformed token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token already used or expired")]
    TokenExpiredOrUsed,

    #[error("No service account token available for cluster {cluster}")]
    NoServiceAccountToken { cluster: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to serialize install manifests: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl InstallError {
    /// Metric label for a failed handshake
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            InstallError::MissingToken => "missing_token",
            InstallError::InvalidToken => "invalid_token",
            InstallError::TokenExpiredOrUsed => "token_used_or_expired",
            InstallError::NoServiceAccountToken { .. } => "no_service_account_token",
            InstallError::Store(_) | InstallError::Serialization(_) => "error",
        }
    }
}

/// Inputs of one handshake
#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    /// Token from the query string, if any
    pub token: Option<&'a str>,
    /// Public base URL of this API
    pub api_url: &'a str,
    pub image: &'a str,
}

/// Result of marking a bootstrap token as used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Consumed,
    /// Another handshake consumed the token first
    AlreadyConsumed,
}

/// Cluster whose bootstrap token equals `token`
///
/// # Errors
///
/// Returns [`InstallError::InvalidToken`] if no cluster holds the token.
pub async fn find_cluster_by_token(
    store: &dyn ResourceStore,
    token: &str,
) -> Result<Cluster, InstallError> {
    store
        .list_clusters(None)
        .await?
        .into_iter()
        .find(|c| {
            c.status
                .as_ref()
                .and_then(|s| s.bootstrap_token.as_ref())
                .is_some_and(|t| t.token == token)
        })
        .ok_or(InstallError::InvalidToken)
}

/// Whether the cluster's bootstrap token may be used at `now`
///
/// # Errors
///
/// Returns [`InstallError::TokenExpiredOrUsed`] otherwise.
pub fn check_token(cluster: &Cluster, now: DateTime<Utc>) -> Result<(), InstallError> {
    let usable = cluster
        .status
        .as_ref()
        .and_then(|s| s.bootstrap_token.as_ref())
        .is_some_and(|t| t.is_usable_at(now));
    if usable {
        Ok(())
    } else {
        Err(InstallError::TokenExpiredOrUsed)
    }
}

fn service_account_token<'a>(secret: &'a Secret, account: &str) -> Option<&'a str> {
    if secret.type_.as_deref() != Some(SERVICE_ACCOUNT_TOKEN_TYPE) {
        return None;
    }
    let owner = secret.annotations().get(SERVICE_ACCOUNT_NAME_ANNOTATION)?;
    if owner != account {
        return None;
    }
    let token = secret.data.as_ref()?.get("token")?;
    std::str::from_utf8(&token.0).ok().filter(|t| !t.is_empty())
}

/// Token of the oldest service-account secret belonging to `account`
///
/// Secrets of another type, of another account or without a token are
/// ignored. Secrets with equal creation times keep their list order.
#[must_use]
pub fn select_service_account_token<'a>(secrets: &'a [Secret], account: &str) -> Option<&'a str> {
    secrets
        .iter()
        .filter_map(|s| service_account_token(s, account).map(|t| (s, t)))
        .min_by_key(|(s, _)| s.metadata.creation_timestamp.clone())
        .map(|(_, token)| token)
}

/// Set the token of a cluster to used, unless it already is
async fn consume(
    store: &dyn ResourceStore,
    mut cluster: Cluster,
    token: &str,
) -> Result<Commit, StoreError> {
    let Some(bootstrap) = cluster
        .status
        .as_mut()
        .and_then(|s| s.bootstrap_token.as_mut())
        .filter(|t| t.token == token && t.token_valid)
    else {
        return Ok(Commit::AlreadyConsumed);
    };
    bootstrap.token_valid = false;
    store.update_cluster_status(&cluster).await?;
    Ok(Commit::Consumed)
}

/// Mark the bootstrap token of `cluster` as used
///
/// The first attempt writes against the revision that was validated; a retry
/// after a conflict re-reads the cluster.
///
/// # Errors
///
/// Returns the [`StoreError`] of the last attempt.
pub async fn commit(
    store: &dyn ResourceStore,
    cluster: Cluster,
    token: &str,
) -> Result<Commit, StoreError> {
    let name = cluster.name_any();
    let mut validated = Some(cluster);
    retry_once_on_conflict(|| {
        let seen = validated.take();
        let name = name.clone();
        async move {
            let cluster = match seen {
                Some(cluster) => cluster,
                None => store.get_cluster(&name).await?,
            };
            consume(store, cluster, token).await
        }
    })
    .await
}

async fn run(
    store: &dyn ResourceStore,
    request: &InstallRequest<'_>,
    now: DateTime<Utc>,
) -> Result<Value, InstallError> {
    let token = request
        .token
        .filter(|t| !t.is_empty())
        .ok_or(InstallError::MissingToken)?;
    let cluster = find_cluster_by_token(store, token).await?;
    let cluster_id = cluster.name_any();
    check_token(&cluster, now)?;

    let secrets = store.list_secrets().await?;
    let sa_token = select_service_account_token(&secrets, &cluster_id).ok_or_else(|| {
        InstallError::NoServiceAccountToken {
            cluster: cluster_id.clone(),
        }
    })?;
    let bundle = build_manifests(&ManifestParams {
        api_url: request.api_url,
        cluster_id: &cluster_id,
        token: sa_token,
        image: request.image,
    })?;

    match commit(store, cluster, token).await {
        Ok(Commit::Consumed) => {
            info!(cluster = %cluster_id, "Bootstrap token consumed");
            metrics::record_install_handshake("served");
        }
        Ok(Commit::AlreadyConsumed) => {
            warn!(
                cluster = %cluster_id,
                "Bootstrap token was consumed by a concurrent handshake"
            );
            return Err(InstallError::TokenExpiredOrUsed);
        }
        Err(e) => {
            error!(cluster = %cluster_id, error = %e, "Failed to invalidate bootstrap token");
            metrics::increment_token_invalidation_failures();
            return Err(e.into());
        }
    }
    Ok(bundle)
}

/// Run the handshake and return the manifest bundle
///
/// # Errors
///
/// Returns an [`InstallError`] if the token is missing, unknown, used or
/// expired, if no service-account token exists, if the store fails, or if the
/// token cannot be marked as used. A token consumed by a concurrent handshake
/// is reported as [`InstallError::TokenExpiredOrUsed`].
pub async fn install_steward(
    store: &dyn ResourceStore,
    request: &InstallRequest<'_>,
    now: DateTime<Utc>,
) -> Result<Value, InstallError> {
    let result = run(store, request, now).await;
    if let Err(e) = &result {
        metrics::record_install_handshake(e.outcome());
    }
    result
}
