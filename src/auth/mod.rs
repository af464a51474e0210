//! # Caller Authentication
//!
//! Every protected request acts with the identity of the caller's bearer
//! token: the token is handed to the backend, which performs authorization.
//! Clients are expensive to build, so one is kept per token in a bounded
//! [`CredentialCache`].
//!
//! - [`ClientFactory`] builds a store client for a token, or for the service's
//!   own identity when no token is given.
//! - [`AuthResolver`] owns the cache and the factory and is installed as axum
//!   middleware with [`authenticate`].

pub mod cache;
mod resolver;

pub use cache::CredentialCache;
pub use resolver::{authenticate, AuthResolver, RequestClient, RouteAccess};

use crate::constants::AUTH_SCHEME;
use crate::store::{KubeStore, ResourceStore};
use async_trait::async_trait;
use kube::config::AuthInfo;
use secrecy::SecretString;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed jwt")]
    MissingCredential,
}

/// Failure to build a backend client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to load kubernetes configuration: {0}")]
    Config(#[from] kube::config::InferConfigError),

    #[error("failed to create kubernetes client: {0}")]
    Client(#[from] kube::Error),
}

/// Extract the token from an `Authorization` header value
///
/// The scheme must match exactly, including case, and be separated from a
/// non-empty token by a space.
///
/// # Errors
///
/// Returns [`AuthError::MissingCredential`] if the header is absent, uses a
/// different scheme or carries no token.
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let token = header
        .and_then(|h| h.strip_prefix(AUTH_SCHEME))
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or(AuthError::MissingCredential)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

/// Builds store clients acting as a given identity
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Client acting as `token`, or as the service itself for `None`
    async fn create_client(&self, token: Option<&str>)
        -> Result<Arc<dyn ResourceStore>, ClientError>;
}

/// Factory for [`KubeStore`] clients
///
/// The connection settings are inferred from the environment (in-cluster or
/// kubeconfig). A caller token replaces whatever credentials were inferred.
#[derive(Debug, Clone)]
pub struct KubeClientFactory {
    namespace: String,
}

impl KubeClientFactory {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl ClientFactory for KubeClientFactory {
    async fn create_client(
        &self,
        token: Option<&str>,
    ) -> Result<Arc<dyn ResourceStore>, ClientError> {
        let mut config = kube::Config::infer().await?;
        if let Some(token) = token {
            config.auth_info = AuthInfo {
                token: Some(SecretString::from(token.to_owned())),
                ..AuthInfo::default()
            };
        }
        let client = kube::Client::try_from(config)?;
        Ok(Arc::new(KubeStore::new(client, self.namespace.clone())))
    }
}
