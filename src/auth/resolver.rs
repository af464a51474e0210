//! Request authentication middleware.

use super::{extract_bearer_token, ClientError, ClientFactory, CredentialCache};
use crate::constants::{INSTALL_PATH_SUFFIX, UNAUTHENTICATED_PATHS};
use crate::server::ApiError;
use crate::store::ResourceStore;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// How a request path is authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Served without any credential
    Public,
    /// Authenticated later by the bootstrap token in the query
    BootstrapToken,
    /// Requires the caller's bearer token
    Caller,
}

impl RouteAccess {
    #[must_use]
    pub fn of(path: &str) -> Self {
        if UNAUTHENTICATED_PATHS.contains(&path) {
            RouteAccess::Public
        } else if path.ends_with(INSTALL_PATH_SUFFIX) {
            RouteAccess::BootstrapToken
        } else {
            RouteAccess::Caller
        }
    }
}

/// Store client resolved for the current request
#[derive(Clone)]
pub struct RequestClient(pub Arc<dyn ResourceStore>);

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RequestClient")
    }
}

/// Resolves the store client each request acts with
///
/// Built once at startup and shared by all requests.
pub struct AuthResolver {
    factory: Arc<dyn ClientFactory>,
    cache: CredentialCache,
    service_client: OnceCell<Arc<dyn ResourceStore>>,
}

impl std::fmt::Debug for AuthResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResolver")
            .field("cache", &self.cache)
            .field("service_client", &self.service_client.initialized())
            .finish_non_exhaustive()
    }
}

impl AuthResolver {
    #[must_use]
    pub fn new(factory: Arc<dyn ClientFactory>, cache_size: usize) -> Self {
        Self {
            factory,
            cache: CredentialCache::new(cache_size),
            service_client: OnceCell::new(),
        }
    }

    /// Client acting as the caller identified by `token`
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if a client has to be built and that fails.
    pub async fn client_for_token(&self, token: &str) -> Result<Arc<dyn ResourceStore>, ClientError> {
        self.cache.get_or_create(token, self.factory.as_ref()).await
    }

    /// Client acting as the service itself, built on first use
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the client cannot be built; the next call
    /// tries again.
    pub async fn service_client(&self) -> Result<Arc<dyn ResourceStore>, ClientError> {
        self.service_client
            .get_or_try_init(|| self.factory.create_client(None))
            .await
            .cloned()
    }

    #[must_use]
    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }
}

/// Attach a [`RequestClient`] to requests on protected paths
///
/// # Errors
///
/// Rejects the request if the bearer token is missing or malformed, or if no
/// client can be built for it.
pub async fn authenticate(
    State(resolver): State<Arc<AuthResolver>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let access = RouteAccess::of(request.uri().path());
    if access == RouteAccess::Caller {
        let header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = extract_bearer_token(header)?;
        let client = resolver.client_for_token(token).await?;
        request.extensions_mut().insert(RequestClient(client));
    } else {
        debug!(path = %request.uri().path(), ?access, "Skipping caller authentication");
    }
    Ok(next.run(request).await)
}
