//! # Resource Store
//!
//! Persisted-resource store used by the handlers.
//!
//! The store is the system of record. This crate holds no locks over it;
//! concurrent writers are detected through `resourceVersion` and surface as
//! [`StoreError::Conflict`].
//!
//! - [`KubeStore`] talks to the Kubernetes API with a caller-scoped client.
//! - [`MemoryStore`] keeps everything in process with the same optimistic
//!   concurrency rules, for tests and local runs.

mod kube_store;
mod memory;

pub use kube_store::KubeStore;
pub use memory::MemoryStore;

use crate::crd::{Cluster, Tenant};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use std::future::Future;
use thiserror::Error;
use tracing::debug;

/// Errors returned by a [`ResourceStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    AlreadyExists(String),

    /// Any other status returned by the backend
    #[error("{message}")]
    Status { code: u16, message: String },

    #[error("backend request failed: {0}")]
    Backend(#[source] kube::Error),
}

impl StoreError {
    pub(crate) fn not_found(resource: &str, name: &str) -> Self {
        StoreError::NotFound(format!("{resource} \"{name}\" not found"))
    }

    pub(crate) fn conflict(resource: &str, name: &str) -> Self {
        StoreError::Conflict(format!(
            "Operation cannot be fulfilled on {resource} \"{name}\": the object has been modified; please apply your changes to the latest version and try again"
        ))
    }

    pub(crate) fn already_exists(resource: &str, name: &str) -> Self {
        StoreError::AlreadyExists(format!("{resource} \"{name}\" already exists"))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(api_err) => match api_err.code {
                404 => StoreError::NotFound(api_err.message),
                409 if api_err.reason == "AlreadyExists" => {
                    StoreError::AlreadyExists(api_err.message)
                }
                409 => StoreError::Conflict(api_err.message),
                code => StoreError::Status {
                    code,
                    message: api_err.message,
                },
            },
            other => StoreError::Backend(other),
        }
    }
}

/// Namespaced store of tenants, clusters and service-account secrets
///
/// Writes of spec and metadata ignore `status`; status is written separately
/// through [`ResourceStore::update_cluster_status`], mirroring a status
/// subresource. Every update carries the `resourceVersion` that was read.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn list_tenants(&self) -> Result<Vec<Tenant>, StoreError>;

    async fn get_tenant(&self, name: &str) -> Result<Tenant, StoreError>;

    async fn create_tenant(&self, tenant: &Tenant) -> Result<Tenant, StoreError>;

    async fn update_tenant(&self, tenant: &Tenant) -> Result<Tenant, StoreError>;

    async fn delete_tenant(&self, name: &str) -> Result<(), StoreError>;

    /// List clusters, optionally only those labelled with the given tenant
    async fn list_clusters(&self, tenant: Option<&str>) -> Result<Vec<Cluster>, StoreError>;

    async fn get_cluster(&self, name: &str) -> Result<Cluster, StoreError>;

    async fn create_cluster(&self, cluster: &Cluster) -> Result<Cluster, StoreError>;

    async fn update_cluster(&self, cluster: &Cluster) -> Result<Cluster, StoreError>;

    /// Replace the observed state of a cluster
    async fn update_cluster_status(&self, cluster: &Cluster) -> Result<Cluster, StoreError>;

    async fn delete_cluster(&self, name: &str) -> Result<(), StoreError>;

    /// All secrets of the namespace, in backend order
    async fn list_secrets(&self) -> Result<Vec<Secret>, StoreError>;
}

/// Run `op`, running it a second time if the first attempt hit a conflict.
///
/// # Errors
///
/// Returns the error of the last attempt.
pub async fn retry_once_on_conflict<T, F, Fut>(mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    match op().await {
        Err(err) if err.is_conflict() => {
            debug!(error = %err, "Write conflicted, retrying once");
            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retry_once_recovers_from_single_conflict() {
        let attempts = AtomicUsize::new(0);
        let result = retry_once_on_conflict(|| async {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StoreError::conflict("clusters.syn.tools", "c-a"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_once_gives_up_after_second_conflict() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), _> = retry_once_on_conflict(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::conflict("clusters.syn.tools", "c-a"))
        })
        .await;
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_skips_other_errors() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), _> = retry_once_on_conflict(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::not_found("clusters.syn.tools", "c-a"))
        })
        .await;
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_messages_follow_backend_wording() {
        let err = StoreError::not_found("tenants.syn.tools", "t-x");
        assert_eq!(err.to_string(), "tenants.syn.tools \"t-x\" not found");
    }
}
