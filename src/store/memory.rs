//! In-process store.
//!
//! Follows the same rules as the Kubernetes API for the operations used here:
//! names are unique per kind, every write bumps `resourceVersion`, writes
//! carrying a stale `resourceVersion` conflict, and cluster status is only
//! written through the status operation.

use super::{ResourceStore, StoreError};
use crate::constants::TENANT_LABEL;
use crate::crd::{Cluster, Tenant};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

const TENANTS: &str = "tenants.syn.tools";
const CLUSTERS: &str = "clusters.syn.tools";

#[derive(Debug, Default)]
struct Inner {
    tenants: BTreeMap<String, Tenant>,
    clusters: BTreeMap<String, Cluster>,
    secrets: Vec<Secret>,
    revision: u64,
    pending_status_conflicts: usize,
}

impl Inner {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }
}

/// Store keeping all resources in memory
#[derive(Debug)]
pub struct MemoryStore {
    namespace: String,
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_NAMESPACE)
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a tenant as-is, overwriting any tenant of the same name
    pub fn insert_tenant(&self, mut tenant: Tenant) -> Tenant {
        let mut inner = self.lock();
        tenant.metadata.namespace = Some(self.namespace.clone());
        tenant.metadata.resource_version = Some(inner.next_revision());
        inner.tenants.insert(tenant.name_any(), tenant.clone());
        tenant
    }

    /// Store a cluster including its status, overwriting any cluster of the same name
    pub fn insert_cluster(&self, mut cluster: Cluster) -> Cluster {
        let mut inner = self.lock();
        cluster.metadata.namespace = Some(self.namespace.clone());
        cluster.metadata.resource_version = Some(inner.next_revision());
        inner.clusters.insert(cluster.name_any(), cluster.clone());
        cluster
    }

    pub fn insert_secret(&self, mut secret: Secret) {
        secret.metadata.namespace = Some(self.namespace.clone());
        self.lock().secrets.push(secret);
    }

    /// Make the next `count` status writes fail with a conflict
    pub fn fail_status_writes_with_conflict(&self, count: usize) {
        self.lock().pending_status_conflicts = count;
    }

    /// Bump the revision of a stored cluster, as a concurrent writer would
    pub fn touch_cluster(&self, name: &str) {
        let mut inner = self.lock();
        let revision = inner.next_revision();
        if let Some(cluster) = inner.clusters.get_mut(name) {
            cluster.metadata.resource_version = Some(revision);
        }
    }
}

/// Reject writes based on a revision other than the stored one
fn check_revision<K: Resource>(stored: &K, incoming: &K, resource: &str) -> Result<(), StoreError> {
    match incoming.meta().resource_version.as_deref() {
        Some(rv) if Some(rv) != stored.meta().resource_version.as_deref() => {
            Err(StoreError::conflict(resource, &incoming.name_any()))
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        Ok(self.lock().tenants.values().cloned().collect())
    }

    async fn get_tenant(&self, name: &str) -> Result<Tenant, StoreError> {
        self.lock()
            .tenants
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(TENANTS, name))
    }

    async fn create_tenant(&self, tenant: &Tenant) -> Result<Tenant, StoreError> {
        let mut inner = self.lock();
        let name = tenant.name_any();
        if inner.tenants.contains_key(&name) {
            return Err(StoreError::already_exists(TENANTS, &name));
        }
        let mut created = tenant.clone();
        created.metadata.namespace = Some(self.namespace.clone());
        created.metadata.resource_version = Some(inner.next_revision());
        inner.tenants.insert(name, created.clone());
        Ok(created)
    }

    async fn update_tenant(&self, tenant: &Tenant) -> Result<Tenant, StoreError> {
        let mut inner = self.lock();
        let name = tenant.name_any();
        let stored = inner
            .tenants
            .get(&name)
            .ok_or_else(|| StoreError::not_found(TENANTS, &name))?;
        check_revision(stored, tenant, TENANTS)?;
        let mut updated = tenant.clone();
        updated.metadata.namespace = Some(self.namespace.clone());
        updated.metadata.resource_version = Some(inner.next_revision());
        inner.tenants.insert(name, updated.clone());
        Ok(updated)
    }

    async fn delete_tenant(&self, name: &str) -> Result<(), StoreError> {
        self.lock()
            .tenants
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(TENANTS, name))
    }

    async fn list_clusters(&self, tenant: Option<&str>) -> Result<Vec<Cluster>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .clusters
            .values()
            .filter(|c| {
                tenant.is_none_or(|t| c.labels().get(TENANT_LABEL).map(String::as_str) == Some(t))
            })
            .cloned()
            .collect())
    }

    async fn get_cluster(&self, name: &str) -> Result<Cluster, StoreError> {
        self.lock()
            .clusters
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(CLUSTERS, name))
    }

    async fn create_cluster(&self, cluster: &Cluster) -> Result<Cluster, StoreError> {
        let mut inner = self.lock();
        let name = cluster.name_any();
        if inner.clusters.contains_key(&name) {
            return Err(StoreError::already_exists(CLUSTERS, &name));
        }
        let mut created = cluster.clone();
        created.status = None;
        created.metadata.namespace = Some(self.namespace.clone());
        created.metadata.resource_version = Some(inner.next_revision());
        inner.clusters.insert(name, created.clone());
        Ok(created)
    }

    async fn update_cluster(&self, cluster: &Cluster) -> Result<Cluster, StoreError> {
        let mut inner = self.lock();
        let name = cluster.name_any();
        let stored = inner
            .clusters
            .get(&name)
            .ok_or_else(|| StoreError::not_found(CLUSTERS, &name))?;
        check_revision(stored, cluster, CLUSTERS)?;
        let mut updated = cluster.clone();
        updated.status.clone_from(&stored.status);
        updated.metadata.namespace = Some(self.namespace.clone());
        updated.metadata.resource_version = Some(inner.next_revision());
        inner.clusters.insert(name, updated.clone());
        Ok(updated)
    }

    async fn update_cluster_status(&self, cluster: &Cluster) -> Result<Cluster, StoreError> {
        let mut inner = self.lock();
        let name = cluster.name_any();
        if inner.pending_status_conflicts > 0 {
            inner.pending_status_conflicts -= 1;
            return Err(StoreError::conflict(CLUSTERS, &name));
        }
        let stored = inner
            .clusters
            .get(&name)
            .ok_or_else(|| StoreError::not_found(CLUSTERS, &name))?;
        check_revision(stored, cluster, CLUSTERS)?;
        let mut updated = stored.clone();
        updated.status.clone_from(&cluster.status);
        updated.metadata.resource_version = Some(inner.next_revision());
        inner.clusters.insert(name, updated.clone());
        Ok(updated)
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), StoreError> {
        self.lock()
            .clusters
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(CLUSTERS, name))
    }

    async fn list_secrets(&self) -> Result<Vec<Secret>, StoreError> {
        Ok(self.lock().secrets.clone())
    }
}
