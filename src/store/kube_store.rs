//! Kubernetes-backed store.

use super::{ResourceStore, StoreError};
use crate::constants::TENANT_LABEL;
use crate::crd::{Cluster, Tenant};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

/// Store scoped to one namespace, acting with the identity of its client
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    namespace: String,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn tenants(&self) -> Api<Tenant> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn clusters(&self) -> Api<Cluster> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn list_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        let list = self.tenants().list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get_tenant(&self, name: &str) -> Result<Tenant, StoreError> {
        Ok(self.tenants().get(name).await?)
    }

    async fn create_tenant(&self, tenant: &Tenant) -> Result<Tenant, StoreError> {
        Ok(self.tenants().create(&PostParams::default(), tenant).await?)
    }

    async fn update_tenant(&self, tenant: &Tenant) -> Result<Tenant, StoreError> {
        let name = tenant.name_any();
        Ok(self
            .tenants()
            .replace(&name, &PostParams::default(), tenant)
            .await?)
    }

    async fn delete_tenant(&self, name: &str) -> Result<(), StoreError> {
        self.tenants().delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn list_clusters(&self, tenant: Option<&str>) -> Result<Vec<Cluster>, StoreError> {
        let params = match tenant {
            Some(tenant) => ListParams::default().labels(&format!("{TENANT_LABEL}={tenant}")),
            None => ListParams::default(),
        };
        let list = self.clusters().list(&params).await?;
        Ok(list.items)
    }

    async fn get_cluster(&self, name: &str) -> Result<Cluster, StoreError> {
        Ok(self.clusters().get(name).await?)
    }

    async fn create_cluster(&self, cluster: &Cluster) -> Result<Cluster, StoreError> {
        Ok(self
            .clusters()
            .create(&PostParams::default(), cluster)
            .await?)
    }

    async fn update_cluster(&self, cluster: &Cluster) -> Result<Cluster, StoreError> {
        let name = cluster.name_any();
        Ok(self
            .clusters()
            .replace(&name, &PostParams::default(), cluster)
            .await?)
    }

    async fn update_cluster_status(&self, cluster: &Cluster) -> Result<Cluster, StoreError> {
        let name = cluster.name_any();
        debug!(
            cluster = %name,
            resource_version = ?cluster.resource_version(),
            "Replacing cluster status"
        );
        let body = serde_json::to_vec(cluster).map_err(|e| {
            StoreError::Backend(kube::Error::SerdeError(e))
        })?;
        Ok(self
            .clusters()
            .replace_status(&name, &PostParams::default(), body)
            .await?)
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), StoreError> {
        self.clusters().delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn list_secrets(&self) -> Result<Vec<Secret>, StoreError> {
        let list = self.secrets().list(&ListParams::default()).await?;
        Ok(list.items)
    }
}
