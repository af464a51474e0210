//! Cluster handlers.
//!
//! Spec and status are separate writes: the store ignores `status` on spec
//! updates, so any status produced by a sync is written afterwards against
//! the revision returned by the spec write.

use super::body::{install_url, parse_body, parse_strict, public_base_url};
use super::{ApiError, AppState};
use crate::api::{self, sort_clusters, ClusterCompileMeta, ClusterProperties, ListClustersQuery};
use crate::auth::RequestClient;
use crate::constants::TENANT_LABEL;
use crate::crd::{self, ClusterStatus, CompileMeta};
use crate::store::{retry_once_on_conflict, ResourceStore};
use crate::sync::{
    cluster_to_api, cluster_to_resource, compile_meta_to_resource, stamp_instance_fact, sync_cluster,
};
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::info;

/// Public representation including the install URL while the token is usable
fn render(
    cluster: &crd::Cluster,
    base_url: &str,
    now: DateTime<Utc>,
) -> Result<api::Cluster, ApiError> {
    let mut rendered = cluster_to_api(cluster)?;
    rendered.properties.install_url = cluster
        .status
        .as_ref()
        .and_then(|s| s.bootstrap_token.as_ref())
        .filter(|t| t.is_usable_at(now))
        .map(|t| install_url(base_url, &t.token));
    Ok(rendered)
}

/// Write `status` unless the stored one is already equal
async fn write_status(
    store: &dyn ResourceStore,
    mut written: crd::Cluster,
    status: Option<ClusterStatus>,
) -> Result<crd::Cluster, ApiError> {
    if status.is_none() || written.status == status {
        return Ok(written);
    }
    written.status = status;
    Ok(store.update_cluster_status(&written).await?)
}

async fn create(
    state: &AppState,
    store: &dyn ResourceStore,
    mut resource: crd::Cluster,
) -> Result<crd::Cluster, ApiError> {
    resource.metadata.namespace = Some(state.config.namespace.clone());
    stamp_instance_fact(&mut resource, &state.config.instance_name);
    let status = resource.status.take();
    let created = store.create_cluster(&resource).await?;
    info!(cluster = %created.name_any(), tenant = %created.spec.tenant_ref.name, "Cluster created");
    write_status(store, created, status).await
}

fn require_tenant(cluster: &api::Cluster) -> Result<(), ApiError> {
    if cluster.tenant_ref.tenant.is_empty() {
        return Err(ApiError::BadRequest("tenant is required".to_string()));
    }
    Ok(())
}

pub async fn list_clusters(
    Extension(RequestClient(store)): Extension<RequestClient>,
    headers: HeaderMap,
    query: Result<Query<ListClustersQuery>, QueryRejection>,
) -> Result<Json<Vec<api::Cluster>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let tenant = query.tenant.as_deref().filter(|t| !t.is_empty());
    let base_url = public_base_url(&headers);
    let now = Utc::now();
    let mut clusters = store
        .list_clusters(tenant)
        .await?
        .iter()
        .map(|c| render(c, &base_url, now))
        .collect::<Result<Vec<_>, _>>()?;
    sort_clusters(&mut clusters, query.sort_by.unwrap_or_default());
    Ok(Json(clusters))
}

pub async fn create_cluster(
    State(state): State<AppState>,
    Extension(RequestClient(store)): Extension<RequestClient>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<api::Cluster>), ApiError> {
    let cluster: api::Cluster = parse_body(&body)?;
    require_tenant(&cluster)?;
    let resource = cluster_to_resource(&cluster)?;
    let created = create(&state, store.as_ref(), resource).await?;
    let rendered = render(&created, &public_base_url(&headers), Utc::now())?;
    Ok((StatusCode::CREATED, Json(rendered)))
}

pub async fn get_cluster(
    Extension(RequestClient(store)): Extension<RequestClient>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<api::Cluster>, ApiError> {
    let cluster = store.get_cluster(&id).await?;
    Ok(Json(render(&cluster, &public_base_url(&headers), Utc::now())?))
}

pub async fn update_cluster(
    Extension(RequestClient(store)): Extension<RequestClient>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<api::Cluster>, ApiError> {
    let patch: ClusterProperties = parse_strict(&body)?;
    let mut cluster = store.get_cluster(&id).await?;
    sync_cluster(&patch, &mut cluster)?;
    let status = cluster.status.clone();
    let updated = store.update_cluster(&cluster).await?;
    let updated = write_status(store.as_ref(), updated, status).await?;
    Ok(Json(render(&updated, &public_base_url(&headers), Utc::now())?))
}

/// Create the cluster, or replace its spec and annotations keeping its status
pub async fn put_cluster(
    State(state): State<AppState>,
    Extension(RequestClient(store)): Extension<RequestClient>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<api::Cluster>), ApiError> {
    let mut cluster: api::Cluster = parse_body(&body)?;
    require_tenant(&cluster)?;
    cluster.identity.id = id;
    let resource = cluster_to_resource(&cluster)?;
    let name = resource.name_any();
    let base_url = public_base_url(&headers);

    let mut found = match store.get_cluster(&name).await {
        Ok(found) => found,
        Err(e) if e.is_not_found() => {
            let created = create(&state, store.as_ref(), resource).await?;
            let rendered = render(&created, &base_url, Utc::now())?;
            return Ok((StatusCode::CREATED, Json(rendered)));
        }
        Err(e) => return Err(e.into()),
    };
    found.spec = resource.spec;
    found.metadata.annotations = resource.metadata.annotations;
    let tenant_name = found.spec.tenant_ref.name.clone();
    found
        .labels_mut()
        .insert(TENANT_LABEL.to_string(), tenant_name);
    let updated = store.update_cluster(&found).await?;
    info!(cluster = %name, "Cluster replaced");
    Ok((StatusCode::OK, Json(render(&updated, &base_url, Utc::now())?)))
}

pub async fn delete_cluster(
    Extension(RequestClient(store)): Extension<RequestClient>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    store.delete_cluster(&id).await?;
    info!(cluster = %id, "Cluster deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the compile report of a cluster as a whole
pub async fn post_compile_meta(
    Extension(RequestClient(store)): Extension<RequestClient>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let report: ClusterCompileMeta = parse_body(&body)?;
    let meta = compile_meta_to_resource(&report)?;
    write_compile_meta(store, &id, meta).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn write_compile_meta(
    store: Arc<dyn ResourceStore>,
    id: &str,
    meta: CompileMeta,
) -> Result<(), ApiError> {
    retry_once_on_conflict(|| {
        let store = Arc::clone(&store);
        let meta = meta.clone();
        async move {
            let mut cluster = store.get_cluster(id).await?;
            cluster
                .status
                .get_or_insert_with(ClusterStatus::default)
                .compile_meta = Some(meta);
            store.update_cluster_status(&cluster).await
        }
    })
    .await?;
    Ok(())
}
