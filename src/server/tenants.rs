//! Tenant handlers.

use super::body::{parse_body, parse_strict};
use super::{ApiError, AppState};
use crate::api::{Tenant, TenantProperties};
use crate::auth::RequestClient;
use crate::sync::{apply_tenant_defaults, sync_tenant, tenant_to_api, tenant_to_resource, TenantDefaults};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::info;

pub async fn list_tenants(
    Extension(RequestClient(store)): Extension<RequestClient>,
) -> Result<Json<Vec<Tenant>>, ApiError> {
    let tenants = store.list_tenants().await?;
    Ok(Json(tenants.iter().map(tenant_to_api).collect()))
}

pub async fn create_tenant(
    State(state): State<AppState>,
    Extension(RequestClient(store)): Extension<RequestClient>,
    body: Bytes,
) -> Result<(StatusCode, Json<Tenant>), ApiError> {
    let tenant: Tenant = parse_body(&body)?;
    let mut resource = tenant_to_resource(&tenant)?;
    resource.metadata.namespace = Some(state.config.namespace.clone());
    let defaults = TenantDefaults {
        api_secret_ref_name: state.config.default_api_secret_ref_name.as_deref(),
        repo_path: state.config.default_tenant_repo_path.as_deref(),
    };
    apply_tenant_defaults(&mut resource, &defaults)?;
    let created = store.create_tenant(&resource).await?;
    let tenant = tenant_to_api(&created);
    info!(tenant = %tenant.identity.id, "Tenant created");
    Ok((StatusCode::CREATED, Json(tenant)))
}

pub async fn get_tenant(
    Extension(RequestClient(store)): Extension<RequestClient>,
    Path(id): Path<String>,
) -> Result<Json<Tenant>, ApiError> {
    let tenant = store.get_tenant(&id).await?;
    Ok(Json(tenant_to_api(&tenant)))
}

pub async fn update_tenant(
    Extension(RequestClient(store)): Extension<RequestClient>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Tenant>, ApiError> {
    let patch: TenantProperties = parse_strict(&body)?;
    let mut tenant = store.get_tenant(&id).await?;
    sync_tenant(&patch, &mut tenant)?;
    let updated = store.update_tenant(&tenant).await?;
    Ok(Json(tenant_to_api(&updated)))
}

pub async fn delete_tenant(
    Extension(RequestClient(store)): Extension<RequestClient>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    store.delete_tenant(&id).await?;
    info!(tenant = %id, "Tenant deleted");
    Ok(StatusCode::NO_CONTENT)
}
