//! # Public API Model
//!
//! JSON representation of tenants and clusters as served to clients.
//!
//! Records are composed from named parts instead of one flat struct:
//! `identity` (the immutable id), `tenant_ref` (clusters only) and
//! `properties` (everything a client may change). On the wire the parts are
//! flattened into a single object, and PATCH bodies carry `properties` only.

pub mod facts;
pub mod id;
pub mod repo;

use crate::crd::RepoType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use facts::{FactMap, FactValue};

/// Immutable identifier of a tenant or cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Identity {
    /// Generated on creation when empty; prefixed with `t-`/`c-` when missing
    #[serde(default)]
    pub id: String,
}

impl Identity {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Owning tenant of a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClusterTenant {
    pub tenant: String,
}

/// Configuration repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRepo {
    /// Full URL of the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// SSH known hosts of the git server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_keys: Option<String>,
    /// `auto` (managed by the git controller) or `unmanaged`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub repo_type: Option<RepoType>,
    /// Deploy key in the form `<type> <key>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_key: Option<String>,
}

impl GitRepo {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Tenant repository with a revision
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RevisionedGitRepo {
    #[serde(flatten)]
    pub repo: GitRepo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

/// Tenant fields a client may set
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<FactMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<RevisionedGitRepo>,
    #[serde(default, rename = "globalGitRepoURL", skip_serializing_if = "Option::is_none")]
    pub global_git_repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_git_repo_revision: Option<String>,
}

/// Tenant record
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Tenant {
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(flatten)]
    pub properties: TenantProperties,
}

/// Compile report of a cluster catalog
///
/// Only `lastCompile` is typed here; the remaining keys pass through as JSON
/// and are mapped onto the persisted structure structurally.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCompileMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_compile: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Cluster fields a client may set
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<FactMap>,
    /// Static facts; only string values are stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facts: Option<FactMap>,
    /// Facts reported by the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_facts: Option<FactMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<GitRepo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_git_repo_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_git_repo_revision: Option<String>,
    /// Set on responses while the bootstrap token is valid; ignored on input
    #[serde(default, rename = "installURL", skip_serializing_if = "Option::is_none")]
    pub install_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_meta: Option<ClusterCompileMeta>,
}

/// Cluster record
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Cluster {
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(flatten)]
    pub tenant_ref: ClusterTenant,
    #[serde(flatten)]
    pub properties: ClusterProperties,
}

/// Body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Reason {
    pub reason: String,
}

/// Sort key for cluster listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClusterSortKey {
    #[default]
    Id,
    Tenant,
    DisplayName,
}

/// Query parameters of `GET /clusters`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListClustersQuery {
    pub tenant: Option<String>,
    pub sort_by: Option<ClusterSortKey>,
}

/// Sort clusters in place by the given key
pub fn sort_clusters(clusters: &mut [Cluster], key: ClusterSortKey) {
    match key {
        ClusterSortKey::Id => clusters.sort_by(|a, b| a.identity.id.cmp(&b.identity.id)),
        ClusterSortKey::Tenant => {
            clusters.sort_by(|a, b| a.tenant_ref.tenant.cmp(&b.tenant_ref.tenant));
        }
        ClusterSortKey::DisplayName => clusters.sort_by(|a, b| {
            let a = a.properties.display_name.as_deref().unwrap_or_default();
            let b = b.properties.display_name.as_deref().unwrap_or_default();
            a.cmp(b)
        }),
    }
}

/// `Some(repo)` unless every field is unset
pub(crate) fn non_empty_repo(repo: GitRepo) -> Option<GitRepo> {
    if repo.is_empty() {
        None
    } else {
        Some(repo)
    }
}
