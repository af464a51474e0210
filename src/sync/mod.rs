//! # Resource Synchronization
//!
//! Maps the public model to and from the persisted resources.
//!
//! - `*_to_api` builds the public record from a persisted resource.
//! - `*_to_resource` builds a new persisted resource from a public record.
//! - `sync_*` applies a partial update: fields present in the update
//!   overwrite the persisted ones, absent fields stay untouched.
//!
//! Some paths are lossy on purpose. Facts and annotations only persist
//! string values and skip the rest. Dynamic facts go through a JSON
//! encode/decode cycle.

mod cluster;
mod tenant;

pub use cluster::{
    cluster_to_api, cluster_to_resource, compile_meta_to_resource, stamp_instance_fact, sync_cluster,
};
pub use tenant::{apply_tenant_defaults, sync_tenant, tenant_to_api, tenant_to_resource, TenantDefaults};

use crate::api::facts::{string_entries, FactMap, FactValue};
use crate::api::id::{GenerationExhausted, InvalidId};
use crate::api::repo::{self, InvalidRepoUrl};
use crate::api::GitRepo;
use crate::constants::STEWARD_DEPLOY_KEY;
use crate::crd::{DeployKey, GitRepoTemplate, RepoType};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while mapping between the public model and persisted resources
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    InvalidRepoUrl(#[from] InvalidRepoUrl),

    #[error("Illegal deploy key format. Expected '<type> <public key>'")]
    MalformedDeployKey,

    #[error("Cannot set deploy key for unmanaged git repo")]
    UnmanagedRepoDeployKey,

    #[error(transparent)]
    GenerationExhausted(#[from] GenerationExhausted),

    #[error(transparent)]
    InvalidId(#[from] InvalidId),

    #[error("GitRepo URL is required")]
    MissingRepoUrl,

    #[error("Invalid compile metadata: {0}")]
    InvalidCompileMeta(#[source] serde_json::Error),

    #[error("failed to convert {what}: {source}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl SyncError {
    /// Whether the error was caused by the client's input
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            SyncError::GenerationExhausted(_) | SyncError::Serialization { .. }
        )
    }
}

/// Convert between two structurally compatible types through a JSON tree.
pub(crate) fn reencode<T, U>(value: &T, what: &'static str) -> Result<U, SyncError>
where
    T: Serialize,
    U: DeserializeOwned,
{
    serde_json::to_value(value)
        .and_then(serde_json::from_value)
        .map_err(|source| SyncError::Serialization { what, source })
}

/// Merge string-valued entries into a persisted string map.
pub(crate) fn merge_strings(target: &mut Option<BTreeMap<String, String>>, source: &FactMap) {
    let entries = string_entries(source);
    if entries.is_empty() {
        return;
    }
    target.get_or_insert_with(BTreeMap::new).extend(entries);
}

/// Persisted string map as public values; `None` when empty.
pub(crate) fn strings_to_facts(source: Option<&BTreeMap<String, String>>) -> Option<FactMap> {
    let source = source.filter(|m| !m.is_empty())?;
    Some(
        source
            .iter()
            .map(|(k, v)| (k.clone(), FactValue::from(v.as_str())))
            .collect(),
    )
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Re-derive the repository template after the repository changed.
///
/// `repo` must carry the effective URL (from the update, or the persisted one).
/// Nothing happens unless the update named a URL or a type. An unmanaged
/// template stays unmanaged unless the type is changed explicitly.
pub(crate) fn update_repo_template(
    template: &mut Option<GitRepoTemplate>,
    repo: &GitRepo,
    url_changed: bool,
    name: &str,
) -> Result<(), SyncError> {
    let type_given = repo.repo_type.is_some();
    let keep_unmanaged = !type_given && template.as_ref().is_some_and(|t| !t.is_managed());
    if keep_unmanaged || !(type_given || url_changed) {
        return Ok(());
    }
    let Some(resolved) = repo::resolve(Some(repo), name)? else {
        return Ok(());
    };
    match template {
        Some(existing) if resolved.is_managed() => {
            existing.repo_type = RepoType::Auto;
            existing.path = resolved.path;
            existing.repo_name = resolved.repo_name;
            if existing.display_name.is_empty() {
                existing.display_name = resolved.display_name;
            }
        }
        Some(existing) => {
            existing.repo_type = RepoType::Unmanaged;
            existing.path.clear();
            existing.repo_name.clear();
            existing.deploy_keys.clear();
        }
        None => *template = Some(resolved),
    }
    Ok(())
}

/// Store a `<type> <key>` deploy key on a managed repository template.
pub(crate) fn apply_deploy_key(
    template: Option<&mut GitRepoTemplate>,
    deploy_key: &str,
) -> Result<(), SyncError> {
    let parts: Vec<&str> = deploy_key.split(' ').collect();
    let [key_type, key] = parts.as_slice() else {
        return Err(SyncError::MalformedDeployKey);
    };
    if key_type.is_empty() || key.is_empty() {
        return Err(SyncError::MalformedDeployKey);
    }
    let template = template
        .filter(|t| t.is_managed())
        .ok_or(SyncError::UnmanagedRepoDeployKey)?;
    template.deploy_keys.insert(
        STEWARD_DEPLOY_KEY.to_string(),
        DeployKey {
            key_type: (*key_type).to_string(),
            key: (*key).to_string(),
            write_access: true,
        },
    );
    Ok(())
}

/// Deploy key managed through the API, as `<type> <key>`
pub(crate) fn deploy_key_to_api(template: Option<&GitRepoTemplate>) -> Option<String> {
    template
        .and_then(|t| t.deploy_keys.get(STEWARD_DEPLOY_KEY))
        .map(|k| format!("{} {}", k.key_type, k.key))
}
