//! # Tenant Resource

use super::repo::GitRepoTemplate;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tenant desired state
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "syn.tools",
    version = "v1alpha1",
    kind = "Tenant",
    namespaced,
    printcolumn = r#"{"name":"Display Name", "type":"string", "jsonPath":".spec.displayName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TenantSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Full URL of the tenant configuration repository
    #[serde(default, rename = "gitRepoURL", skip_serializing_if = "String::is_empty")]
    pub git_repo_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_repo_revision: String,
    /// Full URL of the global configuration repository
    #[serde(default, rename = "globalGitRepoURL", skip_serializing_if = "String::is_empty")]
    pub global_git_repo_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub global_git_repo_revision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo_template: Option<GitRepoTemplate>,
}
