//! # Cluster Resource
//!
//! Cluster desired state plus the observed state written by the platform:
//! dynamic facts, the one-time bootstrap token and the last compile report.

use super::repo::GitRepoTemplate;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference to the owning tenant
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct TenantRef {
    #[serde(default)]
    pub name: String,
}

/// Cluster desired state
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "syn.tools",
    version = "v1alpha1",
    kind = "Cluster",
    namespaced,
    status = "ClusterStatus",
    printcolumn = r#"{"name":"Display Name", "type":"string", "jsonPath":".spec.displayName"}"#,
    printcolumn = r#"{"name":"Tenant", "type":"string", "jsonPath":".spec.tenantRef.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Full URL of the cluster catalog repository
    #[serde(default, rename = "gitRepoURL", skip_serializing_if = "String::is_empty")]
    pub git_repo_url: String,
    /// SSH known hosts of the git server
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_host_keys: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo_template: Option<GitRepoTemplate>,
    #[serde(default)]
    pub tenant_ref: TenantRef,
    /// Static facts, string values only
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facts: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub global_git_repo_revision: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tenant_git_repo_revision: String,
}

/// Single-use token allowing a cluster to fetch its install manifest once
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapToken {
    pub token: String,
    #[serde(default)]
    pub token_valid: bool,
    #[schemars(with = "String")]
    pub valid_until: DateTime<Utc>,
}

impl BootstrapToken {
    /// A token is usable while it is flagged valid and not yet expired.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.token_valid && now < self.valid_until
    }
}

/// Cluster observed state
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_token: Option<BootstrapToken>,
    /// Dynamic facts; each value is a JSON document encoded as a string
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facts: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_meta: Option<CompileMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommodoreBuildInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompileMetaVersionInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_sha: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompileMetaInstanceVersionInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub component: String,
    #[serde(flatten)]
    pub version: CompileMetaVersionInfo,
}

/// Metadata of the last catalog compilation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompileMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub last_compile: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commodore_build_info: Option<CommodoreBuildInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<CompileMetaVersionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<CompileMetaVersionInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub instances: BTreeMap<String, CompileMetaInstanceVersionInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, CompileMetaVersionInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(valid: bool, offset: Duration) -> BootstrapToken {
        BootstrapToken {
            token: "haevechee2ethot".to_string(),
            token_valid: valid,
            valid_until: Utc::now() + offset,
        }
    }

    #[test]
    fn test_token_usable_while_valid_and_unexpired() {
        assert!(token(true, Duration::minutes(30)).is_usable_at(Utc::now()));
    }

    #[test]
    fn test_token_unusable_once_invalidated() {
        assert!(!token(false, Duration::minutes(30)).is_usable_at(Utc::now()));
    }

    #[test]
    fn test_token_unusable_at_expiry() {
        let t = token(true, Duration::zero());
        assert!(!t.is_usable_at(t.valid_until));
        assert!(!token(true, Duration::hours(-1)).is_usable_at(Utc::now()));
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::json!({
            "bootstrapToken": {
                "token": "abc",
                "tokenValid": true,
                "validUntil": "2030-01-01T00:00:00Z"
            },
            "facts": {"kubernetesVersion": "{\"major\":\"1\"}"},
            "compileMeta": {
                "lastCompile": "2024-05-01T10:00:00Z",
                "global": {"url": "https://git.example.com/global.git", "gitSha": "abc"},
                "instances": {"argocd": {"component": "argocd", "version": "v1.0.0"}}
            }
        });
        let status: ClusterStatus = serde_json::from_value(json).unwrap();
        let token = status.bootstrap_token.as_ref().unwrap();
        assert!(token.token_valid);
        assert_eq!(status.facts.len(), 1);
        let meta = status.compile_meta.as_ref().unwrap();
        assert_eq!(meta.global.as_ref().unwrap().git_sha, "abc");
        assert!(meta.tenant.is_none());
        assert_eq!(meta.instances["argocd"].version.version, "v1.0.0");
    }
}
