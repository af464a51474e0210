//! # Git Repository Template
//!
//! Derived description of the configuration repository backing a tenant or cluster.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whether the repository is managed by the git controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    #[default]
    Auto,
    Unmanaged,
}

impl RepoType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RepoType::Auto => "auto",
            RepoType::Unmanaged => "unmanaged",
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the secret holding credentials for the git hosting API
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// SSH deploy key granted access to the repository
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeployKey {
    /// Key type, e.g. `ssh-ed25519`
    #[serde(rename = "type")]
    pub key_type: String,
    /// Public key material
    pub key: String,
    #[serde(default)]
    pub write_access: bool,
}

/// Git repository template
///
/// Present iff the repository is managed. An unmanaged template carries
/// no path or name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitRepoTemplate {
    #[serde(default, rename = "apiSecretRef")]
    pub api_secret_ref: SecretRef,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deploy_keys: BTreeMap<String, DeployKey>,
    /// Group or namespace path on the git host
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_name: String,
    #[serde(default)]
    pub repo_type: RepoType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
}

impl GitRepoTemplate {
    /// Template for a repository managed at `path/name`
    #[must_use]
    pub fn managed(path: impl Into<String>, repo_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            repo_name: repo_name.into(),
            repo_type: RepoType::Auto,
            ..Self::default()
        }
    }

    /// Template marking the repository as unmanaged
    #[must_use]
    pub fn unmanaged() -> Self {
        Self {
            repo_type: RepoType::Unmanaged,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.repo_type == RepoType::Auto
    }
}
