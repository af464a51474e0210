//! # Custom Resource Definitions
//!
//! Persisted resource types for tenants and clusters (`syn.tools/v1alpha1`).
//!
//! These are the durable counterparts of the public API model. Each resource
//! has a desired-state `spec` and, for clusters, an observed-state `status`.
//!
//! ## Module Structure
//!
//! - `repo.rs` - Git repository template shared by tenants and clusters
//! - `tenant.rs` - Tenant resource
//! - `cluster.rs` - Cluster resource, bootstrap token and compile metadata

mod cluster;
mod repo;
mod tenant;

pub use cluster::{
    BootstrapToken, Cluster, ClusterSpec, ClusterStatus, CommodoreBuildInfo, CompileMeta,
    CompileMetaInstanceVersionInfo, CompileMetaVersionInfo, TenantRef,
};
pub use repo::{DeployKey, GitRepoTemplate, RepoType, SecretRef};
pub use tenant::{Tenant, TenantSpec};
