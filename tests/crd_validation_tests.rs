//! # CRD Validation Tests
//!
//! Deserializes sample resources as they appear in a cluster to catch schema
//! drift early, and checks the generated CustomResourceDefinitions.

use kube::core::CustomResourceExt;
use kube::ResourceExt;
use lieutenant_api::crd::{Cluster, RepoType, Tenant};

/// Tenant with a managed repository and a deploy key
#[test]
fn test_tenant_sample() {
    let yaml = r#"
apiVersion: syn.tools/v1alpha1
kind: Tenant
metadata:
  name: t-aezoo6
  namespace: lieutenant
  annotations:
    monitoring.syn.tools/sla: "24/7"
spec:
  displayName: ACME Corp
  gitRepoURL: ssh://git@git.example.com/tenants/t-aezoo6.git
  gitRepoRevision: main
  globalGitRepoURL: ssh://git@git.example.com/syn/commodore-defaults.git
  gitRepoTemplate:
    apiSecretRef:
      name: gitlab-api
    path: tenants
    repoName: t-aezoo6
    repoType: auto
    deployKeys:
      steward:
        type: ssh-ed25519
        key: AAAAC3NzaC1lZDI1NTE5
        writeAccess: true
"#;

    let tenant: Tenant = serde_yaml::from_str(yaml).expect("Failed to parse tenant");

    assert_eq!(tenant.name_any(), "t-aezoo6");
    assert_eq!(tenant.spec.display_name, "ACME Corp");
    assert_eq!(tenant.spec.git_repo_revision, "main");
    let template = tenant.spec.git_repo_template.expect("template");
    assert_eq!(template.repo_type, RepoType::Auto);
    assert_eq!(template.api_secret_ref.name, "gitlab-api");
    let key = &template.deploy_keys["steward"];
    assert_eq!(key.key_type, "ssh-ed25519");
    assert!(key.write_access);
}

/// Cluster with observed state written by the platform
#[test]
fn test_cluster_sample_with_status() {
    let yaml = r#"
apiVersion: syn.tools/v1alpha1
kind: Cluster
metadata:
  name: c-aukaey
  namespace: lieutenant
  labels:
    syn.tools/tenant: t-aezoo6
spec:
  displayName: Production
  tenantRef:
    name: t-aezoo6
  gitRepoURL: ssh://git@git.example.com/clusters/c-aukaey.git
  gitHostKeys: "git.example.com ssh-ed25519 AAAA"
  gitRepoTemplate:
    repoType: unmanaged
  facts:
    cloud: cloudscale
    region: rma1
    lieutenant-instance: lieutenant-prod
status:
  bootstrapToken:
    token: haevechee2ethot
    tokenValid: true
    validUntil: "2024-05-01T12:30:00Z"
  facts:
    kubernetesVersion: '{"major":"1","minor":"30"}'
  compileMeta:
    lastCompile: "2024-05-01T10:00:00Z"
    commodoreBuildInfo:
      version: v1.22.0
      gitVersion: v1.22.0-0-gabcdef
    global:
      url: https://github.com/projectsyn/commodore-defaults.git
      gitSha: 1234abcd
      version: master
    instances:
      argocd:
        component: argocd
        url: https://github.com/projectsyn/component-argocd.git
        version: v5.0.0
"#;

    let cluster: Cluster = serde_yaml::from_str(yaml).expect("Failed to parse cluster");

    assert_eq!(cluster.spec.tenant_ref.name, "t-aezoo6");
    assert_eq!(cluster.labels()["syn.tools/tenant"], "t-aezoo6");
    assert_eq!(cluster.spec.facts["cloud"], "cloudscale");
    assert_eq!(
        cluster.spec.git_repo_template.map(|t| t.repo_type),
        Some(RepoType::Unmanaged)
    );

    let status = cluster.status.expect("status");
    let token = status.bootstrap_token.expect("bootstrap token");
    assert!(token.token_valid);
    assert_eq!(token.valid_until.to_rfc3339(), "2024-05-01T12:30:00+00:00");
    assert_eq!(status.facts["kubernetesVersion"], r#"{"major":"1","minor":"30"}"#);

    let meta = status.compile_meta.expect("compile meta");
    assert_eq!(meta.global.expect("global").git_sha, "1234abcd");
    let argocd = &meta.instances["argocd"];
    assert_eq!(argocd.component, "argocd");
    assert_eq!(argocd.version.version, "v5.0.0");
}

/// Minimal cluster without optional fields
#[test]
fn test_cluster_sample_minimal() {
    let yaml = r"
apiVersion: syn.tools/v1alpha1
kind: Cluster
metadata:
  name: c-minimal
spec:
  tenantRef:
    name: t-aezoo6
";

    let cluster: Cluster = serde_yaml::from_str(yaml).expect("Failed to parse cluster");

    assert!(cluster.spec.facts.is_empty());
    assert!(cluster.spec.git_repo_template.is_none());
    assert!(cluster.status.is_none());
}

#[test]
fn test_generated_crds() {
    let tenant = Tenant::crd();
    assert_eq!(tenant.spec.group, "syn.tools");
    assert_eq!(tenant.spec.names.plural, "tenants");
    assert_eq!(tenant.spec.scope, "Namespaced");

    let cluster = Cluster::crd();
    assert_eq!(cluster.spec.names.plural, "clusters");
    let version = &cluster.spec.versions[0];
    assert_eq!(version.name, "v1alpha1");
    assert!(
        version
            .subresources
            .as_ref()
            .is_some_and(|s| s.status.is_some()),
        "cluster status must be a subresource"
    );
}
