//! Cluster mapping.

use super::{
    apply_deploy_key, deploy_key_to_api, merge_strings, non_empty, reencode, strings_to_facts,
    update_repo_template, SyncError,
};
use crate::api::{
    self, id::{normalize_id, validate_id}, non_empty_repo, ClusterProperties, ClusterTenant, FactMap, FactValue,
    GitRepo, Identity,
};
use crate::constants::{CLUSTER_ID_PREFIX, INSTANCE_FACT, TENANT_LABEL};
use crate::crd::{self, ClusterSpec, ClusterStatus, TenantRef};
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Persisted form of a compile metadata report sent by a client.
///
/// # Errors
///
/// Returns [`SyncError::InvalidCompileMeta`] if the report does not match the
/// persisted shape, e.g. `global` is not an object.
pub fn compile_meta_to_resource(
    report: &api::ClusterCompileMeta,
) -> Result<crd::CompileMeta, SyncError> {
    serde_json::to_value(report)
        .and_then(serde_json::from_value)
        .map_err(SyncError::InvalidCompileMeta)
}

/// Public representation of a persisted cluster.
///
/// Dynamic facts are decoded best effort: values that are not valid JSON come
/// back as plain strings.
///
/// # Errors
///
/// Returns [`SyncError::Serialization`] if the stored compile metadata cannot
/// be represented in the public model.
pub fn cluster_to_api(cluster: &crd::Cluster) -> Result<api::Cluster, SyncError> {
    let spec = &cluster.spec;
    let status = cluster.status.as_ref();
    let template = spec.git_repo_template.as_ref();

    let git_repo = non_empty_repo(GitRepo {
        url: non_empty(&spec.git_repo_url),
        host_keys: non_empty(&spec.git_host_keys),
        repo_type: template.map(|t| t.repo_type),
        deploy_key: deploy_key_to_api(template),
    });
    let dynamic_facts = status
        .map(|s| &s.facts)
        .filter(|facts| !facts.is_empty())
        .map(|facts| {
            facts
                .iter()
                .map(|(k, v)| (k.clone(), FactValue::decode(v)))
                .collect::<FactMap>()
        });
    let compile_meta = status
        .and_then(|s| s.compile_meta.as_ref())
        .map(|meta| reencode(meta, "compile metadata"))
        .transpose()?;

    Ok(api::Cluster {
        identity: Identity::new(cluster.name_any()),
        tenant_ref: ClusterTenant {
            tenant: spec.tenant_ref.name.clone(),
        },
        properties: ClusterProperties {
            display_name: non_empty(&spec.display_name),
            annotations: strings_to_facts(cluster.metadata.annotations.as_ref()),
            facts: strings_to_facts(Some(&spec.facts)),
            dynamic_facts,
            git_repo,
            global_git_repo_revision: non_empty(&spec.global_git_repo_revision),
            tenant_git_repo_revision: non_empty(&spec.tenant_git_repo_revision),
            install_url: None,
            compile_meta,
        },
    })
}

/// New persisted cluster from a public record.
///
/// The identifier is generated or prefixed as needed and the tenant label is set.
///
/// # Errors
///
/// Returns a [`SyncError`] if identifier generation or any field mapping fails.
pub fn cluster_to_resource(cluster: &api::Cluster) -> Result<crd::Cluster, SyncError> {
    let id = normalize_id(&cluster.identity.id, CLUSTER_ID_PREFIX)?;
    validate_id(&id)?;
    let tenant = &cluster.tenant_ref.tenant;
    let mut resource = crd::Cluster::new(
        &id,
        ClusterSpec {
            tenant_ref: TenantRef {
                name: tenant.clone(),
            },
            ..ClusterSpec::default()
        },
    );
    resource
        .labels_mut()
        .insert(TENANT_LABEL.to_string(), tenant.clone());
    sync_cluster(&cluster.properties, &mut resource)?;
    Ok(resource)
}

/// Apply a partial update to a persisted cluster.
///
/// Facts and annotations are merged key by key and keep string values only.
/// Dynamic facts and compile metadata replace the stored value as a whole.
///
/// # Errors
///
/// Returns a [`SyncError`] for an invalid repository URL, a malformed deploy
/// key, a deploy key on an unmanaged repository, or unconvertible compile
/// metadata.
pub fn sync_cluster(source: &ClusterProperties, target: &mut crd::Cluster) -> Result<(), SyncError> {
    let name = target.name_any();
    if let Some(display_name) = &source.display_name {
        target.spec.display_name.clone_from(display_name);
    }
    if let Some(annotations) = &source.annotations {
        merge_strings(&mut target.metadata.annotations, annotations);
    }
    if let Some(facts) = &source.facts {
        let mut merged = Some(std::mem::take(&mut target.spec.facts));
        merge_strings(&mut merged, facts);
        target.spec.facts = merged.unwrap_or_default();
    }
    if let Some(git_repo) = &source.git_repo {
        sync_repo(git_repo, &mut target.spec, &name)?;
    }
    if let Some(revision) = &source.global_git_repo_revision {
        target.spec.global_git_repo_revision.clone_from(revision);
    }
    if let Some(revision) = &source.tenant_git_repo_revision {
        target.spec.tenant_git_repo_revision.clone_from(revision);
    }
    if let Some(dynamic_facts) = &source.dynamic_facts {
        let encoded = dynamic_facts
            .iter()
            .map(|(k, v)| {
                v.encode()
                    .map(|e| (k.clone(), e))
                    .map_err(|source| SyncError::Serialization {
                        what: "dynamic facts",
                        source,
                    })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        target.status.get_or_insert_with(ClusterStatus::default).facts = encoded;
    }
    if let Some(compile_meta) = &source.compile_meta {
        let meta = compile_meta_to_resource(compile_meta)?;
        target
            .status
            .get_or_insert_with(ClusterStatus::default)
            .compile_meta = Some(meta);
    }
    Ok(())
}

fn sync_repo(git_repo: &GitRepo, spec: &mut ClusterSpec, name: &str) -> Result<(), SyncError> {
    if let Some(url) = &git_repo.url {
        spec.git_repo_url.clone_from(url);
    }
    if let Some(host_keys) = &git_repo.host_keys {
        spec.git_host_keys.clone_from(host_keys);
    }
    let effective = GitRepo {
        url: non_empty(&spec.git_repo_url),
        ..git_repo.clone()
    };
    update_repo_template(
        &mut spec.git_repo_template,
        &effective,
        git_repo.url.is_some(),
        name,
    )?;
    if let Some(deploy_key) = &git_repo.deploy_key {
        apply_deploy_key(spec.git_repo_template.as_mut(), deploy_key)?;
    }
    Ok(())
}

/// Record the API instance a cluster was created on, replacing any client value.
pub fn stamp_instance_fact(cluster: &mut crd::Cluster, instance: &str) {
    cluster
        .spec
        .facts
        .insert(INSTANCE_FACT.to_string(), instance.to_string());
}
