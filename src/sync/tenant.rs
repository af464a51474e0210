//! Tenant mapping.

use super::{
    apply_deploy_key, deploy_key_to_api, merge_strings, non_empty, strings_to_facts,
    update_repo_template, SyncError,
};
use crate::api::{self, id::{normalize_id, validate_id}, GitRepo, Identity, RevisionedGitRepo, TenantProperties};
use crate::constants::TENANT_ID_PREFIX;
use crate::crd::{self, GitRepoTemplate, TenantSpec};
use kube::ResourceExt;

/// Instance defaults applied to newly created tenants
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantDefaults<'a> {
    /// API secret reference name for managed repositories
    pub api_secret_ref_name: Option<&'a str>,
    /// Repository path used when no repository URL was given
    pub repo_path: Option<&'a str>,
}

/// Public representation of a persisted tenant
#[must_use]
pub fn tenant_to_api(tenant: &crd::Tenant) -> api::Tenant {
    let spec = &tenant.spec;
    let template = spec.git_repo_template.as_ref();
    let repo = GitRepo {
        url: non_empty(&spec.git_repo_url),
        host_keys: None,
        repo_type: template.map(|t| t.repo_type),
        deploy_key: deploy_key_to_api(template),
    };
    let git_repo = RevisionedGitRepo {
        repo,
        revision: non_empty(&spec.git_repo_revision),
    };
    api::Tenant {
        identity: Identity::new(tenant.name_any()),
        properties: TenantProperties {
            display_name: non_empty(&spec.display_name),
            annotations: strings_to_facts(tenant.metadata.annotations.as_ref()),
            git_repo: (git_repo != RevisionedGitRepo::default()).then_some(git_repo),
            global_git_repo_url: non_empty(&spec.global_git_repo_url),
            global_git_repo_revision: non_empty(&spec.global_git_repo_revision),
        },
    }
}

/// New persisted tenant from a public record.
///
/// The identifier is generated or prefixed as needed.
///
/// # Errors
///
/// Returns a [`SyncError`] if identifier generation, repository resolution or
/// deploy key validation fails.
pub fn tenant_to_resource(tenant: &api::Tenant) -> Result<crd::Tenant, SyncError> {
    let id = normalize_id(&tenant.identity.id, TENANT_ID_PREFIX)?;
    validate_id(&id)?;
    let mut resource = crd::Tenant::new(&id, TenantSpec::default());
    sync_tenant(&tenant.properties, &mut resource)?;
    Ok(resource)
}

/// Apply a partial update to a persisted tenant.
///
/// # Errors
///
/// Returns a [`SyncError`] if the repository URL or deploy key is invalid.
pub fn sync_tenant(source: &TenantProperties, target: &mut crd::Tenant) -> Result<(), SyncError> {
    let name = target.name_any();
    if let Some(display_name) = &source.display_name {
        target.spec.display_name.clone_from(display_name);
    }
    if let Some(annotations) = &source.annotations {
        merge_strings(&mut target.metadata.annotations, annotations);
    }
    if let Some(git_repo) = &source.git_repo {
        let spec = &mut target.spec;
        if let Some(url) = &git_repo.repo.url {
            spec.git_repo_url.clone_from(url);
        }
        if let Some(revision) = &git_repo.revision {
            spec.git_repo_revision.clone_from(revision);
        }
        let effective = GitRepo {
            url: non_empty(&spec.git_repo_url),
            ..git_repo.repo.clone()
        };
        update_repo_template(
            &mut spec.git_repo_template,
            &effective,
            git_repo.repo.url.is_some(),
            &name,
        )?;
        if let Some(deploy_key) = &git_repo.repo.deploy_key {
            apply_deploy_key(spec.git_repo_template.as_mut(), deploy_key)?;
        }
    }
    if let Some(url) = &source.global_git_repo_url {
        target.spec.global_git_repo_url.clone_from(url);
    }
    if let Some(revision) = &source.global_git_repo_revision {
        target.spec.global_git_repo_revision.clone_from(revision);
    }
    Ok(())
}

/// Apply creation-time defaults to a new tenant.
///
/// A tenant needs a repository URL. Without one, a managed template at the
/// default repository path is synthesized if such a path is configured.
///
/// # Errors
///
/// Returns [`SyncError::MissingRepoUrl`] if there is neither a URL nor a
/// default repository path.
pub fn apply_tenant_defaults(
    tenant: &mut crd::Tenant,
    defaults: &TenantDefaults<'_>,
) -> Result<(), SyncError> {
    let name = tenant.name_any();
    let spec = &mut tenant.spec;
    if spec.git_repo_url.is_empty() {
        let synthesize = spec.git_repo_template.is_none();
        match defaults.repo_path {
            Some(path) if synthesize => {
                let mut template = GitRepoTemplate::managed(path, name.as_str());
                template.display_name.clone_from(&name);
                spec.git_repo_template = Some(template);
            }
            _ => return Err(SyncError::MissingRepoUrl),
        }
    }
    if let (Some(secret_name), Some(template)) =
        (defaults.api_secret_ref_name, spec.git_repo_template.as_mut())
    {
        if template.is_managed() {
            template.api_secret_ref.name = secret_name.to_string();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FactValue;
    use crate::crd::RepoType;
    use std::collections::BTreeMap;

    fn with_repo(url: &str) -> TenantProperties {
        TenantProperties {
            git_repo: Some(RevisionedGitRepo {
                repo: GitRepo {
                    url: Some(url.to_string()),
                    ..GitRepo::default()
                },
                revision: None,
            }),
            ..TenantProperties::default()
        }
    }

    fn api_tenant(id: &str, properties: TenantProperties) -> api::Tenant {
        api::Tenant {
            identity: Identity::new(id),
            properties,
        }
    }

    #[test]
    fn test_to_resource_copies_revisions_and_urls() {
        let mut props = with_repo("ssh://git@example.com/foo/t-buzz.git");
        props.global_git_repo_url = Some("ssh://git@example.com/foo/bar.git".to_string());
        props.global_git_repo_revision = Some("v1.2.3".to_string());
        if let Some(repo) = props.git_repo.as_mut() {
            repo.revision = Some("v2.0.0".to_string());
        }
        let tenant = tenant_to_resource(&api_tenant("t-buzz", props)).unwrap();
        assert_eq!(tenant.name_any(), "t-buzz");
        assert_eq!(tenant.spec.git_repo_url, "ssh://git@example.com/foo/t-buzz.git");
        assert_eq!(tenant.spec.git_repo_revision, "v2.0.0");
        assert_eq!(tenant.spec.global_git_repo_url, "ssh://git@example.com/foo/bar.git");
        assert_eq!(tenant.spec.global_git_repo_revision, "v1.2.3");
        let template = tenant.spec.git_repo_template.unwrap();
        assert_eq!(template.path, "foo");
        assert_eq!(template.repo_name, "t-buzz");
    }

    #[test]
    fn test_to_resource_prefixes_id() {
        let tenant =
            tenant_to_resource(&api_tenant("acme", with_repo("ssh://git@h/g/r.git"))).unwrap();
        assert_eq!(tenant.name_any(), "t-acme");
    }

    #[test]
    fn test_to_api_omits_empty_fields() {
        let tenant = crd::Tenant::new("t-empty", TenantSpec::default());
        let api = tenant_to_api(&tenant);
        assert_eq!(api.identity.id, "t-empty");
        assert_eq!(api.properties, TenantProperties::default());
    }

    #[test]
    fn test_round_trip() {
        let mut props = with_repo("ssh://git@example.com/foo/t-buzz.git");
        props.display_name = Some("Buzz".to_string());
        props.annotations = Some(BTreeMap::from([(
            "monitoring.syn.tools/sla".to_string(),
            FactValue::from("247"),
        )]));
        if let Some(repo) = props.git_repo.as_mut() {
            repo.repo.repo_type = Some(RepoType::Auto);
            repo.repo.deploy_key = Some("ssh-ed25519 AAAA".to_string());
            repo.revision = Some("main".to_string());
        }
        let original = api_tenant("t-buzz", props);
        let round_tripped = tenant_to_api(&tenant_to_resource(&original).unwrap());
        assert_eq!(round_tripped, original);
    }

    #[test]
    fn test_sync_leaves_untouched_fields() {
        let mut tenant =
            tenant_to_resource(&api_tenant("t-a", with_repo("ssh://git@h/tenant-a/defaults.git")))
                .unwrap();
        tenant.spec.display_name = "Tenant A".to_string();
        let before = tenant.clone();
        let patch = TenantProperties {
            global_git_repo_revision: Some("v9".to_string()),
            ..TenantProperties::default()
        };
        sync_tenant(&patch, &mut tenant).unwrap();
        assert_eq!(tenant.spec.global_git_repo_revision, "v9");
        assert_eq!(tenant.spec.display_name, before.spec.display_name);
        assert_eq!(tenant.spec.git_repo_url, before.spec.git_repo_url);
        assert_eq!(tenant.spec.git_repo_template, before.spec.git_repo_template);
    }

    #[test]
    fn test_defaults_require_url_or_path() {
        let mut tenant = crd::Tenant::new("t-new", TenantSpec::default());
        let err = apply_tenant_defaults(&mut tenant, &TenantDefaults::default()).unwrap_err();
        assert!(matches!(err, SyncError::MissingRepoUrl));
    }

    #[test]
    fn test_defaults_synthesize_template_from_path() {
        let mut tenant = crd::Tenant::new("t-new", TenantSpec::default());
        let defaults = TenantDefaults {
            api_secret_ref_name: Some("api-creds"),
            repo_path: Some("syn/tenants"),
        };
        apply_tenant_defaults(&mut tenant, &defaults).unwrap();
        let template = tenant.spec.git_repo_template.unwrap();
        assert_eq!(template.path, "syn/tenants");
        assert_eq!(template.repo_name, "t-new");
        assert_eq!(template.api_secret_ref.name, "api-creds");
    }

    #[test]
    fn test_defaults_skip_secret_ref_for_unmanaged() {
        let mut props = with_repo("ssh://git@h/g/r.git");
        if let Some(repo) = props.git_repo.as_mut() {
            repo.repo.repo_type = Some(RepoType::Unmanaged);
        }
        let mut tenant = tenant_to_resource(&api_tenant("t-u", props)).unwrap();
        let defaults = TenantDefaults {
            api_secret_ref_name: Some("api-creds"),
            repo_path: None,
        };
        apply_tenant_defaults(&mut tenant, &defaults).unwrap();
        let template = tenant.spec.git_repo_template.unwrap();
        assert!(template.api_secret_ref.name.is_empty());
    }
}
