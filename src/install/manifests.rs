//! Agent install manifests.

use crate::constants::{STEWARD_NAME, STEWARD_NAMESPACE};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, Namespace, PodSpec, PodTemplateSpec, Secret,
    SecretKeySelector, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const ADMIN_ROLE: &str = "syn-admin";
const ADMIN_BINDING: &str = "syn-steward";
const NAME_LABEL: &str = "app.kubernetes.io/name";
const TOKEN_KEY: &str = "token";

/// Inputs of the install bundle
#[derive(Debug, Clone, Copy)]
pub struct ManifestParams<'a> {
    /// Public base URL of this API, e.g. `https://api.example.com`
    pub api_url: &'a str,
    pub cluster_id: &'a str,
    /// Service-account token the agent authenticates with
    pub token: &'a str,
    pub image: &'a str,
}

fn labels() -> BTreeMap<String, String> {
    BTreeMap::from([(NAME_LABEL.to_string(), STEWARD_NAME.to_string())])
}

fn namespaced_meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(STEWARD_NAMESPACE.to_string()),
        labels: Some(labels()),
        ..ObjectMeta::default()
    }
}

fn cluster_meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: Some(labels()),
        ..ObjectMeta::default()
    }
}

fn namespace() -> Namespace {
    Namespace {
        metadata: cluster_meta(STEWARD_NAMESPACE),
        ..Namespace::default()
    }
}

fn admin_role() -> ClusterRole {
    let all = || Some(vec!["*".to_string()]);
    ClusterRole {
        metadata: cluster_meta(ADMIN_ROLE),
        rules: Some(vec![
            PolicyRule {
                api_groups: all(),
                resources: all(),
                verbs: vec!["*".to_string()],
                ..PolicyRule::default()
            },
            PolicyRule {
                non_resource_urls: all(),
                verbs: vec!["*".to_string()],
                ..PolicyRule::default()
            },
        ]),
        ..ClusterRole::default()
    }
}

fn admin_binding() -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: cluster_meta(ADMIN_BINDING),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: ADMIN_ROLE.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: STEWARD_NAME.to_string(),
            namespace: Some(STEWARD_NAMESPACE.to_string()),
            ..Subject::default()
        }]),
    }
}

fn service_account() -> ServiceAccount {
    ServiceAccount {
        metadata: namespaced_meta(STEWARD_NAME),
        ..ServiceAccount::default()
    }
}

fn token_secret(token: &str) -> Secret {
    Secret {
        metadata: namespaced_meta(STEWARD_NAME),
        string_data: Some(BTreeMap::from([(TOKEN_KEY.to_string(), token.to_string())])),
        ..Secret::default()
    }
}

fn deployment(params: &ManifestParams<'_>) -> Deployment {
    let env = vec![
        EnvVar {
            name: "STEWARD_API".to_string(),
            value: Some(params.api_url.to_string()),
            ..EnvVar::default()
        },
        EnvVar {
            name: "STEWARD_CLUSTER_ID".to_string(),
            value: Some(params.cluster_id.to_string()),
            ..EnvVar::default()
        },
        EnvVar {
            name: "STEWARD_TOKEN".to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    key: TOKEN_KEY.to_string(),
                    name: STEWARD_NAME.to_string().into(),
                    ..SecretKeySelector::default()
                }),
                ..EnvVarSource::default()
            }),
            ..EnvVar::default()
        },
    ];
    Deployment {
        metadata: namespaced_meta(STEWARD_NAME),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels()),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(STEWARD_NAME.to_string()),
                    containers: vec![Container {
                        name: STEWARD_NAME.to_string(),
                        image: Some(params.image.to_string()),
                        env: Some(env),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

fn item<T: Serialize>(object: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(object)
}

/// Install bundle as a `v1` `List`
///
/// The namespace comes first so the remaining objects can be applied in order.
///
/// # Errors
///
/// Returns an error if an object cannot be serialized.
pub fn build_manifests(params: &ManifestParams<'_>) -> Result<Value, serde_json::Error> {
    let items = vec![
        item(&namespace())?,
        item(&admin_role())?,
        item(&admin_binding())?,
        item(&service_account())?,
        item(&token_secret(params.token))?,
        item(&deployment(params))?,
    ];
    Ok(json!({
        "apiVersion": "v1",
        "kind": "List",
        "metadata": {},
        "items": items,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ManifestParams<'static> {
        ManifestParams {
            api_url: "https://example.com",
            cluster_id: "c-sample",
            token: "sometoken",
            image: "docker.io/projectsyn/steward:v0.12.0",
        }
    }

    #[test]
    fn test_bundle_order() {
        let bundle = build_manifests(&params()).unwrap();
        assert_eq!(bundle["kind"], "List");
        let kinds: Vec<_> = bundle["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["kind"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            kinds,
            [
                "Namespace",
                "ClusterRole",
                "ClusterRoleBinding",
                "ServiceAccount",
                "Secret",
                "Deployment"
            ]
        );
    }

    #[test]
    fn test_secret_carries_token() {
        let bundle = build_manifests(&params()).unwrap();
        let secret = &bundle["items"][4];
        assert_eq!(secret["metadata"]["namespace"], "syn");
        assert_eq!(secret["stringData"]["token"], "sometoken");
    }

    #[test]
    fn test_deployment_environment() {
        let bundle = build_manifests(&params()).unwrap();
        let container = &bundle["items"][5]["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["image"], "docker.io/projectsyn/steward:v0.12.0");
        assert_eq!(container["env"][0]["value"], "https://example.com");
        assert_eq!(container["env"][1]["value"], "c-sample");
        assert_eq!(
            container["env"][2]["valueFrom"]["secretKeyRef"]["name"],
            "steward"
        );
    }
}
