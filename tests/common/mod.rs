//! Common test utilities for API integration tests
//!
//! Provides seeded tenants, clusters and service-account secrets plus a
//! router wired to an in-memory store, so requests can be driven end to end
//! without a Kubernetes API server.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use lieutenant_api::auth::{AuthResolver, ClientError, ClientFactory};
use lieutenant_api::config::ApiConfig;
use lieutenant_api::constants::{
    SERVICE_ACCOUNT_NAME_ANNOTATION, SERVICE_ACCOUNT_TOKEN_TYPE, TENANT_LABEL,
};
use lieutenant_api::crd::{
    BootstrapToken, Cluster, ClusterSpec, ClusterStatus, GitRepoTemplate, Tenant, TenantRef,
    TenantSpec,
};
use lieutenant_api::server::{router, AppState};
use lieutenant_api::store::{MemoryStore, ResourceStore};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub const TENANT_A: &str = "t-aezoo6";
pub const TENANT_B: &str = "t-b1ohw2";
pub const CLUSTER_A: &str = "c-aukaey";
pub const CLUSTER_B: &str = "c-bohdoo";

pub const TOKEN_A: &str = "haevechee2ethot";
pub const TOKEN_B: &str = "shuaCh1k";

pub const CALLER_TOKEN: &str = "eyJhbGciOiJSUzI1NiJ9.caller";

/// Factory handing out the same in-memory store for every identity
#[derive(Debug)]
pub struct TestFactory {
    store: Arc<MemoryStore>,
    builds: AtomicUsize,
}

impl TestFactory {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for TestFactory {
    async fn create_client(
        &self,
        _token: Option<&str>,
    ) -> Result<Arc<dyn ResourceStore>, ClientError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.store) as Arc<dyn ResourceStore>)
    }
}

pub fn tenant_a() -> Tenant {
    let mut tenant = Tenant::new(
        TENANT_A,
        TenantSpec {
            display_name: "Tenant A".to_string(),
            git_repo_url: "ssh://git@github.com/tenant-a/defaults.git".to_string(),
            git_repo_template: Some(GitRepoTemplate::unmanaged()),
            ..TenantSpec::default()
        },
    );
    tenant.annotations_mut().extend([
        ("some".to_string(), "value".to_string()),
        ("existing".to_string(), "annotation".to_string()),
    ]);
    tenant
}

pub fn tenant_b() -> Tenant {
    let mut template = GitRepoTemplate::managed("tenant-a", "defaults");
    template.api_secret_ref.name = "api-creds".to_string();
    Tenant::new(
        TENANT_B,
        TenantSpec {
            display_name: "Tenant B".to_string(),
            git_repo_template: Some(template),
            ..TenantSpec::default()
        },
    )
}

fn bootstrap_status(token: &str, valid: bool, offset: Duration) -> ClusterStatus {
    ClusterStatus {
        bootstrap_token: Some(BootstrapToken {
            token: token.to_string(),
            token_valid: valid,
            valid_until: Utc::now() + offset,
        }),
        ..ClusterStatus::default()
    }
}

fn labelled(mut cluster: Cluster) -> Cluster {
    let tenant = cluster.spec.tenant_ref.name.clone();
    cluster.labels_mut().insert(TENANT_LABEL.to_string(), tenant);
    cluster
}

pub fn cluster_a() -> Cluster {
    let mut cluster = Cluster::new(
        CLUSTER_A,
        ClusterSpec {
            display_name: "Cluster A".to_string(),
            git_repo_url: "ssh://git@github.com/tenant-a/cluster-a.git".to_string(),
            git_host_keys: "github.com ssh-ed25519 AAAA".to_string(),
            git_repo_template: Some(GitRepoTemplate::unmanaged()),
            tenant_ref: TenantRef {
                name: TENANT_A.to_string(),
            },
            facts: BTreeMap::from([("cloud".to_string(), "cloudscale".to_string())]),
            ..ClusterSpec::default()
        },
    );
    cluster.status = Some(bootstrap_status(TOKEN_A, true, Duration::minutes(30)));
    labelled(cluster)
}

pub fn cluster_b() -> Cluster {
    let mut cluster = Cluster::new(
        CLUSTER_B,
        ClusterSpec {
            display_name: "Another Cluster".to_string(),
            git_repo_template: Some(GitRepoTemplate::managed("tenant-b", "cluster-b")),
            tenant_ref: TenantRef {
                name: TENANT_B.to_string(),
            },
            ..ClusterSpec::default()
        },
    );
    cluster
        .annotations_mut()
        .insert("existing".to_string(), "annotation".to_string());
    cluster.status = Some(bootstrap_status(TOKEN_B, false, Duration::hours(-1)));
    labelled(cluster)
}

/// Service-account token secret for `account`
pub fn service_account_secret(name: &str, account: &str, token: &str, created: &str) -> Secret {
    let mut secret = Secret {
        type_: Some(SERVICE_ACCOUNT_TOKEN_TYPE.to_string()),
        data: Some(BTreeMap::from([(
            "token".to_string(),
            ByteString(token.as_bytes().to_vec()),
        )])),
        ..Secret::default()
    };
    secret.metadata.name = Some(name.to_string());
    secret.metadata.creation_timestamp =
        Some(serde_json::from_value::<Time>(json!(created)).expect("valid timestamp"));
    secret.metadata.annotations = Some(BTreeMap::from([(
        SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(),
        account.to_string(),
    )]));
    secret
}

/// Router backed by a seeded in-memory store
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub factory: Arc<TestFactory>,
    pub resolver: Arc<AuthResolver>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ApiConfig {
            instance_name: "lieutenant-test".to_string(),
            ..ApiConfig::default()
        })
    }

    pub fn with_config(config: ApiConfig) -> Self {
        let store = Arc::new(MemoryStore::new(config.namespace.clone()));
        store.insert_tenant(tenant_a());
        store.insert_tenant(tenant_b());
        store.insert_cluster(cluster_a());
        store.insert_cluster(cluster_b());
        store.insert_secret(service_account_secret(
            "c-aukaey-token-abcde",
            CLUSTER_A,
            "sa-token-a",
            "2024-01-01T00:00:00Z",
        ));

        let factory = Arc::new(TestFactory {
            store: Arc::clone(&store),
            builds: AtomicUsize::new(0),
        });
        let resolver = AuthResolver::new(
            Arc::clone(&factory) as Arc<dyn ClientFactory>,
            config.client_cache_size,
        );
        let state = AppState::new(config, resolver);
        let resolver = Arc::clone(&state.resolver);
        Self {
            store,
            factory,
            resolver,
            router: router(state),
        }
    }

    /// Send a request as the default caller
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let auth = format!("Bearer {CALLER_TOKEN}");
        self.send(method, uri, body, &[("authorization", auth.as_str())])
            .await
    }

    /// Send a request with exactly the given headers
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("valid request");
        self.raw(request).await
    }

    /// Send a prepared request and decode the JSON response, if any
    pub async fn raw(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }
}
