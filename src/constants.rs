//! # Constants
//!
//! Shared constants used throughout the API.
//!
//! These values represent defaults and fixed literals. Defaults can be
//! overridden via environment variables where noted.

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default namespace holding tenants, clusters and their secrets
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default capacity of the per-credential client cache
pub const DEFAULT_CLIENT_CACHE_SIZE: usize = 128;

/// Default agent image referenced by the install manifest
pub const DEFAULT_STEWARD_IMAGE: &str = "docker.io/projectsyn/steward:v0.12.0";

/// Default log level when neither `RUST_LOG` nor `LOG_LEVEL` is set
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log format (`text` or `json`)
pub const DEFAULT_LOG_FORMAT: &str = "text";

// Environment variable names
pub const ENV_NAMESPACE: &str = "NAMESPACE";
pub const ENV_CLIENT_CACHE_SIZE: &str = "K8S_AUTH_CLIENT_CACHE_SIZE";
pub const ENV_INSTANCE_NAME: &str = "LIEUTENANT_INSTANCE";
pub const ENV_DEFAULT_API_SECRET_REF_NAME: &str = "DEFAULT_API_SECRET_REF_NAME";
pub const ENV_DEFAULT_TENANT_REPO_PATH: &str = "DEFAULT_TENANT_REPO_PATH";
pub const ENV_STEWARD_IMAGE: &str = "STEWARD_IMAGE";
pub const ENV_PORT: &str = "PORT";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// Scheme expected in the `Authorization` header (case-sensitive)
pub const AUTH_SCHEME: &str = "Bearer";

/// Paths served without a caller credential
pub const UNAUTHENTICATED_PATHS: [&str; 4] = ["/healthz", "/metrics", "/openapi.json", "/docs"];

/// Suffix of the install-manifest path, authenticated by bootstrap token instead
pub const INSTALL_PATH_SUFFIX: &str = "/install/steward.json";

/// Identifier prefix for tenants
pub const TENANT_ID_PREFIX: &str = "t-";

/// Identifier prefix for clusters
pub const CLUSTER_ID_PREFIX: &str = "c-";

/// Maximum identifier length (DNS label)
pub const MAX_ID_LENGTH: usize = 63;

/// Attempts made by the identifier generator before giving up
pub const MAX_ID_GENERATION_ATTEMPTS: usize = 10;

/// Fact stamped onto new clusters with the instance name
pub const INSTANCE_FACT: &str = "lieutenant-instance";

/// Label on clusters carrying the owning tenant id
pub const TENANT_LABEL: &str = "syn.tools/tenant";

/// Deploy key entry managed through the API
pub const STEWARD_DEPLOY_KEY: &str = "steward";

/// Secret type of service-account tokens
pub const SERVICE_ACCOUNT_TOKEN_TYPE: &str = "kubernetes.io/service-account-token";

/// Annotation naming the service account a token secret belongs to
pub const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";

/// Namespace the agent is installed into
pub const STEWARD_NAMESPACE: &str = "syn";

/// Name shared by the agent's service account, secret and deployment
pub const STEWARD_NAME: &str = "steward";
