//! # API Configuration
//!
//! Process-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_CLIENT_CACHE_SIZE, DEFAULT_LOG_FORMAT, DEFAULT_LOG_LEVEL, DEFAULT_NAMESPACE,
    DEFAULT_PORT, DEFAULT_STEWARD_IMAGE, ENV_CLIENT_CACHE_SIZE, ENV_DEFAULT_API_SECRET_REF_NAME,
    ENV_DEFAULT_TENANT_REPO_PATH, ENV_INSTANCE_NAME, ENV_LOG_FORMAT, ENV_LOG_LEVEL,
    ENV_NAMESPACE, ENV_PORT, ENV_STEWARD_IMAGE,
};

/// API configuration
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Namespace holding tenants, clusters and service-account secrets
    pub namespace: String,
    /// Capacity of the per-credential client cache
    pub client_cache_size: usize,
    /// Stamped into the instance fact of every new cluster
    pub instance_name: String,
    /// API secret reference applied to new tenants with a managed repository
    pub default_api_secret_ref_name: Option<String>,
    /// Repository path used when a tenant is created without a repository URL
    pub default_tenant_repo_path: Option<String>,
    /// Agent image referenced by the install manifest
    pub steward_image: String,
    /// HTTP listen port
    pub port: u16,
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            client_cache_size: DEFAULT_CLIENT_CACHE_SIZE,
            instance_name: String::new(),
            default_api_secret_ref_name: None,
            default_tenant_repo_path: None,
            steward_image: DEFAULT_STEWARD_IMAGE.to_string(),
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            namespace: non_empty(env_var_or_default_str(ENV_NAMESPACE, DEFAULT_NAMESPACE))
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            client_cache_size: parse_cache_size(std::env::var(ENV_CLIENT_CACHE_SIZE).ok().as_deref()),
            instance_name: env_var_or_default_str(ENV_INSTANCE_NAME, ""),
            default_api_secret_ref_name: std::env::var(ENV_DEFAULT_API_SECRET_REF_NAME).ok(),
            default_tenant_repo_path: std::env::var(ENV_DEFAULT_TENANT_REPO_PATH)
                .ok()
                .and_then(non_empty),
            steward_image: env_var_or_default_str(ENV_STEWARD_IMAGE, DEFAULT_STEWARD_IMAGE),
            port: env_var_or_default(ENV_PORT, DEFAULT_PORT),
            log_level: env_var_or_default_str(ENV_LOG_LEVEL, DEFAULT_LOG_LEVEL),
            log_format: env_var_or_default_str(ENV_LOG_FORMAT, DEFAULT_LOG_FORMAT),
        }
    }

    /// Whether logs should be emitted as JSON
    #[must_use]
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Parse the cache capacity; anything that is not a positive integer yields the default.
#[must_use]
pub fn parse_cache_size(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|size| *size > 0)
        .and_then(|size| usize::try_from(size).ok())
        .unwrap_or(DEFAULT_CLIENT_CACHE_SIZE)
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_size_defaults_when_unset() {
        assert_eq!(parse_cache_size(None), DEFAULT_CLIENT_CACHE_SIZE);
    }

    #[test]
    fn test_cache_size_accepts_positive_values() {
        assert_eq!(parse_cache_size(Some("16")), 16);
        assert_eq!(parse_cache_size(Some(" 1 ")), 1);
    }

    #[test]
    fn test_cache_size_rejects_invalid_values() {
        for raw in ["", "0", "-5", "many", "1.5"] {
            assert_eq!(
                parse_cache_size(Some(raw)),
                DEFAULT_CLIENT_CACHE_SIZE,
                "'{raw}' should fall back to the default"
            );
        }
    }

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.namespace, "default");
        assert_eq!(config.client_cache_size, 128);
        assert!(config.default_api_secret_ref_name.is_none());
        assert!(!config.json_logs());
    }
}
