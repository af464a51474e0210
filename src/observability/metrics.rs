//! # Metrics
//!
//! Prometheus metrics for monitoring the API.
//!
//! ## Metrics Exposed
//!
//! - `lieutenant_api_credential_cache_hits_total` - Requests served by a cached client
//! - `lieutenant_api_credential_cache_misses_total` - Requests that had to build a client
//! - `lieutenant_api_credential_cache_evictions_total` - Clients dropped to stay within capacity
//! - `lieutenant_api_install_handshakes_total` - Install handshakes by outcome
//! - `lieutenant_api_token_invalidation_failures_total` - Bootstrap tokens that could not be marked as used

use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static CREDENTIAL_CACHE_HITS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lieutenant_api_credential_cache_hits_total",
        "Total number of requests served by a cached client",
    )
    .expect("Failed to create CREDENTIAL_CACHE_HITS_TOTAL metric - this should never happen")
});

static CREDENTIAL_CACHE_MISSES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lieutenant_api_credential_cache_misses_total",
        "Total number of requests that required building a client",
    )
    .expect("Failed to create CREDENTIAL_CACHE_MISSES_TOTAL metric - this should never happen")
});

static CREDENTIAL_CACHE_EVICTIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lieutenant_api_credential_cache_evictions_total",
        "Total number of cached clients evicted to stay within capacity",
    )
    .expect("Failed to create CREDENTIAL_CACHE_EVICTIONS_TOTAL metric - this should never happen")
});

static INSTALL_HANDSHAKES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "lieutenant_api_install_handshakes_total",
            "Total number of install handshakes by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create INSTALL_HANDSHAKES_TOTAL metric - this should never happen")
});

static TOKEN_INVALIDATION_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lieutenant_api_token_invalidation_failures_total",
        "Total number of bootstrap tokens that could not be marked as used",
    )
    .expect("Failed to create TOKEN_INVALIDATION_FAILURES_TOTAL metric - this should never happen")
});

/// Register all collectors with the registry served on `/metrics`
///
/// # Errors
///
/// Returns an error if a collector is already registered.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(CREDENTIAL_CACHE_HITS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CREDENTIAL_CACHE_MISSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CREDENTIAL_CACHE_EVICTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INSTALL_HANDSHAKES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TOKEN_INVALIDATION_FAILURES_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_credential_cache_hits() {
    CREDENTIAL_CACHE_HITS_TOTAL.inc();
}

pub fn increment_credential_cache_misses() {
    CREDENTIAL_CACHE_MISSES_TOTAL.inc();
}

pub fn increment_credential_cache_evictions() {
    CREDENTIAL_CACHE_EVICTIONS_TOTAL.inc();
}

/// Count a finished install handshake; `outcome` is a short stable label
pub fn record_install_handshake(outcome: &str) {
    INSTALL_HANDSHAKES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_token_invalidation_failures() {
    TOKEN_INVALIDATION_FAILURES_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_credential_cache_hits() {
        let before = CREDENTIAL_CACHE_HITS_TOTAL.get();
        increment_credential_cache_hits();
        let after = CREDENTIAL_CACHE_HITS_TOTAL.get();
        assert!(after > before);
    }

    #[test]
    fn test_record_install_handshake() {
        let before = INSTALL_HANDSHAKES_TOTAL
            .with_label_values(&["served"])
            .get();
        record_install_handshake("served");
        let after = INSTALL_HANDSHAKES_TOTAL
            .with_label_values(&["served"])
            .get();
        assert!(after > before);
    }

    #[test]
    fn test_increment_token_invalidation_failures() {
        let before = TOKEN_INVALIDATION_FAILURES_TOTAL.get();
        increment_token_invalidation_failures();
        let after = TOKEN_INVALIDATION_FAILURES_TOTAL.get();
        assert!(after > before);
    }
}
