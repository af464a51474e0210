//! Lieutenant API Library
//!
//! REST facade over the `syn.tools` Tenant and Cluster custom resources.
//! Callers act with their own bearer token against the backing store; new
//! clusters fetch their agent manifests once with a bootstrap token.
//!
//! Tests are included in the module files and under `tests/`.

pub mod api;
pub mod auth;
pub mod config;
pub mod constants;
pub mod crd;
pub mod install;
pub mod observability;
pub mod server;
pub mod store;
pub mod sync;
