//! # CRD Generator
//!
//! Prints the `Tenant` and `Cluster` CustomResourceDefinitions as a
//! multi-document YAML stream.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/syn.tools.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use lieutenant_api::crd::{Cluster, Tenant};

fn main() {
    for crd in [Tenant::crd(), Cluster::crd()] {
        match serde_yaml::to_string(&crd) {
            Ok(yaml) => print!("---\n{yaml}"),
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
