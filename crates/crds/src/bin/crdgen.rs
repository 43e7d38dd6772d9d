//! Prints every CRD in this crate as a multi-document YAML stream.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/bases/gateway.yaml`

use anyhow::Result;
use crds::{
    ClientSettingsPolicy, GatewayControlConfig, ObservabilityPolicy, ProxyConfig, SnippetsFilter,
    UpstreamSettingsPolicy,
};
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let crds = [
        GatewayControlConfig::crd(),
        ProxyConfig::crd(),
        ClientSettingsPolicy::crd(),
        ObservabilityPolicy::crd(),
        UpstreamSettingsPolicy::crd(),
        SnippetsFilter::crd(),
    ];

    for crd in crds {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }

    Ok(())
}
