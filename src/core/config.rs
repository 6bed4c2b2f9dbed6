use std::net::SocketAddr;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub fn compose_config<'de, CFG: Deserialize<'de>>(external_path: &str, env_prefix: &str) -> Result<CFG, ConfigError> {
    Config::builder()

        // Add in a local configuration file
        .add_source(File::with_name(external_path).required(false))

        // Add in settings from the environment (with a prefix of AUTOSCALER)
        .add_source(Environment::with_prefix(env_prefix))

        .build()?
        .try_deserialize()
}

#[derive(Clone, Deserialize)]
pub struct OperatorConfig {
    /// Namespace holding the watched resources and the generated deployments.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Name of the ClusterAutoscaler resource checked by the status endpoint.
    #[serde(default = "default_name")]
    pub name: String,
    /// Image run by the generated deployments.
    #[serde(default = "default_image")]
    pub image: String,
    /// Version stamped on the generated deployments.
    #[serde(default)]
    pub release_version: String,
    #[serde(default = "default_cloud_provider")]
    pub cloud_provider: String,
    /// Listen address of the metrics and status server.
    #[serde(default = "default_address")]
    pub address: SocketAddr,
}

fn default_namespace() -> String {
    String::from("kube-system")
}

fn default_name() -> String {
    String::from("default")
}

fn default_image() -> String {
    String::from("quay.io/bison/cluster-autoscaler:a554b4f5")
}

fn default_cloud_provider() -> String {
    String::from("clusterapi")
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9090))
}
