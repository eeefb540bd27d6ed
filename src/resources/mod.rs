//! Desired-state generation for the resources an exporter owns
//!
//! Every function here is pure: the same exporter (and resolved connection)
//! always yields the same ConfigMap, Service and Deployment. The controller
//! stamps the owner reference with [`with_owner`] before converging them.

mod config_map;
mod deployment;
mod service;
mod zookeeper;

pub use config_map::generate_metrics_config_map;
pub use deployment::generate_exporter_deployment;
pub use service::generate_metrics_service;
pub use zookeeper::zookeeper_acl_env_vars;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;

use crate::crd::SolrPrometheusExporter;
use crate::Error;

/// Port the exporter listens on inside the pod
pub const SOLR_METRICS_PORT: i32 = 8080;

/// Name of the metrics port on both the container and the Service
pub const SOLR_METRICS_PORT_NAME: &str = "solr-metrics";

/// Port exposed by the metrics Service
pub const EXT_SOLR_METRICS_PORT: i32 = 80;

/// Exporter executable used when `exporterEntrypoint` is unset
pub const DEFAULT_EXPORTER_ENTRYPOINT: &str =
    "/opt/solr/contrib/prometheus-exporter/bin/solr-exporter";

/// Configuration baked into the Solr image
pub const DEFAULT_EXPORTER_CONFIG_PATH: &str =
    "/opt/solr/contrib/prometheus-exporter/conf/solr-exporter-config.xml";

/// Key of the configuration document in the ConfigMap
pub const EXPORTER_CONFIG_KEY: &str = "solr-prometheus-exporter.xml";

/// Volume carrying the ConfigMap into the pod
pub const EXPORTER_CONFIG_VOLUME: &str = "solr-prometheus-exporter-xml";

/// Directory the ConfigMap is mounted at
pub const EXPORTER_CONFIG_MOUNT_DIR: &str = "/opt/solr-exporter";

/// Name of the exporter container
pub const EXPORTER_CONTAINER_NAME: &str = "solr-prometheus-exporter";

/// Path the exporter serves metrics on
pub const METRICS_PATH: &str = "/metrics";

/// Full path of the mounted configuration document
pub fn mounted_config_path() -> String {
    format!("{EXPORTER_CONFIG_MOUNT_DIR}/{EXPORTER_CONFIG_KEY}")
}

/// Controller owner reference pointing at the exporter
pub fn controller_owner_reference(exporter: &SolrPrometheusExporter) -> Result<OwnerReference, Error> {
    exporter.controller_owner_ref(&()).ok_or_else(|| {
        Error::owner_reference(format!(
            "exporter {} has no uid yet",
            exporter.metadata.name.as_deref().unwrap_or_default()
        ))
    })
}

/// Attach the exporter's controller reference to a generated resource
pub fn with_owner<K: Resource>(
    mut resource: K,
    exporter: &SolrPrometheusExporter,
) -> Result<K, Error> {
    let owner = controller_owner_reference(exporter)?;
    resource.meta_mut().owner_references = Some(vec![owner]);
    Ok(resource)
}
