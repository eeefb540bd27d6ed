//! SolrPrometheusExporter Custom Resource Definition
//!
//! A SolrPrometheusExporter runs a Solr Prometheus exporter process against a
//! standalone Solr node or a SolrCloud, and exposes its metrics through a
//! Service annotated for Prometheus discovery.

use std::collections::{BTreeMap, BTreeSet};

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ContainerImage, CustomExporterKubeOptions, SolrReference};
use crate::resources::EXPORTER_CONFIG_VOLUME;
use crate::Error;

/// Label key identifying resources belonging to one exporter
pub const EXPORTER_LABEL: &str = "solr-prometheus-exporter";

/// Label key identifying the kind of workload
pub const TECHNOLOGY_LABEL: &str = "technology";

/// Value of [`TECHNOLOGY_LABEL`] for exporter pods
pub const TECHNOLOGY: &str = "solr-prometheus-exporter";

/// Specification for a SolrPrometheusExporter
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "solr.bloomberg.com",
    version = "v1beta1",
    kind = "SolrPrometheusExporter",
    plural = "solrprometheusexporters",
    shortname = "solrmetrics",
    status = "SolrPrometheusExporterStatus",
    namespaced,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Scrape Interval","type":"integer","jsonPath":".spec.scrapeInterval"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SolrPrometheusExporterSpec {
    /// Solr deployment to export metrics for
    #[serde(default)]
    pub solr_reference: SolrReference,

    /// Image of the exporter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ContainerImage>,

    /// Number of threads used to scrape Solr
    #[serde(default)]
    pub num_threads: i32,

    /// Scrape interval in seconds; 0 leaves the exporter default
    #[serde(default)]
    pub scrape_interval: i32,

    /// Exporter configuration XML; the image's default config is used when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub config: String,

    /// Path of the exporter executable inside the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exporter_entrypoint: Option<String>,

    /// Customization of the generated resources
    #[serde(default)]
    pub custom_kube_options: CustomExporterKubeOptions,
}

/// Status for a SolrPrometheusExporter
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolrPrometheusExporterStatus {
    /// Whether at least one exporter pod is ready
    #[serde(default)]
    pub ready: bool,
}

impl SolrPrometheusExporter {
    /// Fill unset fields with their defaults, returning true if anything changed
    pub fn with_defaults(&mut self) -> bool {
        let namespace = self.namespace().unwrap_or_default();
        let spec = &mut self.spec;
        let mut changed = false;

        if spec.image.is_none() {
            spec.image = Some(ContainerImage::default());
            changed = true;
        }
        if let Some(image) = spec.image.as_mut() {
            changed |= image.with_defaults();
        }
        if spec.num_threads == 0 {
            spec.num_threads = 1;
            changed = true;
        }
        changed |= spec.solr_reference.with_defaults(&namespace);

        changed
    }

    /// Image of the exporter, with defaults applied if they were not persisted yet
    pub fn image(&self) -> ContainerImage {
        let mut image = self.spec.image.clone().unwrap_or_default();
        image.with_defaults();
        image
    }

    /// Name of the ConfigMap holding the exporter configuration
    pub fn metrics_config_map_name(&self) -> String {
        format!("{}-solr-metrics", self.name_any())
    }

    /// Name of the metrics Service
    pub fn metrics_service_name(&self) -> String {
        format!("{}-solr-metrics", self.name_any())
    }

    /// Name of the exporter Deployment
    pub fn metrics_deployment_name(&self) -> String {
        format!("{}-solr-metrics", self.name_any())
    }

    /// Labels shared by every resource generated for this exporter
    pub fn shared_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(EXPORTER_LABEL.to_string(), self.name_any())])
    }

    /// The given labels extended with [`Self::shared_labels`]
    pub fn shared_labels_with(&self, labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = labels.clone();
        merged.extend(self.shared_labels());
        merged
    }

    /// Whether a ConfigMap should be managed for this exporter
    pub fn has_custom_config(&self) -> bool {
        !self.spec.config.is_empty()
    }

    /// Last recorded readiness, false when no status was written yet
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready)
    }

    /// Reject specs that would produce a Deployment the API server refuses
    ///
    /// None of these can be fixed by retrying; the exporter must be edited.
    pub fn validate(&self) -> Result<(), Error> {
        let spec = &self.spec;
        if spec.num_threads < 0 {
            return Err(Error::validation(format!(
                "numThreads must not be negative, got {}",
                spec.num_threads
            )));
        }
        if spec.scrape_interval < 0 {
            return Err(Error::validation(format!(
                "scrapeInterval must not be negative, got {}",
                spec.scrape_interval
            )));
        }

        let volumes = spec
            .custom_kube_options
            .pod_options
            .iter()
            .flat_map(|p| p.volumes.iter());
        let mut seen = BTreeSet::new();
        for volume in volumes {
            if volume.name == EXPORTER_CONFIG_VOLUME {
                return Err(Error::validation(format!(
                    "volume name {EXPORTER_CONFIG_VOLUME} is reserved for the exporter config"
                )));
            }
            if !seen.insert(volume.name.as_str()) {
                return Err(Error::validation(format!(
                    "volume {} is declared more than once",
                    volume.name
                )));
            }
        }
        Ok(())
    }
}
