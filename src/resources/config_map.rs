//! ConfigMap carrying a user supplied exporter configuration

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use super::EXPORTER_CONFIG_KEY;
use crate::crd::SolrPrometheusExporter;
use crate::labels::merge_labels_or_annotations;

/// Generate the ConfigMap holding `spec.config`
///
/// Only meaningful when the exporter has a custom config; callers check
/// [`SolrPrometheusExporter::has_custom_config`] first.
pub fn generate_metrics_config_map(exporter: &SolrPrometheusExporter) -> ConfigMap {
    let options = exporter.spec.custom_kube_options.config_map_options.as_ref();

    let base = exporter.shared_labels_with(exporter.labels());
    let labels = merge_labels_or_annotations(Some(&base), options.and_then(|o| o.labels.as_ref()));
    let annotations = options.and_then(|o| o.annotations.clone());

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(exporter.metrics_config_map_name()),
            namespace: exporter.namespace(),
            labels: Some(labels),
            annotations,
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            EXPORTER_CONFIG_KEY.to_string(),
            exporter.spec.config.clone(),
        )])),
        ..Default::default()
    }
}
