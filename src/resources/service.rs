//! Service exposing exporter metrics to Prometheus

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use super::{EXT_SOLR_METRICS_PORT, METRICS_PATH, SOLR_METRICS_PORT, SOLR_METRICS_PORT_NAME};
use crate::crd::{SolrPrometheusExporter, TECHNOLOGY, TECHNOLOGY_LABEL};
use crate::labels::merge_labels_or_annotations;

/// Label marking the Service as a metrics endpoint
pub const SERVICE_TYPE_LABEL: &str = "service-type";

/// Annotations picked up by Prometheus service discovery
fn scrape_annotations() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("prometheus.io/scrape".to_string(), "true".to_string()),
        ("prometheus.io/scheme".to_string(), "http".to_string()),
        ("prometheus.io/path".to_string(), METRICS_PATH.to_string()),
        (
            "prometheus.io/port".to_string(),
            EXT_SOLR_METRICS_PORT.to_string(),
        ),
    ])
}

/// Labels selecting exporter pods, shared with the Deployment selector
pub(crate) fn exporter_selector_labels(exporter: &SolrPrometheusExporter) -> BTreeMap<String, String> {
    let mut selector = exporter.shared_labels();
    selector.insert(TECHNOLOGY_LABEL.to_string(), TECHNOLOGY.to_string());
    selector
}

/// Generate the metrics Service
///
/// Metrics are scraped through the Service rather than per pod so that
/// several exporter replicas never report the same data twice.
pub fn generate_metrics_service(exporter: &SolrPrometheusExporter) -> Service {
    let options = exporter.spec.custom_kube_options.service_options.as_ref();

    let mut base = exporter.shared_labels_with(exporter.labels());
    base.insert(SERVICE_TYPE_LABEL.to_string(), "metrics".to_string());
    let labels = merge_labels_or_annotations(Some(&base), options.and_then(|o| o.labels.as_ref()));
    let annotations = merge_labels_or_annotations(
        Some(&scrape_annotations()),
        options.and_then(|o| o.annotations.as_ref()),
    );

    Service {
        metadata: ObjectMeta {
            name: Some(exporter.metrics_service_name()),
            namespace: exporter.namespace(),
            labels: Some(labels),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some(SOLR_METRICS_PORT_NAME.to_string()),
                port: EXT_SOLR_METRICS_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(SOLR_METRICS_PORT)),
                ..Default::default()
            }]),
            selector: Some(exporter_selector_labels(exporter)),
            ..Default::default()
        }),
        ..Default::default()
    }
}
