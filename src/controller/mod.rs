//! Controller implementation for SolrPrometheusExporter
//!
//! The controller follows the Kubernetes controller pattern with
//! observe-diff-act loops over the exporter's ConfigMap, Service and Deployment.

mod exporter;

pub use exporter::{
    error_policy, reconcile, Context, ExporterKubeClient, ExporterKubeClientImpl, FIELD_MANAGER,
};

#[cfg(test)]
pub use exporter::MockExporterKubeClient;
