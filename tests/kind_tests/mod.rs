//! Integration tests for the Solr metrics operator
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how users run Prometheus exporters for their Solr deployments.
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about creating, defaulting and deleting
//!   SolrPrometheusExporter resources through the Kubernetes API
//!
//! - `exporter_lifecycle`: Stories about how the controller creates, repairs
//!   and reports on the ConfigMap, Service and Deployment of an exporter
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored --nocapture
//! ```

mod exporter_lifecycle;
mod helpers;
