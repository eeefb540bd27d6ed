//! Solr metrics operator - runs Solr Prometheus exporters declared as CRDs
//!
//! A `SolrPrometheusExporter` names a standalone Solr node or a SolrCloud.
//! The operator keeps three child resources in line with it: an optional
//! ConfigMap carrying a custom exporter configuration, a Service annotated
//! for Prometheus discovery, and a single-replica Deployment running the
//! exporter. Readiness of that Deployment is mirrored into the exporter's
//! status.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (SolrPrometheusExporter and its types)
//! - [`labels`] - Label and annotation merging
//! - [`connection`] - Resolution of the Solr connection, including SolrCloud lookups
//! - [`resources`] - Desired ConfigMap, Service and Deployment generation
//! - [`converge`] - Create/update/no-op convergence of observed resources
//! - [`controller`] - Kubernetes controller reconciliation logic
//! - [`config`] - Operator runtime configuration
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod connection;
pub mod controller;
pub mod converge;
pub mod crd;
pub mod error;
pub mod labels;
pub mod resources;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
