//! Custom Resource Definitions for the exporter operator
//!
//! `SolrPrometheusExporter` is owned by this operator. `SolrCloud` is owned by
//! a sibling controller and only read through [`crate::connection`].

mod exporter;
mod types;

pub use exporter::{
    SolrPrometheusExporter, SolrPrometheusExporterSpec, SolrPrometheusExporterStatus,
    EXPORTER_LABEL, TECHNOLOGY, TECHNOLOGY_LABEL,
};
pub use types::{
    AdditionalVolume, ContainerImage, CustomExporterKubeOptions, PodOptions, ResourceOptions,
    SolrCloudReference, SolrReference, SolrTarget, StandaloneSolrReference, VolumeSource, ZookeeperAcl,
    ZookeeperConnectionInfo, DEFAULT_PULL_POLICY, DEFAULT_SOLR_REPOSITORY, DEFAULT_SOLR_VERSION,
};
