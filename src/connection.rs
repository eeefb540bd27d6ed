//! Resolution of how the exporter reaches Solr
//!
//! A standalone address or an inline ZooKeeper descriptor is used as is. A
//! SolrCloud referenced by name is looked up and its published
//! `status.zookeeperConnectionInfo` is used instead.

use async_trait::async_trait;
use kube::api::{Api, DynamicObject};
use kube::discovery::ApiResource;
use kube::Client;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::crd::{SolrPrometheusExporter, SolrTarget, ZookeeperConnectionInfo};
use crate::error::is_kube_not_found;
use crate::Error;

/// API group of the SolrCloud resource
pub const SOLR_CLOUD_GROUP: &str = "solr.bloomberg.com";

/// API version of the SolrCloud resource
pub const SOLR_CLOUD_VERSION: &str = "v1beta1";

/// Kind of the SolrCloud resource
pub const SOLR_CLOUD_KIND: &str = "SolrCloud";

/// Resolved connection of one reconciliation pass
#[derive(Clone, Debug, PartialEq)]
pub enum SolrConnectionInfo {
    /// Address of a standalone Solr node, passed with `-b`
    Standalone(String),
    /// ZooKeeper descriptor of a SolrCloud, passed with `-z`
    Cloud(ZookeeperConnectionInfo),
    /// The exporter names no target; the exporter runs without a connection argument
    Unspecified,
}

impl SolrConnectionInfo {
    /// ZooKeeper descriptor, if this is a cloud connection
    pub fn zookeeper(&self) -> Option<&ZookeeperConnectionInfo> {
        match self {
            Self::Cloud(info) => Some(info),
            _ => None,
        }
    }
}

/// Read access to SolrCloud resources managed by the sibling controller
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SolrCloudLookup: Send + Sync {
    /// Connection info published in the SolrCloud's status, `None` if it does not exist
    async fn get_solr_cloud_connection(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ZookeeperConnectionInfo>, Error>;
}

/// [`SolrCloudLookup`] backed by the Kubernetes API
pub struct SolrCloudLookupImpl {
    client: Client,
}

impl SolrCloudLookupImpl {
    /// Create a new SolrCloudLookupImpl
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api_resource() -> ApiResource {
        ApiResource {
            group: SOLR_CLOUD_GROUP.to_string(),
            version: SOLR_CLOUD_VERSION.to_string(),
            api_version: format!("{SOLR_CLOUD_GROUP}/{SOLR_CLOUD_VERSION}"),
            kind: SOLR_CLOUD_KIND.to_string(),
            plural: "solrclouds".to_string(),
        }
    }
}

#[async_trait]
impl SolrCloudLookup for SolrCloudLookupImpl {
    async fn get_solr_cloud_connection(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ZookeeperConnectionInfo>, Error> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &Self::api_resource());

        let cloud = match api.get(name).await {
            Ok(cloud) => cloud,
            Err(e) if is_kube_not_found(&e) => return Ok(None),
            Err(e) => return Err(Error::lookup(name, namespace, e.to_string())),
        };

        let info = cloud
            .data
            .get("status")
            .and_then(|status| status.get("zookeeperConnectionInfo"))
            .ok_or_else(|| {
                Error::lookup(name, namespace, "status.zookeeperConnectionInfo not published")
            })?;

        serde_json::from_value(info.clone())
            .map(Some)
            .map_err(|e| Error::lookup(name, namespace, e.to_string()))
    }
}

/// Work out how the exporter should reach Solr
///
/// Fails with [`Error::NotFound`] when the referenced SolrCloud does not exist;
/// other lookup failures are surfaced unchanged.
pub async fn resolve_connection(
    exporter: &SolrPrometheusExporter,
    lookup: &dyn SolrCloudLookup,
) -> Result<SolrConnectionInfo, Error> {
    match exporter.spec.solr_reference.target() {
        Some(SolrTarget::Standalone(address)) => {
            Ok(SolrConnectionInfo::Standalone(address.to_string()))
        }
        Some(SolrTarget::CloudInline(info)) => Ok(SolrConnectionInfo::Cloud(info.clone())),
        Some(SolrTarget::CloudByName { name, namespace }) => {
            debug!(solr_cloud = %name, namespace = %namespace, "looking up SolrCloud connection");
            lookup
                .get_solr_cloud_connection(name, namespace)
                .await?
                .map(SolrConnectionInfo::Cloud)
                .ok_or_else(|| Error::not_found(SOLR_CLOUD_KIND, name, namespace))
        }
        None => {
            warn!("exporter names neither a standalone address nor a SolrCloud");
            Ok(SolrConnectionInfo::Unspecified)
        }
    }
}
