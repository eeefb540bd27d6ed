//! SolrPrometheusExporter controller implementation
//!
//! One reconciliation pass applies missing defaults (persisting them and
//! stopping early), resolves how to reach Solr, converges the ConfigMap,
//! Service and Deployment, and finally records readiness in the status.
//! Every step returns on the first error; the next pass picks up where this
//! one stopped because all child content is recomputed from the exporter.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use crate::config::OperatorConfig;
use crate::connection::{resolve_connection, SolrCloudLookup, SolrCloudLookupImpl};
use crate::converge::{converge, deployment_ready};
use crate::crd::{SolrPrometheusExporter, SolrPrometheusExporterStatus};
use crate::resources::{
    generate_exporter_deployment, generate_metrics_config_map, generate_metrics_service,
    with_owner,
};
use crate::Error;

/// Field manager recorded on writes made by this operator
pub const FIELD_MANAGER: &str = "solr-metrics-operator";

/// Trait abstracting Kubernetes client operations for the exporter controller
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production. Getters return `None` for absent objects.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExporterKubeClient: Send + Sync {
    /// Fetch the latest copy of an exporter
    async fn get_exporter(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<SolrPrometheusExporter>, Error>;

    /// Persist a (defaulted) exporter spec
    async fn replace_exporter(&self, exporter: &SolrPrometheusExporter) -> Result<(), Error>;

    /// Write the exporter status sub-resource
    async fn patch_exporter_status(
        &self,
        name: &str,
        namespace: &str,
        status: &SolrPrometheusExporterStatus,
    ) -> Result<(), Error>;

    /// Fetch a ConfigMap
    async fn get_config_map(&self, name: &str, namespace: &str)
        -> Result<Option<ConfigMap>, Error>;

    /// Create a ConfigMap
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<(), Error>;

    /// Replace a ConfigMap
    async fn replace_config_map(&self, config_map: &ConfigMap) -> Result<(), Error>;

    /// Fetch a Service
    async fn get_service(&self, name: &str, namespace: &str) -> Result<Option<Service>, Error>;

    /// Create a Service
    async fn create_service(&self, service: &Service) -> Result<(), Error>;

    /// Replace a Service
    async fn replace_service(&self, service: &Service) -> Result<(), Error>;

    /// Fetch a Deployment
    async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Deployment>, Error>;

    /// Create a Deployment
    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), Error>;

    /// Replace a Deployment
    async fn replace_deployment(&self, deployment: &Deployment) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct ExporterKubeClientImpl {
    client: Client,
}

impl ExporterKubeClientImpl {
    /// Create a new ExporterKubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get<K>(&self, name: &str, namespace: &str) -> Result<Option<K>, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn create<K>(&self, resource: &K) -> Result<(), Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Serialize
            + DeserializeOwned
            + Debug,
    {
        let namespace = resource.namespace().unwrap_or_default();
        self.api::<K>(&namespace)
            .create(&PostParams::default(), resource)
            .await
            .map_err(|e| Error::persistence(K::kind(&()), resource.name_any(), e.to_string()))?;
        Ok(())
    }

    async fn replace<K>(&self, resource: &K) -> Result<(), Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Serialize
            + DeserializeOwned
            + Debug,
    {
        let namespace = resource.namespace().unwrap_or_default();
        let name = resource.name_any();
        self.api::<K>(&namespace)
            .replace(&name, &PostParams::default(), resource)
            .await
            .map_err(|e| Error::persistence(K::kind(&()), &name, e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ExporterKubeClient for ExporterKubeClientImpl {
    async fn get_exporter(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<SolrPrometheusExporter>, Error> {
        self.get(name, namespace).await
    }

    async fn replace_exporter(&self, exporter: &SolrPrometheusExporter) -> Result<(), Error> {
        self.replace(exporter).await
    }

    async fn patch_exporter_status(
        &self,
        name: &str,
        namespace: &str,
        status: &SolrPrometheusExporterStatus,
    ) -> Result<(), Error> {
        let api: Api<SolrPrometheusExporter> = self.api(namespace);

        let status_patch = serde_json::json!({
            "status": status
        });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await
        .map_err(|e| Error::persistence("SolrPrometheusExporter", name, e.to_string()))?;

        Ok(())
    }

    async fn get_config_map(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ConfigMap>, Error> {
        self.get(name, namespace).await
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<(), Error> {
        self.create(config_map).await
    }

    async fn replace_config_map(&self, config_map: &ConfigMap) -> Result<(), Error> {
        self.replace(config_map).await
    }

    async fn get_service(&self, name: &str, namespace: &str) -> Result<Option<Service>, Error> {
        self.get(name, namespace).await
    }

    async fn create_service(&self, service: &Service) -> Result<(), Error> {
        self.create(service).await
    }

    async fn replace_service(&self, service: &Service) -> Result<(), Error> {
        self.replace(service).await
    }

    async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Deployment>, Error> {
        self.get(name, namespace).await
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        self.create(deployment).await
    }

    async fn replace_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        self.replace(deployment).await
    }
}

/// Controller context shared across all reconciliation calls
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn ExporterKubeClient>,
    /// Read access to SolrCloud resources
    pub solr_clouds: Arc<dyn SolrCloudLookup>,
    /// Requeue delay after a successful pass
    pub resync_interval: Duration,
    /// Requeue delay after a retryable failure
    pub error_requeue: Duration,
}

impl Context {
    /// Create a new controller context with the given Kubernetes client
    pub fn new(client: Client, config: &OperatorConfig) -> Self {
        Self {
            kube: Arc::new(ExporterKubeClientImpl::new(client.clone())),
            solr_clouds: Arc::new(SolrCloudLookupImpl::new(client)),
            resync_interval: config.resync_interval,
            error_requeue: config.error_requeue,
        }
    }

    /// Create a context for testing with custom mock clients
    #[cfg(test)]
    pub fn for_testing(
        kube: Arc<dyn ExporterKubeClient>,
        solr_clouds: Arc<dyn SolrCloudLookup>,
    ) -> Self {
        let config = OperatorConfig::default();
        Self {
            kube,
            solr_clouds,
            resync_interval: config.resync_interval,
            error_requeue: config.error_requeue,
        }
    }
}

/// Reconcile a SolrPrometheusExporter
///
/// The exporter is re-read from the API so that a pass never acts on a stale
/// cached copy. Returns `requeue(0)` right after persisting defaults.
#[instrument(skip(exporter, ctx), fields(exporter = %exporter.name_any(), namespace = ?exporter.namespace()))]
pub async fn reconcile(
    exporter: Arc<SolrPrometheusExporter>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let name = exporter.name_any();
    let namespace = exporter.namespace().unwrap_or_default();

    let Some(mut exporter) = ctx.kube.get_exporter(&name, &namespace).await? else {
        debug!("exporter is gone, owned resources are garbage collected");
        return Ok(Action::await_change());
    };

    if exporter.with_defaults() {
        info!("persisting exporter defaults");
        ctx.kube.replace_exporter(&exporter).await?;
        return Ok(Action::requeue(Duration::ZERO));
    }
    exporter.validate()?;

    let connection = resolve_connection(&exporter, ctx.solr_clouds.as_ref()).await?;
    let kube = ctx.kube.as_ref();

    if exporter.has_custom_config() {
        let config_map = with_owner(generate_metrics_config_map(&exporter), &exporter)?;
        converge(kube, config_map).await?;
    }

    let service = with_owner(generate_metrics_service(&exporter), &exporter)?;
    converge(kube, service).await?;

    let deployment = with_owner(generate_exporter_deployment(&exporter, &connection), &exporter)?;
    let result = converge(kube, deployment).await?;

    let ready = deployment_ready(&result);
    if ready != exporter.is_ready() {
        info!(ready, "updating exporter status");
        ctx.kube
            .patch_exporter_status(&name, &namespace, &SolrPrometheusExporterStatus { ready })
            .await?;
    }

    Ok(Action::requeue(ctx.resync_interval))
}

/// Error policy for the controller
///
/// Retryable errors are requeued after the configured delay; errors that
/// need a spec change wait for the next change event.
pub fn error_policy(
    exporter: Arc<SolrPrometheusExporter>,
    error: &Error,
    ctx: Arc<Context>,
) -> Action {
    if error.is_retryable() {
        error!(
            ?error,
            exporter = %exporter.name_any(),
            "reconciliation failed"
        );
        Action::requeue(ctx.error_requeue)
    } else {
        warn!(
            %error,
            exporter = %exporter.name_any(),
            "exporter spec rejected, waiting for a change"
        );
        Action::await_change()
    }
}
