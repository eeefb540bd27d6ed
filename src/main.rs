//! Solr metrics operator - runs Solr Prometheus exporters declared as CRDs

use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::runtime::controller::Config as ControllerConfig;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt, Resource};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use solr_metrics_operator::config::{ControllerArgs, LogFormat, OperatorConfig};
use solr_metrics_operator::controller::{error_policy, reconcile, Context, FIELD_MANAGER};
use solr_metrics_operator::crd::SolrPrometheusExporter;

/// Solr metrics operator - Kubernetes operator for Solr Prometheus exporters
#[derive(Parser, Debug)]
#[command(name = "solr-metrics-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    controller: ControllerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches SolrPrometheusExporter CRDs together with the ConfigMaps,
    /// Services and Deployments they own, and reconciles them.
    Controller,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        // Generate CRD YAML
        let crd = serde_yaml::to_string(&SolrPrometheusExporter::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    let config = OperatorConfig::try_from(cli.controller)
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    init_tracing(config.log_format);

    match cli.command {
        Some(Commands::Controller) | None => run_controller(config).await,
    }
}

/// Install or update the SolrPrometheusExporter CRD using server-side apply
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    tracing::info!("Installing SolrPrometheusExporter CRD...");
    crds.patch(
        &SolrPrometheusExporter::crd_name(),
        &params,
        &Patch::Apply(&SolrPrometheusExporter::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install SolrPrometheusExporter CRD: {}", e))?;

    Ok(())
}

/// Api handle scoped to the watched namespace, or to the whole cluster
fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    tracing::info!(
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        concurrency = config.concurrency,
        "Solr metrics operator starting..."
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if config.install_crds {
        ensure_crds_installed(&client).await?;
    }

    let namespace = config.namespace.as_deref();
    let exporters: Api<SolrPrometheusExporter> = scoped_api(&client, namespace);
    let config_maps: Api<ConfigMap> = scoped_api(&client, namespace);
    let services: Api<Service> = scoped_api(&client, namespace);
    let deployments: Api<Deployment> = scoped_api(&client, namespace);

    let ctx = Arc::new(Context::new(client, &config));

    Controller::new(exporters, WatcherConfig::default())
        .owns(config_maps, WatcherConfig::default())
        .owns(services, WatcherConfig::default())
        .owns(deployments, WatcherConfig::default())
        .with_config(ControllerConfig::default().concurrency(config.concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Exporter reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Exporter reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("Solr metrics operator shutting down");
    Ok(())
}
