//! Shared helpers for kind integration tests

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::runtime::wait::{await_condition, conditions};
use kube::{Client, CustomResourceExt};

use solr_metrics_operator::crd::{
    SolrPrometheusExporter, SolrPrometheusExporterSpec, SolrReference, StandaloneSolrReference,
};

/// Connect to the test cluster and make sure the exporter CRD is established
pub async fn ensure_test_cluster() -> anyhow::Result<Client> {
    let client = Client::try_default().await?;

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    crds.patch(
        &SolrPrometheusExporter::crd_name(),
        &PatchParams::apply("solr-metrics-operator-tests").force(),
        &Patch::Apply(&SolrPrometheusExporter::crd()),
    )
    .await?;

    let established = await_condition(
        crds,
        SolrPrometheusExporter::crd_name(),
        conditions::is_crd_established(),
    );
    tokio::time::timeout(Duration::from_secs(30), established)
        .await
        .context("CRD was not established within 30s")??;

    Ok(client)
}

/// Create a fresh namespace for one test, replacing a leftover one
pub async fn fresh_namespace(client: &Client, name: &str) -> Result<(), kube::Error> {
    let api: Api<Namespace> = Api::all(client.clone());
    delete_namespace(client, name).await;
    wait_for(Duration::from_secs(60), || async {
        api.get_opt(name).await.ok().flatten().is_none()
    })
    .await;

    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    api.create(&PostParams::default(), &ns).await?;
    Ok(())
}

/// Delete a test namespace, ignoring errors
pub async fn delete_namespace(client: &Client, name: &str) {
    let api: Api<Namespace> = Api::all(client.clone());
    let _ = api.delete(name, &DeleteParams::default()).await;
}

/// A standalone exporter pointing at a Solr address that does not need to exist
pub fn standalone_exporter(name: &str, namespace: &str) -> SolrPrometheusExporter {
    let mut exporter = SolrPrometheusExporter::new(
        name,
        SolrPrometheusExporterSpec {
            solr_reference: SolrReference {
                cloud: None,
                standalone: Some(StandaloneSolrReference {
                    address: "http://solr.invalid:8983/solr".to_string(),
                }),
            },
            ..Default::default()
        },
    );
    exporter.metadata.namespace = Some(namespace.to_string());
    exporter
}

/// Poll `check` every second until it returns true or `timeout` elapses
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    false
}
