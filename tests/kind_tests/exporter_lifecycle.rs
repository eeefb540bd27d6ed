//! Stories about the controller managing an exporter's child resources
//!
//! Each test drives `reconcile` directly against the cluster, the same call
//! the controller makes on every watch event, so results do not depend on
//! watch timing.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};

use solr_metrics_operator::config::OperatorConfig;
use solr_metrics_operator::controller::{reconcile, Context};
use solr_metrics_operator::crd::{SolrCloudReference, SolrPrometheusExporter, SolrReference};
use solr_metrics_operator::Error;

use super::helpers::{
    delete_namespace, ensure_test_cluster, fresh_namespace, standalone_exporter, wait_for,
};

fn context(client: &Client) -> Arc<Context> {
    Arc::new(Context::new(client.clone(), &OperatorConfig::default()))
}

/// Run reconcile until it stops asking for an immediate requeue
async fn reconcile_until_settled(
    client: &Client,
    name: &str,
    namespace: &str,
) -> Result<Action, Error> {
    let api: Api<SolrPrometheusExporter> = Api::namespaced(client.clone(), namespace);
    let ctx = context(client);
    loop {
        let exporter = api.get(name).await?;
        let action = reconcile(Arc::new(exporter), ctx.clone()).await?;
        if action != Action::requeue(Duration::ZERO) {
            return Ok(action);
        }
    }
}

fn owned_by(resource: &impl ResourceExt, exporter: &SolrPrometheusExporter) -> bool {
    resource
        .owner_references()
        .iter()
        .any(|o| Some(&o.uid) == exporter.metadata.uid.as_ref() && o.controller == Some(true))
}

// =============================================================================
// First Reconcile Stories
// =============================================================================

/// Story: A new exporter gets a Service and a Deployment
///
/// Without a custom config the exporter runs with the config shipped in the
/// Solr image, so no ConfigMap is created. Both children are owned by the
/// exporter so deleting it cleans them up.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_new_exporter_gets_service_and_deployment() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "lifecycle-create";
    fresh_namespace(&client, ns)
        .await
        .expect("failed to create namespace");
    let exporters: Api<SolrPrometheusExporter> = Api::namespaced(client.clone(), ns);
    exporters
        .create(&PostParams::default(), &standalone_exporter("metrics", ns))
        .await
        .expect("failed to create exporter");

    // Act
    reconcile_until_settled(&client, "metrics", ns)
        .await
        .expect("reconcile failed");

    // Assert: Defaults were persisted on the exporter
    let exporter = exporters.get("metrics").await.expect("failed to get exporter");
    assert_eq!(exporter.spec.num_threads, 1);
    assert!(exporter.spec.image.is_some());

    // Assert: Service and Deployment exist and are owned by the exporter
    let service = Api::<Service>::namespaced(client.clone(), ns)
        .get("metrics-solr-metrics")
        .await
        .expect("service should exist");
    assert!(owned_by(&service, &exporter));
    let ports = service.spec.and_then(|s| s.ports).unwrap_or_default();
    assert_eq!(ports[0].port, 80);

    let deployment = Api::<Deployment>::namespaced(client.clone(), ns)
        .get("metrics-solr-metrics")
        .await
        .expect("deployment should exist");
    assert!(owned_by(&deployment, &exporter));
    let args = deployment
        .spec
        .and_then(|s| s.template.spec)
        .map(|p| p.containers[0].args.clone().unwrap_or_default())
        .unwrap_or_default();
    assert!(args.windows(2).any(|w| w[0] == "-b" && w[1] == "http://solr.invalid:8983/solr"));

    // Assert: No ConfigMap without a custom config
    let config_map = Api::<ConfigMap>::namespaced(client.clone(), ns)
        .get_opt("metrics-solr-metrics")
        .await
        .expect("failed to query config map");
    assert!(config_map.is_none());

    // Cleanup
    delete_namespace(&client, ns).await;
}

/// Story: Administrator supplies a custom exporter config
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_custom_config_is_published_in_config_map() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "lifecycle-config";
    fresh_namespace(&client, ns)
        .await
        .expect("failed to create namespace");
    let exporters: Api<SolrPrometheusExporter> = Api::namespaced(client.clone(), ns);
    let mut exporter = standalone_exporter("metrics", ns);
    exporter.spec.config = "<config><rules/></config>".to_string();
    exporters
        .create(&PostParams::default(), &exporter)
        .await
        .expect("failed to create exporter");

    // Act
    reconcile_until_settled(&client, "metrics", ns)
        .await
        .expect("reconcile failed");

    // Assert
    let config_map = Api::<ConfigMap>::namespaced(client.clone(), ns)
        .get("metrics-solr-metrics")
        .await
        .expect("config map should exist");
    let data = config_map.data.unwrap_or_default();
    assert_eq!(
        data.get("solr-prometheus-exporter.xml").map(String::as_str),
        Some("<config><rules/></config>")
    );

    // Cleanup
    delete_namespace(&client, ns).await;
}

// =============================================================================
// Steady State Stories
// =============================================================================

/// Story: Repeated reconciles leave the children untouched
///
/// Once everything matches, a resync must not rewrite the Deployment; its
/// generation stays the same.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_resync_does_not_rewrite_children() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "lifecycle-idempotent";
    fresh_namespace(&client, ns)
        .await
        .expect("failed to create namespace");
    Api::<SolrPrometheusExporter>::namespaced(client.clone(), ns)
        .create(&PostParams::default(), &standalone_exporter("metrics", ns))
        .await
        .expect("failed to create exporter");
    reconcile_until_settled(&client, "metrics", ns)
        .await
        .expect("first reconcile failed");

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), ns);
    let before = deployments
        .get("metrics-solr-metrics")
        .await
        .expect("deployment should exist");

    // Act
    let action = reconcile_until_settled(&client, "metrics", ns)
        .await
        .expect("second reconcile failed");

    // Assert
    let after = deployments
        .get("metrics-solr-metrics")
        .await
        .expect("deployment should exist");
    assert_eq!(before.metadata.generation, after.metadata.generation);
    assert_eq!(before.resource_version(), after.resource_version());
    assert_eq!(action, Action::requeue(Duration::from_secs(300)));

    // Cleanup
    delete_namespace(&client, ns).await;
}

/// Story: A hand-edited Deployment is put back
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_manual_scale_is_reverted() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "lifecycle-drift";
    fresh_namespace(&client, ns)
        .await
        .expect("failed to create namespace");
    Api::<SolrPrometheusExporter>::namespaced(client.clone(), ns)
        .create(&PostParams::default(), &standalone_exporter("metrics", ns))
        .await
        .expect("failed to create exporter");
    reconcile_until_settled(&client, "metrics", ns)
        .await
        .expect("first reconcile failed");

    // Arrange: Someone scales the exporter by hand
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), ns);
    deployments
        .patch(
            "metrics-solr-metrics",
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({"spec": {"replicas": 3}})),
        )
        .await
        .expect("failed to scale deployment");

    // Act
    reconcile_until_settled(&client, "metrics", ns)
        .await
        .expect("reconcile failed");

    // Assert
    let deployment = deployments
        .get("metrics-solr-metrics")
        .await
        .expect("deployment should exist");
    assert_eq!(deployment.spec.and_then(|s| s.replicas), Some(1));

    // Cleanup
    delete_namespace(&client, ns).await;
}

// =============================================================================
// Status Stories
// =============================================================================

/// Story: The exporter reports ready once its pod is ready
///
/// The exporter image starts without a reachable Solr, so this waits for the
/// Deployment to report a ready replica and then checks the status follows.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_status_follows_deployment_readiness() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "lifecycle-status";
    fresh_namespace(&client, ns)
        .await
        .expect("failed to create namespace");
    let exporters: Api<SolrPrometheusExporter> = Api::namespaced(client.clone(), ns);
    exporters
        .create(&PostParams::default(), &standalone_exporter("metrics", ns))
        .await
        .expect("failed to create exporter");
    reconcile_until_settled(&client, "metrics", ns)
        .await
        .expect("first reconcile failed");

    // Assert: Not ready right after creation
    let exporter = exporters.get("metrics").await.expect("failed to get exporter");
    assert!(!exporter.is_ready());

    // Act: Keep reconciling until the pod comes up
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), ns);
    let pod_ready = wait_for(Duration::from_secs(300), || async {
        deployments
            .get("metrics-solr-metrics")
            .await
            .ok()
            .and_then(|d| d.status)
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0)
            > 0
    })
    .await;
    assert!(pod_ready, "exporter pod never became ready");
    reconcile_until_settled(&client, "metrics", ns)
        .await
        .expect("reconcile failed");

    // Assert
    let exporter = exporters.get("metrics").await.expect("failed to get exporter");
    assert!(exporter.is_ready());

    // Cleanup
    delete_namespace(&client, ns).await;
}

// =============================================================================
// Failure Stories
// =============================================================================

/// Story: An exporter naming a SolrCloud that does not exist creates nothing
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_missing_solr_cloud_creates_no_children() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "lifecycle-missing-cloud";
    fresh_namespace(&client, ns)
        .await
        .expect("failed to create namespace");
    let mut exporter = standalone_exporter("metrics", ns);
    exporter.spec.solr_reference = SolrReference {
        cloud: Some(SolrCloudReference {
            name: Some("nowhere".to_string()),
            ..Default::default()
        }),
        standalone: None,
    };
    Api::<SolrPrometheusExporter>::namespaced(client.clone(), ns)
        .create(&PostParams::default(), &exporter)
        .await
        .expect("failed to create exporter");

    // Act
    let result = reconcile_until_settled(&client, "metrics", ns).await;

    // Assert
    assert!(result.is_err(), "reconcile should fail");
    let deployment = Api::<Deployment>::namespaced(client.clone(), ns)
        .get_opt("metrics-solr-metrics")
        .await
        .expect("failed to query deployment");
    assert!(deployment.is_none());
    let service = Api::<Service>::namespaced(client.clone(), ns)
        .get_opt("metrics-solr-metrics")
        .await
        .expect("failed to query service");
    assert!(service.is_none());

    // Cleanup
    delete_namespace(&client, ns).await;
}
