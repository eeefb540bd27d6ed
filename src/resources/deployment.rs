//! Deployment running the exporter process

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvVar, HTTPGetAction, KeyToPath,
    LocalObjectReference, PodSecurityContext, PodSpec, PodTemplateSpec, Probe,
    ResourceRequirements, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use super::service::exporter_selector_labels;
use super::zookeeper::{zookeeper_acl_env_vars, ZK_CREDS_AND_ACLS_ENV};
use super::{
    mounted_config_path, DEFAULT_EXPORTER_CONFIG_PATH, DEFAULT_EXPORTER_ENTRYPOINT,
    EXPORTER_CONFIG_KEY, EXPORTER_CONFIG_MOUNT_DIR, EXPORTER_CONFIG_VOLUME,
    EXPORTER_CONTAINER_NAME, METRICS_PATH, SOLR_METRICS_PORT, SOLR_METRICS_PORT_NAME,
};
use crate::connection::SolrConnectionInfo;
use crate::crd::{
    PodOptions, SolrPrometheusExporter, ZookeeperConnectionInfo, TECHNOLOGY, TECHNOLOGY_LABEL,
};
use crate::labels::merge_labels_or_annotations;

const TERMINATION_GRACE_PERIOD_SECONDS: i64 = 10;

/// Exporter command line, in the order the exporter expects it
fn exporter_args(exporter: &SolrPrometheusExporter, connection: &SolrConnectionInfo) -> Vec<String> {
    let spec = &exporter.spec;
    let mut args = vec![
        "-p".to_string(),
        SOLR_METRICS_PORT.to_string(),
        "-n".to_string(),
        spec.num_threads.to_string(),
    ];

    if spec.scrape_interval > 0 {
        args.push("-s".to_string());
        args.push(spec.scrape_interval.to_string());
    }

    match connection {
        SolrConnectionInfo::Cloud(info) => {
            args.push("-z".to_string());
            args.push(info.zk_connection_string());
        }
        SolrConnectionInfo::Standalone(address) => {
            args.push("-b".to_string());
            args.push(address.clone());
        }
        SolrConnectionInfo::Unspecified => {}
    }

    args.push("-f".to_string());
    if exporter.has_custom_config() {
        args.push(mounted_config_path());
    } else {
        args.push(DEFAULT_EXPORTER_CONFIG_PATH.to_string());
    }
    args
}

fn liveness_probe() -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            scheme: Some("HTTP".to_string()),
            path: Some(METRICS_PATH.to_string()),
            port: IntOrString::Int(SOLR_METRICS_PORT),
            ..Default::default()
        }),
        initial_delay_seconds: Some(20),
        timeout_seconds: Some(1),
        period_seconds: Some(10),
        success_threshold: Some(1),
        failure_threshold: Some(3),
        ..Default::default()
    }
}

fn config_volume(exporter: &SolrPrometheusExporter) -> (Volume, VolumeMount) {
    let volume = Volume {
        name: EXPORTER_CONFIG_VOLUME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: exporter.metrics_config_map_name(),
            items: Some(vec![KeyToPath {
                key: EXPORTER_CONFIG_KEY.to_string(),
                path: EXPORTER_CONFIG_KEY.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    };
    let mount = VolumeMount {
        name: EXPORTER_CONFIG_VOLUME.to_string(),
        mount_path: EXPORTER_CONFIG_MOUNT_DIR.to_string(),
        read_only: Some(true),
        ..Default::default()
    };
    (volume, mount)
}

fn container_resources(pod: Option<&PodOptions>) -> Option<ResourceRequirements> {
    let resources = pod?.resources.as_ref()?;
    if resources.requests.is_none() && resources.limits.is_none() {
        return None;
    }
    Some(ResourceRequirements {
        requests: resources.requests.clone(),
        limits: resources.limits.clone(),
        ..Default::default()
    })
}

/// Generate the exporter Deployment for a resolved Solr connection
pub fn generate_exporter_deployment(
    exporter: &SolrPrometheusExporter,
    connection: &SolrConnectionInfo,
) -> Deployment {
    let options = &exporter.spec.custom_kube_options;
    let pod = options.pod_options.as_ref();
    let image = exporter.image();

    let selector_labels = exporter_selector_labels(exporter);
    let mut base_labels = exporter.shared_labels_with(exporter.labels());
    base_labels.insert(TECHNOLOGY_LABEL.to_string(), TECHNOLOGY.to_string());

    let deployment_options = options.deployment_options.as_ref();
    let labels = merge_labels_or_annotations(
        Some(&base_labels),
        deployment_options.and_then(|o| o.labels.as_ref()),
    );
    let annotations = deployment_options.and_then(|o| o.annotations.clone());

    let mut pod_labels =
        merge_labels_or_annotations(Some(&base_labels), pod.and_then(|p| p.labels.as_ref()));
    pod_labels.extend(selector_labels.clone());
    let pod_annotations = pod.and_then(|p| p.annotations.clone());

    let mut volumes = Vec::new();
    let mut volume_mounts = Vec::new();
    if exporter.has_custom_config() {
        let (volume, mount) = config_volume(exporter);
        volumes.push(volume);
        volume_mounts.push(mount);
    }

    let mut env: Vec<EnvVar> = Vec::new();
    let zookeeper = connection.zookeeper();
    let has_acls = zookeeper.is_some_and(ZookeeperConnectionInfo::has_acls);
    if let Some(info) = zookeeper {
        env.extend(zookeeper_acl_env_vars(info));
    }

    if let Some(pod) = pod {
        env.extend(pod.env_variables.iter().cloned());
        for volume in &pod.volumes {
            volume_mounts.extend(volume.container_mount());
            volumes.push(volume.to_volume());
        }
    }

    // JAVA_OPTS goes last so it can reference every other env var
    if has_acls {
        env.push(EnvVar {
            name: "JAVA_OPTS".to_string(),
            value: Some(format!("$({ZK_CREDS_AND_ACLS_ENV})")),
            ..Default::default()
        });
    }

    let entrypoint = exporter
        .spec
        .exporter_entrypoint
        .clone()
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| DEFAULT_EXPORTER_ENTRYPOINT.to_string());

    let mut containers = vec![Container {
        name: EXPORTER_CONTAINER_NAME.to_string(),
        image: Some(image.to_image_name()),
        image_pull_policy: image.pull_policy.clone(),
        command: Some(vec![entrypoint]),
        args: Some(exporter_args(exporter, connection)),
        env: (!env.is_empty()).then_some(env),
        ports: Some(vec![ContainerPort {
            name: Some(SOLR_METRICS_PORT_NAME.to_string()),
            container_port: SOLR_METRICS_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        volume_mounts: (!volume_mounts.is_empty()).then_some(volume_mounts),
        liveness_probe: Some(liveness_probe()),
        resources: container_resources(pod),
        ..Default::default()
    }];
    let init_containers = pod
        .map(|p| p.init_containers.clone())
        .filter(|c| !c.is_empty());
    if let Some(pod) = pod {
        containers.extend(pod.sidecar_containers.iter().cloned());
    }

    let security_context = pod
        .and_then(|p| p.pod_security_context.clone())
        .unwrap_or(PodSecurityContext {
            fs_group: Some(i64::from(SOLR_METRICS_PORT)),
            ..Default::default()
        });

    let image_pull_secrets = image
        .image_pull_secret
        .filter(|s| !s.is_empty())
        .map(|name| vec![LocalObjectReference { name }]);

    Deployment {
        metadata: ObjectMeta {
            name: Some(exporter.metrics_deployment_name()),
            namespace: exporter.namespace(),
            labels: Some(labels),
            annotations,
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector_labels),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    annotations: pod_annotations,
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    termination_grace_period_seconds: Some(TERMINATION_GRACE_PERIOD_SECONDS),
                    security_context: Some(security_context),
                    volumes: (!volumes.is_empty()).then_some(volumes),
                    init_containers,
                    containers,
                    image_pull_secrets,
                    affinity: pod.and_then(|p| p.affinity.clone()),
                    tolerations: pod.and_then(|p| p.tolerations.clone()),
                    node_selector: pod.and_then(|p| p.node_selector.clone()),
                    priority_class_name: pod
                        .and_then(|p| p.priority_class_name.clone())
                        .filter(|p| !p.is_empty()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
