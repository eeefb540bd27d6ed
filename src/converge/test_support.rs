//! API server admission, as far as it changes the objects the operator writes

use k8s_openapi::api::apps::v1::{Deployment, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    Container, DownwardAPIVolumeFile, EnvVar, HTTPGetAction, Probe, ResourceRequirements, Service,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

fn default_pull_policy(image: Option<&str>) -> String {
    let image = image.unwrap_or_default();
    let tag = image.rsplit('/').next().and_then(|last| last.split_once(':'));
    match tag {
        Some((_, "latest")) | None => "Always".to_string(),
        Some(_) => "IfNotPresent".to_string(),
    }
}

fn admit_http_get(get: &mut HTTPGetAction) {
    get.scheme.get_or_insert_with(|| "HTTP".to_string());
    if get.path.as_deref().is_none_or(str::is_empty) {
        get.path = Some("/".to_string());
    }
}

fn admit_probe(probe: &mut Probe) {
    probe.timeout_seconds.get_or_insert(1);
    probe.period_seconds.get_or_insert(10);
    probe.success_threshold.get_or_insert(1);
    probe.failure_threshold.get_or_insert(3);
    if let Some(get) = probe.http_get.as_mut() {
        admit_http_get(get);
    }
    if let Some(grpc) = probe.grpc.as_mut() {
        grpc.service.get_or_insert_with(String::new);
    }
}

fn admit_env(env: &mut EnvVar) {
    if let Some(field) = env.value_from.as_mut().and_then(|v| v.field_ref.as_mut()) {
        field.api_version.get_or_insert_with(|| "v1".to_string());
    }
}

fn admit_downward_files(items: Option<&mut Vec<DownwardAPIVolumeFile>>) {
    for file in items.into_iter().flatten() {
        if let Some(field) = file.field_ref.as_mut() {
            field.api_version.get_or_insert_with(|| "v1".to_string());
        }
    }
}

fn admit_container(container: &mut Container) {
    container
        .termination_message_path
        .get_or_insert_with(|| "/dev/termination-log".to_string());
    container
        .termination_message_policy
        .get_or_insert_with(|| "File".to_string());
    if container.image_pull_policy.is_none() {
        container.image_pull_policy = Some(default_pull_policy(container.image.as_deref()));
    }
    container
        .resources
        .get_or_insert_with(ResourceRequirements::default);
    for port in container.ports.iter_mut().flatten() {
        port.protocol.get_or_insert_with(|| "TCP".to_string());
    }
    for env in container.env.iter_mut().flatten() {
        admit_env(env);
    }
    for probe in [
        &mut container.liveness_probe,
        &mut container.readiness_probe,
        &mut container.startup_probe,
    ] {
        if let Some(p) = probe.as_mut() {
            admit_probe(p);
        }
    }
    if let Some(lifecycle) = container.lifecycle.as_mut() {
        for handler in [&mut lifecycle.post_start, &mut lifecycle.pre_stop] {
            if let Some(get) = handler.as_mut().and_then(|h| h.http_get.as_mut()) {
                admit_http_get(get);
            }
        }
    }
}

/// What the API server returns after admitting `desired`
pub(crate) fn admit_deployment(desired: &Deployment) -> Deployment {
    let mut observed = desired.clone();
    observed.metadata.uid = Some("deploy-uid".to_string());
    observed.metadata.generation = Some(1);

    let spec = observed.spec.get_or_insert_with(Default::default);
    spec.revision_history_limit.get_or_insert(10);
    spec.progress_deadline_seconds.get_or_insert(600);
    spec.strategy.get_or_insert_with(|| DeploymentStrategy {
        type_: Some("RollingUpdate".to_string()),
        ..Default::default()
    });

    let pod = spec.template.spec.get_or_insert_with(Default::default);
    pod.restart_policy = Some("Always".to_string());
    pod.dns_policy = Some("ClusterFirst".to_string());
    pod.scheduler_name = Some("default-scheduler".to_string());
    pod.service_account_name = Some("default".to_string());
    for container in pod.containers.iter_mut() {
        admit_container(container);
    }
    for container in pod.init_containers.iter_mut().flatten() {
        admit_container(container);
    }
    for volume in pod.volumes.iter_mut().flatten() {
        if let Some(cm) = volume.config_map.as_mut() {
            cm.default_mode.get_or_insert(420);
        }
        if let Some(secret) = volume.secret.as_mut() {
            secret.default_mode.get_or_insert(420);
        }
        if let Some(projected) = volume.projected.as_mut() {
            projected.default_mode.get_or_insert(420);
            for source in projected.sources.iter_mut().flatten() {
                if let Some(downward) = source.downward_api.as_mut() {
                    admit_downward_files(downward.items.as_mut());
                }
                if let Some(token) = source.service_account_token.as_mut() {
                    token.expiration_seconds.get_or_insert(3600);
                }
            }
        }
        if let Some(downward) = volume.downward_api.as_mut() {
            downward.default_mode.get_or_insert(420);
            admit_downward_files(downward.items.as_mut());
        }
        if let Some(host_path) = volume.host_path.as_mut() {
            host_path.type_.get_or_insert_with(String::new);
        }
    }
    observed
}

/// What the API server returns after admitting `desired`
pub(crate) fn admit_service(desired: &Service) -> Service {
    let mut observed = desired.clone();
    observed.metadata.uid = Some("svc-uid".to_string());
    let spec = observed.spec.get_or_insert_with(Default::default);
    spec.cluster_ip = Some("10.96.12.7".to_string());
    spec.cluster_ips = Some(vec!["10.96.12.7".to_string()]);
    spec.type_.get_or_insert_with(|| "ClusterIP".to_string());
    spec.session_affinity.get_or_insert_with(|| "None".to_string());
    spec.internal_traffic_policy
        .get_or_insert_with(|| "Cluster".to_string());
    spec.ip_families = Some(vec!["IPv4".to_string()]);
    for port in spec.ports.iter_mut().flatten() {
        port.protocol.get_or_insert_with(|| "TCP".to_string());
        if port.target_port.is_none() {
            port.target_port = Some(IntOrString::Int(port.port));
        }
    }
    observed
}
