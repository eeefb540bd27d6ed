//! Deployment convergence
//!
//! Containers and volumes are compared whole, after filling in the values
//! the API server defaults (termination message path, probe thresholds,
//! volume modes, field ref API versions), so those are never mistaken for
//! drift while every field a user can set is still applied.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, DownwardAPIVolumeFile, EnvVar, HTTPGetAction, LifecycleHandler,
    PodSpec, Probe, ResourceRequirements, Volume,
};

use super::{merge_metadata, merge_string_map, sync, ManagedResource, Merged};
use crate::controller::ExporterKubeClient;
use crate::Error;

const DEFAULT_TERMINATION_MESSAGE_PATH: &str = "/dev/termination-log";
const DEFAULT_TERMINATION_MESSAGE_POLICY: &str = "File";
const DEFAULT_FIELD_REF_API_VERSION: &str = "v1";
const DEFAULT_TOKEN_EXPIRATION_SECONDS: i64 = 3600;

fn http_get_with_defaults(get: &mut HTTPGetAction) {
    get.scheme.get_or_insert_with(|| "HTTP".to_string());
    if get.path.as_deref().is_none_or(str::is_empty) {
        get.path = Some("/".to_string());
    }
}

fn probe_with_defaults(probe: &Probe) -> Probe {
    let mut probe = probe.clone();
    probe.timeout_seconds.get_or_insert(1);
    probe.period_seconds.get_or_insert(10);
    probe.success_threshold.get_or_insert(1);
    probe.failure_threshold.get_or_insert(3);
    if let Some(get) = probe.http_get.as_mut() {
        http_get_with_defaults(get);
    }
    if let Some(grpc) = probe.grpc.as_mut() {
        grpc.service.get_or_insert_with(String::new);
    }
    probe
}

fn handler_with_defaults(handler: &mut LifecycleHandler) {
    if let Some(get) = handler.http_get.as_mut() {
        http_get_with_defaults(get);
    }
}

fn port_with_defaults(port: &ContainerPort) -> ContainerPort {
    let mut port = port.clone();
    port.protocol.get_or_insert_with(|| "TCP".to_string());
    port
}

fn env_with_defaults(env: &EnvVar) -> EnvVar {
    let mut env = env.clone();
    if let Some(field) = env.value_from.as_mut().and_then(|v| v.field_ref.as_mut()) {
        field
            .api_version
            .get_or_insert_with(|| DEFAULT_FIELD_REF_API_VERSION.to_string());
    }
    env
}

fn is_empty_resources(resources: &Option<ResourceRequirements>) -> bool {
    resources.as_ref().is_none_or(|r| {
        r.requests.as_ref().is_none_or(|m| m.is_empty())
            && r.limits.as_ref().is_none_or(|m| m.is_empty())
            && r.claims.as_ref().is_none_or(|c| c.is_empty())
    })
}

/// The desired container as the API server stores it
///
/// Fields the server derives from others (the pull policy from the image
/// tag, an empty resources object) are taken from `observed` when the
/// desired container leaves them out.
fn container_with_defaults(desired: &Container, observed: &Container) -> Container {
    let mut container = desired.clone();
    container
        .termination_message_path
        .get_or_insert_with(|| DEFAULT_TERMINATION_MESSAGE_PATH.to_string());
    container
        .termination_message_policy
        .get_or_insert_with(|| DEFAULT_TERMINATION_MESSAGE_POLICY.to_string());
    if container.image_pull_policy.is_none() {
        container.image_pull_policy = observed.image_pull_policy.clone();
    }
    if is_empty_resources(&container.resources) && is_empty_resources(&observed.resources) {
        container.resources = observed.resources.clone();
    }

    if let Some(ports) = container.ports.as_mut() {
        *ports = ports.iter().map(port_with_defaults).collect();
    }
    if let Some(env) = container.env.as_mut() {
        *env = env.iter().map(env_with_defaults).collect();
    }
    for probe in [
        &mut container.liveness_probe,
        &mut container.readiness_probe,
        &mut container.startup_probe,
    ] {
        if let Some(p) = probe.as_mut() {
            *p = probe_with_defaults(p);
        }
    }
    if let Some(lifecycle) = container.lifecycle.as_mut() {
        for handler in [&mut lifecycle.post_start, &mut lifecycle.pre_stop] {
            if let Some(h) = handler.as_mut() {
                handler_with_defaults(h);
            }
        }
    }
    container
}

/// Every container field is managed; sidecars and init containers are passed
/// through from the exporter as written.
fn merge_container(desired: &Container, observed: &mut Container) -> bool {
    let desired = container_with_defaults(desired, observed);
    sync(&desired, observed)
}

fn merge_containers(desired: &[Container], observed: &mut Vec<Container>) -> bool {
    if desired.len() != observed.len() {
        *observed = desired.to_vec();
        return true;
    }
    desired
        .iter()
        .zip(observed.iter_mut())
        .fold(false, |changed, (d, o)| merge_container(d, o) | changed)
}

fn adopt_mode(desired: &mut Option<i32>, observed: Option<i32>) {
    if desired.is_none() {
        *desired = observed;
    }
}

fn downward_files_with_defaults(items: Option<&mut Vec<DownwardAPIVolumeFile>>) {
    for file in items.into_iter().flatten() {
        if let Some(field) = file.field_ref.as_mut() {
            field
                .api_version
                .get_or_insert_with(|| DEFAULT_FIELD_REF_API_VERSION.to_string());
        }
    }
}

/// Carry server-defaulted file modes and source types over to the desired volume
fn adopt_volume_defaults(desired: &mut Volume, observed: &Volume) {
    if let (Some(d), Some(o)) = (desired.config_map.as_mut(), observed.config_map.as_ref()) {
        adopt_mode(&mut d.default_mode, o.default_mode);
    }
    if let (Some(d), Some(o)) = (desired.secret.as_mut(), observed.secret.as_ref()) {
        adopt_mode(&mut d.default_mode, o.default_mode);
    }
    if let (Some(d), Some(o)) = (desired.projected.as_mut(), observed.projected.as_ref()) {
        adopt_mode(&mut d.default_mode, o.default_mode);
    }
    if let (Some(d), Some(o)) = (desired.downward_api.as_mut(), observed.downward_api.as_ref()) {
        adopt_mode(&mut d.default_mode, o.default_mode);
    }
    if let (Some(d), Some(o)) = (desired.host_path.as_mut(), observed.host_path.as_ref()) {
        if d.type_.is_none() {
            d.type_ = o.type_.clone();
        }
    }
}

fn volume_with_defaults(desired: &Volume, observed: Option<&Volume>) -> Volume {
    let mut volume = desired.clone();
    if let Some(live) = observed {
        adopt_volume_defaults(&mut volume, live);
    }
    if let Some(downward) = volume.downward_api.as_mut() {
        downward_files_with_defaults(downward.items.as_mut());
    }
    if let Some(projected) = volume.projected.as_mut() {
        for source in projected.sources.iter_mut().flatten() {
            if let Some(downward) = source.downward_api.as_mut() {
                downward_files_with_defaults(downward.items.as_mut());
            }
            if let Some(token) = source.service_account_token.as_mut() {
                token
                    .expiration_seconds
                    .get_or_insert(DEFAULT_TOKEN_EXPIRATION_SECONDS);
            }
        }
    }
    volume
}

fn merge_volumes(desired: Option<&Vec<Volume>>, observed: &mut Option<Vec<Volume>>) -> bool {
    let current = observed.as_deref().unwrap_or_default();
    let desired: Vec<Volume> = desired
        .into_iter()
        .flatten()
        .map(|volume| {
            let live = current.iter().find(|v| v.name == volume.name);
            volume_with_defaults(volume, live)
        })
        .collect();
    let desired = (!desired.is_empty()).then_some(desired);
    sync(&desired, observed)
}

fn merge_pod_spec(desired: &PodSpec, observed: &mut PodSpec) -> bool {
    let mut changed = merge_containers(&desired.containers, &mut observed.containers);

    let mut init = observed.init_containers.take().unwrap_or_default();
    changed |= merge_containers(
        desired.init_containers.as_deref().unwrap_or_default(),
        &mut init,
    );
    observed.init_containers = (!init.is_empty()).then_some(init);

    changed |= merge_volumes(desired.volumes.as_ref(), &mut observed.volumes);
    changed |= sync(&desired.affinity, &mut observed.affinity);
    changed |= sync(&desired.security_context, &mut observed.security_context);
    changed |= sync(&desired.tolerations, &mut observed.tolerations);
    changed |= sync(&desired.node_selector, &mut observed.node_selector);
    changed |= sync(&desired.image_pull_secrets, &mut observed.image_pull_secrets);
    changed |= sync(
        &desired.termination_grace_period_seconds,
        &mut observed.termination_grace_period_seconds,
    );
    // admission may assign a default priority class
    if desired.priority_class_name.is_some() {
        changed |= sync(&desired.priority_class_name, &mut observed.priority_class_name);
    }
    changed
}

/// Fold the desired exporter Deployment into the live one
///
/// Deployment status is left untouched so readiness can be read from the result.
pub fn merge_deployment(desired: &Deployment, mut observed: Deployment) -> Merged<Deployment> {
    let mut changed = merge_metadata(&desired.metadata, &mut observed.metadata);

    let desired_spec = desired.spec.clone().unwrap_or_default();
    let spec = observed.spec.get_or_insert_with(Default::default);
    changed |= sync(&desired_spec.replicas, &mut spec.replicas);
    changed |= sync(&desired_spec.selector, &mut spec.selector);

    let desired_meta = desired_spec.template.metadata.clone().unwrap_or_default();
    let meta = spec.template.metadata.get_or_insert_with(Default::default);
    changed |= merge_string_map(desired_meta.labels.as_ref(), &mut meta.labels);
    changed |= merge_string_map(desired_meta.annotations.as_ref(), &mut meta.annotations);

    let desired_pod = desired_spec.template.spec.clone().unwrap_or_default();
    let pod = spec.template.spec.get_or_insert_with(Default::default);
    changed |= merge_pod_spec(&desired_pod, pod);

    Merged {
        resource: observed,
        changed,
    }
}

#[async_trait]
impl ManagedResource for Deployment {
    const KIND: &'static str = "Deployment";

    fn merge(desired: &Self, observed: Self) -> Merged<Self> {
        merge_deployment(desired, observed)
    }

    async fn fetch(
        kube: &dyn ExporterKubeClient,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Self>, Error> {
        kube.get_deployment(name, namespace).await
    }

    async fn create(kube: &dyn ExporterKubeClient, resource: &Self) -> Result<(), Error> {
        kube.create_deployment(resource).await
    }

    async fn update(kube: &dyn ExporterKubeClient, resource: &Self) -> Result<(), Error> {
        kube.replace_deployment(resource).await
    }
}
