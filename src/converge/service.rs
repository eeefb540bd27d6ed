//! Service convergence

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServicePort};

use super::{merge_metadata, sync, ManagedResource, Merged};
use crate::controller::ExporterKubeClient;
use crate::Error;

/// Ports equal once server-side defaults are ignored
fn ports_match(desired: &[ServicePort], observed: &[ServicePort]) -> bool {
    desired.len() == observed.len()
        && desired.iter().zip(observed).all(|(d, o)| {
            d.name == o.name
                && d.port == o.port
                && d.target_port == o.target_port
                && d.protocol.as_deref().unwrap_or("TCP") == o.protocol.as_deref().unwrap_or("TCP")
        })
}

/// Fold the desired metrics Service into the live one
///
/// Only ports and selector are managed; cluster-assigned addresses stay as they are.
pub fn merge_service(desired: &Service, mut observed: Service) -> Merged<Service> {
    let mut changed = merge_metadata(&desired.metadata, &mut observed.metadata);

    let desired_spec = desired.spec.clone().unwrap_or_default();
    let spec = observed.spec.get_or_insert_with(Default::default);

    let desired_ports = desired_spec.ports.clone().unwrap_or_default();
    let observed_ports = spec.ports.clone().unwrap_or_default();
    if !ports_match(&desired_ports, &observed_ports) {
        spec.ports = desired_spec.ports.clone();
        changed = true;
    }
    changed |= sync(&desired_spec.selector, &mut spec.selector);

    Merged {
        resource: observed,
        changed,
    }
}

#[async_trait]
impl ManagedResource for Service {
    const KIND: &'static str = "Service";

    fn merge(desired: &Self, observed: Self) -> Merged<Self> {
        merge_service(desired, observed)
    }

    async fn fetch(
        kube: &dyn ExporterKubeClient,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Self>, Error> {
        kube.get_service(name, namespace).await
    }

    async fn create(kube: &dyn ExporterKubeClient, resource: &Self) -> Result<(), Error> {
        kube.create_service(resource).await
    }

    async fn update(kube: &dyn ExporterKubeClient, resource: &Self) -> Result<(), Error> {
        kube.replace_service(resource).await
    }
}
