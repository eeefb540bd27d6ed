//! ConfigMap convergence

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;

use super::{merge_metadata, sync, ManagedResource, Merged};
use crate::controller::ExporterKubeClient;
use crate::Error;

/// Fold the desired exporter ConfigMap into the live one
pub fn merge_config_map(desired: &ConfigMap, mut observed: ConfigMap) -> Merged<ConfigMap> {
    let mut changed = merge_metadata(&desired.metadata, &mut observed.metadata);
    changed |= sync(&desired.data, &mut observed.data);
    Merged {
        resource: observed,
        changed,
    }
}

#[async_trait]
impl ManagedResource for ConfigMap {
    const KIND: &'static str = "ConfigMap";

    fn merge(desired: &Self, observed: Self) -> Merged<Self> {
        merge_config_map(desired, observed)
    }

    async fn fetch(
        kube: &dyn ExporterKubeClient,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Self>, Error> {
        kube.get_config_map(name, namespace).await
    }

    async fn create(kube: &dyn ExporterKubeClient, resource: &Self) -> Result<(), Error> {
        kube.create_config_map(resource).await
    }

    async fn update(kube: &dyn ExporterKubeClient, resource: &Self) -> Result<(), Error> {
        kube.replace_config_map(resource).await
    }
}
