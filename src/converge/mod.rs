//! Convergence of observed child resources toward their desired state
//!
//! For each child kind the engine fetches the live object, creates it when
//! absent, and otherwise folds the operator-managed fields of the desired
//! object into it. An update is only sent when a managed field changed, so
//! fields the cluster fills in after creation never cause write traffic.

mod config_map;
mod deployment;
mod service;
#[cfg(test)]
pub(crate) mod test_support;

pub use config_map::merge_config_map;
pub use deployment::merge_deployment;
pub use service::merge_service;

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use tracing::{debug, info};

use crate::controller::ExporterKubeClient;
use crate::Error;

/// Result of folding a desired object into an observed one
#[derive(Clone, Debug, PartialEq)]
pub struct Merged<K> {
    /// The observed object with every managed field taken from the desired one
    pub resource: K,
    /// Whether any managed field differed
    pub changed: bool,
}

/// What one convergence step did
#[derive(Clone, Debug, PartialEq)]
pub enum Convergence<K> {
    /// The resource did not exist and was created
    Created,
    /// The resource existed and was updated to the contained value
    Updated(K),
    /// The resource existed and already matched
    Unchanged(K),
}

impl<K> Convergence<K> {
    /// The live object after this step, `None` if it was just created
    pub fn observed(&self) -> Option<&K> {
        match self {
            Self::Created => None,
            Self::Updated(k) | Self::Unchanged(k) => Some(k),
        }
    }
}

/// A child resource kind the operator converges
#[async_trait]
pub trait ManagedResource: Resource + Clone + Send + Sync + Sized + 'static {
    /// Kind name used in logs and errors
    const KIND: &'static str;

    /// Fold the managed fields of `desired` into `observed`
    fn merge(desired: &Self, observed: Self) -> Merged<Self>;

    /// Fetch the live object, `None` if it does not exist
    async fn fetch(
        kube: &dyn ExporterKubeClient,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Self>, Error>;

    /// Create the object
    async fn create(kube: &dyn ExporterKubeClient, resource: &Self) -> Result<(), Error>;

    /// Replace the live object
    async fn update(kube: &dyn ExporterKubeClient, resource: &Self) -> Result<(), Error>;
}

/// Create, update or leave alone the live copy of `desired`
///
/// Errors from the cluster are returned unchanged; nothing is written after a
/// failed fetch.
pub async fn converge<K: ManagedResource>(
    kube: &dyn ExporterKubeClient,
    desired: K,
) -> Result<Convergence<K>, Error> {
    let name = desired.meta().name.clone().unwrap_or_default();
    let namespace = desired.meta().namespace.clone().unwrap_or_default();

    let Some(observed) = K::fetch(kube, &name, &namespace).await? else {
        info!(kind = K::KIND, name = %name, namespace = %namespace, "creating resource");
        K::create(kube, &desired).await?;
        return Ok(Convergence::Created);
    };

    let merged = K::merge(&desired, observed);
    if merged.changed {
        info!(kind = K::KIND, name = %name, namespace = %namespace, "updating resource");
        K::update(kube, &merged.resource).await?;
        Ok(Convergence::Updated(merged.resource))
    } else {
        debug!(kind = K::KIND, name = %name, "resource up to date");
        Ok(Convergence::Unchanged(merged.resource))
    }
}

/// Whether the exporter Deployment has at least one ready replica
///
/// A Deployment that was just created has no observed replicas yet.
pub fn deployment_ready(result: &Convergence<Deployment>) -> bool {
    result
        .observed()
        .and_then(|d| d.status.as_ref())
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0)
        > 0
}

/// Replace `observed` with `desired` when they differ
pub(crate) fn sync<T: PartialEq + Clone>(desired: &T, observed: &mut T) -> bool {
    if desired == observed {
        return false;
    }
    *observed = desired.clone();
    true
}

/// Set every desired key on `observed`, keeping keys added by others
pub(crate) fn merge_string_map(
    desired: Option<&BTreeMap<String, String>>,
    observed: &mut Option<BTreeMap<String, String>>,
) -> bool {
    let Some(desired) = desired.filter(|d| !d.is_empty()) else {
        return false;
    };
    let target = observed.get_or_insert_with(BTreeMap::new);
    let mut changed = false;
    for (key, value) in desired {
        if target.get(key) != Some(value) {
            target.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Merge labels and annotations additively and add missing owner references
pub(crate) fn merge_metadata(desired: &ObjectMeta, observed: &mut ObjectMeta) -> bool {
    let mut changed = merge_string_map(desired.labels.as_ref(), &mut observed.labels);
    changed |= merge_string_map(desired.annotations.as_ref(), &mut observed.annotations);

    for owner in desired.owner_references.iter().flatten() {
        let owners = observed.owner_references.get_or_insert_with(Vec::new);
        if !owners.iter().any(|o| o.uid == owner.uid) {
            owners.push(owner.clone());
            changed = true;
        }
    }
    changed
}
