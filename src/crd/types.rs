//! Supporting types for the SolrPrometheusExporter CRD

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Affinity, CSIVolumeSource, ConfigMapVolumeSource, Container, DownwardAPIVolumeSource,
    EmptyDirVolumeSource, EnvVar, EphemeralVolumeSource, HostPathVolumeSource, NFSVolumeSource,
    PersistentVolumeClaimVolumeSource, PodSecurityContext, ProjectedVolumeSource,
    ResourceRequirements, SecretVolumeSource, Toleration, Volume, VolumeMount,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default Solr image repository used by the exporter
pub const DEFAULT_SOLR_REPOSITORY: &str = "library/solr";

/// Default Solr image tag used by the exporter
pub const DEFAULT_SOLR_VERSION: &str = "8.7.0";

/// Default image pull policy
pub const DEFAULT_PULL_POLICY: &str = "IfNotPresent";

/// Which Solr deployment the exporter scrapes
///
/// Exactly one of `cloud` or `standalone` is expected. Use [`SolrReference::target`]
/// to view it as a single tagged value.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolrReference {
    /// A SolrCloud, reached through ZooKeeper
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<SolrCloudReference>,

    /// A standalone Solr node reached by address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standalone: Option<StandaloneSolrReference>,
}

/// The connection target named by a [`SolrReference`]
#[derive(Clone, Debug, PartialEq)]
pub enum SolrTarget<'a> {
    /// Standalone Solr at a fixed address
    Standalone(&'a str),
    /// SolrCloud with an inline ZooKeeper connection descriptor
    CloudInline(&'a ZookeeperConnectionInfo),
    /// SolrCloud resource in the cluster, resolved through its status
    CloudByName {
        /// SolrCloud name
        name: &'a str,
        /// SolrCloud namespace (empty until defaults are applied)
        namespace: &'a str,
    },
}

impl SolrReference {
    /// The single connection target this reference names, if any.
    ///
    /// A cloud reference takes precedence over a standalone address. Within a
    /// cloud reference an inline connection descriptor wins over a name.
    pub fn target(&self) -> Option<SolrTarget<'_>> {
        if let Some(cloud) = &self.cloud {
            if let Some(info) = &cloud.zookeeper_connection_info {
                return Some(SolrTarget::CloudInline(info));
            }
            if let Some(name) = cloud.name.as_deref().filter(|n| !n.is_empty()) {
                return Some(SolrTarget::CloudByName {
                    name,
                    namespace: cloud.namespace.as_deref().unwrap_or_default(),
                });
            }
        }
        self.standalone
            .as_ref()
            .filter(|s| !s.address.is_empty())
            .map(|s| SolrTarget::Standalone(&s.address))
    }

    pub(crate) fn with_defaults(&mut self, namespace: &str) -> bool {
        let Some(cloud) = self.cloud.as_mut() else {
            return false;
        };
        let mut changed = false;
        let named = cloud.name.as_deref().is_some_and(|n| !n.is_empty());
        let missing_namespace = cloud.namespace.as_deref().is_none_or(str::is_empty);
        if named && missing_namespace {
            cloud.namespace = Some(namespace.to_string());
            changed = true;
        }
        if let Some(info) = cloud.zookeeper_connection_info.as_mut() {
            changed |= info.with_defaults();
        }
        changed
    }
}

/// Reference to a SolrCloud, either by name or by explicit connection info
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolrCloudReference {
    /// Name of a SolrCloud resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Namespace of the SolrCloud resource, defaults to the exporter's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Explicit ZooKeeper connection information
    #[serde(
        rename = "zkConnectionInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub zookeeper_connection_info: Option<ZookeeperConnectionInfo>,
}

/// Standalone Solr node
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StandaloneSolrReference {
    /// Address of the Solr node, e.g. `http://solr:8983/solr`
    pub address: String,
}

/// How to reach the ZooKeeper ensemble backing a SolrCloud
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperConnectionInfo {
    /// Connection string usable from inside the cluster
    #[serde(default)]
    pub internal_connection_string: String,

    /// Connection string usable from outside the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_connection_string: Option<String>,

    /// ZooKeeper chroot of the SolrCloud
    #[serde(default)]
    pub chroot: String,

    /// ACL with full access to the chroot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<ZookeeperAcl>,

    /// ACL with read-only access to the chroot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_acl: Option<ZookeeperAcl>,
}

impl ZookeeperConnectionInfo {
    /// Connection string including the chroot, as passed to `-z`
    pub fn zk_connection_string(&self) -> String {
        format!("{}{}", self.internal_connection_string, self.chroot)
    }

    /// Whether credentials are attached to this connection
    pub fn has_acls(&self) -> bool {
        self.acl.is_some() || self.read_only_acl.is_some()
    }

    fn with_defaults(&mut self) -> bool {
        if self.chroot.is_empty() {
            self.chroot = "/".to_string();
            true
        } else if !self.chroot.starts_with('/') {
            self.chroot = format!("/{}", self.chroot);
            true
        } else {
            false
        }
    }
}

/// Digest credentials stored in a Secret
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperAcl {
    /// Name of the Secret holding the credentials
    #[serde(rename = "secret")]
    pub secret_ref: String,

    /// Key of the username within the Secret
    pub username_key: String,

    /// Key of the password within the Secret
    pub password_key: String,
}

/// Container image for the exporter
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerImage {
    /// Image repository
    #[serde(default)]
    pub repository: String,

    /// Image tag
    #[serde(default)]
    pub tag: String,

    /// Pull policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<String>,

    /// Name of a pull secret in the exporter's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secret: Option<String>,
}

impl ContainerImage {
    /// Full image reference, `repository:tag`
    pub fn to_image_name(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    pub(crate) fn with_defaults(&mut self) -> bool {
        let mut changed = false;
        if self.repository.is_empty() {
            self.repository = DEFAULT_SOLR_REPOSITORY.to_string();
            changed = true;
        }
        if self.tag.is_empty() {
            self.tag = DEFAULT_SOLR_VERSION.to_string();
            changed = true;
        }
        if self.pull_policy.as_deref().is_none_or(str::is_empty) {
            self.pull_policy = Some(DEFAULT_PULL_POLICY.to_string());
            changed = true;
        }
        changed
    }
}

/// Labels and annotations to add to one generated resource kind
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOptions {
    /// Extra labels, overriding generated ones on conflict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Extra annotations, overriding generated ones on conflict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Pod-level customization of the exporter Deployment
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodOptions {
    /// Extra pod labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Pod annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    /// Pod affinity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    /// Compute resources of the exporter container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Extra environment variables of the exporter container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_variables: Vec<EnvVar>,

    /// Extra volumes, optionally mounted into the exporter container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<AdditionalVolume>,

    /// Pod security context, replacing the default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_security_context: Option<PodSecurityContext>,

    /// Pod tolerations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,

    /// Node selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    /// Priority class name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,

    /// Containers run next to the exporter
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sidecar_containers: Vec<Container>,

    /// Containers run before the exporter starts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_containers: Vec<Container>,
}

/// A user supplied volume
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalVolume {
    /// Volume name
    pub name: String,

    /// Volume source
    pub source: VolumeSource,

    /// Mount into the exporter container; its name is always the volume name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_container_mount: Option<VolumeMount>,
}

/// Source of a user supplied volume; exactly one field is expected to be set
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSource {
    /// ConfigMap volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapVolumeSource>,

    /// Secret volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretVolumeSource>,

    /// Scratch space living as long as the pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDirVolumeSource>,

    /// Existing PersistentVolumeClaim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimVolumeSource>,

    /// Host path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<HostPathVolumeSource>,

    /// Projection of several sources into one directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projected: Option<ProjectedVolumeSource>,

    /// Downward API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downward_api: Option<DownwardAPIVolumeSource>,

    /// CSI driver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csi: Option<CSIVolumeSource>,

    /// NFS export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfs: Option<NFSVolumeSource>,

    /// Generic ephemeral volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<EphemeralVolumeSource>,
}

impl AdditionalVolume {
    /// The pod volume described by this entry
    pub fn to_volume(&self) -> Volume {
        let source = self.source.clone();
        Volume {
            name: self.name.clone(),
            config_map: source.config_map,
            secret: source.secret,
            empty_dir: source.empty_dir,
            persistent_volume_claim: source.persistent_volume_claim,
            host_path: source.host_path,
            projected: source.projected,
            downward_api: source.downward_api,
            csi: source.csi,
            nfs: source.nfs,
            ephemeral: source.ephemeral,
            ..Default::default()
        }
    }

    /// Mount into the exporter container, named after the volume
    pub fn container_mount(&self) -> Option<VolumeMount> {
        self.default_container_mount.clone().map(|mut mount| {
            mount.name = self.name.clone();
            mount
        })
    }
}

/// Per-resource customization of everything the operator generates
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomExporterKubeOptions {
    /// Pod options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_options: Option<PodOptions>,

    /// Deployment labels/annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_options: Option<ResourceOptions>,

    /// Service labels/annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_options: Option<ResourceOptions>,

    /// ConfigMap labels/annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_options: Option<ResourceOptions>,
}
