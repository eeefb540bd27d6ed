//! ZooKeeper digest ACL credentials passed to the exporter JVM

use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, SecretKeySelector};

use crate::crd::{ZookeeperAcl, ZookeeperConnectionInfo};

/// Env var holding the ACL and credential provider system properties
pub const ZK_CREDS_AND_ACLS_ENV: &str = "SOLR_ZK_CREDS_AND_ACLS";

const ZK_PROVIDERS: &str = "-DzkACLProvider=org.apache.solr.common.cloud.VMParamsAllAndReadonlyDigestZkACLProvider \
     -DzkCredentialsProvider=org.apache.solr.common.cloud.VMParamsSingleSetCredentialsDigestZkCredentialsProvider";

fn secret_env(name: &str, acl: &ZookeeperAcl, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: acl.secret_ref.clone(),
                key: key.to_string(),
                optional: Some(false),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Env vars carrying the ZooKeeper ACLs of a connection, empty when it has none
///
/// The last entry is always [`ZK_CREDS_AND_ACLS_ENV`], which references the
/// credential env vars before it.
pub fn zookeeper_acl_env_vars(info: &ZookeeperConnectionInfo) -> Vec<EnvVar> {
    let mut env = Vec::new();
    let mut digests = Vec::new();

    if let Some(acl) = &info.acl {
        env.push(secret_env("ZK_ALL_ACL_USERNAME", acl, &acl.username_key));
        env.push(secret_env("ZK_ALL_ACL_PASSWORD", acl, &acl.password_key));
        digests.push("-DzkDigestUsername=$(ZK_ALL_ACL_USERNAME)");
        digests.push("-DzkDigestPassword=$(ZK_ALL_ACL_PASSWORD)");
    }
    if let Some(acl) = &info.read_only_acl {
        env.push(secret_env("ZK_READ_ACL_USERNAME", acl, &acl.username_key));
        env.push(secret_env("ZK_READ_ACL_PASSWORD", acl, &acl.password_key));
        digests.push("-DzkDigestReadonlyUsername=$(ZK_READ_ACL_USERNAME)");
        digests.push("-DzkDigestReadonlyPassword=$(ZK_READ_ACL_PASSWORD)");
    }

    if !digests.is_empty() {
        env.push(EnvVar {
            name: ZK_CREDS_AND_ACLS_ENV.to_string(),
            value: Some(format!("{ZK_PROVIDERS} {}", digests.join(" "))),
            ..Default::default()
        });
    }
    env
}
