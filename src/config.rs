//! Operator runtime configuration
//!
//! Values come from command line flags with environment variable fallbacks
//! and end up in [`OperatorConfig`], which is handed to the controller
//! [`Context`](crate::controller::Context).

use std::time::Duration;

use clap::{Args, ValueEnum};

use crate::Error;

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Controller flags
#[derive(Args, Clone, Debug)]
pub struct ControllerArgs {
    /// Only watch exporters in this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Maximum number of exporters reconciled at the same time
    #[arg(long, env = "EXPORTER_CONCURRENCY", default_value_t = 4)]
    pub concurrency: u16,

    /// Seconds between periodic resyncs of a healthy exporter
    #[arg(long, env = "EXPORTER_RESYNC_SECS", default_value_t = 300)]
    pub resync_secs: u64,

    /// Seconds to wait before retrying a failed reconciliation
    #[arg(long, env = "EXPORTER_ERROR_REQUEUE_SECS", default_value_t = 30)]
    pub error_requeue_secs: u64,

    /// Install or update the SolrPrometheusExporter CRD on startup
    #[arg(long, env = "INSTALL_CRDS")]
    pub install_crds: bool,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Validated operator configuration
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorConfig {
    /// Namespace to watch, `None` for all namespaces
    pub namespace: Option<String>,
    /// Worker pool size
    pub concurrency: u16,
    /// Requeue delay after a successful pass
    pub resync_interval: Duration,
    /// Requeue delay after a retryable failure
    pub error_requeue: Duration,
    /// Whether to apply the CRD on startup
    pub install_crds: bool,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            concurrency: 4,
            resync_interval: Duration::from_secs(300),
            error_requeue: Duration::from_secs(30),
            install_crds: false,
            log_format: LogFormat::Text,
        }
    }
}

impl TryFrom<ControllerArgs> for OperatorConfig {
    type Error = Error;

    fn try_from(args: ControllerArgs) -> Result<Self, Error> {
        if args.concurrency == 0 {
            return Err(Error::validation("concurrency must be at least 1"));
        }
        if args.resync_secs == 0 {
            return Err(Error::validation("resync interval must be at least 1 second"));
        }
        Ok(Self {
            namespace: args.namespace.filter(|ns| !ns.is_empty()),
            concurrency: args.concurrency,
            resync_interval: Duration::from_secs(args.resync_secs),
            error_requeue: Duration::from_secs(args.error_requeue_secs),
            install_crds: args.install_crds,
            log_format: args.log_format,
        })
    }
}
