//! Error types for the exporter operator

use thiserror::Error;

/// Main error type for exporter reconciliation
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error that doesn't fit a more specific category
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// A resource that must exist was absent
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Resource kind (e.g. "SolrCloud")
        kind: String,
        /// Resource name
        name: String,
        /// Resource namespace
        namespace: String,
    },

    /// Resolving the SolrCloud connection failed for a reason other than absence
    #[error("lookup of SolrCloud {namespace}/{name} failed: {message}")]
    Lookup {
        /// Referenced SolrCloud name
        name: String,
        /// Referenced SolrCloud namespace
        namespace: String,
        /// What went wrong
        message: String,
    },

    /// The cluster rejected a create, update or status write
    #[error("failed to persist {kind} {name}: {message}")]
    Persistence {
        /// Resource kind being written
        kind: String,
        /// Resource name
        name: String,
        /// Reason reported by the API server
        message: String,
    },

    /// The owner reference to the exporter could not be built
    #[error("owner reference error: {0}")]
    OwnerReference(String),

    /// Invalid exporter spec
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a not-found error for the given resource
    pub fn not_found(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Create a SolrCloud lookup error
    pub fn lookup(
        name: impl Into<String>,
        namespace: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Lookup {
            name: name.into(),
            namespace: namespace.into(),
            message: msg.into(),
        }
    }

    /// Create a persistence error for a rejected write
    pub fn persistence(
        kind: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Persistence {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create an owner reference error
    pub fn owner_reference(msg: impl Into<String>) -> Self {
        Self::OwnerReference(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether re-delivering the reconcile request can succeed without a spec change
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }

    /// True when this is the not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Returns true if the kube error is an API 404
pub(crate) fn is_kube_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}
