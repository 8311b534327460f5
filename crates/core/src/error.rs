use minibroker_storage::StorageError;

use crate::cluster::ClusterError;
use crate::config::ConfigError;
use crate::installer::InstallerError;
use crate::provider::ProviderError;
use crate::repository::RepositoryError;

/// Machine-readable reason attached to conflicting or stale requests.
pub const CONCURRENCY_ERROR: &str = "ConcurrencyError";
/// Human-readable description paired with [`CONCURRENCY_ERROR`].
pub const CONCURRENCY_ERROR_DESCRIPTION: &str = "Concurrent modification not supported";

/// Protocol-independent classification of a [`BrokerError`].
///
/// The front end maps these to status codes; the core never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The instance was already reserved by another provision request.
    Conflict,
    NotFound,
    /// The instance no longer exists. For deprovision and polling this is
    /// the idempotent "already done" answer, not a failure.
    Gone,
    /// A poll presented an operation token that is not the current one.
    Concurrency,
    /// The request named something the catalog does not offer.
    InvalidRequest,
    /// The request collides with work still in flight; retrying later may succeed.
    Retryable,
    /// A collaborator (repository, installer, cluster API, provider) failed.
    Upstream,
    Config,
}

/// A failure from one of the broker's collaborators.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Installer(#[from] InstallerError),
    #[error("could not render value overrides: {0}")]
    Values(#[from] serde_yaml::Error),
    #[error("background task did not complete: {0}")]
    Task(String),
}

/// Errors surfaced by broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("instance {instance_id} already exists")]
    Conflict { instance_id: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("instance {instance_id} is gone")]
    Gone { instance_id: String },

    #[error("operation {presented} is not the current operation of instance {instance_id}")]
    Concurrency {
        instance_id: String,
        presented: String,
        current: Option<String>,
    },

    #[error("plan {plan_id} is not offered by service {service_id}")]
    UnknownPlan { service_id: String, plan_id: String },

    #[error("instance {instance_id} still has a provision in progress")]
    OperationInProgress { instance_id: String },

    #[error("unable to bind instance {instance_id}")]
    Bind {
        instance_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("{operation} failed{}", instance_suffix(.instance_id))]
    Upstream {
        operation: &'static str,
        instance_id: Option<String>,
        #[source]
        source: UpstreamError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn instance_suffix(instance_id: &Option<String>) -> String {
    match instance_id {
        Some(id) => format!(" for instance {id}"),
        None => String::new(),
    }
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::Conflict { .. } => ErrorKind::Conflict,
            BrokerError::NotFound { .. } => ErrorKind::NotFound,
            BrokerError::Gone { .. } => ErrorKind::Gone,
            BrokerError::Concurrency { .. } => ErrorKind::Concurrency,
            BrokerError::UnknownPlan { .. } => ErrorKind::InvalidRequest,
            BrokerError::OperationInProgress { .. } => ErrorKind::Retryable,
            BrokerError::Bind { .. } | BrokerError::Upstream { .. } => ErrorKind::Upstream,
            BrokerError::Config(_) => ErrorKind::Config,
        }
    }

    /// Fixed reason code for the front end to put in the error body, if any.
    pub fn reason_code(&self) -> Option<&'static str> {
        match self.kind() {
            ErrorKind::Conflict | ErrorKind::Concurrency | ErrorKind::Retryable => {
                Some(CONCURRENCY_ERROR)
            }
            _ => None,
        }
    }

    pub(crate) fn upstream(
        operation: &'static str,
        instance_id: &str,
        source: impl Into<UpstreamError>,
    ) -> Self {
        BrokerError::Upstream {
            operation,
            instance_id: Some(instance_id.to_string()),
            source: source.into(),
        }
    }

    /// Map a record-store failure, keeping `Conflict` / `NotFound` distinct.
    pub(crate) fn from_storage(operation: &'static str, err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists { instance_id } => BrokerError::Conflict { instance_id },
            StorageError::NotFound { instance_id } => BrokerError::NotFound {
                what: format!("instance {instance_id}"),
            },
            other => BrokerError::Upstream {
                operation,
                instance_id: None,
                source: other.into(),
            },
        }
    }
}
