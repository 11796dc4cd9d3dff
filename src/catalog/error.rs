use thiserror::Error;

/// Errors raised by a version store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    #[error("Database connection lock poisoned")]
    LockPoisoned,

    #[error("Version {version} of {policy_name} already exists")]
    DuplicateVersion {
        policy_name: String,
        version: String,
    },

    #[error("Another version of {policy_name} was marked latest concurrently")]
    LatestConflict { policy_name: String },

    #[error("Database is busy")]
    Busy,

    #[error("Query interrupted")]
    Interrupted,

    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked) => {
                StoreError::Busy
            }
            Some(rusqlite::ErrorCode::OperationInterrupted) => StoreError::Interrupted,
            _ => StoreError::Database(err),
        }
    }
}

impl StoreError {
    /// Whether the latest-version determination should be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::LatestConflict { .. } | StoreError::Busy)
    }
}

/// What could not be found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    Policy {
        policy_name: String,
    },
    PolicyVersion {
        policy_name: String,
        version: String,
    },
    Doc {
        policy_name: String,
        version: String,
        page: String,
    },
}

impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotFound::Policy { policy_name } => write!(f, "Policy not found: {}", policy_name),
            NotFound::PolicyVersion {
                policy_name,
                version,
            } => write!(f, "Policy version not found: {}@{}", policy_name, version),
            NotFound::Doc {
                policy_name,
                version,
                page,
            } => write!(
                f,
                "Documentation page not found: {}@{} ({})",
                policy_name, version, page
            ),
        }
    }
}

/// Errors surfaced at the engine boundary.
///
/// Storage failures are reduced to [`CatalogError::Database`], which carries only the
/// name of the failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{0}")]
    NotFound(NotFound),

    #[error("Policy version already exists: {policy_name}@{version}")]
    Conflict {
        policy_name: String,
        version: String,
    },

    #[error("A database error occurred while {operation}")]
    Database { operation: &'static str },

    #[error("Operation cancelled")]
    Cancelled,
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        CatalogError::Validation {
            message: message.into(),
        }
    }

    pub fn version_not_found(policy_name: &str, version: &str) -> Self {
        CatalogError::NotFound(NotFound::PolicyVersion {
            policy_name: policy_name.to_string(),
            version: version.to_string(),
        })
    }

    /// Translate a store failure, logging the internal detail.
    pub fn from_store(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::DuplicateVersion {
                policy_name,
                version,
            } => CatalogError::Conflict {
                policy_name,
                version,
            },
            StoreError::Interrupted => CatalogError::Cancelled,
            other => {
                tracing::error!("Store failure while {}: {}", operation, other);
                CatalogError::Database { operation }
            }
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::Validation { .. } => "VALIDATION_ERROR",
            CatalogError::NotFound(NotFound::Policy { .. }) => "POLICY_NOT_FOUND",
            CatalogError::NotFound(NotFound::PolicyVersion { .. }) => "POLICY_VERSION_NOT_FOUND",
            CatalogError::NotFound(NotFound::Doc { .. }) => "DOC_NOT_FOUND",
            CatalogError::Conflict { .. } => "POLICY_VERSION_CONFLICT",
            CatalogError::Database { .. } => "DB_ERROR",
            CatalogError::Cancelled => "CANCELLED",
        }
    }
}
