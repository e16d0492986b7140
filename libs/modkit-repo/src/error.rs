//! Repository error types

use sea_orm::DbErr;
use thiserror::Error;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Errors raised by the generic repository and its collaborators
#[derive(Debug, Error)]
pub enum RepoError {
    /// Entity does not declare exactly one primary key column
    #[error("entity '{entity}' must have exactly one primary key column, found {key_columns}")]
    KeyResolution { entity: String, key_columns: usize },

    /// Sort column does not map to a sortable column of the entity
    #[error("unknown sort column '{column}' for entity '{entity}'")]
    SortColumn { entity: String, column: String },

    /// Page number or page size below 1
    #[error("invalid page request: page={page}, page_size={page_size} (both must be >= 1)")]
    InvalidPageRequest { page: u64, page_size: u64 },

    /// Audit column declared with a type that cannot hold the stamp
    #[error("audit column '{column}' of entity '{entity}' must be {expected}")]
    AuditColumns {
        entity: String,
        column: String,
        expected: &'static str,
    },

    /// Save was cancelled before commit
    #[error("save cancelled before commit")]
    Cancelled,

    #[error(transparent)]
    Db(#[from] DbErr),
}

impl RepoError {
    /// True when the error was caused by caller input rather than the store
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::SortColumn { .. } | Self::InvalidPageRequest { .. }
        )
    }

    /// True for errors detected while building entity metadata
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::KeyResolution { .. } | Self::AuditColumns { .. })
    }
}
