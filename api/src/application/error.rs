use crate::application::ports::entry_repository::EntryStoreError;
use crate::domain::entries::name::NameError;

/// Failure taxonomy shared by every entry use case. The HTTP layer maps each
/// variant to a stable machine-readable kind.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("entry not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("upload exceeds the limit of {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("{0}")]
    Conflict(String),
    #[error("blob storage failure")]
    Storage(#[source] anyhow::Error),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::NotFound => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Storage(_) => "STORAGE_FAILURE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<EntryStoreError> for AppError {
    fn from(err: EntryStoreError) -> Self {
        match err {
            EntryStoreError::NotFound => AppError::NotFound,
            EntryStoreError::InvalidParent(problem) => AppError::validation(problem.message()),
            EntryStoreError::Conflict => {
                AppError::Conflict("entry state changed concurrently".into())
            }
            EntryStoreError::NotTrashed => {
                AppError::validation("only entries in the trash can be deleted permanently")
            }
            EntryStoreError::Other(e) => AppError::Internal(e),
        }
    }
}

impl From<NameError> for AppError {
    fn from(err: NameError) -> Self {
        AppError::Validation(err.to_string())
    }
}
