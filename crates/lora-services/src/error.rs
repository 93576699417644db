//! Store errors.
//!
//! `NotFound` is an expected outcome callers match on. Everything wrapped
//! in `Backend` is an infrastructure failure and is passed through as-is.

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("invalid value {value:?} for field {field}")]
    InvalidField { field: &'static str, value: String },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("backend lock poisoned")]
    Poisoned,
    #[error("failed to open {path}: {source}")]
    Open {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
