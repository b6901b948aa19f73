use thiserror::Error;

/// Outcome of a service operation that did not produce a value.
///
/// Expected denials (`NotFound`, `Forbidden`) are part of normal control flow;
/// only `Unavailable` represents a genuine failure of the underlying store.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
