use thiserror::Error;

/// Errors surfaced to API callers.
///
/// A simulated execution failure is not represented here: it is a normal
/// terminal state of an execution record, observable only through the logs.
#[derive(Debug, Error)]
pub enum DeckError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DeckError {
    pub fn not_found(what: &str) -> Self {
        DeckError::NotFound(format!("{} not found", what))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DeckError::Validation(msg.into())
    }
}

impl From<rusqlite::Error> for DeckError {
    fn from(e: rusqlite::Error) -> Self {
        DeckError::Internal(e.into())
    }
}

pub type DeckResult<T> = std::result::Result<T, DeckError>;
