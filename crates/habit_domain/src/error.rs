use thiserror::Error;
use uuid::Uuid;

/// Problems with a pending habit edit, reported before anything is mutated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("select at least one day")]
    NoDaysSelected,
    #[error("choose a color")]
    NoColor,
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("priority {0} is out of range (0-3)")]
    PriorityOutOfRange(u8),
}

#[derive(Debug, Error)]
pub enum HabitError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Misuse of the status ledger or a broken record link. Never clamped.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("persistence failed: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HabitError {
    pub fn persistence(err: anyhow::Error) -> Self {
        Self::Persistence(err.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }
}

pub type HabitResult<T> = Result<T, HabitError>;
