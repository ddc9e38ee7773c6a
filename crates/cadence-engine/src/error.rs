use cadence_core::ticket::TicketStatus;
use cadence_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already completed: {0}")]
    AlreadyCompleted(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: TicketStatus, to: TicketStatus },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => Self::NotFound(msg),
            other => Self::Store(other),
        }
    }
}

impl EngineError {
    /// Short classification string for logging and the HTTP error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyCompleted(_) => "already_completed",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Validation(_) => "validation_error",
            Self::Store(_) => "store_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_not_found() {
        let e: EngineError = StoreError::NotFound("activity act_1".into()).into();
        assert!(matches!(e, EngineError::NotFound(_)));
    }

    #[test]
    fn other_store_errors_stay_store() {
        let e: EngineError = StoreError::Database("locked".into()).into();
        assert!(matches!(e, EngineError::Store(_)));
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(EngineError::NotFound("x".into()).code(), "not_found");
        assert_eq!(EngineError::AlreadyCompleted("x".into()).code(), "already_completed");
        assert_eq!(
            EngineError::InvalidTransition {
                from: TicketStatus::Closed,
                to: TicketStatus::Open
            }
            .code(),
            "invalid_transition"
        );
        assert_eq!(EngineError::Validation("x".into()).code(), "validation_error");
    }
}
