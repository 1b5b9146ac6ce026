use std::fmt::Display;
use thiserror::Error;

use crate::models::content_models::ValidationState;
use crate::models::ContentRef;

/// Everything `ModerationEngine::handle` can report back to a caller.
///
/// The `Already*` variants are idempotency signals: the engine turns them into
/// a successful outcome carrying the unchanged entity, so API callers only see
/// them when a component is driven directly.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid {entity} transition: {from} -> {to}")]
    InvalidTransition { entity: &'static str, from: String, to: String },
    #[error("{content} is already {state}")]
    AlreadyInState { content: ContentRef, state: ValidationState },
    #[error("contribution {0} has already been reviewed")]
    AlreadyReviewed(i64),
    #[error("moderator action {0} has already been reversed")]
    AlreadyReversed(i64),
    #[error("moderator action {0} is not reversible")]
    NotReversible(i64),
    #[error("{entity} {id} was modified concurrently")]
    VersionConflict { entity: &'static str, id: String },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn invalid_transition(entity: &'static str, from: impl Display, to: impl Display) -> Self {
        Self::InvalidTransition { entity, from: from.to_string(), to: to.to_string() }
    }

    pub fn version_conflict(entity: &'static str, id: impl Display) -> Self {
        Self::VersionConflict { entity, id: id.to_string() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Safe to retry the whole transaction.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::StorageUnavailable(_))
    }

    /// A repeated decision that leaves state untouched.
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            EngineError::AlreadyInState { .. }
                | EngineError::AlreadyReviewed(_)
                | EngineError::AlreadyReversed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentType;

    #[test]
    fn only_idempotency_signals_are_noops() {
        let content = ContentRef::new(ContentType::Word, 42);
        assert!(EngineError::AlreadyInState { content, state: ValidationState::Validated }.is_noop());
        assert!(EngineError::AlreadyReviewed(1).is_noop());
        assert!(EngineError::AlreadyReversed(1).is_noop());
        assert!(!EngineError::NotReversible(1).is_noop());
        assert!(!EngineError::forbidden("nope").is_noop());
    }

    #[test]
    fn only_storage_unavailable_is_transient() {
        assert!(EngineError::StorageUnavailable("busy".into()).is_transient());
        assert!(!EngineError::Storage("disk image is malformed".into()).is_transient());
        assert!(!EngineError::version_conflict("content", "word#1").is_transient());
    }

    #[test]
    fn messages_name_the_entity() {
        let err = EngineError::invalid_transition("report", "pending", "resolved");
        assert_eq!(err.to_string(), "invalid report transition: pending -> resolved");
        let err = EngineError::not_found("moderator action", 22);
        assert_eq!(err.to_string(), "moderator action 22 not found");
    }
}
