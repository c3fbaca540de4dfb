use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The caller asked for data outside its visible branches/company.
    #[error("Scope violation: {0}")]
    ScopeViolation(String),

    /// The payout request no longer matches the eligible backlog. The request
    /// has already been moved to CANCELLED when this is returned.
    #[error("Payout request {request_id} is stale: {reason}")]
    StaleRequest { request_id: DbId, reason: String },

    #[error("Therapist already has a pending payout request ({existing_id})")]
    DuplicatePendingRequest { existing_id: DbId },

    /// Lesson flip and ledger write disagreed. Requires manual reconciliation.
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
