//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that take
//! `&PgPool`, or `&mut PgConnection` when they must run inside a caller's
//! transaction.

use ledger_core::scope::Scope;
use ledger_core::types::DbId;

pub mod audit_repo;
pub mod checkpoint_repo;
pub mod commission_repo;
pub mod lesson_facts_repo;
pub mod lesson_repo;
pub mod org_repo;
pub mod pass_repo;
pub mod payout_request_repo;
pub mod transaction_repo;

pub use audit_repo::AuditLogRepo;
pub use checkpoint_repo::CheckpointRepo;
pub use commission_repo::CommissionRepo;
pub use lesson_facts_repo::LessonFactsRepo;
pub use lesson_repo::LessonRepo;
pub use org_repo::OrgRepo;
pub use pass_repo::PassRepo;
pub use payout_request_repo::PayoutRequestRepo;
pub use transaction_repo::TransactionRepo;

/// SQL predicate restricting rows to a scope.
///
/// `None` means the scope can match nothing and the caller should return
/// an empty result without querying. Otherwise the clause references
/// parameter `$param` when a bind is returned.
pub(crate) fn scope_predicate(
    scope: &Scope,
    therapist_col: &str,
    branch_col: &str,
    param: usize,
) -> Option<(String, Option<Vec<DbId>>)> {
    if scope.is_empty() {
        return None;
    }
    match scope {
        Scope::All => Some(("TRUE".to_string(), None)),
        Scope::Branches { branch_ids } => Some((
            format!("{branch_col} = ANY(${param})"),
            Some(branch_ids.clone()),
        )),
        Scope::Therapist { therapist_id } => Some((
            format!("{therapist_col} = ANY(${param})"),
            Some(vec![*therapist_id]),
        )),
        Scope::Nothing => None,
    }
}
