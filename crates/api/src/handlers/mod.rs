pub mod admin;
pub mod branch;
pub mod checkpoint;
pub mod commission;
pub mod lesson;
pub mod pass;
pub mod payout;
pub mod settlement;
pub mod transaction;

use ledger_core::error::CoreError;
use ledger_core::scope::{resolve_scope, CallerContext, Role, Scope};
use ledger_core::types::DbId;
use ledger_db::repositories::OrgRepo;
use ledger_db::DbPool;

use crate::error::AppResult;

// ---------------------------------------------------------------------------
// Scope helpers shared by the handlers
// ---------------------------------------------------------------------------

/// Resolve what the caller may see. Owners need their company's branches.
pub async fn caller_scope(pool: &DbPool, caller: &CallerContext) -> AppResult<Scope> {
    let company_branches = match (caller.role, caller.company_id) {
        (Role::Owner, Some(company_id)) => OrgRepo::branch_ids_for_company(pool, company_id).await?,
        _ => Vec::new(),
    };
    Ok(resolve_scope(caller, &company_branches))
}

/// Fail unless `therapist_id` exists and lies inside `scope`.
pub async fn authorize_therapist(pool: &DbPool, scope: &Scope, therapist_id: DbId) -> AppResult<()> {
    let placement = OrgRepo::find_placement(pool, therapist_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "therapist",
            id: therapist_id,
        })?;
    scope.ensure_therapist(therapist_id, placement.branch_id)?;
    Ok(())
}

/// Resolve the caller's scope and check the therapist against it.
pub async fn scoped_therapist(
    pool: &DbPool,
    caller: &CallerContext,
    therapist_id: DbId,
) -> AppResult<Scope> {
    let scope = caller_scope(pool, caller).await?;
    authorize_therapist(pool, &scope, therapist_id).await?;
    Ok(scope)
}
