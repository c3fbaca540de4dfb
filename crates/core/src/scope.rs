//! Caller context and visibility scope.
//!
//! Every read and write takes the caller explicitly. The resolved [`Scope`]
//! is intersected with each query; anything that cannot be resolved fails
//! closed to [`Scope::Nothing`].

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::{ROLE_ACCOUNTANT, ROLE_MANAGER, ROLE_OWNER, ROLE_THERAPIST};
use crate::types::DbId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Company owner: every branch of their company.
    Owner,
    /// Branch manager: their own branch.
    Manager,
    /// Sees only their own lessons and requests.
    Therapist,
    /// Unrestricted.
    Accountant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => ROLE_OWNER,
            Self::Manager => ROLE_MANAGER,
            Self::Therapist => ROLE_THERAPIST,
            Self::Accountant => ROLE_ACCOUNTANT,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            ROLE_OWNER => Some(Self::Owner),
            ROLE_MANAGER => Some(Self::Manager),
            ROLE_THERAPIST => Some(Self::Therapist),
            ROLE_ACCOUNTANT => Some(Self::Accountant),
            _ => None,
        }
    }

    /// Leaders sit on the other side of the settlement from the therapist.
    pub fn is_leader(self) -> bool {
        matches!(self, Self::Owner | Self::Manager)
    }

    /// May confirm payouts and change commission rates.
    pub fn can_settle(self) -> bool {
        self.is_leader() || self == Self::Accountant
    }

    /// May archive and purge ledger entries.
    pub fn can_administer_ledger(self) -> bool {
        matches!(self, Self::Owner | Self::Accountant)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is calling, as supplied by the identity layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub user_id: DbId,
    pub role: Role,
    pub branch_id: Option<DbId>,
    pub company_id: Option<DbId>,
}

impl CallerContext {
    /// Require a role that may confirm payouts and edit rates.
    pub fn require_settler(&self) -> Result<(), CoreError> {
        if self.role.can_settle() {
            Ok(())
        } else {
            Err(CoreError::Forbidden(
                "Leader or accountant role required".into(),
            ))
        }
    }

    pub fn require_ledger_admin(&self) -> Result<(), CoreError> {
        if self.role.can_administer_ledger() {
            Ok(())
        } else {
            Err(CoreError::Forbidden("Owner or accountant role required".into()))
        }
    }

    /// Require the caller to be the therapist `therapist_id`.
    pub fn require_self_therapist(&self, therapist_id: DbId) -> Result<(), CoreError> {
        if self.role == Role::Therapist && self.user_id == therapist_id {
            Ok(())
        } else {
            Err(CoreError::Forbidden(
                "Only the therapist may act on their own payout requests".into(),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Data visible to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    All,
    Branches { branch_ids: Vec<DbId> },
    Therapist { therapist_id: DbId },
    Nothing,
}

/// Resolve the caller's scope.
///
/// `company_branch_ids` are the branches of the caller's company; only the
/// owner role reads them.
pub fn resolve_scope(ctx: &CallerContext, company_branch_ids: &[DbId]) -> Scope {
    match ctx.role {
        Role::Accountant => Scope::All,
        Role::Therapist => Scope::Therapist {
            therapist_id: ctx.user_id,
        },
        Role::Manager => match ctx.branch_id {
            Some(branch_id) => Scope::Branches {
                branch_ids: vec![branch_id],
            },
            None => Scope::Nothing,
        },
        Role::Owner => {
            if ctx.company_id.is_none() || company_branch_ids.is_empty() {
                Scope::Nothing
            } else {
                let mut branch_ids = company_branch_ids.to_vec();
                branch_ids.sort_unstable();
                branch_ids.dedup();
                Scope::Branches { branch_ids }
            }
        }
    }
}

impl Scope {
    /// True when no row can ever match.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Nothing => true,
            Self::Branches { branch_ids } => branch_ids.is_empty(),
            Self::All | Self::Therapist { .. } => false,
        }
    }

    pub fn allows_branch(&self, branch_id: DbId) -> bool {
        match self {
            Self::All => true,
            Self::Branches { branch_ids } => branch_ids.contains(&branch_id),
            Self::Therapist { .. } | Self::Nothing => false,
        }
    }

    /// Whether data about `therapist_id` (working in `branch_id`) is visible.
    pub fn allows_therapist(&self, therapist_id: DbId, branch_id: Option<DbId>) -> bool {
        match self {
            Self::All => true,
            Self::Branches { branch_ids } => branch_id.is_some_and(|b| branch_ids.contains(&b)),
            Self::Therapist { therapist_id: own } => *own == therapist_id,
            Self::Nothing => false,
        }
    }

    pub fn ensure_therapist(&self, therapist_id: DbId, branch_id: Option<DbId>) -> Result<(), CoreError> {
        if self.allows_therapist(therapist_id, branch_id) {
            Ok(())
        } else {
            Err(CoreError::ScopeViolation(format!(
                "Therapist {therapist_id} is outside the caller's scope"
            )))
        }
    }

    pub fn ensure_branch(&self, branch_id: DbId) -> Result<(), CoreError> {
        if self.allows_branch(branch_id) {
            Ok(())
        } else {
            Err(CoreError::ScopeViolation(format!(
                "Branch {branch_id} is outside the caller's scope"
            )))
        }
    }
}
