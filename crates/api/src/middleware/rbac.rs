//! Role-based access control extractors.
//!
//! Each wraps [`AuthUser`] and rejects callers whose role does not qualify.
//! Scope checks still apply on top.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use ledger_core::error::CoreError;
use ledger_core::scope::Role;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Owner, manager or accountant: may confirm payouts, settle lessons and
/// edit commission rates.
pub struct RequireSettler(pub AuthUser);

impl FromRequestParts<AppState> for RequireSettler {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.caller.require_settler()?;
        Ok(RequireSettler(user))
    }
}

/// Owner or accountant: may archive and purge ledger entries.
pub struct RequireLedgerAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireLedgerAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.caller.require_ledger_admin()?;
        Ok(RequireLedgerAdmin(user))
    }
}

/// Therapist role only.
pub struct RequireTherapist(pub AuthUser);

impl FromRequestParts<AppState> for RequireTherapist {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.caller.role != Role::Therapist {
            return Err(AppError::Core(CoreError::Forbidden(
                "Therapist role required".into(),
            )));
        }
        Ok(RequireTherapist(user))
    }
}
