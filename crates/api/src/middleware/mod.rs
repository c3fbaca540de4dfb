//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`]: the caller context from a JWT Bearer token.
//! - [`rbac::RequireSettler`]: leader or accountant.
//! - [`rbac::RequireLedgerAdmin`]: owner or accountant.
//! - [`rbac::RequireTherapist`]: the therapist role.

pub mod auth;
pub mod rbac;
