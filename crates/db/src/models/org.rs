//! Companies, branches, users and children.
//!
//! These tables belong to the organization CRUD layer. The ledger reads
//! them to resolve scope and placement; the create DTOs exist for seeding.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ledger_core::types::{DbId, Money, Timestamp};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Company {
    pub id: DbId,
    pub name: String,
    pub owner_id: Option<DbId>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Branch {
    pub id: DbId,
    pub company_id: DbId,
    pub name: String,
    pub manager_id: Option<DbId>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub name: String,
    pub role: String,
    pub branch_id: Option<DbId>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Child {
    pub id: DbId,
    pub name: String,
    pub branch_id: Option<DbId>,
    pub lesson_rate: Option<Money>,
    pub created_at: Timestamp,
}

/// A user together with the company of their branch.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserPlacement {
    pub user_id: DbId,
    pub role: String,
    pub branch_id: Option<DbId>,
    pub company_id: Option<DbId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCompany {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBranch {
    pub company_id: DbId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub role: String,
    pub branch_id: Option<DbId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateChild {
    pub name: String,
    pub branch_id: Option<DbId>,
    pub lesson_rate: Option<Money>,
}
