//! Repository for the organizational read models.

use ledger_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::org::{
    Branch, Child, Company, CreateBranch, CreateChild, CreateCompany, CreateUser, User,
    UserPlacement,
};

/// Owners usually have no branch; their company comes from `owner_id`.
const PLACEMENT_QUERY: &str = "\
    SELECT u.id AS user_id, u.role, u.branch_id, \
           COALESCE(b.company_id, (SELECT c.id FROM companies c WHERE c.owner_id = u.id \
                                   ORDER BY c.id LIMIT 1)) AS company_id \
    FROM users u LEFT JOIN branches b ON b.id = u.branch_id \
    WHERE u.id = $1";

/// Reads of companies, branches, users and children, plus the inserts used
/// for seeding.
pub struct OrgRepo;

impl OrgRepo {
    /// Find a user's branch and company.
    pub async fn find_placement(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<UserPlacement>, sqlx::Error> {
        sqlx::query_as::<_, UserPlacement>(PLACEMENT_QUERY)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Same as [`Self::find_placement`] inside a transaction.
    pub async fn find_placement_in(
        conn: &mut PgConnection,
        user_id: DbId,
    ) -> Result<Option<UserPlacement>, sqlx::Error> {
        sqlx::query_as::<_, UserPlacement>(PLACEMENT_QUERY)
            .bind(user_id)
            .fetch_optional(conn)
            .await
    }

    /// Ids of every branch of a company.
    pub async fn branch_ids_for_company(
        pool: &PgPool,
        company_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>("SELECT id FROM branches WHERE company_id = $1 ORDER BY id")
            .bind(company_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_branch(pool: &PgPool, id: DbId) -> Result<Option<Branch>, sqlx::Error> {
        sqlx::query_as::<_, Branch>(
            "SELECT id, company_id, name, manager_id, created_at FROM branches WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    pub async fn create_company(
        pool: &PgPool,
        input: &CreateCompany,
    ) -> Result<Company, sqlx::Error> {
        sqlx::query_as::<_, Company>(
            "INSERT INTO companies (name) VALUES ($1) \
             RETURNING id, name, owner_id, created_at",
        )
        .bind(&input.name)
        .fetch_one(pool)
        .await
    }

    pub async fn create_branch(pool: &PgPool, input: &CreateBranch) -> Result<Branch, sqlx::Error> {
        sqlx::query_as::<_, Branch>(
            "INSERT INTO branches (company_id, name) VALUES ($1, $2) \
             RETURNING id, company_id, name, manager_id, created_at",
        )
        .bind(input.company_id)
        .bind(&input.name)
        .fetch_one(pool)
        .await
    }

    pub async fn create_user(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (name, role, branch_id) VALUES ($1, $2, $3) \
             RETURNING id, name, role, branch_id, created_at",
        )
        .bind(&input.name)
        .bind(&input.role)
        .bind(input.branch_id)
        .fetch_one(pool)
        .await
    }

    pub async fn create_child(pool: &PgPool, input: &CreateChild) -> Result<Child, sqlx::Error> {
        sqlx::query_as::<_, Child>(
            "INSERT INTO children (name, branch_id, lesson_rate) VALUES ($1, $2, $3) \
             RETURNING id, name, branch_id, lesson_rate, created_at",
        )
        .bind(&input.name)
        .bind(input.branch_id)
        .bind(input.lesson_rate)
        .fetch_one(pool)
        .await
    }

    pub async fn set_company_owner(
        pool: &PgPool,
        company_id: DbId,
        owner_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE companies SET owner_id = $2 WHERE id = $1")
            .bind(company_id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_branch_manager(
        pool: &PgPool,
        branch_id: DbId,
        manager_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE branches SET manager_id = $2 WHERE id = $1")
            .bind(branch_id)
            .bind(manager_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
