//! Repository for `passes` and `pass_usages`.

use ledger_core::audit::{action_types, entity_types};
use ledger_core::error::CoreError;
use ledger_core::ledger::{PaymentMethod, TransactionKind};
use ledger_core::pass::{ensure_closable, ensure_consumable, plan_refund, validate_new_pass};
use ledger_core::status::PassStatus;
use ledger_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::audit::CreateAuditLog;
use crate::models::pass::{CreatePass, Pass, PassRefund, PassUsage};
use crate::models::transaction::CreateTransaction;
use crate::repositories::{AuditLogRepo, TransactionRepo};
use crate::LedgerDbError;

const COLUMNS: &str = "\
    id, child_id, branch_id, total_lessons, remaining_lessons, total_price, \
    status_id, valid_until, created_at, updated_at";

pub struct PassRepo;

impl PassRepo {
    /// Issue a pass and record its sale as REVENUE.
    pub async fn issue(pool: &PgPool, input: &CreatePass) -> Result<Pass, LedgerDbError> {
        validate_new_pass(input.total_lessons, input.total_price)?;
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO passes \
                (child_id, branch_id, total_lessons, remaining_lessons, total_price, valid_until) \
             VALUES ($1, $2, $3, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        let pass = sqlx::query_as::<_, Pass>(&query)
            .bind(input.child_id)
            .bind(input.branch_id)
            .bind(input.total_lessons)
            .bind(input.total_price)
            .bind(input.valid_until)
            .fetch_one(&mut *tx)
            .await?;

        let mut sale = CreateTransaction::new(TransactionKind::Revenue, input.total_price);
        sale.branch_id = input.branch_id;
        sale.payment_method = Some(input.payment_method.unwrap_or(PaymentMethod::LeaderCash));
        TransactionRepo::insert(&mut tx, &sale).await?;

        tx.commit().await?;
        tracing::info!(pass_id = pass.id, child_id = pass.child_id, "Pass issued");
        Ok(pass)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Pass>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM passes WHERE id = $1");
        sqlx::query_as::<_, Pass>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    async fn lock(conn: &mut PgConnection, id: DbId) -> Result<Pass, LedgerDbError> {
        let query = format!("SELECT {COLUMNS} FROM passes WHERE id = $1 FOR UPDATE");
        let pass = sqlx::query_as::<_, Pass>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or(CoreError::NotFound { entity: "pass", id })?;
        Ok(pass)
    }

    fn status_of(pass: &Pass) -> Result<PassStatus, CoreError> {
        pass.status()
            .ok_or_else(|| CoreError::Internal(format!("Pass {} has unknown status", pass.id)))
    }

    /// Take one lesson from the pass and link it to `lesson_id`.
    pub async fn consume(
        pool: &PgPool,
        pass_id: DbId,
        lesson_id: DbId,
        now: Timestamp,
    ) -> Result<PassUsage, LedgerDbError> {
        let mut tx = pool.begin().await?;
        let pass = Self::lock(&mut tx, pass_id).await?;
        ensure_consumable(Self::status_of(&pass)?, pass.remaining_lessons, pass.valid_until, now)?;

        sqlx::query(
            "UPDATE passes SET remaining_lessons = remaining_lessons - 1, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(pass_id)
        .execute(&mut *tx)
        .await?;

        let usage = sqlx::query_as::<_, PassUsage>(
            "INSERT INTO pass_usages (pass_id, lesson_id) VALUES ($1, $2) \
             RETURNING id, pass_id, lesson_id, created_at",
        )
        .bind(pass_id)
        .bind(lesson_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(usage)
    }

    /// Close a fully used pass.
    pub async fn close(pool: &PgPool, id: DbId) -> Result<Pass, LedgerDbError> {
        let mut tx = pool.begin().await?;
        let pass = Self::lock(&mut tx, id).await?;
        ensure_closable(Self::status_of(&pass)?, pass.remaining_lessons)?;

        let pass = Self::set_status(&mut tx, id, PassStatus::Cancelled).await?;
        tx.commit().await?;
        Ok(pass)
    }

    /// Refund the unused remainder and write a negative REVENUE correction.
    pub async fn refund(pool: &PgPool, id: DbId, actor_id: DbId) -> Result<PassRefund, LedgerDbError> {
        let mut tx = pool.begin().await?;
        let pass = Self::lock(&mut tx, id).await?;
        let plan = plan_refund(
            Self::status_of(&pass)?,
            pass.total_lessons,
            pass.remaining_lessons,
            pass.total_price,
        )?;

        let mut correction = CreateTransaction::new(TransactionKind::Revenue, -plan.amount);
        correction.branch_id = pass.branch_id;
        correction.payment_method = Some(PaymentMethod::Subscription);
        let correction = TransactionRepo::insert(&mut tx, &correction).await?;

        let query = format!(
            "UPDATE passes SET status_id = $2, remaining_lessons = 0, updated_at = NOW() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let pass = sqlx::query_as::<_, Pass>(&query)
            .bind(id)
            .bind(plan.status.id())
            .fetch_one(&mut *tx)
            .await?;

        AuditLogRepo::append(
            &mut tx,
            &CreateAuditLog {
                user_id: Some(actor_id),
                action_type: action_types::PASS_REFUND.to_string(),
                entity_type: Some(entity_types::PASS.to_string()),
                entity_id: Some(id),
                details_json: Some(serde_json::json!({
                    "amount": plan.amount.to_string(),
                    "transaction_id": correction.id,
                })),
            },
        )
        .await?;

        tx.commit().await?;
        tracing::info!(pass_id = id, amount = %plan.amount, "Pass refunded");
        Ok(PassRefund { pass, correction })
    }

    async fn set_status(
        conn: &mut PgConnection,
        id: DbId,
        status: PassStatus,
    ) -> Result<Pass, sqlx::Error> {
        let query = format!(
            "UPDATE passes SET status_id = $2, updated_at = NOW() WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Pass>(&query)
            .bind(id)
            .bind(status.id())
            .fetch_one(conn)
            .await
    }
}
