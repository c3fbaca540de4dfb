//! Repository for the append-only `transactions` ledger.

use ledger_core::audit::{action_types, entity_types};
use ledger_core::ledger::{TransactionKind, MAX_TRANSACTIONS_PER_PAGE};
use ledger_core::retention::{purge_horizon, validate_archive_range};
use ledger_core::scope::Scope;
use ledger_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::audit::CreateAuditLog;
use crate::models::transaction::{CreateTransaction, Transaction, TransactionQuery};
use crate::repositories::{scope_predicate, AuditLogRepo};
use crate::LedgerDbError;

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const COLUMNS: &str = "\
    id, kind, amount, lesson_id, user_id, branch_id, company_id, \
    meta, archived_at, created_at";

// ---------------------------------------------------------------------------
// TransactionRepo
// ---------------------------------------------------------------------------

pub struct TransactionRepo;

impl TransactionRepo {
    /// Append an entry inside the caller's transaction.
    pub async fn insert(
        conn: &mut PgConnection,
        input: &CreateTransaction,
    ) -> Result<Transaction, sqlx::Error> {
        let query = format!(
            "INSERT INTO transactions \
                (kind, amount, lesson_id, user_id, branch_id, company_id, meta) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(input.kind.as_str())
            .bind(input.amount)
            .bind(input.lesson_id)
            .bind(input.user_id)
            .bind(input.branch_id)
            .bind(input.company_id)
            .bind(input.meta().to_json())
            .fetch_one(conn)
            .await
    }

    /// Append an entry on its own.
    pub async fn create(pool: &PgPool, input: &CreateTransaction) -> Result<Transaction, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::insert(&mut conn, input).await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Transaction>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM transactions WHERE id = $1");
        sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Every entry linked to the given lessons, archived ones included.
    pub async fn list_for_lessons(
        conn: &mut PgConnection,
        lesson_ids: &[DbId],
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        if lesson_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM transactions \
             WHERE lesson_id = ANY($1) \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(lesson_ids)
            .fetch_all(conn)
            .await
    }

    /// Ledger listing within a scope, newest first. Archived entries are
    /// hidden.
    pub async fn list(
        pool: &PgPool,
        scope: &Scope,
        params: &TransactionQuery,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        let Some((scope_clause, scope_bind)) = scope_predicate(scope, "user_id", "branch_id", 1)
        else {
            return Ok(Vec::new());
        };

        let limit = params.limit.unwrap_or(50).clamp(1, MAX_TRANSACTIONS_PER_PAGE);
        let offset = params.offset.unwrap_or(0).max(0);

        let query = format!(
            "SELECT {COLUMNS} FROM transactions \
             WHERE archived_at IS NULL \
               AND ({scope_clause} OR $1::BIGINT[] IS NULL) \
               AND ($2::BIGINT IS NULL OR user_id = $2) \
               AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3) \
               AND ($4::TIMESTAMPTZ IS NULL OR created_at < $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(scope_bind)
            .bind(params.user_id)
            .bind(params.from)
            .bind(params.to)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// The therapist's latest PAYOUT entry created before `(created_at, id)`.
    pub async fn previous_payout(
        pool: &PgPool,
        therapist_id: DbId,
        created_at: Timestamp,
        id: DbId,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM transactions \
             WHERE kind = $1 AND user_id = $2 AND (created_at, id) < ($3, $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(TransactionKind::Payout.as_str())
            .bind(therapist_id)
            .bind(created_at)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Archival
    // -----------------------------------------------------------------------

    /// Archive every visible, unarchived entry created in `[start, end]`.
    ///
    /// Returns the number of entries archived. Writes an audit entry in the
    /// same transaction.
    pub async fn archive_range(
        pool: &PgPool,
        scope: &Scope,
        start: Timestamp,
        end: Timestamp,
        actor_id: DbId,
        now: Timestamp,
    ) -> Result<u64, LedgerDbError> {
        validate_archive_range(start, end, now)?;
        let Some((scope_clause, scope_bind)) = scope_predicate(scope, "user_id", "branch_id", 4)
        else {
            return Ok(0);
        };

        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE transactions SET archived_at = $3 \
             WHERE archived_at IS NULL \
               AND created_at >= $1 AND created_at <= $2 \
               AND ({scope_clause} OR $4::BIGINT[] IS NULL)"
        );
        let archived = sqlx::query(&query)
            .bind(start)
            .bind(end)
            .bind(now)
            .bind(scope_bind)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        AuditLogRepo::append(
            &mut tx,
            &CreateAuditLog {
                user_id: Some(actor_id),
                action_type: action_types::LEDGER_ARCHIVE.to_string(),
                entity_type: Some(entity_types::TRANSACTION.to_string()),
                entity_id: None,
                details_json: Some(serde_json::json!({
                    "start": start,
                    "end": end,
                    "archived": archived,
                    "scope": scope,
                })),
            },
        )
        .await?;

        tx.commit().await?;
        tracing::info!(actor_id, archived, %start, %end, "Archived ledger entries");
        Ok(archived)
    }

    /// Permanently delete archived entries created before the retention
    /// horizon. Irreversible.
    pub async fn purge_archived(
        pool: &PgPool,
        actor_id: DbId,
        now: Timestamp,
    ) -> Result<u64, LedgerDbError> {
        let horizon = purge_horizon(now);
        let mut tx = pool.begin().await?;

        let purged = sqlx::query(
            "DELETE FROM transactions WHERE archived_at IS NOT NULL AND created_at < $1",
        )
        .bind(horizon)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        AuditLogRepo::append(
            &mut tx,
            &CreateAuditLog {
                user_id: Some(actor_id),
                action_type: action_types::LEDGER_PURGE.to_string(),
                entity_type: Some(entity_types::TRANSACTION.to_string()),
                entity_id: None,
                details_json: Some(serde_json::json!({
                    "horizon": horizon,
                    "purged": purged,
                })),
            },
        )
        .await?;

        tx.commit().await?;
        tracing::warn!(actor_id, purged, %horizon, "Purged archived ledger entries");
        Ok(purged)
    }
}
