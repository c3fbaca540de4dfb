//! Repository for `settlement_checkpoints` and closed-window previews.

use chrono::{DateTime, Utc};
use ledger_core::error::CoreError;
use ledger_core::ledger::TransactionKind;
use ledger_core::settlement::{compute_settlement_window, SettlementWindow};
use ledger_core::types::{DbId, Money, Timestamp};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::models::checkpoint::{SettlementCheckpoint, WindowPreview};
use crate::repositories::{CommissionRepo, LessonFactsRepo, TransactionRepo};
use crate::LedgerDbError;

const COLUMNS: &str = "\
    id, therapist_id, payout_request_id, transaction_id, window_from, closed_at, \
    net, lesson_count, created_at";

/// Fields of a checkpoint written at confirmation.
#[derive(Debug, Clone)]
pub struct NewCheckpoint {
    pub therapist_id: DbId,
    pub payout_request_id: DbId,
    pub transaction_id: DbId,
    pub window_from: Timestamp,
    pub closed_at: Timestamp,
    pub net: Money,
    pub lesson_count: i32,
}

pub struct CheckpointRepo;

impl CheckpointRepo {
    /// Insert inside the confirmation transaction.
    pub async fn insert(
        conn: &mut PgConnection,
        input: &NewCheckpoint,
    ) -> Result<SettlementCheckpoint, sqlx::Error> {
        let query = format!(
            "INSERT INTO settlement_checkpoints \
                (therapist_id, payout_request_id, transaction_id, window_from, closed_at, \
                 net, lesson_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SettlementCheckpoint>(&query)
            .bind(input.therapist_id)
            .bind(input.payout_request_id)
            .bind(input.transaction_id)
            .bind(input.window_from)
            .bind(input.closed_at)
            .bind(input.net)
            .bind(input.lesson_count)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<SettlementCheckpoint>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM settlement_checkpoints WHERE id = $1");
        sqlx::query_as::<_, SettlementCheckpoint>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_transaction(
        pool: &PgPool,
        transaction_id: DbId,
    ) -> Result<Option<SettlementCheckpoint>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM settlement_checkpoints WHERE transaction_id = $1");
        sqlx::query_as::<_, SettlementCheckpoint>(&query)
            .bind(transaction_id)
            .fetch_optional(pool)
            .await
    }

    /// Checkpoints of a therapist, most recent first.
    pub async fn list_for_therapist(
        pool: &PgPool,
        therapist_id: DbId,
        limit: i64,
    ) -> Result<Vec<SettlementCheckpoint>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM settlement_checkpoints \
             WHERE therapist_id = $1 ORDER BY closed_at DESC LIMIT $2"
        );
        sqlx::query_as::<_, SettlementCheckpoint>(&query)
            .bind(therapist_id)
            .bind(limit.clamp(1, 500))
            .fetch_all(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Previews
    // -----------------------------------------------------------------------

    /// Recompute the window a checkpoint closed.
    pub async fn preview(
        pool: &PgPool,
        id: DbId,
        default_percent: Decimal,
        now: Timestamp,
    ) -> Result<WindowPreview, LedgerDbError> {
        let checkpoint = Self::find_by_id(pool, id)
            .await?
            .ok_or(CoreError::NotFound { entity: "checkpoint", id })?;
        replay(
            pool,
            checkpoint.therapist_id,
            checkpoint.window_from,
            checkpoint.closed_at,
            Some(checkpoint.net),
            default_percent,
            now,
        )
        .await
    }

    /// Recompute what a PAYOUT entry covered.
    ///
    /// Entries written with a checkpoint replay its window. Older entries,
    /// including zero-amount markers, replay the interval since the
    /// therapist's previous PAYOUT entry.
    pub async fn preview_payout_transaction(
        pool: &PgPool,
        transaction_id: DbId,
        default_percent: Decimal,
        now: Timestamp,
    ) -> Result<WindowPreview, LedgerDbError> {
        let payout = TransactionRepo::find_by_id(pool, transaction_id)
            .await?
            .ok_or(CoreError::NotFound { entity: "transaction", id: transaction_id })?;
        if payout.kind() != Some(TransactionKind::Payout) {
            return Err(CoreError::Validation(format!(
                "Transaction {transaction_id} is not a payout"
            ))
            .into());
        }
        let therapist_id = payout.user_id.ok_or_else(|| {
            CoreError::Validation(format!("Payout {transaction_id} has no therapist"))
        })?;

        if let Some(checkpoint) = Self::find_by_transaction(pool, transaction_id).await? {
            return replay(
                pool,
                therapist_id,
                checkpoint.window_from,
                checkpoint.closed_at,
                Some(checkpoint.net),
                default_percent,
                now,
            )
            .await;
        }

        let from = TransactionRepo::previous_payout(pool, therapist_id, payout.created_at, payout.id)
            .await?
            .map(|prev| prev.created_at)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        replay(
            pool,
            therapist_id,
            from,
            payout.created_at,
            Some(payout.amount),
            default_percent,
            now,
        )
        .await
    }
}

async fn replay(
    pool: &PgPool,
    therapist_id: DbId,
    from: Timestamp,
    to: Timestamp,
    recorded_net: Option<Money>,
    default_percent: Decimal,
    now: Timestamp,
) -> Result<WindowPreview, LedgerDbError> {
    let window = SettlementWindow::new(from, to)?;

    let mut conn = pool.acquire().await?;
    let lessons = LessonFactsRepo::therapist_window(&mut conn, therapist_id, &window).await?;
    let schedule = CommissionRepo::schedule(&mut conn, therapist_id, default_percent).await?;

    Ok(WindowPreview {
        therapist_id,
        window_from: from,
        window_to: to,
        recorded_net,
        replayed: compute_settlement_window(&lessons, &window, &schedule, now),
    })
}
