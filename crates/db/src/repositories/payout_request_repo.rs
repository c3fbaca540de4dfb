//! Repository for `payout_requests` and the payout lifecycle.
//!
//! Create, cancel and confirm each run in one database transaction with the
//! request row locked, so concurrent calls on the same request serialize.

use ledger_core::audit::{action_types, entity_types};
use ledger_core::error::CoreError;
use ledger_core::ledger::TransactionKind;
use ledger_core::payout::{
    cancel_transition, eligible_count, ensure_can_create, ensure_confirmable, is_stale,
    plan_payout, CancelOutcome, STALE_NEW_LESSONS,
};
use ledger_core::status::{LessonPayoutStatus, PayoutStatus};
use ledger_core::types::{DbId, Timestamp};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::models::audit::CreateAuditLog;
use crate::models::payout_request::{ConfirmedPayout, PayoutRequest};
use crate::models::transaction::CreateTransaction;
use crate::repositories::checkpoint_repo::NewCheckpoint;
use crate::repositories::{
    AuditLogRepo, CheckpointRepo, CommissionRepo, LessonFactsRepo, OrgRepo, TransactionRepo,
};
use crate::LedgerDbError;

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const COLUMNS: &str = "\
    id, therapist_id, status_id, final_amount, confirmed_at, confirmed_by, \
    cancelled_at, created_at, updated_at";

/// Name of the partial unique index allowing one PENDING request per therapist.
const PENDING_UNIQUE_INDEX: &str = "uq_payout_requests_pending_therapist";

// ---------------------------------------------------------------------------
// PayoutRequestRepo
// ---------------------------------------------------------------------------

pub struct PayoutRequestRepo;

impl PayoutRequestRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PayoutRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM payout_requests WHERE id = $1");
        sqlx::query_as::<_, PayoutRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    async fn find_pending_in(
        conn: &mut PgConnection,
        therapist_id: DbId,
    ) -> Result<Option<PayoutRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payout_requests WHERE therapist_id = $1 AND status_id = $2"
        );
        sqlx::query_as::<_, PayoutRequest>(&query)
            .bind(therapist_id)
            .bind(PayoutStatus::Pending.id())
            .fetch_optional(conn)
            .await
    }

    /// Requests of a therapist, newest first.
    ///
    /// A PENDING row in the page goes through [`Self::refresh`] first, so a
    /// request overtaken by newly settled lessons is listed as CANCELLED.
    pub async fn list_for_therapist(
        pool: &PgPool,
        therapist_id: DbId,
        limit: i64,
        now: Timestamp,
    ) -> Result<Vec<PayoutRequest>, LedgerDbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM payout_requests \
             WHERE therapist_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        let mut requests = sqlx::query_as::<_, PayoutRequest>(&query)
            .bind(therapist_id)
            .bind(limit.clamp(1, 500))
            .fetch_all(pool)
            .await?;

        for request in requests.iter_mut() {
            if request.status() != Some(PayoutStatus::Pending) {
                continue;
            }
            *request = match Self::refresh(pool, request.id, now).await {
                Ok(current) => current,
                Err(LedgerDbError::Core(CoreError::StaleRequest { request_id, .. })) => {
                    Self::find_by_id(pool, request_id)
                        .await?
                        .ok_or(CoreError::NotFound {
                            entity: "payout_request",
                            id: request_id,
                        })?
                }
                Err(e) => return Err(e),
            };
        }
        Ok(requests)
    }

    async fn lock(conn: &mut PgConnection, id: DbId) -> Result<PayoutRequest, LedgerDbError> {
        let query = format!("SELECT {COLUMNS} FROM payout_requests WHERE id = $1 FOR UPDATE");
        let request = sqlx::query_as::<_, PayoutRequest>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or(CoreError::NotFound { entity: "payout_request", id })?;
        Ok(request)
    }

    fn status_of(request: &PayoutRequest) -> Result<PayoutStatus, CoreError> {
        request.status().ok_or_else(|| {
            CoreError::Internal(format!("Payout request {} has unknown status", request.id))
        })
    }

    async fn mark_cancelled(
        conn: &mut PgConnection,
        id: DbId,
        now: Timestamp,
    ) -> Result<PayoutRequest, sqlx::Error> {
        let query = format!(
            "UPDATE payout_requests SET status_id = $2, cancelled_at = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PayoutRequest>(&query)
            .bind(id)
            .bind(PayoutStatus::Cancelled.id())
            .bind(now)
            .fetch_one(conn)
            .await
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Open a PENDING request for the therapist's current backlog.
    pub async fn create(
        pool: &PgPool,
        therapist_id: DbId,
        now: Timestamp,
    ) -> Result<PayoutRequest, LedgerDbError> {
        let mut tx = pool.begin().await?;

        let existing = Self::find_pending_in(&mut tx, therapist_id).await?;
        let lessons = LessonFactsRepo::unpaid(&mut tx, therapist_id, now).await?;
        ensure_can_create(existing.map(|r| r.id), eligible_count(&lessons, now))?;

        let query = format!(
            "INSERT INTO payout_requests (therapist_id, status_id, created_at) \
             VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, PayoutRequest>(&query)
            .bind(therapist_id)
            .bind(PayoutStatus::Pending.id())
            .bind(now)
            .fetch_one(&mut *tx)
            .await;

        let request = match inserted {
            Ok(request) => request,
            // A concurrent create won the race for the partial unique index.
            Err(sqlx::Error::Database(db_err))
                if db_err.constraint() == Some(PENDING_UNIQUE_INDEX) =>
            {
                drop(tx);
                let mut conn = pool.acquire().await?;
                let existing = Self::find_pending_in(&mut conn, therapist_id).await?;
                return Err(match existing {
                    Some(r) => CoreError::DuplicatePendingRequest { existing_id: r.id },
                    None => CoreError::Conflict("Concurrent payout request, retry".into()),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;
        tracing::info!(therapist_id, request_id = request.id, "Payout requested");
        Ok(request)
    }

    /// Read a request, applying the lazy staleness check.
    ///
    /// A PENDING request overtaken by newly settled lessons is cancelled and
    /// [`CoreError::StaleRequest`] is returned.
    pub async fn refresh(
        pool: &PgPool,
        id: DbId,
        now: Timestamp,
    ) -> Result<PayoutRequest, LedgerDbError> {
        let mut tx = pool.begin().await?;
        let request = Self::lock(&mut tx, id).await?;
        if Self::status_of(&request)? != PayoutStatus::Pending {
            return Ok(request);
        }

        let lessons = LessonFactsRepo::unpaid(&mut tx, request.therapist_id, now).await?;
        if !is_stale(request.created_at, &lessons, now) {
            return Ok(request);
        }

        Self::mark_cancelled(&mut tx, id, now).await?;
        tx.commit().await?;
        tracing::info!(
            therapist_id = request.therapist_id,
            request_id = id,
            "Pending payout request auto-cancelled: new lessons settled"
        );
        Err(CoreError::StaleRequest {
            request_id: id,
            reason: STALE_NEW_LESSONS.into(),
        }
        .into())
    }

    /// The therapist's PENDING request, after the staleness check.
    pub async fn find_pending(
        pool: &PgPool,
        therapist_id: DbId,
        now: Timestamp,
    ) -> Result<Option<PayoutRequest>, LedgerDbError> {
        let mut conn = pool.acquire().await?;
        let Some(pending) = Self::find_pending_in(&mut conn, therapist_id).await? else {
            return Ok(None);
        };
        drop(conn);
        match Self::refresh(pool, pending.id, now).await {
            Ok(request) => Ok(Some(request)),
            Err(LedgerDbError::Core(CoreError::StaleRequest { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Cancel a request. Cancelling a CANCELLED request changes nothing.
    pub async fn cancel(
        pool: &PgPool,
        id: DbId,
        now: Timestamp,
    ) -> Result<(PayoutRequest, CancelOutcome), LedgerDbError> {
        let mut tx = pool.begin().await?;
        let request = Self::lock(&mut tx, id).await?;
        let outcome = cancel_transition(id, Self::status_of(&request)?)?;

        let request = match outcome {
            CancelOutcome::AlreadyCancelled => request,
            CancelOutcome::Cancelled => {
                let cancelled = Self::mark_cancelled(&mut tx, id, now).await?;
                tracing::info!(therapist_id = cancelled.therapist_id, request_id = id, "Payout request cancelled");
                cancelled
            }
        };
        tx.commit().await?;
        Ok((request, outcome))
    }

    /// Confirm a PENDING request.
    ///
    /// In one transaction: lock the request, re-check staleness, lock and
    /// flip the frozen lesson set to PAID, write one PAYOUT entry for the
    /// net, record the checkpoint and mark the request PAID. A stale or
    /// empty request is cancelled and [`CoreError::StaleRequest`] returned.
    /// Any other failure rolls everything back.
    pub async fn confirm(
        pool: &PgPool,
        id: DbId,
        confirmed_by: DbId,
        default_percent: Decimal,
        now: Timestamp,
    ) -> Result<ConfirmedPayout, LedgerDbError> {
        let mut tx = pool.begin().await?;

        let request = Self::lock(&mut tx, id).await?;
        ensure_confirmable(id, Self::status_of(&request)?)?;
        let therapist_id = request.therapist_id;

        let lessons = LessonFactsRepo::unpaid_for_update(&mut tx, therapist_id, now).await?;
        let schedule = CommissionRepo::schedule(&mut tx, therapist_id, default_percent).await?;

        let plan = match plan_payout(id, therapist_id, request.created_at, &lessons, &schedule, now) {
            Ok(plan) => plan,
            Err(err @ CoreError::StaleRequest { .. }) => {
                Self::mark_cancelled(&mut tx, id, now).await?;
                tx.commit().await?;
                tracing::info!(therapist_id, request_id = id, %err, "Payout request cancelled at confirmation");
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        // Flip only lessons still unpaid; any shortfall means another writer
        // touched the set and the whole confirmation must roll back.
        let lesson_ids = plan.totals.lesson_ids.clone();
        let flipped = sqlx::query(
            "UPDATE lessons SET payout_status_id = $2, paid_at = $3, payout_request_id = $4, \
                updated_at = NOW() \
             WHERE id = ANY($1) AND payout_status_id = $5",
        )
        .bind(&lesson_ids)
        .bind(LessonPayoutStatus::Paid.id())
        .bind(now)
        .bind(id)
        .bind(LessonPayoutStatus::None.id())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if flipped != lesson_ids.len() as u64 {
            tracing::error!(
                therapist_id,
                request_id = id,
                expected = lesson_ids.len(),
                flipped,
                "Lesson flip count mismatch, rolling back payout"
            );
            return Err(CoreError::IntegrityViolation(format!(
                "Expected to mark {} lessons paid for request {id}, marked {flipped}",
                lesson_ids.len()
            ))
            .into());
        }

        let placement = OrgRepo::find_placement_in(&mut tx, therapist_id).await?;
        let mut payout = CreateTransaction::new(TransactionKind::Payout, plan.totals.net);
        payout.user_id = Some(therapist_id);
        payout.branch_id = placement.as_ref().and_then(|p| p.branch_id);
        payout.company_id = placement.as_ref().and_then(|p| p.company_id);
        let transaction = TransactionRepo::insert(&mut tx, &payout).await?;

        let checkpoint = CheckpointRepo::insert(
            &mut tx,
            &NewCheckpoint {
                therapist_id,
                payout_request_id: id,
                transaction_id: transaction.id,
                window_from: plan.window_from,
                closed_at: now,
                net: plan.totals.net,
                lesson_count: plan.totals.lesson_count as i32,
            },
        )
        .await?;

        let query = format!(
            "UPDATE payout_requests SET status_id = $2, final_amount = $3, confirmed_at = $4, \
                confirmed_by = $5, updated_at = NOW() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let request = sqlx::query_as::<_, PayoutRequest>(&query)
            .bind(id)
            .bind(PayoutStatus::Paid.id())
            .bind(plan.totals.net)
            .bind(now)
            .bind(confirmed_by)
            .fetch_one(&mut *tx)
            .await?;

        AuditLogRepo::append(
            &mut tx,
            &CreateAuditLog {
                user_id: Some(confirmed_by),
                action_type: action_types::PAYOUT_CONFIRM.to_string(),
                entity_type: Some(entity_types::PAYOUT_REQUEST.to_string()),
                entity_id: Some(id),
                details_json: Some(serde_json::json!({
                    "therapist_id": therapist_id,
                    "net": plan.totals.net.to_string(),
                    "lesson_count": plan.totals.lesson_count,
                    "transaction_id": transaction.id,
                })),
            },
        )
        .await?;

        tx.commit().await?;
        tracing::info!(
            therapist_id,
            request_id = id,
            net = %plan.totals.net,
            lessons = plan.totals.lesson_count,
            "Payout confirmed"
        );

        Ok(ConfirmedPayout {
            request,
            transaction,
            checkpoint,
            lesson_ids,
        })
    }
}
