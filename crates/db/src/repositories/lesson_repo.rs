//! Repository for the ledger-owned columns of `lessons`.

use ledger_core::attribution::full_price;
use ledger_core::commission::ShareSnapshot;
use ledger_core::error::CoreError;
use ledger_core::types::{DbId, Timestamp};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::models::lesson::{CreateLesson, Lesson};
use crate::repositories::{CommissionRepo, LessonFactsRepo};
use crate::LedgerDbError;

const COLUMNS: &str = "\
    id, starts_at, ends_at, therapist_id, branch_id, child_id, payout_status_id, \
    settled_at, paid_at, payout_request_id, commission_percent_at_time, \
    therapist_share_at_time, leader_share_at_time, created_at, updated_at";

pub struct LessonRepo;

impl LessonRepo {
    /// Insert a scheduled lesson. Scheduling owns lessons; used for seeding.
    pub async fn create(pool: &PgPool, input: &CreateLesson) -> Result<Lesson, sqlx::Error> {
        let query = format!(
            "INSERT INTO lessons (starts_at, ends_at, therapist_id, branch_id, child_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Lesson>(&query)
            .bind(input.starts_at)
            .bind(input.ends_at)
            .bind(input.therapist_id)
            .bind(input.branch_id)
            .bind(input.child_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Lesson>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM lessons WHERE id = $1");
        sqlx::query_as::<_, Lesson>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lessons flipped to PAID by a payout request.
    pub async fn list_for_payout_request(
        pool: &PgPool,
        payout_request_id: DbId,
    ) -> Result<Vec<Lesson>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM lessons WHERE payout_request_id = $1 ORDER BY settled_at, id"
        );
        sqlx::query_as::<_, Lesson>(&query)
            .bind(payout_request_id)
            .fetch_all(pool)
            .await
    }

    /// Stamp `settled_at` and capture the commission snapshot.
    ///
    /// The price comes from the lesson's current attribution and the percent
    /// from the schedule in force at `now`. A lesson settles once.
    pub async fn settle(
        pool: &PgPool,
        id: DbId,
        default_percent: Decimal,
        now: Timestamp,
    ) -> Result<Lesson, LedgerDbError> {
        let mut tx = pool.begin().await?;

        let lock = format!("SELECT {COLUMNS} FROM lessons WHERE id = $1 FOR UPDATE");
        let lesson = sqlx::query_as::<_, Lesson>(&lock)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(CoreError::NotFound { entity: "lesson", id })?;

        if lesson.settled_at.is_some() {
            return Err(CoreError::Conflict(format!("Lesson {id} is already settled")).into());
        }

        let facts = LessonFactsRepo::for_lesson(&mut tx, id)
            .await?
            .ok_or(CoreError::NotFound { entity: "lesson", id })?;
        let schedule = CommissionRepo::schedule(&mut tx, lesson.therapist_id, default_percent).await?;
        let snapshot = ShareSnapshot::capture(full_price(&facts), schedule.percent_at(now));

        let update = format!(
            "UPDATE lessons SET settled_at = $2, commission_percent_at_time = $3, \
                therapist_share_at_time = $4, leader_share_at_time = $5, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let settled = sqlx::query_as::<_, Lesson>(&update)
            .bind(id)
            .bind(now)
            .bind(snapshot.commission_percent)
            .bind(snapshot.therapist_share)
            .bind(snapshot.leader_share)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(lesson_id = id, therapist_id = settled.therapist_id, "Lesson settled");
        Ok(settled)
    }
}
