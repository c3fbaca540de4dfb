//! Loads [`LessonFacts`] for the settlement logic.
//!
//! A lesson's facts are its row, the child's rate, the pass it consumed and
//! every transaction linked to it. Archived transactions are included: they
//! are hidden from listings but still decide attribution.

use std::collections::HashMap;

use ledger_core::attribution::LessonFacts;
use ledger_core::pass::unit_price;
use ledger_core::settlement::{ensure_backlog_complete, SettlementWindow, MAX_LESSONS_PER_QUERY};
use ledger_core::status::{LessonPayoutStatus, StatusId};
use ledger_core::types::{DbId, Money, Timestamp};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};

use crate::repositories::TransactionRepo;
use crate::LedgerDbError;

const FACT_COLUMNS: &str = "\
    l.id, l.therapist_id, l.branch_id, l.settled_at, l.payout_status_id, l.paid_at, \
    l.commission_percent_at_time, l.therapist_share_at_time, l.leader_share_at_time, \
    c.lesson_rate AS child_rate, \
    p.total_price AS pass_total_price, p.total_lessons AS pass_total_lessons";

const FACT_JOINS: &str = "\
    FROM lessons l \
    LEFT JOIN children c ON c.id = l.child_id \
    LEFT JOIN pass_usages pu ON pu.lesson_id = l.id \
    LEFT JOIN passes p ON p.id = pu.pass_id";

#[derive(Debug, FromRow)]
struct LessonFactRow {
    id: DbId,
    therapist_id: DbId,
    branch_id: Option<DbId>,
    settled_at: Option<Timestamp>,
    payout_status_id: StatusId,
    paid_at: Option<Timestamp>,
    commission_percent_at_time: Option<Decimal>,
    therapist_share_at_time: Option<Money>,
    leader_share_at_time: Option<Money>,
    child_rate: Option<Money>,
    pass_total_price: Option<Money>,
    pass_total_lessons: Option<i32>,
}

pub struct LessonFactsRepo;

impl LessonFactsRepo {
    /// Lessons of a therapist settled in `[from, to)`.
    pub async fn therapist_window(
        conn: &mut PgConnection,
        therapist_id: DbId,
        window: &SettlementWindow,
    ) -> Result<Vec<LessonFacts>, sqlx::Error> {
        let query = format!(
            "SELECT {FACT_COLUMNS} {FACT_JOINS} \
             WHERE l.therapist_id = $1 AND l.settled_at >= $2 AND l.settled_at < $3 \
             ORDER BY l.settled_at ASC, l.id ASC \
             LIMIT $4"
        );
        let rows = sqlx::query_as::<_, LessonFactRow>(&query)
            .bind(therapist_id)
            .bind(window.from)
            .bind(window.to)
            .bind(MAX_LESSONS_PER_QUERY)
            .fetch_all(&mut *conn)
            .await?;
        Self::assemble(conn, rows).await
    }

    /// Lessons of a branch settled in `[from, to)`.
    pub async fn branch_window(
        conn: &mut PgConnection,
        branch_id: DbId,
        window: &SettlementWindow,
    ) -> Result<Vec<LessonFacts>, sqlx::Error> {
        let query = format!(
            "SELECT {FACT_COLUMNS} {FACT_JOINS} \
             WHERE l.branch_id = $1 AND l.settled_at >= $2 AND l.settled_at < $3 \
             ORDER BY l.settled_at ASC, l.id ASC \
             LIMIT $4"
        );
        let rows = sqlx::query_as::<_, LessonFactRow>(&query)
            .bind(branch_id)
            .bind(window.from)
            .bind(window.to)
            .bind(MAX_LESSONS_PER_QUERY)
            .fetch_all(&mut *conn)
            .await?;
        Self::assemble(conn, rows).await
    }

    /// Settled, unpaid lessons of a therapist settled before `now`.
    pub async fn unpaid(
        conn: &mut PgConnection,
        therapist_id: DbId,
        now: Timestamp,
    ) -> Result<Vec<LessonFacts>, LedgerDbError> {
        Self::unpaid_inner(conn, therapist_id, now, false).await
    }

    /// Same as [`Self::unpaid`] but locks the lesson rows until the
    /// surrounding transaction ends.
    pub async fn unpaid_for_update(
        conn: &mut PgConnection,
        therapist_id: DbId,
        now: Timestamp,
    ) -> Result<Vec<LessonFacts>, LedgerDbError> {
        Self::unpaid_inner(conn, therapist_id, now, true).await
    }

    async fn unpaid_inner(
        conn: &mut PgConnection,
        therapist_id: DbId,
        now: Timestamp,
        lock: bool,
    ) -> Result<Vec<LessonFacts>, LedgerDbError> {
        let lock_clause = if lock { "FOR UPDATE OF l" } else { "" };
        let query = format!(
            "SELECT {FACT_COLUMNS} {FACT_JOINS} \
             WHERE l.therapist_id = $1 AND l.payout_status_id = $2 \
               AND l.settled_at IS NOT NULL AND l.settled_at < $3 \
             ORDER BY l.settled_at ASC, l.id ASC \
             LIMIT $4 {lock_clause}"
        );
        let rows = sqlx::query_as::<_, LessonFactRow>(&query)
            .bind(therapist_id)
            .bind(LessonPayoutStatus::None.id())
            .bind(now)
            .bind(MAX_LESSONS_PER_QUERY + 1)
            .fetch_all(&mut *conn)
            .await?;
        ensure_backlog_complete(therapist_id, rows.len(), MAX_LESSONS_PER_QUERY)?;
        Ok(Self::assemble(conn, rows).await?)
    }

    /// Facts for one lesson, settled or not.
    pub async fn for_lesson(
        conn: &mut PgConnection,
        lesson_id: DbId,
    ) -> Result<Option<LessonFacts>, sqlx::Error> {
        let query = format!("SELECT {FACT_COLUMNS} {FACT_JOINS} WHERE l.id = $1");
        let rows = sqlx::query_as::<_, LessonFactRow>(&query)
            .bind(lesson_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(Self::assemble(conn, rows).await?.into_iter().next())
    }

    async fn assemble(
        conn: &mut PgConnection,
        rows: Vec<LessonFactRow>,
    ) -> Result<Vec<LessonFacts>, sqlx::Error> {
        let lesson_ids: Vec<DbId> = rows.iter().map(|r| r.id).collect();
        let transactions = TransactionRepo::list_for_lessons(conn, &lesson_ids).await?;

        let mut entries_by_lesson: HashMap<DbId, Vec<_>> = HashMap::new();
        for tx in &transactions {
            let Some(lesson_id) = tx.lesson_id else {
                continue;
            };
            match tx.to_entry() {
                Some(entry) => entries_by_lesson.entry(lesson_id).or_default().push(entry),
                None => tracing::warn!(
                    transaction_id = tx.id,
                    kind = %tx.kind,
                    "Skipping transaction with unknown kind"
                ),
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let pass_unit_price = match (row.pass_total_price, row.pass_total_lessons) {
                    (Some(price), Some(lessons)) => unit_price(price, lessons),
                    _ => None,
                };
                LessonFacts {
                    lesson_id: row.id,
                    therapist_id: row.therapist_id,
                    branch_id: row.branch_id,
                    settled_at: row.settled_at,
                    payout_status: LessonPayoutStatus::from_id(row.payout_status_id)
                        .unwrap_or(LessonPayoutStatus::None),
                    paid_at: row.paid_at,
                    entries: entries_by_lesson.remove(&row.id).unwrap_or_default(),
                    snapshot: ledger_core::commission::ShareSnapshot {
                        commission_percent: row.commission_percent_at_time,
                        therapist_share: row.therapist_share_at_time,
                        leader_share: row.leader_share_at_time,
                    },
                    child_rate: row.child_rate,
                    pass_unit_price,
                }
            })
            .collect())
    }
}
