//! Repository for the `commission_rates` history.

use ledger_core::audit::{action_types, entity_types};
use ledger_core::commission::{validate_percent, CommissionSchedule, RateChange};
use ledger_core::types::{DbId, Timestamp};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::models::audit::CreateAuditLog;
use crate::models::commission::{CommissionRate, CreateCommissionRate};
use crate::repositories::AuditLogRepo;
use crate::LedgerDbError;

const COLUMNS: &str = "id, therapist_id, percent, effective_from, created_by, created_at";

pub struct CommissionRepo;

impl CommissionRepo {
    /// Rate history of a therapist, oldest first.
    pub async fn list_for_therapist(
        pool: &PgPool,
        therapist_id: DbId,
    ) -> Result<Vec<CommissionRate>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::list_in(&mut conn, therapist_id).await
    }

    async fn list_in(
        conn: &mut PgConnection,
        therapist_id: DbId,
    ) -> Result<Vec<CommissionRate>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM commission_rates \
             WHERE therapist_id = $1 ORDER BY effective_from ASC"
        );
        sqlx::query_as::<_, CommissionRate>(&query)
            .bind(therapist_id)
            .fetch_all(conn)
            .await
    }

    /// Build the therapist's schedule on top of the organization default.
    pub async fn schedule(
        conn: &mut PgConnection,
        therapist_id: DbId,
        default_percent: Decimal,
    ) -> Result<CommissionSchedule, sqlx::Error> {
        let rates = Self::list_in(conn, therapist_id).await?;
        Ok(CommissionSchedule::new(
            default_percent,
            rates
                .into_iter()
                .map(|r| RateChange {
                    effective_from: r.effective_from,
                    percent: r.percent,
                })
                .collect(),
        ))
    }

    /// Record a new percent. Already settled lessons keep their snapshot.
    pub async fn create(
        pool: &PgPool,
        therapist_id: DbId,
        input: &CreateCommissionRate,
        created_by: DbId,
        now: Timestamp,
    ) -> Result<CommissionRate, LedgerDbError> {
        validate_percent(input.percent)?;
        let effective_from = input.effective_from.unwrap_or(now);

        let mut tx = pool.begin().await?;
        let query = format!(
            "INSERT INTO commission_rates (therapist_id, percent, effective_from, created_by) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let rate = sqlx::query_as::<_, CommissionRate>(&query)
            .bind(therapist_id)
            .bind(input.percent)
            .bind(effective_from)
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;

        AuditLogRepo::append(
            &mut tx,
            &CreateAuditLog {
                user_id: Some(created_by),
                action_type: action_types::COMMISSION_CHANGE.to_string(),
                entity_type: Some(entity_types::COMMISSION_RATE.to_string()),
                entity_id: Some(rate.id),
                details_json: Some(serde_json::json!({
                    "therapist_id": therapist_id,
                    "percent": rate.percent.to_string(),
                    "effective_from": effective_from,
                })),
            },
        )
        .await?;

        tx.commit().await?;
        tracing::info!(therapist_id, percent = %rate.percent, "Commission rate changed");
        Ok(rate)
    }
}
