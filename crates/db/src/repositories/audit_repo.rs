//! Repository for the hash-chained `audit_logs` table.

use ledger_core::audit::{compute_integrity_hash, first_broken_link};
use sqlx::{PgConnection, PgPool};

use crate::models::audit::{AuditLog, CreateAuditLog};

const COLUMNS: &str = "\
    id, user_id, action_type, entity_type, entity_id, \
    details_json, integrity_hash, created_at";

/// Advisory lock key serializing appends so the chain stays linear.
const AUDIT_CHAIN_LOCK: i64 = 0x4c45_4447_4155_4454;

/// Canonical content covered by an entry's hash.
fn entry_data(
    user_id: Option<i64>,
    action_type: &str,
    entity_type: Option<&str>,
    entity_id: Option<i64>,
    details: Option<&serde_json::Value>,
) -> String {
    serde_json::json!({
        "user_id": user_id,
        "action_type": action_type,
        "entity_type": entity_type,
        "entity_id": entity_id,
        "details": details,
    })
    .to_string()
}

pub struct AuditLogRepo;

impl AuditLogRepo {
    /// Append an entry inside the caller's transaction.
    ///
    /// Takes a transaction-scoped advisory lock, reads the last hash and
    /// chains the new entry onto it.
    pub async fn append(
        conn: &mut PgConnection,
        input: &CreateAuditLog,
    ) -> Result<AuditLog, sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(AUDIT_CHAIN_LOCK)
            .execute(&mut *conn)
            .await?;

        let prev_hash = sqlx::query_scalar::<_, String>(
            "SELECT integrity_hash FROM audit_logs ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&mut *conn)
        .await?;

        let data = entry_data(
            input.user_id,
            &input.action_type,
            input.entity_type.as_deref(),
            input.entity_id,
            input.details_json.as_ref(),
        );
        let hash = compute_integrity_hash(prev_hash.as_deref(), &data);

        let query = format!(
            "INSERT INTO audit_logs \
                (user_id, action_type, entity_type, entity_id, details_json, integrity_hash) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditLog>(&query)
            .bind(input.user_id)
            .bind(&input.action_type)
            .bind(&input.entity_type)
            .bind(input.entity_id)
            .bind(&input.details_json)
            .bind(&hash)
            .fetch_one(&mut *conn)
            .await
    }

    /// Most recent entries, newest first.
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<AuditLog>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM audit_logs ORDER BY id DESC LIMIT $1");
        sqlx::query_as::<_, AuditLog>(&query)
            .bind(limit.clamp(1, 500))
            .fetch_all(pool)
            .await
    }

    /// Walk the whole chain and return the id of the first entry whose hash
    /// does not verify.
    pub async fn verify_chain(pool: &PgPool) -> Result<Option<i64>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM audit_logs ORDER BY id ASC");
        let entries = sqlx::query_as::<_, AuditLog>(&query).fetch_all(pool).await?;

        let data: Vec<String> = entries
            .iter()
            .map(|e| {
                entry_data(
                    e.user_id,
                    &e.action_type,
                    e.entity_type.as_deref(),
                    e.entity_id,
                    e.details_json.as_ref(),
                )
            })
            .collect();

        let broken = first_broken_link(
            data.iter()
                .zip(entries.iter())
                .map(|(d, e)| (d.as_str(), e.integrity_hash.as_str())),
        );
        Ok(broken.map(|index| entries[index].id))
    }
}
