#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};

use super::CoordDb;
use crate::error::{ArchitectError, Result};
use crate::types::ContextEntry;

impl CoordDb {
    pub async fn read_context(&self, domain: Option<&str>) -> Result<Vec<ContextEntry>> {
        let rows = sqlx::query_as::<_, (String, String, String, f64, String, Option<String>, DateTime<Utc>)>(
            "SELECT domain, key_name, value, confidence, agent_id, source_file, updated_at
             FROM context
             WHERE ($1::text IS NULL OR domain = $1)
             ORDER BY domain, key_name",
        )
        .bind(domain)
        .fetch_all(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to read context: {e}")))?;

        Ok(rows
            .into_iter()
            .map(
                |(domain, key_name, value, confidence, agent_id, source_file, updated_at)| {
                    ContextEntry {
                        agent_id,
                        domain,
                        key_name,
                        value,
                        confidence,
                        source_file,
                        updated_at,
                    }
                },
            )
            .collect())
    }

    /// Upsert keyed on `(domain, key_name)`; re-writing replaces the value
    /// atomically so at most one row ever exists per key.
    pub async fn write_context(
        &self,
        agent_id: &str,
        domain: &str,
        key: &str,
        value: &str,
        confidence: f64,
        source_file: Option<&str>,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO context (agent_id, domain, key_name, value, confidence, source_file)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (domain, key_name) DO UPDATE
               SET value = EXCLUDED.value,
                   confidence = EXCLUDED.confidence,
                   agent_id = EXCLUDED.agent_id,
                   source_file = EXCLUDED.source_file,
                   updated_at = NOW()
             RETURNING id",
        )
        .bind(agent_id)
        .bind(domain)
        .bind(key)
        .bind(value)
        .bind(confidence)
        .bind(source_file)
        .fetch_one(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to write context: {e}")))
    }
}
