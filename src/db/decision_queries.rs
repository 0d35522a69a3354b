#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};

use super::CoordDb;
use crate::error::{ArchitectError, Result};
use crate::types::{Decision, RiskLevel};

impl CoordDb {
    pub async fn write_decision(
        &self,
        agent_id: &str,
        branch: Option<&str>,
        domain: &str,
        decision: &str,
        rationale: &str,
        alternatives: Option<&str>,
        risk_level: RiskLevel,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO decisions
                 (agent_id, branch, domain, decision, rationale, alternatives_considered, risk_level)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id",
        )
        .bind(agent_id)
        .bind(branch)
        .bind(domain)
        .bind(decision)
        .bind(rationale)
        .bind(alternatives)
        .bind(risk_level.as_str())
        .fetch_one(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to write decision: {e}")))
    }

    pub async fn check_decisions(&self, domain: &str) -> Result<Vec<Decision>> {
        let rows = sqlx::query_as::<_, (
            i64,
            String,
            Option<String>,
            String,
            String,
            Option<String>,
            String,
            DateTime<Utc>,
        )>(
            "SELECT id, agent_id, branch, decision, rationale, alternatives_considered,
                    risk_level, created_at
             FROM decisions
             WHERE domain = $1
             ORDER BY created_at DESC",
        )
        .bind(domain)
        .fetch_all(self.pool())
        .await
        .map_err(|e| ArchitectError::Database(format!("Failed to check decisions: {e}")))?;

        rows.into_iter()
            .map(
                |(id, agent_id, branch, decision, rationale, alternatives, risk_level, created_at)| {
                    Ok(Decision {
                        id,
                        agent_id,
                        branch,
                        domain: domain.to_string(),
                        decision,
                        rationale,
                        alternatives,
                        risk_level: RiskLevel::try_from(risk_level.as_str())
                            .map_err(ArchitectError::Database)?,
                        created_at,
                    })
                },
            )
            .collect()
    }
}
