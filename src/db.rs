use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::snapshot::{Snapshot, SnapshotEntry, SnapshotStore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Snapshot history in Postgres, one row per employee per run.
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        PgSnapshotStore { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn latest(&self) -> anyhow::Result<Option<Snapshot>> {
        let run = sqlx::query(
            "SELECT id, taken_at, policy FROM swot_risk.runs ORDER BY taken_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(run) = run else {
            return Ok(None);
        };
        let run_id: Uuid = run.get("id");
        let taken_at: DateTime<Utc> = run.get("taken_at");
        let policy: String = run.get("policy");

        let rows = sqlx::query(
            r#"
            SELECT employee_id, department, category, risk_score
            FROM swot_risk.snapshots
            WHERE run_id = $1
            ORDER BY employee_id
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let employee_id: String = row.get("employee_id");
            let department: String = row.get("department");
            let category: String = row.get("category");
            entries.push(SnapshotEntry {
                department: department
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("stored department for {employee_id}"))?,
                category: category
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("stored category for {employee_id}"))?,
                risk_score: row.get("risk_score"),
                employee_id,
            });
        }

        Ok(Some(Snapshot {
            run_id,
            taken_at,
            policy,
            entries,
        }))
    }

    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO swot_risk.runs (id, taken_at, policy, employee_count)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(snapshot.run_id)
        .bind(snapshot.taken_at)
        .bind(&snapshot.policy)
        .bind(i32::try_from(snapshot.entries.len()).context("too many employees for one run")?)
        .execute(&mut *tx)
        .await?;

        for entry in &snapshot.entries {
            sqlx::query(
                r#"
                INSERT INTO swot_risk.snapshots
                (run_id, employee_id, department, category, risk_score)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(snapshot.run_id)
            .bind(&entry.employee_id)
            .bind(entry.department.as_str())
            .bind(entry.category.as_str())
            .bind(entry.risk_score)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
