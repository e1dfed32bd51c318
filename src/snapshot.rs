use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CategorizedRecord, Category, Department};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub employee_id: String,
    pub department: Department,
    pub category: Category,
    pub risk_score: f64,
}

/// The categories assigned in one run, keyed by employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub run_id: Uuid,
    pub taken_at: DateTime<Utc>,
    pub policy: String,
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn capture(policy: &str, records: &[CategorizedRecord]) -> Self {
        Snapshot {
            run_id: Uuid::new_v4(),
            taken_at: Utc::now(),
            policy: policy.to_string(),
            entries: records
                .iter()
                .map(|r| SnapshotEntry {
                    employee_id: r.employee_id().to_string(),
                    department: r.department(),
                    category: r.category,
                    risk_score: r.scores().risk,
                })
                .collect(),
        }
    }

    pub fn categories(&self) -> HashMap<&str, Category> {
        self.entries
            .iter()
            .map(|e| (e.employee_id.as_str(), e.category))
            .collect()
    }
}

/// Where previous runs' categories live between runs.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn latest(&self) -> anyhow::Result<Option<Snapshot>>;
    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

/// Snapshot history kept as a JSON array in a single file.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonSnapshotStore { path: path.into() }
    }

    fn history(&self) -> anyhow::Result<Vec<Snapshot>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text)
            .with_context(|| format!("corrupt snapshot history in {}", self.path.display()))
    }
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn latest(&self) -> anyhow::Result<Option<Snapshot>> {
        Ok(self.history()?.into_iter().max_by_key(|s| s.taken_at))
    }

    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let mut history = self.history()?;
        history.push(snapshot.clone());
        let text = serde_json::to_string_pretty(&history)?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Improved,
    Declined,
    New,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Movement {
    pub employee_id: String,
    pub department: Department,
    pub from: Option<Category>,
    pub to: Category,
    pub direction: Direction,
}

/// Employees whose category differs from the previous run, plus newcomers.
/// Unchanged employees are omitted.
pub fn diff(previous: Option<&Snapshot>, current: &[CategorizedRecord]) -> Vec<Movement> {
    let before = previous.map(Snapshot::categories).unwrap_or_default();

    let mut movements: Vec<Movement> = current
        .iter()
        .filter_map(|record| {
            let from = before.get(record.employee_id()).copied();
            let direction = match from {
                None => Direction::New,
                Some(prev) if prev == record.category => return None,
                Some(prev) if record.category.standing() > prev.standing() => Direction::Improved,
                Some(_) => Direction::Declined,
            };
            Some(Movement {
                employee_id: record.employee_id().to_string(),
                department: record.department(),
                from,
                to: record.category,
                direction,
            })
        })
        .collect();

    movements.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
    movements
}
