use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::aggregate_by_department;
use crate::alerts::{select_alerts, AlertCutoffs, AlertMode, AlertThresholds};
use crate::categorize::{categorize, CategorizationPolicy, PolicyBasis};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::features::{derive_row, ScoringScheme};
use crate::input::{apply_annotations, Annotation, LoadedRows};
use crate::insights::{summarize, OrganizationInsights};
use crate::ml::{annotate, MlConfig, ModelSelection};
use crate::models::{
    AlertEntry, CategorizedRecord, DepartmentAggregate, EmployeeResult, RawEmployeeRow,
    ScoredRecord,
};

/// Everything one run produces.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRun {
    pub scheme: ScoringScheme,
    pub policy: &'static str,
    #[serde(serialize_with = "serialize_results")]
    pub records: Vec<CategorizedRecord>,
    #[serde(serialize_with = "serialize_rejections")]
    pub rejected: Vec<AnalysisError>,
    pub basis: PolicyBasis,
    pub departments: Vec<DepartmentAggregate>,
    pub alert_cutoffs: AlertCutoffs,
    pub alerts: Vec<AlertEntry>,
    pub insights: OrganizationInsights,
}

fn serialize_results<S: serde::Serializer>(
    records: &[CategorizedRecord],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(records.iter().map(EmployeeResult::from_record))
}

fn serialize_rejections<S: serde::Serializer>(
    rejected: &[AnalysisError],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(rejected.iter().map(|e| e.to_string()))
}

/// Score every row, collecting rejections instead of stopping at the first
/// bad one. Later rows reusing an identifier are rejected.
pub fn score_rows(
    rows: &[RawEmployeeRow],
    scheme: ScoringScheme,
) -> (Vec<ScoredRecord>, Vec<AnalysisError>) {
    let mut seen = HashSet::new();
    let mut scored = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();

    for row in rows {
        match derive_row(row, scheme) {
            Ok(record) if !seen.insert(record.employee_id().to_string()) => {
                rejected.push(AnalysisError::invalid(
                    record.employee_id(),
                    "duplicate Employee_ID",
                ));
            }
            Ok(record) => scored.push(record),
            Err(err) => rejected.push(err),
        }
    }

    for err in &rejected {
        warn!(%err, "record rejected");
    }
    (scored, rejected)
}

pub struct Pipeline {
    scheme: ScoringScheme,
    policy: CategorizationPolicy,
    alert_thresholds: AlertThresholds,
    ml: MlConfig,
    models: ModelSelection,
    annotations: Option<HashMap<String, Annotation>>,
}

impl Pipeline {
    pub fn new(scheme: ScoringScheme, policy: CategorizationPolicy) -> Self {
        Pipeline {
            scheme,
            policy,
            alert_thresholds: AlertThresholds::default(),
            ml: MlConfig::default(),
            models: ModelSelection::default(),
            annotations: None,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> anyhow::Result<Self> {
        let mut pipeline = Pipeline::new(config.scheme, config.categorization_policy()?);
        pipeline.alert_thresholds = config.alerts;
        pipeline.ml = config.ml.clone();
        Ok(pipeline)
    }

    pub fn with_models(mut self, models: ModelSelection) -> Self {
        self.models = models;
        self
    }

    pub fn with_annotations(mut self, annotations: HashMap<String, Annotation>) -> Self {
        self.annotations = Some(annotations);
        self
    }

    #[cfg(test)]
    pub fn run(&self, rows: &[RawEmployeeRow]) -> Result<AnalysisRun, AnalysisError> {
        self.run_with(rows, Vec::new())
    }

    /// Run over rows from [`crate::input::read_rows`], carrying the rows it
    /// could not decode into the rejection list.
    pub fn run_loaded(&self, loaded: &LoadedRows) -> Result<AnalysisRun, AnalysisError> {
        self.run_with(&loaded.rows, loaded.rejected.clone())
    }

    fn run_with(
        &self,
        rows: &[RawEmployeeRow],
        mut rejected: Vec<AnalysisError>,
    ) -> Result<AnalysisRun, AnalysisError> {
        let (mut scored, row_rejections) = score_rows(rows, self.scheme);
        rejected.extend(row_rejections);
        if scored.is_empty() {
            return Err(AnalysisError::EmptyDataset);
        }
        info!(
            valid = scored.len(),
            rejected = rejected.len(),
            scheme = %self.scheme,
            "records scored"
        );

        if let Some(annotations) = &self.annotations {
            scored = apply_annotations(scored, annotations);
        }
        if self.models.any() {
            scored = annotate(scored, self.models, &self.ml);
        }

        let categorization = categorize(scored, &self.policy)?;
        rejected.extend(categorization.rejected);
        let records = categorization.records;

        let departments = aggregate_by_department(&records)?;
        let mode = AnalysisConfig::alert_mode(&self.policy);
        let alert_cutoffs = AlertCutoffs::resolve(&records, mode, &self.alert_thresholds);
        let alerts = select_alerts(&records, &alert_cutoffs)?;
        let insights = summarize(&records, &departments);

        info!(
            policy = self.policy.name(),
            strength = insights.counts.strength,
            opportunity = insights.counts.opportunity,
            weakness = insights.counts.weakness,
            threat = insights.counts.threat,
            alerts = alerts.len(),
            "run categorized"
        );
        if mode == AlertMode::Absolute && insights.percentages.threat > 90.0 {
            warn!(
                threat_pct = insights.percentages.threat,
                "fixed thresholds put almost everyone in Threat; consider --policy percentile"
            );
        }

        Ok(AnalysisRun {
            scheme: self.scheme,
            policy: self.policy.name(),
            records,
            rejected,
            basis: categorization.basis,
            departments,
            alert_cutoffs,
            alerts,
            insights,
        })
    }
}
