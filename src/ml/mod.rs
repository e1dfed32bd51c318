//! Statistical primitives behind small capability traits.
//!
//! Each primitive is fitted on a feature matrix and then applied to one. The
//! rest of the crate only depends on the traits' input and output shapes, so
//! any of these can be swapped for an external model whose results arrive as
//! annotations instead.

mod isolation_forest;
mod kmeans;
mod logistic;
mod scaler;

pub use isolation_forest::IsolationForest;
pub use kmeans::KMeans;
pub use logistic::LogisticRegression;
pub use scaler::StandardScaler;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{AnomalyAssessment, ScoredRecord};

pub type Matrix = Vec<Vec<f64>>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MlError {
    #[error("no rows to fit")]
    EmptyInput,

    #[error("expected {expected} columns, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("target has a single class; nothing to learn")]
    SingleClass,
}

pub trait Clusterer {
    type Model;

    fn fit(&self, features: &[Vec<f64>]) -> Result<Self::Model, MlError>;
    fn apply(&self, model: &Self::Model, features: &[Vec<f64>]) -> Result<Vec<usize>, MlError>;
}

pub trait AnomalyDetector {
    type Model;

    fn fit(&self, features: &[Vec<f64>]) -> Result<Self::Model, MlError>;
    fn apply(
        &self,
        model: &Self::Model,
        features: &[Vec<f64>],
    ) -> Result<Vec<AnomalyAssessment>, MlError>;
}

pub trait Classifier {
    type Model;

    fn fit(&self, features: &[Vec<f64>], labels: &[bool]) -> Result<Self::Model, MlError>;
    /// Probability of the positive class per row.
    fn apply(&self, model: &Self::Model, features: &[Vec<f64>]) -> Result<Vec<f64>, MlError>;
}

/// Column count of a rectangular, non-empty matrix.
pub(crate) fn dimensions(features: &[Vec<f64>]) -> Result<usize, MlError> {
    let first = features.first().ok_or(MlError::EmptyInput)?;
    let width = first.len();
    if width == 0 {
        return Err(MlError::InvalidParameter("rows have no columns".to_string()));
    }
    for row in features {
        if row.len() != width {
            return Err(MlError::DimensionMismatch {
                expected: width,
                found: row.len(),
            });
        }
    }
    Ok(width)
}

pub(crate) fn check_width(features: &[Vec<f64>], expected: usize) -> Result<(), MlError> {
    for row in features {
        if row.len() != expected {
            return Err(MlError::DimensionMismatch {
                expected,
                found: row.len(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlConfig {
    pub clusters: usize,
    pub cluster_restarts: usize,
    pub max_iterations: usize,
    pub trees: usize,
    pub sample_size: usize,
    pub contamination: f64,
    pub balanced_classes: bool,
    pub classifier_iterations: usize,
    /// Share of each class held out to measure attrition accuracy.
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for MlConfig {
    fn default() -> Self {
        MlConfig {
            clusters: 4,
            cluster_restarts: 10,
            max_iterations: 300,
            trees: 100,
            sample_size: 256,
            contamination: 0.1,
            balanced_classes: true,
            classifier_iterations: 1000,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

pub fn cluster_features(record: &ScoredRecord) -> Vec<f64> {
    vec![
        record.scores.productivity,
        record.scores.engagement,
        record.scores.risk,
        record.work_life_balance,
        record.tenure_factor,
    ]
}

pub fn anomaly_features(record: &ScoredRecord) -> Vec<f64> {
    vec![
        record.scores.productivity,
        record.scores.engagement,
        record.scores.risk,
        record.employee.work_hours_per_week,
        record.employee.sick_days,
        record.employee.overtime_hours,
    ]
}

pub fn attrition_features(record: &ScoredRecord) -> Vec<f64> {
    let e = &record.employee;
    vec![
        record.scores.productivity,
        record.scores.engagement,
        record.scores.risk,
        e.work_hours_per_week,
        e.overtime_hours,
        e.sick_days,
        e.employee_satisfaction_score,
        e.performance_score,
        e.projects_handled,
        e.training_hours,
    ]
}

fn standardized(
    records: &[ScoredRecord],
    extract: fn(&ScoredRecord) -> Vec<f64>,
) -> Result<Matrix, MlError> {
    let raw: Matrix = records.iter().map(extract).collect();
    StandardScaler::fit(&raw)?.transform(&raw)
}

pub fn fit_clusters(records: &[ScoredRecord], config: &MlConfig) -> Result<Vec<usize>, MlError> {
    let features = standardized(records, cluster_features)?;
    let kmeans = KMeans {
        k: config.clusters,
        n_init: config.cluster_restarts,
        max_iter: config.max_iterations,
        seed: config.seed,
        ..KMeans::default()
    };
    let model = kmeans.fit(&features)?;
    info!(k = config.clusters, inertia = model.inertia, "k-means fitted");
    kmeans.apply(&model, &features)
}

pub fn fit_anomalies(
    records: &[ScoredRecord],
    config: &MlConfig,
) -> Result<Vec<AnomalyAssessment>, MlError> {
    let features = standardized(records, anomaly_features)?;
    let forest = IsolationForest {
        n_trees: config.trees,
        sample_size: config.sample_size,
        contamination: config.contamination,
        seed: config.seed,
    };
    let model = forest.fit(&features)?;
    let assessments = forest.apply(&model, &features)?;
    let outliers = assessments.iter().filter(|a| a.outlier).count();
    info!(outliers, total = assessments.len(), "isolation forest fitted");
    Ok(assessments)
}

/// Split row indices into train and test sides, holding out `fraction` of
/// each class. A class with a single member stays on the training side.
pub(crate) fn stratified_split(labels: &[bool], fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let (mut train, mut test) = (Vec::new(), Vec::new());
    for class in [false, true] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == class)
            .map(|(idx, _)| idx)
            .collect();
        members.shuffle(&mut rng);
        let held = if members.len() < 2 || fraction <= 0.0 {
            0
        } else {
            ((members.len() as f64 * fraction).round() as usize).clamp(1, members.len() - 1)
        };
        test.extend_from_slice(&members[..held]);
        train.extend_from_slice(&members[held..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

fn attrition_classifier(config: &MlConfig) -> LogisticRegression {
    LogisticRegression {
        balanced: config.balanced_classes,
        max_iter: config.classifier_iterations,
        ..LogisticRegression::default()
    }
}

/// Fit the attrition model on a stratified training split, log its accuracy
/// on the held-out rows, then score every record.
pub fn fit_attrition(records: &[ScoredRecord], config: &MlConfig) -> Result<Vec<f64>, MlError> {
    let features = standardized(records, attrition_features)?;
    let labels: Vec<bool> = records.iter().map(|r| r.employee.resigned).collect();
    let classifier = attrition_classifier(config);

    let (train, test) = stratified_split(&labels, config.test_fraction, config.seed);
    let pick = |rows: &[usize]| -> (Matrix, Vec<bool>) {
        (
            rows.iter().map(|&i| features[i].clone()).collect(),
            rows.iter().map(|&i| labels[i]).collect(),
        )
    };

    let (train_x, train_y) = pick(&train);
    let model = classifier.fit(&train_x, &train_y)?;
    if test.is_empty() {
        info!(train = train.len(), "attrition model fitted without a hold-out");
    } else {
        let (test_x, test_y) = pick(&test);
        let held_out = classifier.apply(&model, &test_x)?;
        info!(
            train = train.len(),
            test = test.len(),
            test_accuracy = logistic::accuracy(&held_out, &test_y),
            "attrition model fitted"
        );
    }
    classifier.apply(&model, &features)
}

/// Which built-in models to run before categorization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelSelection {
    pub clusters: bool,
    pub anomalies: bool,
    pub attrition: bool,
}

impl ModelSelection {
    pub fn all() -> Self {
        ModelSelection {
            clusters: true,
            anomalies: true,
            attrition: true,
        }
    }

    pub fn any(&self) -> bool {
        self.clusters || self.anomalies || self.attrition
    }
}

/// Run the selected models and return newly annotated records. A model that
/// cannot be fitted is logged and skipped; its annotation stays empty.
pub fn annotate(
    records: Vec<ScoredRecord>,
    selection: ModelSelection,
    config: &MlConfig,
) -> Vec<ScoredRecord> {
    let clusters = if selection.clusters {
        fit_clusters(&records, config)
            .map_err(|err| warn!(%err, "skipping clustering"))
            .ok()
    } else {
        None
    };
    let anomalies = if selection.anomalies {
        fit_anomalies(&records, config)
            .map_err(|err| warn!(%err, "skipping anomaly detection"))
            .ok()
    } else {
        None
    };
    let attrition = if selection.attrition {
        fit_attrition(&records, config)
            .map_err(|err| warn!(%err, "skipping attrition model"))
            .ok()
    } else {
        None
    };

    records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| ScoredRecord {
            cluster: clusters.as_ref().map(|c| c[idx]).or(record.cluster),
            anomaly: anomalies.as_ref().map(|a| a[idx]).or(record.anomaly),
            attrition_probability: attrition
                .as_ref()
                .map(|p| p[idx])
                .or(record.attrition_probability),
            ..record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{derive_row, tests::sample_row, ScoringScheme};

    fn population() -> Vec<ScoredRecord> {
        (0..60)
            .map(|i| {
                let mut row = sample_row(&format!("E{i}"));
                row.performance_score = Some(((i % 5) + 1).to_string());
                row.sick_days = Some((i % 13).to_string());
                row.overtime_hours = Some(((i * 7) % 30).to_string());
                row.employee_satisfaction_score = Some((1.0 + (i % 9) as f64 * 0.5).to_string());
                row.resigned = Some(if i % 4 == 0 { "True" } else { "False" }.to_string());
                derive_row(&row, ScoringScheme::Baseline).unwrap()
            })
            .collect()
    }

    #[test]
    fn annotate_fills_every_selected_model() {
        let annotated = annotate(population(), ModelSelection::all(), &MlConfig::default());
        assert_eq!(annotated.len(), 60);
        for record in &annotated {
            let cluster = record.cluster.unwrap();
            assert!(cluster < 4);
            assert!(record.anomaly.is_some());
            let p = record.attrition_probability.unwrap();
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn annotate_is_deterministic_for_a_seed() {
        let first = annotate(population(), ModelSelection::all(), &MlConfig::default());
        let second = annotate(population(), ModelSelection::all(), &MlConfig::default());
        assert_eq!(first, second);
    }

    #[test]
    fn single_class_target_skips_attrition_only() {
        let records: Vec<ScoredRecord> = population()
            .into_iter()
            .map(|mut r| {
                r.employee.resigned = false;
                r
            })
            .collect();
        let annotated = annotate(records, ModelSelection::all(), &MlConfig::default());
        assert!(annotated.iter().all(|r| r.attrition_probability.is_none()));
        assert!(annotated.iter().all(|r| r.cluster.is_some()));
    }

    #[test]
    fn ragged_matrix_is_rejected() {
        let err = dimensions(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert_eq!(err, MlError::DimensionMismatch { expected: 2, found: 1 });
        assert_eq!(dimensions(&[]).unwrap_err(), MlError::EmptyInput);
    }

    #[test]
    fn stratified_split_holds_out_each_class() {
        let labels: Vec<bool> = (0..50).map(|i| i % 5 == 0).collect();
        let (train, test) = stratified_split(&labels, 0.2, 42);

        assert_eq!(train.len() + test.len(), 50);
        assert!(train.iter().all(|i| !test.contains(i)));
        assert_eq!(test.iter().filter(|&&i| labels[i]).count(), 2);
        assert_eq!(test.iter().filter(|&&i| !labels[i]).count(), 8);
        assert_eq!(stratified_split(&labels, 0.2, 42), (train, test));
    }

    #[test]
    fn lone_class_member_stays_in_training() {
        let labels = [true, false, false, false, false];
        let (train, test) = stratified_split(&labels, 0.2, 7);
        assert!(train.contains(&0));
        assert_eq!(test.len(), 1);
    }

    #[test]
    fn classifier_iterations_reach_the_model() {
        let config = MlConfig {
            classifier_iterations: 7,
            ..MlConfig::default()
        };
        assert_eq!(attrition_classifier(&config).max_iter, 7);
    }
}
