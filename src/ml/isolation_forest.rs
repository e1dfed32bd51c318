use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

use super::{check_width, dimensions, AnomalyDetector, MlError};
use crate::models::{AnomalyAssessment, AnomalyLevel};
use crate::stats::{percentile, sorted};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, PartialEq)]
pub struct IsolationForest {
    pub n_trees: usize,
    pub sample_size: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForest {
    fn default() -> Self {
        IsolationForest {
            n_trees: 100,
            sample_size: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsolationForestModel {
    trees: Vec<Node>,
    width: usize,
    normalizer: f64,
    /// Scores at or above this are outliers.
    pub outlier_threshold: f64,
    pub high_cut: f64,
    pub medium_cut: f64,
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn build(
    features: &[Vec<f64>],
    rows: Vec<usize>,
    depth: usize,
    limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= limit || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }

    let width = features[rows[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|feature| {
            let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, &r| {
                let v = features[r][feature];
                (acc.0.min(v), acc.1.max(v))
            });
            (max > min).then_some((feature, min, max))
        })
        .collect();
    if splittable.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(min..max);
    let (left, right): (Vec<usize>, Vec<usize>) =
        rows.into_iter().partition(|&r| features[r][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build(features, left, depth + 1, limit, rng)),
        right: Box::new(build(features, right, depth + 1, limit, rng)),
    }
}

fn path_length(point: &[f64], node: &Node, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            let next = if point[*feature] < *threshold { left } else { right };
            path_length(point, next, depth + 1)
        }
    }
}

impl IsolationForestModel {
    /// Anomaly score in (0, 1]; higher means easier to isolate.
    pub fn score(&self, point: &[f64]) -> f64 {
        if self.trees.is_empty() || self.normalizer <= 0.0 {
            return 0.5;
        }
        let mean_path = self
            .trees
            .iter()
            .map(|tree| path_length(point, tree, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_path / self.normalizer)
    }

    fn assess(&self, score: f64) -> AnomalyAssessment {
        let level = if score >= self.high_cut {
            AnomalyLevel::High
        } else if score >= self.medium_cut {
            AnomalyLevel::Medium
        } else {
            AnomalyLevel::Low
        };
        AnomalyAssessment {
            score,
            outlier: score >= self.outlier_threshold,
            level,
        }
    }
}

impl AnomalyDetector for IsolationForest {
    type Model = IsolationForestModel;

    fn fit(&self, features: &[Vec<f64>]) -> Result<IsolationForestModel, MlError> {
        let width = dimensions(features)?;
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(MlError::InvalidParameter(format!(
                "contamination {} outside (0, 0.5]",
                self.contamination
            )));
        }
        if self.n_trees == 0 || self.sample_size < 2 {
            return Err(MlError::InvalidParameter(
                "need at least one tree and a sample size of two".to_string(),
            ));
        }

        let psi = self.sample_size.min(features.len());
        let limit = (psi.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let trees = (0..self.n_trees)
            .map(|_| {
                let rows = sample(&mut rng, features.len(), psi).into_vec();
                build(features, rows, 0, limit, &mut rng)
            })
            .collect();

        let mut model = IsolationForestModel {
            trees,
            width,
            normalizer: average_path(psi),
            outlier_threshold: f64::INFINITY,
            high_cut: f64::INFINITY,
            medium_cut: f64::INFINITY,
        };

        let scores = sorted(&features.iter().map(|p| model.score(p)).collect::<Vec<_>>());
        model.outlier_threshold = percentile(&scores, (1.0 - self.contamination) * 100.0);
        model.high_cut = percentile(&scores, 90.0);
        model.medium_cut = percentile(&scores, 75.0);
        Ok(model)
    }

    fn apply(
        &self,
        model: &IsolationForestModel,
        features: &[Vec<f64>],
    ) -> Result<Vec<AnomalyAssessment>, MlError> {
        check_width(features, model.width)?;
        Ok(features
            .iter()
            .map(|p| model.assess(model.score(p)))
            .collect())
    }
}
