use super::{check_width, dimensions, Classifier, MlError};

/// Binary logistic regression fitted by full-batch gradient descent with an
/// L2 penalty.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    pub learning_rate: f64,
    pub max_iter: usize,
    pub l2: f64,
    pub tolerance: f64,
    /// Weight each class inversely to its frequency.
    pub balanced: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        LogisticRegression {
            learning_rate: 0.1,
            max_iter: 1000,
            l2: 0.01,
            tolerance: 1e-6,
            balanced: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticModel {
    pub fn probability(&self, row: &[f64]) -> f64 {
        let z: f64 = self.weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + self.bias;
        sigmoid(z)
    }
}

/// Share of rows where `p > 0.5` agrees with the label.
pub fn accuracy(probabilities: &[f64], labels: &[bool]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = probabilities
        .iter()
        .zip(labels)
        .filter(|(p, label)| (**p > 0.5) == **label)
        .count();
    correct as f64 / labels.len() as f64
}

impl Classifier for LogisticRegression {
    type Model = LogisticModel;

    fn fit(&self, features: &[Vec<f64>], labels: &[bool]) -> Result<LogisticModel, MlError> {
        let width = dimensions(features)?;
        if labels.len() != features.len() {
            return Err(MlError::DimensionMismatch {
                expected: features.len(),
                found: labels.len(),
            });
        }

        let positives = labels.iter().filter(|l| **l).count();
        let negatives = labels.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(MlError::SingleClass);
        }

        let n = labels.len() as f64;
        let (pos_weight, neg_weight) = if self.balanced {
            (n / (2.0 * positives as f64), n / (2.0 * negatives as f64))
        } else {
            (1.0, 1.0)
        };

        let mut model = LogisticModel {
            weights: vec![0.0; width],
            bias: 0.0,
        };

        for _ in 0..self.max_iter {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;
            for (row, label) in features.iter().zip(labels) {
                let target = if *label { 1.0 } else { 0.0 };
                let weight = if *label { pos_weight } else { neg_weight };
                let error = weight * (model.probability(row) - target);
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += error * x / n;
                }
                grad_b += error / n;
            }
            for (g, w) in grad_w.iter_mut().zip(&model.weights) {
                *g += self.l2 * w;
            }

            let largest = grad_w
                .iter()
                .chain(std::iter::once(&grad_b))
                .fold(0.0f64, |acc, g| acc.max(g.abs()));

            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= self.learning_rate * g;
            }
            model.bias -= self.learning_rate * grad_b;

            if largest < self.tolerance {
                break;
            }
        }

        Ok(model)
    }

    fn apply(&self, model: &LogisticModel, features: &[Vec<f64>]) -> Result<Vec<f64>, MlError> {
        check_width(features, model.weights.len())?;
        Ok(features.iter().map(|row| model.probability(row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learns_a_separable_boundary() {
        let features: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64 / 10.0 - 2.0]).collect();
        let labels: Vec<bool> = features.iter().map(|row| row[0] > 0.0).collect();
        let classifier = LogisticRegression::default();
        let model = classifier.fit(&features, &labels).unwrap();
        let probabilities = classifier.apply(&model, &features).unwrap();

        assert!(model.weights[0] > 0.0);
        assert!(probabilities[0] < 0.2);
        assert!(probabilities[39] > 0.8);
        assert!(accuracy(&probabilities, &labels) >= 0.9);
    }

    #[test]
    fn single_class_cannot_be_fitted() {
        let features = vec![vec![1.0], vec![2.0]];
        let err = LogisticRegression::default()
            .fit(&features, &[false, false])
            .unwrap_err();
        assert_eq!(err, MlError::SingleClass);
    }

    #[test]
    fn label_count_must_match_rows() {
        let err = LogisticRegression::default()
            .fit(&[vec![1.0]], &[true, false])
            .unwrap_err();
        assert!(matches!(err, MlError::DimensionMismatch { .. }));
    }
}
