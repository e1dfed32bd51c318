use super::{check_width, dimensions, Matrix, MlError};

/// Z-score standardization. Columns with zero variance keep a scale of one.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(features: &[Vec<f64>]) -> Result<Self, MlError> {
        let width = dimensions(features)?;
        let n = features.len() as f64;

        let mut means = vec![0.0; width];
        for row in features {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value / n;
            }
        }

        let mut scales = vec![0.0; width];
        for row in features {
            for ((var, value), mean) in scales.iter_mut().zip(row).zip(&means) {
                *var += (value - mean).powi(2) / n;
            }
        }
        for scale in scales.iter_mut() {
            *scale = if *scale > f64::EPSILON { scale.sqrt() } else { 1.0 };
        }

        Ok(StandardScaler { means, scales })
    }

    pub fn transform(&self, features: &[Vec<f64>]) -> Result<Matrix, MlError> {
        check_width(features, self.means.len())?;
        Ok(features
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.means)
                    .zip(&self.scales)
                    .map(|((value, mean), scale)| (value - mean) / scale)
                    .collect()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardizes_each_column() {
        let data = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&data).unwrap();
        assert_eq!(scaler.means, vec![2.0, 5.0]);
        assert_eq!(scaler.scales, vec![1.0, 1.0]);
        let scaled = scaler.transform(&data).unwrap();
        assert_eq!(scaled, vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn transform_checks_width() {
        let scaler = StandardScaler::fit(&[vec![1.0, 2.0]]).unwrap();
        assert!(scaler.transform(&[vec![1.0]]).is_err());
    }
}
