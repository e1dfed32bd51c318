use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{check_width, dimensions, Clusterer, MlError};

#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    pub k: usize,
    pub max_iter: usize,
    pub n_init: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for KMeans {
    fn default() -> Self {
        KMeans {
            k: 4,
            max_iter: 300,
            n_init: 10,
            tolerance: 1e-6,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(idx, c)| (idx, squared_distance(point, c)))
        .fold((0, f64::INFINITY), |best, candidate| {
            if candidate.1 < best.1 {
                candidate
            } else {
                best
            }
        })
}

/// k-means++ seeding: each new centroid is drawn with probability
/// proportional to its squared distance from the closest chosen one.
fn seed_centroids(features: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = vec![features[rng.gen_range(0..features.len())].clone()];
    while centroids.len() < k {
        let distances: Vec<f64> = features.iter().map(|p| nearest(p, &centroids).1).collect();
        let total: f64 = distances.iter().sum();
        let next = if total <= f64::EPSILON {
            rng.gen_range(0..features.len())
        } else {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = distances.len() - 1;
            for (idx, d) in distances.iter().enumerate() {
                if target < *d {
                    chosen = idx;
                    break;
                }
                target -= d;
            }
            chosen
        };
        centroids.push(features[next].clone());
    }
    centroids
}

impl KMeans {
    fn lloyd(&self, features: &[Vec<f64>], mut centroids: Vec<Vec<f64>>) -> KMeansModel {
        let width = centroids[0].len();
        for _ in 0..self.max_iter {
            let mut sums = vec![vec![0.0; width]; self.k];
            let mut counts = vec![0usize; self.k];
            for point in features {
                let (cluster, _) = nearest(point, &centroids);
                counts[cluster] += 1;
                for (sum, value) in sums[cluster].iter_mut().zip(point) {
                    *sum += value;
                }
            }

            let mut shift = 0.0;
            for (idx, centroid) in centroids.iter_mut().enumerate() {
                // an emptied cluster keeps its previous centroid
                if counts[idx] == 0 {
                    continue;
                }
                let updated: Vec<f64> = sums[idx].iter().map(|s| s / counts[idx] as f64).collect();
                shift += squared_distance(centroid, &updated);
                *centroid = updated;
            }
            if shift <= self.tolerance {
                break;
            }
        }

        let inertia = features.iter().map(|p| nearest(p, &centroids).1).sum();
        KMeansModel { centroids, inertia }
    }
}

impl Clusterer for KMeans {
    type Model = KMeansModel;

    fn fit(&self, features: &[Vec<f64>]) -> Result<KMeansModel, MlError> {
        dimensions(features)?;
        if self.k == 0 || self.k > features.len() {
            return Err(MlError::InvalidParameter(format!(
                "k={} with {} rows",
                self.k,
                features.len()
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<KMeansModel> = None;
        for _ in 0..self.n_init.max(1) {
            let model = self.lloyd(features, seed_centroids(features, self.k, &mut rng));
            if best.as_ref().map_or(true, |b| model.inertia < b.inertia) {
                best = Some(model);
            }
        }
        best.ok_or(MlError::EmptyInput)
    }

    fn apply(&self, model: &KMeansModel, features: &[Vec<f64>]) -> Result<Vec<usize>, MlError> {
        let width = model.centroids.first().map_or(0, Vec::len);
        check_width(features, width)?;
        Ok(features
            .iter()
            .map(|p| nearest(p, &model.centroids).0)
            .collect())
    }
}
