use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::models::{CategorizedRecord, Category, Scores, ScoredRecord};
use crate::stats::{mean, percentile, sorted};

/// Absolute cut-offs for the fixed-threshold policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedThresholds {
    pub strength_min: f64,
    pub strength_max_risk: f64,
    pub weakness_low: f64,
    pub weakness_high: f64,
    pub threat_min_risk: f64,
    pub low_score: f64,
}

impl Default for FixedThresholds {
    fn default() -> Self {
        FixedThresholds {
            strength_min: 3.5,
            strength_max_risk: 2.0,
            weakness_low: 2.5,
            weakness_high: 3.5,
            threat_min_risk: 4.0,
            low_score: 2.5,
        }
    }
}

impl FixedThresholds {
    pub fn classify(&self, s: &Scores) -> Category {
        let in_band = |v: f64| v >= self.weakness_low && v <= self.weakness_high;

        if s.productivity > self.strength_min
            && s.engagement > self.strength_min
            && s.risk < self.strength_max_risk
        {
            Category::Strength
        } else if in_band(s.productivity) && in_band(s.engagement) {
            Category::Weakness
        } else if s.risk > self.threat_min_risk
            && (s.productivity < self.low_score || s.engagement < self.low_score)
        {
            Category::Threat
        } else {
            Category::Opportunity
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quartiles {
    pub p25: f64,
    pub p75: f64,
}

impl Quartiles {
    fn of(values: &[f64]) -> Self {
        let sorted = sorted(values);
        Quartiles {
            p25: percentile(&sorted, 25.0),
            p75: percentile(&sorted, 75.0),
        }
    }
}

/// Population quartiles computed in the first pass of the percentile policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopulationThresholds {
    pub productivity: Quartiles,
    pub engagement: Quartiles,
    pub risk: Quartiles,
}

impl PopulationThresholds {
    pub fn from_records(records: &[ScoredRecord]) -> Result<Self, AnalysisError> {
        if records.is_empty() {
            return Err(AnalysisError::EmptyDataset);
        }
        let column = |f: fn(&Scores) -> f64| -> Vec<f64> {
            records.iter().map(|r| f(&r.scores)).collect()
        };
        Ok(PopulationThresholds {
            productivity: Quartiles::of(&column(|s| s.productivity)),
            engagement: Quartiles::of(&column(|s| s.engagement)),
            risk: Quartiles::of(&column(|s| s.risk)),
        })
    }

    pub fn classify(&self, s: &Scores) -> Category {
        let low_productivity = s.productivity <= self.productivity.p25;
        let low_engagement = s.engagement <= self.engagement.p25;

        if s.productivity >= self.productivity.p75
            && s.engagement >= self.engagement.p75
            && s.risk <= self.risk.p25
        {
            Category::Strength
        } else if low_productivity && low_engagement {
            Category::Weakness
        } else if s.risk >= self.risk.p75 && (low_productivity || low_engagement) {
            Category::Threat
        } else {
            Category::Opportunity
        }
    }
}

/// Label a cluster by comparing its mean scores against the population means.
fn classify_cluster(cluster: &Scores, population: &Scores) -> Category {
    let prod_above = cluster.productivity > population.productivity;
    let prod_below = cluster.productivity < population.productivity;
    let eng_above = cluster.engagement > population.engagement;
    let eng_below = cluster.engagement < population.engagement;

    if prod_above && eng_above && cluster.risk < population.risk {
        Category::Strength
    } else if prod_below && eng_below {
        Category::Weakness
    } else if cluster.risk > population.risk && (prod_below || eng_below) {
        Category::Threat
    } else {
        Category::Opportunity
    }
}

fn mean_scores<'a>(scores: impl Iterator<Item = &'a Scores>) -> Scores {
    let (mut prod, mut eng, mut risk) = (Vec::new(), Vec::new(), Vec::new());
    for s in scores {
        prod.push(s.productivity);
        eng.push(s.engagement);
        risk.push(s.risk);
    }
    Scores {
        productivity: mean(&prod),
        engagement: mean(&eng),
        risk: mean(&risk),
    }
}

/// Cluster id to category, built from one pass over every clustered record.
pub fn cluster_mapping(records: &[ScoredRecord]) -> BTreeMap<usize, Category> {
    let population = mean_scores(records.iter().map(|r| &r.scores));
    let mut members: BTreeMap<usize, Vec<&Scores>> = BTreeMap::new();
    for record in records {
        if let Some(cluster) = record.cluster {
            members.entry(cluster).or_default().push(&record.scores);
        }
    }

    members
        .into_iter()
        .map(|(cluster, scores)| {
            let cluster_mean = mean_scores(scores.into_iter());
            let category = classify_cluster(&cluster_mean, &population);
            debug!(cluster, %category, "mapped cluster");
            (cluster, category)
        })
        .collect()
}

/// How scored records are turned into SWOT categories. Callers always pick
/// one; there is no `Default`.
#[derive(Debug, Clone, PartialEq)]
pub enum CategorizationPolicy {
    FixedThreshold(FixedThresholds),
    Percentile,
    ClusterRelative,
}

impl CategorizationPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            CategorizationPolicy::FixedThreshold(_) => "fixed",
            CategorizationPolicy::Percentile => "percentile",
            CategorizationPolicy::ClusterRelative => "cluster",
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, CategorizationPolicy::FixedThreshold(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PolicyBasis {
    Fixed(FixedThresholds),
    Percentile(PopulationThresholds),
    Clusters(BTreeMap<usize, Category>),
}

#[derive(Debug, Clone)]
pub struct Categorization {
    pub records: Vec<CategorizedRecord>,
    pub rejected: Vec<AnalysisError>,
    pub basis: PolicyBasis,
}

/// Assign exactly one category to every scored record.
///
/// Under the cluster-relative policy, records without a cluster id are
/// rejected rather than guessed at.
pub fn categorize(
    records: Vec<ScoredRecord>,
    policy: &CategorizationPolicy,
) -> Result<Categorization, AnalysisError> {
    if records.is_empty() {
        return Err(AnalysisError::EmptyDataset);
    }

    match policy {
        CategorizationPolicy::FixedThreshold(thresholds) => {
            let records = records
                .into_iter()
                .map(|scored| {
                    let category = thresholds.classify(&scored.scores);
                    CategorizedRecord { scored, category }
                })
                .collect();
            Ok(Categorization {
                records,
                rejected: Vec::new(),
                basis: PolicyBasis::Fixed(*thresholds),
            })
        }
        CategorizationPolicy::Percentile => {
            let thresholds = PopulationThresholds::from_records(&records)?;
            debug!(?thresholds, "computed population quartiles");
            let records = records
                .into_iter()
                .map(|scored| {
                    let category = thresholds.classify(&scored.scores);
                    CategorizedRecord { scored, category }
                })
                .collect();
            Ok(Categorization {
                records,
                rejected: Vec::new(),
                basis: PolicyBasis::Percentile(thresholds),
            })
        }
        CategorizationPolicy::ClusterRelative => {
            let (clustered, unclustered): (Vec<_>, Vec<_>) =
                records.into_iter().partition(|r| r.cluster.is_some());

            let rejected: Vec<AnalysisError> = unclustered
                .iter()
                .map(|r| AnalysisError::invalid(r.employee_id(), "missing cluster id"))
                .collect();
            if !rejected.is_empty() {
                warn!(count = rejected.len(), "records without cluster id rejected");
            }
            if clustered.is_empty() {
                return Err(AnalysisError::EmptyDataset);
            }

            let mapping = cluster_mapping(&clustered);
            let mut labeled = Vec::with_capacity(clustered.len());
            for scored in clustered {
                let category = scored
                    .cluster
                    .and_then(|cluster| mapping.get(&cluster).copied())
                    .ok_or_else(|| AnalysisError::UnknownCategory {
                        employee_id: scored.employee_id().to_string(),
                    })?;
                labeled.push(CategorizedRecord { scored, category });
            }

            Ok(Categorization {
                records: labeled,
                rejected,
                basis: PolicyBasis::Clusters(mapping),
            })
        }
    }
}
