use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::models::{AlertEntry, AlertTier, CategorizedRecord, Category};
use crate::stats::{percentile, sorted};

/// Whether alert cut-offs are absolute score values or population percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertMode {
    Absolute,
    Percentile,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub critical_percentile: f64,
    pub high_percentile: f64,
    pub medium_engagement_percentile: f64,
    pub recognition_percentile: f64,
    pub critical_risk: f64,
    pub high_risk: f64,
    pub low_engagement: f64,
    pub recognition_score: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        AlertThresholds {
            critical_percentile: 95.0,
            high_percentile: 85.0,
            medium_engagement_percentile: 25.0,
            recognition_percentile: 90.0,
            critical_risk: 4.0,
            high_risk: 3.0,
            low_engagement: 2.5,
            recognition_score: 4.0,
        }
    }
}

/// Score values an employee is compared against, after resolving percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlertCutoffs {
    pub critical_risk: f64,
    pub high_risk: f64,
    pub medium_engagement: f64,
    pub recognition_productivity: f64,
    pub recognition_engagement: f64,
}

impl AlertCutoffs {
    pub fn resolve(
        records: &[CategorizedRecord],
        mode: AlertMode,
        thresholds: &AlertThresholds,
    ) -> Self {
        match mode {
            AlertMode::Absolute => AlertCutoffs {
                critical_risk: thresholds.critical_risk,
                high_risk: thresholds.high_risk,
                medium_engagement: thresholds.low_engagement,
                recognition_productivity: thresholds.recognition_score,
                recognition_engagement: thresholds.recognition_score,
            },
            AlertMode::Percentile => {
                let risk = sorted(&records.iter().map(|r| r.scores().risk).collect::<Vec<_>>());
                let engagement =
                    sorted(&records.iter().map(|r| r.scores().engagement).collect::<Vec<_>>());
                let productivity =
                    sorted(&records.iter().map(|r| r.scores().productivity).collect::<Vec<_>>());
                AlertCutoffs {
                    critical_risk: percentile(&risk, thresholds.critical_percentile),
                    high_risk: percentile(&risk, thresholds.high_percentile),
                    medium_engagement: percentile(
                        &engagement,
                        thresholds.medium_engagement_percentile,
                    ),
                    recognition_productivity: percentile(
                        &productivity,
                        thresholds.recognition_percentile,
                    ),
                    recognition_engagement: percentile(
                        &engagement,
                        thresholds.recognition_percentile,
                    ),
                }
            }
        }
    }

    /// The single most severe tier a record matches, if any.
    pub fn tier_for(&self, record: &CategorizedRecord) -> Option<AlertTier> {
        let s = record.scores();
        if s.risk >= self.critical_risk {
            Some(AlertTier::Critical)
        } else if s.risk >= self.high_risk {
            Some(AlertTier::High)
        } else if s.engagement <= self.medium_engagement {
            Some(AlertTier::Medium)
        } else if s.productivity >= self.recognition_productivity
            && s.engagement >= self.recognition_engagement
        {
            Some(AlertTier::Info)
        } else {
            None
        }
    }
}

fn recommendation(tier: AlertTier, category: Category, attrition: Option<f64>) -> String {
    let mut text = match tier {
        AlertTier::Critical => {
            "Schedule an immediate retention conversation and review workload".to_string()
        }
        AlertTier::High => "Manager check-in within two weeks; review overtime and sick leave".to_string(),
        AlertTier::Medium => {
            "Enroll in engagement program and discuss training opportunities".to_string()
        }
        AlertTier::Info => "Recognize contribution and consider for promotion track".to_string(),
    };

    if tier != AlertTier::Info && category == Category::Threat {
        text.push_str("; flagged as Threat");
    }
    if let Some(probability) = attrition.filter(|p| *p > 0.5) {
        text.push_str(&format!("; attrition probability {:.0}%", probability * 100.0));
    }
    text
}

/// Build the prioritized alert list against already resolved cut-offs, most
/// severe first. Records that match no tier are left out; no record appears
/// twice.
pub fn select_alerts(
    records: &[CategorizedRecord],
    cutoffs: &AlertCutoffs,
) -> Result<Vec<AlertEntry>, AnalysisError> {
    if records.is_empty() {
        return Err(AnalysisError::EmptyDataset);
    }

    let mut alerts: Vec<AlertEntry> = records
        .iter()
        .filter_map(|record| {
            let tier = cutoffs.tier_for(record)?;
            let attrition = record.scored.attrition_probability;
            Some(AlertEntry {
                employee_id: record.employee_id().to_string(),
                department: record.department(),
                category: record.category,
                tier,
                risk_score: record.scores().risk,
                attrition_probability: attrition,
                recommendation: recommendation(tier, record.category, attrition),
            })
        })
        .collect();

    alerts.sort_by(|a, b| {
        a.tier
            .cmp(&b.tier)
            .then(
                b.risk_score
                    .partial_cmp(&a.risk_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then_with(|| a.employee_id.cmp(&b.employee_id))
    });
    Ok(alerts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::tests::scored;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn labeled(id: &str, p: f64, e: f64, r: f64) -> CategorizedRecord {
        CategorizedRecord {
            scored: scored(id, p, e, r),
            category: Category::Opportunity,
        }
    }

    fn alerts_for(records: &[CategorizedRecord], mode: AlertMode) -> Vec<AlertEntry> {
        let cutoffs = AlertCutoffs::resolve(records, mode, &AlertThresholds::default());
        select_alerts(records, &cutoffs).unwrap()
    }

    #[test]
    fn absolute_mode_picks_most_severe_tier() {
        let records = vec![
            labeled("calm", 3.0, 3.0, 1.0),
            labeled("star", 4.5, 4.2, 0.5),
            labeled("disengaged", 3.0, 2.0, 3.5),
            labeled("burning", 2.0, 1.0, 4.5),
            labeled("bored", 3.0, 2.0, 1.0),
        ];
        let alerts = alerts_for(&records, AlertMode::Absolute);
        let summary: Vec<(&str, AlertTier)> = alerts
            .iter()
            .map(|a| (a.employee_id.as_str(), a.tier))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("burning", AlertTier::Critical),
                ("disengaged", AlertTier::High),
                ("bored", AlertTier::Medium),
                ("star", AlertTier::Info),
            ]
        );
    }

    #[test]
    fn percentile_mode_uses_population_cutoffs() {
        let records: Vec<CategorizedRecord> = (0..20)
            .map(|i| labeled(&format!("E{i:02}"), 3.0, 3.0 + i as f64 * 0.01, i as f64 * 0.2))
            .collect();
        let alerts = alerts_for(&records, AlertMode::Percentile);
        assert_eq!(alerts[0].employee_id, "E19");
        assert_eq!(alerts[0].tier, AlertTier::Critical);
        assert_eq!(alerts[1].tier, AlertTier::High);
    }

    #[test]
    fn recommendation_mentions_high_attrition() {
        let mut record = labeled("leaving", 2.0, 2.0, 4.8);
        record.scored.attrition_probability = Some(0.81);
        record.category = Category::Threat;
        let alerts = alerts_for(&[record], AlertMode::Absolute);
        assert!(alerts[0].recommendation.contains("attrition probability 81%"));
        assert!(alerts[0].recommendation.contains("Threat"));
    }

    #[test]
    fn empty_input_is_an_error() {
        let cutoffs = AlertCutoffs::resolve(&[], AlertMode::Absolute, &AlertThresholds::default());
        let err = select_alerts(&[], &cutoffs).unwrap_err();
        assert_eq!(err, AnalysisError::EmptyDataset);
    }

    #[test]
    fn tiers_follow_the_cutoffs_passed_in() {
        let records = vec![labeled("a", 3.0, 3.0, 2.0), labeled("b", 3.0, 3.0, 1.0)];
        let cutoffs = AlertCutoffs {
            critical_risk: 1.5,
            high_risk: 0.5,
            medium_engagement: 0.0,
            recognition_productivity: 5.0,
            recognition_engagement: 5.0,
        };
        let alerts = select_alerts(&records, &cutoffs).unwrap();
        let tiers: Vec<(&str, AlertTier)> = alerts
            .iter()
            .map(|a| (a.employee_id.as_str(), a.tier))
            .collect();
        assert_eq!(tiers, vec![("a", AlertTier::Critical), ("b", AlertTier::High)]);
    }

    proptest! {
        #[test]
        fn alerts_are_ordered_and_unique(
            scores in prop::collection::vec((0.0f64..5.0, 0.0f64..5.0, 0.0f64..5.0), 1..60),
            percentile_mode in any::<bool>(),
        ) {
            let records: Vec<CategorizedRecord> = scores
                .iter()
                .enumerate()
                .map(|(i, (p, e, r))| labeled(&i.to_string(), *p, *e, *r))
                .collect();
            let mode = if percentile_mode { AlertMode::Percentile } else { AlertMode::Absolute };
            let alerts = alerts_for(&records, mode);

            let ids: HashSet<&str> = alerts.iter().map(|a| a.employee_id.as_str()).collect();
            prop_assert_eq!(ids.len(), alerts.len());
            for pair in alerts.windows(2) {
                prop_assert!(pair[0].tier <= pair[1].tier);
            }
        }
    }
}
