use serde::Serialize;

use crate::aggregate::percentages;
use crate::models::{
    AnomalyLevel, CategorizedRecord, Category, CategoryCounts, CategoryPercentages, Department,
    DepartmentAggregate,
};
use crate::stats::Summary;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreStatistics {
    pub productivity: Summary,
    pub engagement: Summary,
    pub risk: Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskFactor {
    HighOvertime,
    LowSatisfaction,
    HighSickDays,
    LowPerformance,
    NoTraining,
}

impl RiskFactor {
    pub fn label(&self) -> &'static str {
        match self {
            RiskFactor::HighOvertime => "overtime above 20 hours",
            RiskFactor::LowSatisfaction => "satisfaction below 2.5",
            RiskFactor::HighSickDays => "more than 10 sick days",
            RiskFactor::LowPerformance => "performance below 3",
            RiskFactor::NoTraining => "no training hours",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    Critical,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub area: String,
    pub action: String,
    pub expected_impact: String,
}

/// Isolation forest results across the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnomalySummary {
    pub assessed: usize,
    pub outliers: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// `None` when no record carries an anomaly assessment.
pub fn anomaly_summary(records: &[CategorizedRecord]) -> Option<AnomalySummary> {
    let mut summary = AnomalySummary::default();
    for assessment in records.iter().filter_map(|r| r.scored.anomaly) {
        summary.assessed += 1;
        if assessment.outlier {
            summary.outliers += 1;
        }
        match assessment.level {
            AnomalyLevel::High => summary.high += 1,
            AnomalyLevel::Medium => summary.medium += 1,
            AnomalyLevel::Low => summary.low += 1,
        }
    }
    (summary.assessed > 0).then_some(summary)
}

/// Organization-wide view of one categorized run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationInsights {
    pub total: usize,
    pub counts: CategoryCounts,
    pub percentages: CategoryPercentages,
    pub health_score: f64,
    pub statistics: ScoreStatistics,
    pub risk_factors: Vec<(RiskFactor, usize)>,
    pub anomalies: Option<AnomalySummary>,
    pub recommendations: Vec<Recommendation>,
}

pub fn health_score(pct: &CategoryPercentages) -> f64 {
    pct.strength + pct.opportunity * 0.7 - pct.weakness * 0.3 - pct.threat
}

pub fn risk_factors(records: &[CategorizedRecord]) -> Vec<(RiskFactor, usize)> {
    let count = |f: fn(&CategorizedRecord) -> bool| records.iter().filter(|r| f(r)).count();
    let mut factors = vec![
        (RiskFactor::HighOvertime, count(|r| r.scored.employee.overtime_hours > 20.0)),
        (
            RiskFactor::LowSatisfaction,
            count(|r| r.scored.employee.employee_satisfaction_score < 2.5),
        ),
        (RiskFactor::HighSickDays, count(|r| r.scored.employee.sick_days > 10.0)),
        (RiskFactor::LowPerformance, count(|r| r.scored.employee.performance_score < 3.0)),
        (RiskFactor::NoTraining, count(|r| r.scored.employee.training_hours == 0.0)),
    ];
    // stable sort keeps declaration order among ties
    factors.sort_by(|a, b| b.1.cmp(&a.1));
    factors
}

pub fn recommendations(
    percentages: &CategoryPercentages,
    departments: &[DepartmentAggregate],
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if percentages.threat > 20.0 {
        recommendations.push(Recommendation {
            priority: Priority::Critical,
            area: "Risk Mitigation".to_string(),
            action: "Implement immediate intervention program for high-threat employees"
                .to_string(),
            expected_impact: "Reduce turnover risk by 15-25%".to_string(),
        });
    }

    if percentages.strength < 15.0 {
        recommendations.push(Recommendation {
            priority: Priority::High,
            area: "Performance Enhancement".to_string(),
            action: "Develop talent programs to move Opportunities to Strengths".to_string(),
            expected_impact: "Increase top performer retention by 20%".to_string(),
        });
    }

    let hot_spots: Vec<&str> = departments
        .iter()
        .filter(|d| d.percentages.threat > 25.0)
        .map(|d| d.department.as_str())
        .collect();
    if !hot_spots.is_empty() {
        recommendations.push(Recommendation {
            priority: Priority::High,
            area: "Departmental Focus".to_string(),
            action: format!("Conduct culture assessment in: {}", hot_spots.join(", ")),
            expected_impact: "Improve departmental satisfaction by 15%".to_string(),
        });
    }

    recommendations
}

pub fn summarize(
    records: &[CategorizedRecord],
    departments: &[DepartmentAggregate],
) -> OrganizationInsights {
    let counts = CategoryCounts::from_records(records);
    let percentages = percentages(&counts, records.len());
    let column = |f: fn(&CategorizedRecord) -> f64| -> Vec<f64> { records.iter().map(f).collect() };

    OrganizationInsights {
        total: counts.total(),
        counts,
        health_score: (health_score(&percentages) * 10.0).round() / 10.0,
        statistics: ScoreStatistics {
            productivity: Summary::of(&column(|r| r.scores().productivity)),
            engagement: Summary::of(&column(|r| r.scores().engagement)),
            risk: Summary::of(&column(|r| r.scores().risk)),
        },
        risk_factors: risk_factors(records),
        anomalies: anomaly_summary(records),
        recommendations: recommendations(&percentages, departments),
        percentages,
    }
}

/// A row in the high-risk or top-performer listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeHighlight {
    pub employee_id: String,
    pub department: Department,
    pub job_title: Option<String>,
    pub category: Category,
    pub productivity: f64,
    pub engagement: f64,
    pub risk: f64,
    pub attrition_level: Option<String>,
    pub anomaly_level: Option<AnomalyLevel>,
}

impl EmployeeHighlight {
    fn from_record(record: &CategorizedRecord) -> Self {
        let s = record.scores();
        EmployeeHighlight {
            employee_id: record.employee_id().to_string(),
            department: record.department(),
            job_title: record.scored.employee.job_title.clone(),
            category: record.category,
            productivity: s.productivity,
            engagement: s.engagement,
            risk: s.risk,
            attrition_level: record.scored.attrition_level().map(|l| l.to_string()),
            anomaly_level: record.scored.anomaly.map(|a| a.level),
        }
    }
}

/// Threats, anyone with risk at or above 4, anyone the attrition model rates
/// High or Very High, and high-level anomalies; riskiest first.
pub fn high_risk_employees(records: &[CategorizedRecord], limit: usize) -> Vec<EmployeeHighlight> {
    let mut flagged: Vec<&CategorizedRecord> = records
        .iter()
        .filter(|r| {
            r.category == Category::Threat
                || r.scores().risk >= 4.0
                || r.scored.attrition_level().is_some_and(|l| l.is_elevated())
                || r.scored
                    .anomaly
                    .is_some_and(|a| a.level == AnomalyLevel::High)
        })
        .collect();
    flagged.sort_by(|a, b| {
        b.scores()
            .risk
            .partial_cmp(&a.scores().risk)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.employee_id().cmp(b.employee_id()))
    });
    flagged
        .into_iter()
        .take(limit)
        .map(EmployeeHighlight::from_record)
        .collect()
}

/// Strengths with productivity of at least 4, most productive first.
pub fn top_performers(records: &[CategorizedRecord], limit: usize) -> Vec<EmployeeHighlight> {
    let mut top: Vec<&CategorizedRecord> = records
        .iter()
        .filter(|r| r.category == Category::Strength && r.scores().productivity >= 4.0)
        .collect();
    top.sort_by(|a, b| {
        b.scores()
            .productivity
            .partial_cmp(&a.scores().productivity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.employee_id().cmp(b.employee_id()))
    });
    top.into_iter()
        .take(limit)
        .map(EmployeeHighlight::from_record)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_by_department;
    use crate::categorize::tests::scored;
    use crate::models::AnomalyAssessment;

    fn labeled(id: &str, p: f64, e: f64, r: f64, category: Category) -> CategorizedRecord {
        CategorizedRecord {
            scored: scored(id, p, e, r),
            category,
        }
    }

    #[test]
    fn summary_flags_heavy_threat_share() {
        let records = vec![
            labeled("1", 2.0, 2.0, 4.5, Category::Threat),
            labeled("2", 2.0, 2.0, 4.1, Category::Threat),
            labeled("3", 3.0, 3.0, 2.0, Category::Opportunity),
            labeled("4", 4.2, 4.0, 1.0, Category::Strength),
        ];
        let departments = aggregate_by_department(&records).unwrap();
        let insights = summarize(&records, &departments);

        assert_eq!(insights.total, 4);
        assert_eq!(insights.percentages.threat, 50.0);
        // 25 + 25 * 0.7 - 0 - 50
        assert_eq!(insights.health_score, -7.5);
        let priorities: Vec<Priority> =
            insights.recommendations.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![Priority::Critical, Priority::High]);
        assert!(insights.recommendations[1].action.contains("Sales"));
    }

    #[test]
    fn highlights_are_sorted_and_limited() {
        let mut leaving = labeled("leaving", 3.0, 3.0, 1.0, Category::Opportunity);
        leaving.scored.attrition_probability = Some(0.9);
        let mut odd = labeled("odd", 3.0, 3.0, 0.8, Category::Opportunity);
        odd.scored.anomaly = Some(AnomalyAssessment {
            score: 0.7,
            outlier: true,
            level: AnomalyLevel::High,
        });
        let mut mild = labeled("mild", 3.0, 3.0, 0.9, Category::Opportunity);
        mild.scored.anomaly = Some(AnomalyAssessment {
            score: 0.55,
            outlier: false,
            level: AnomalyLevel::Medium,
        });
        let records = vec![
            labeled("a", 2.0, 2.0, 4.1, Category::Threat),
            labeled("b", 2.0, 2.0, 4.8, Category::Opportunity),
            leaving,
            odd,
            mild,
            labeled("star", 4.5, 4.0, 0.5, Category::Strength),
            labeled("solid", 3.9, 4.0, 0.5, Category::Strength),
        ];

        let risky: Vec<String> = high_risk_employees(&records, 10)
            .into_iter()
            .map(|h| h.employee_id)
            .collect();
        assert_eq!(risky, vec!["b", "a", "leaving", "odd"]);
        assert_eq!(high_risk_employees(&records, 1).len(), 1);

        let top = top_performers(&records, 10);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].employee_id, "star");
    }

    #[test]
    fn risk_factors_sorted_by_prevalence() {
        let mut tired = labeled("t", 3.0, 3.0, 2.0, Category::Opportunity);
        tired.scored.employee.overtime_hours = 25.0;
        let mut tired2 = tired.clone();
        tired2.scored.employee.employee_satisfaction_score = 2.0;
        let factors = risk_factors(&[tired, tired2]);
        assert_eq!(factors[0], (RiskFactor::HighOvertime, 2));
        assert_eq!(factors[1], (RiskFactor::LowSatisfaction, 1));
    }

    #[test]
    fn anomaly_summary_counts_levels_and_outliers() {
        let mut records: Vec<CategorizedRecord> = (0..5)
            .map(|i| labeled(&i.to_string(), 3.0, 3.0, 2.0, Category::Opportunity))
            .collect();
        assert_eq!(anomaly_summary(&records), None);

        let levels = [AnomalyLevel::High, AnomalyLevel::Medium, AnomalyLevel::Low, AnomalyLevel::Low];
        for (record, level) in records.iter_mut().zip(levels) {
            record.scored.anomaly = Some(AnomalyAssessment {
                score: 0.5,
                outlier: level == AnomalyLevel::High,
                level,
            });
        }
        let departments = aggregate_by_department(&records).unwrap();
        let summary = summarize(&records, &departments).anomalies.unwrap();
        assert_eq!(
            summary,
            AnomalySummary {
                assessed: 4,
                outliers: 1,
                high: 1,
                medium: 1,
                low: 2,
            }
        );
    }
}
