use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::models::{Department, EmployeeRecord, RawEmployeeRow, Scores, ScoredRecord};
use crate::stats::round2;

/// Which weighting formulas turn raw attributes into composite scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScoringScheme {
    /// Original weights. Scores are left unbounded.
    #[default]
    Baseline,
    /// Rebalanced weights with every score clipped to 0..=5.
    Normalized,
}

impl std::fmt::Display for ScoringScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringScheme::Baseline => f.write_str("baseline"),
            ScoringScheme::Normalized => f.write_str("normalized"),
        }
    }
}

fn required_number(
    employee_id: &str,
    field: &str,
    value: Option<&String>,
) -> Result<f64, AnalysisError> {
    let raw = value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AnalysisError::invalid(employee_id, format!("missing {field}")))?;

    let parsed: f64 = raw.parse().map_err(|_| {
        AnalysisError::invalid(employee_id, format!("{field} is not numeric: '{raw}'"))
    })?;

    if !parsed.is_finite() {
        return Err(AnalysisError::invalid(
            employee_id,
            format!("{field} is not finite: '{raw}'"),
        ));
    }
    Ok(parsed)
}

fn parse_flag(employee_id: &str, value: Option<&String>) -> Result<bool, AnalysisError> {
    let raw = value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AnalysisError::invalid(employee_id, "missing Resigned"))?;

    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(AnalysisError::invalid(
            employee_id,
            format!("Resigned is not a boolean: '{raw}'"),
        )),
    }
}

/// Validate a raw CSV row into an [`EmployeeRecord`].
pub fn parse_record(row: &RawEmployeeRow) -> Result<EmployeeRecord, AnalysisError> {
    let employee_id = row
        .employee_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AnalysisError::invalid("<unknown>", "missing Employee_ID"))?
        .to_string();
    let id = employee_id.as_str();

    let department: Department = row
        .department
        .as_deref()
        .ok_or_else(|| AnalysisError::invalid(id, "missing Department"))?
        .parse()
        .map_err(|reason: String| AnalysisError::invalid(id, reason))?;

    let remote_work_frequency = match row.remote_work_frequency.as_ref() {
        Some(value) if !value.trim().is_empty() => {
            required_number(id, "Remote_Work_Frequency", Some(value))?
        }
        _ => 0.0,
    };

    Ok(EmployeeRecord {
        department,
        job_title: row
            .job_title
            .as_ref()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        performance_score: required_number(id, "Performance_Score", row.performance_score.as_ref())?,
        work_hours_per_week: required_number(
            id,
            "Work_Hours_Per_Week",
            row.work_hours_per_week.as_ref(),
        )?,
        projects_handled: required_number(id, "Projects_Handled", row.projects_handled.as_ref())?,
        training_hours: required_number(id, "Training_Hours", row.training_hours.as_ref())?,
        sick_days: required_number(id, "Sick_Days", row.sick_days.as_ref())?,
        employee_satisfaction_score: required_number(
            id,
            "Employee_Satisfaction_Score",
            row.employee_satisfaction_score.as_ref(),
        )?,
        overtime_hours: required_number(id, "Overtime_Hours", row.overtime_hours.as_ref())?,
        years_at_company: required_number(id, "Years_At_Company", row.years_at_company.as_ref())?,
        promotions: required_number(id, "Promotions", row.promotions.as_ref())?,
        resigned: parse_flag(id, row.resigned.as_ref())?,
        remote_work_frequency,
        employee_id,
    })
}

fn baseline_scores(e: &EmployeeRecord) -> Scores {
    let productivity = (e.performance_score * 2.0
        + e.work_hours_per_week / 40.0
        + e.projects_handled / 10.0
        + e.training_hours / 50.0
        - e.sick_days / 5.0
        + e.employee_satisfaction_score / 5.0)
        / 6.0;

    let engagement = (e.employee_satisfaction_score + e.training_hours / 10.0 + e.promotions * 2.0
        - e.sick_days * 0.5)
        / 4.0;

    let resignation = if e.resigned { 5.0 } else { 0.0 };
    let risk = (e.sick_days + e.overtime_hours / 10.0 + resignation + (5.0 - e.performance_score)
        - e.employee_satisfaction_score)
        / 5.0;

    Scores {
        productivity: round2(productivity),
        engagement: round2(engagement),
        risk: round2(risk),
    }
}

fn normalized_scores(e: &EmployeeRecord) -> Scores {
    let productivity = (e.performance_score * 1.2
        + (e.work_hours_per_week / 50.0) * 2.0
        + (e.projects_handled / 15.0) * 1.5
        + (e.training_hours / 100.0) * 1.0
        + (e.employee_satisfaction_score / 5.0) * 1.3)
        / 5.0;

    let engagement = (e.employee_satisfaction_score * 1.5
        + (e.training_hours / 50.0) * 1.0
        + e.promotions * 3.0
        + (e.remote_work_frequency / 100.0) * 0.5
        - e.sick_days * 0.3)
        / 4.0;

    let resignation = if e.resigned { 2.0 } else { 0.0 };
    let risk = (e.sick_days * 0.3
        + e.overtime_hours / 15.0
        + resignation
        + (5.0 - e.performance_score) * 0.4
        + (5.0 - e.employee_satisfaction_score) * 0.3)
        / 5.0;

    Scores {
        productivity: round2(productivity.clamp(0.0, 5.0)),
        engagement: round2(engagement.clamp(0.0, 5.0)),
        risk: round2(risk.clamp(0.0, 5.0)),
    }
}

fn work_life_balance(overtime_hours: f64, scheme: ScoringScheme) -> f64 {
    match scheme {
        ScoringScheme::Baseline => match overtime_hours {
            h if h <= 5.0 => 5.0,
            h if h <= 15.0 => 4.0,
            h if h <= 25.0 => 3.0,
            _ => 2.0,
        },
        ScoringScheme::Normalized => 5.0 - (overtime_hours / 10.0).clamp(0.0, 5.0),
    }
}

fn tenure_factor(years: f64, scheme: ScoringScheme) -> f64 {
    match scheme {
        ScoringScheme::Baseline => match years {
            y if y <= 1.0 => 1.0,
            y if y <= 3.0 => 2.0,
            y if y <= 5.0 => 3.0,
            _ => 4.0,
        },
        ScoringScheme::Normalized => years.max(0.0).ln_1p().clamp(0.0, 3.0),
    }
}

/// Derive composite scores for one validated employee.
pub fn derive(employee: &EmployeeRecord, scheme: ScoringScheme) -> ScoredRecord {
    let scores = match scheme {
        ScoringScheme::Baseline => baseline_scores(employee),
        ScoringScheme::Normalized => normalized_scores(employee),
    };

    ScoredRecord {
        scores,
        work_life_balance: work_life_balance(employee.overtime_hours, scheme),
        tenure_factor: tenure_factor(employee.years_at_company, scheme),
        cluster: None,
        anomaly: None,
        attrition_probability: None,
        employee: employee.clone(),
    }
}

pub fn derive_row(row: &RawEmployeeRow, scheme: ScoringScheme) -> Result<ScoredRecord, AnalysisError> {
    let employee = parse_record(row)?;
    Ok(derive(&employee, scheme))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn sample_row(id: &str) -> RawEmployeeRow {
        RawEmployeeRow {
            employee_id: Some(id.to_string()),
            department: Some("IT".to_string()),
            job_title: Some("Developer".to_string()),
            performance_score: Some("4".to_string()),
            work_hours_per_week: Some("40".to_string()),
            projects_handled: Some("20".to_string()),
            training_hours: Some("50".to_string()),
            sick_days: Some("5".to_string()),
            employee_satisfaction_score: Some("3.5".to_string()),
            overtime_hours: Some("10".to_string()),
            years_at_company: Some("4".to_string()),
            promotions: Some("1".to_string()),
            resigned: Some("False".to_string()),
            remote_work_frequency: Some("50".to_string()),
        }
    }

    #[test]
    fn baseline_scores_follow_weighted_formulas() {
        let scored = derive_row(&sample_row("1"), ScoringScheme::Baseline).unwrap();
        // (8 + 1 + 2 + 1 - 1 + 0.7) / 6 = 1.95
        assert_eq!(scored.scores.productivity, 1.95);
        // (3.5 + 5 + 2 - 2.5) / 4 = 2.0
        assert_eq!(scored.scores.engagement, 2.0);
        // (5 + 1 + 0 + 1 - 3.5) / 5 = 0.7
        assert_eq!(scored.scores.risk, 0.7);
        assert_eq!(scored.work_life_balance, 4.0);
        assert_eq!(scored.tenure_factor, 3.0);
    }

    #[test]
    fn baseline_scores_are_not_clamped() {
        let mut row = sample_row("2");
        row.sick_days = Some("14".to_string());
        row.employee_satisfaction_score = Some("1".to_string());
        row.training_hours = Some("0".to_string());
        row.promotions = Some("0".to_string());
        let scored = derive_row(&row, ScoringScheme::Baseline).unwrap();
        assert!(scored.scores.engagement < 0.0);
    }

    #[test]
    fn resignation_raises_risk() {
        let mut row = sample_row("3");
        let stayed = derive_row(&row, ScoringScheme::Baseline).unwrap();
        row.resigned = Some("True".to_string());
        let left = derive_row(&row, ScoringScheme::Baseline).unwrap();
        assert!((left.scores.risk - stayed.scores.risk - 1.0).abs() < 1e-9);
    }

    #[test]
    fn normalized_scores_stay_within_bounds() {
        let mut row = sample_row("4");
        row.sick_days = Some("30".to_string());
        row.overtime_hours = Some("90".to_string());
        let scored = derive_row(&row, ScoringScheme::Normalized).unwrap();
        for value in [
            scored.scores.productivity,
            scored.scores.engagement,
            scored.scores.risk,
        ] {
            assert!((0.0..=5.0).contains(&value));
        }
        assert_eq!(scored.work_life_balance, 0.0);
    }

    #[test]
    fn missing_performance_score_is_invalid() {
        let mut row = sample_row("5");
        row.performance_score = None;
        let err = derive_row(&row, ScoringScheme::Baseline).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::invalid("5", "missing Performance_Score")
        );
    }

    #[test]
    fn non_numeric_field_is_invalid() {
        let mut row = sample_row("6");
        row.overtime_hours = Some("lots".to_string());
        let err = derive_row(&row, ScoringScheme::Baseline).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidRecord { ref employee_id, .. } if employee_id == "6"));
    }

    #[test]
    fn unknown_department_is_invalid() {
        let mut row = sample_row("7");
        row.department = Some("Astrology".to_string());
        assert!(parse_record(&row).is_err());
    }

    #[test]
    fn remote_work_frequency_defaults_to_zero() {
        let mut row = sample_row("8");
        row.remote_work_frequency = None;
        let record = parse_record(&row).unwrap();
        assert_eq!(record.remote_work_frequency, 0.0);
    }

    proptest! {
        #[test]
        fn derivation_is_deterministic(
            perf in 1.0f64..5.0,
            hours in 20.0f64..70.0,
            sick in 0.0f64..15.0,
            satisfaction in 1.0f64..5.0,
            overtime in 0.0f64..30.0,
            resigned in any::<bool>(),
        ) {
            let mut row = sample_row("p");
            row.performance_score = Some(perf.to_string());
            row.work_hours_per_week = Some(hours.to_string());
            row.sick_days = Some(sick.to_string());
            row.employee_satisfaction_score = Some(satisfaction.to_string());
            row.overtime_hours = Some(overtime.to_string());
            row.resigned = Some(resigned.to_string());

            for scheme in [ScoringScheme::Baseline, ScoringScheme::Normalized] {
                let first = derive_row(&row, scheme).unwrap();
                let second = derive_row(&row, scheme).unwrap();
                prop_assert_eq!(first, second);
            }
        }
    }
}
