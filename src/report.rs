use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::categorize::PolicyBasis;
use crate::insights::{high_risk_employees, top_performers};
use crate::models::{AlertTier, Category};
use crate::pipeline::AnalysisRun;
use crate::snapshot::{Direction, Movement};

fn write_basis(output: &mut String, basis: &PolicyBasis) {
    let _ = writeln!(output, "## Thresholds");
    match basis {
        PolicyBasis::Fixed(t) => {
            let _ = writeln!(
                output,
                "- Strength: productivity and engagement above {:.2}, risk below {:.2}",
                t.strength_min, t.strength_max_risk
            );
            let _ = writeln!(
                output,
                "- Weakness: productivity and engagement within [{:.2}, {:.2}]",
                t.weakness_low, t.weakness_high
            );
            let _ = writeln!(
                output,
                "- Threat: risk above {:.2} with productivity or engagement below {:.2}",
                t.threat_min_risk, t.low_score
            );
        }
        PolicyBasis::Percentile(t) => {
            for (name, q) in [
                ("Productivity", t.productivity),
                ("Engagement", t.engagement),
                ("Risk", t.risk),
            ] {
                let _ = writeln!(output, "- {name}: 25th={:.2}, 75th={:.2}", q.p25, q.p75);
            }
        }
        PolicyBasis::Clusters(mapping) => {
            for (cluster, category) in mapping {
                let _ = writeln!(output, "- Cluster {cluster}: {category}");
            }
        }
    }
}

pub fn build_report(
    source: &str,
    generated_at: DateTime<Utc>,
    run: &AnalysisRun,
    movements: Option<&[Movement]>,
    top_n: usize,
) -> String {
    let insights = &run.insights;
    let mut output = String::new();

    let _ = writeln!(output, "# Employee SWOT Risk Report");
    let _ = writeln!(
        output,
        "Generated {} from {} ({} scheme, {} policy)",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        source,
        run.scheme,
        run.policy
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## SWOT Distribution");
    let _ = writeln!(output, "Total employees analyzed: {}", insights.total);
    for category in Category::ALL {
        let _ = writeln!(
            output,
            "- {}: {} ({:.1}%)",
            category,
            insights.counts.get(category),
            insights.percentages.get(category)
        );
    }
    let _ = writeln!(output, "Organization health score: {:.1}", insights.health_score);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Score Statistics");
    let stats = &insights.statistics;
    for (name, summary) in [
        ("Productivity", stats.productivity),
        ("Engagement", stats.engagement),
        ("Risk", stats.risk),
    ] {
        let _ = writeln!(
            output,
            "- {name}: mean {:.2}, median {:.2}",
            summary.mean, summary.median
        );
    }

    let _ = writeln!(output);
    write_basis(&mut output, &run.basis);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Department Risk");
    let _ = writeln!(
        output,
        "| Department | Total | Threats | Threat % | Tier | Avg Prod | Avg Eng | Avg Risk |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|---|");
    let mut departments: Vec<_> = run.departments.iter().collect();
    departments.sort_by(|a, b| {
        b.percentages
            .threat
            .partial_cmp(&a.percentages.threat)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for dept in departments {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {:.2} | {} | {:.2} | {:.2} | {:.2} |",
            dept.department,
            dept.total,
            dept.counts.threat,
            dept.percentages.threat,
            dept.risk_tier,
            dept.avg_productivity,
            dept.avg_engagement,
            dept.avg_risk
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## High Risk Employees");
    let high_risk = high_risk_employees(&run.records, top_n);
    if high_risk.is_empty() {
        let _ = writeln!(output, "No high-risk employees identified.");
    } else {
        for emp in high_risk {
            let _ = write!(
                output,
                "- {} ({}, {}) risk {:.2}, productivity {:.2}, engagement {:.2}",
                emp.employee_id,
                emp.department,
                emp.category,
                emp.risk,
                emp.productivity,
                emp.engagement
            );
            if let Some(level) = emp.attrition_level {
                let _ = write!(output, ", attrition {level}");
            }
            if let Some(level) = emp.anomaly_level {
                let _ = write!(output, ", anomaly {level}");
            }
            let _ = writeln!(output);
        }
    }

    if let Some(anomalies) = &insights.anomalies {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Anomalies");
        let _ = writeln!(
            output,
            "Outliers flagged: {} of {} assessed",
            anomalies.outliers, anomalies.assessed
        );
        let _ = writeln!(output, "- High: {}", anomalies.high);
        let _ = writeln!(output, "- Medium: {}", anomalies.medium);
        let _ = writeln!(output, "- Low: {}", anomalies.low);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Performers");
    let top = top_performers(&run.records, top_n);
    if top.is_empty() {
        let _ = writeln!(output, "No top performers in the Strength category.");
    } else {
        for emp in top {
            let _ = writeln!(
                output,
                "- {} ({}, {}) productivity {:.2}, engagement {:.2}",
                emp.employee_id,
                emp.department,
                emp.job_title.as_deref().unwrap_or("unknown role"),
                emp.productivity,
                emp.engagement
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");
    if run.alerts.is_empty() {
        let _ = writeln!(output, "No alerts raised.");
    } else {
        for tier in [
            AlertTier::Critical,
            AlertTier::High,
            AlertTier::Medium,
            AlertTier::Info,
        ] {
            let count = run.alerts.iter().filter(|a| a.tier == tier).count();
            let _ = writeln!(output, "- {tier}: {count}");
        }
        let _ = writeln!(output);
        for alert in run.alerts.iter().take(top_n) {
            let _ = writeln!(
                output,
                "- [{}] {} ({}, {}): {}",
                alert.tier, alert.employee_id, alert.department, alert.category, alert.recommendation
            );
        }
    }

    if let Some(movements) = movements {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Category Movement");
        let changed: Vec<&Movement> = movements
            .iter()
            .filter(|m| m.direction != Direction::New)
            .collect();
        let newcomers = movements.len() - changed.len();
        if changed.is_empty() {
            let _ = writeln!(output, "No category changes since the previous run.");
        } else {
            for m in changed.iter().take(top_n) {
                let from = m.from.map(|c| c.to_string()).unwrap_or_default();
                let _ = writeln!(
                    output,
                    "- {} ({}): {} -> {} ({:?})",
                    m.employee_id, m.department, from, m.to, m.direction
                );
            }
        }
        if newcomers > 0 {
            let _ = writeln!(output, "{newcomers} employees had no previous category.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    if insights.recommendations.is_empty() {
        let _ = writeln!(output, "Threat levels are manageable; continue current practices.");
    } else {
        for rec in &insights.recommendations {
            let _ = writeln!(
                output,
                "- [{:?}] {}: {} (expected impact: {})",
                rec.priority, rec.area, rec.action, rec.expected_impact
            );
        }
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "Most common risk factors:");
    for (factor, count) in insights.risk_factors.iter().take(5) {
        let _ = writeln!(output, "- {}: {}", factor.label(), count);
    }

    if !run.rejected.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Rejected Records");
        for err in &run.rejected {
            let _ = writeln!(output, "- {err}");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::{CategorizationPolicy, FixedThresholds};
    use crate::features::{tests::sample_row, ScoringScheme};
    use crate::ml::ModelSelection;
    use crate::pipeline::Pipeline;
    use crate::snapshot::{diff, Snapshot};

    fn run() -> AnalysisRun {
        let mut rows: Vec<_> = (0..12)
            .map(|i| {
                let mut row = sample_row(&format!("E{i}"));
                row.performance_score = Some(((i % 5) + 1).to_string());
                row.sick_days = Some((i % 9).to_string());
                row
            })
            .collect();
        rows[4].department = None;
        Pipeline::new(
            ScoringScheme::Baseline,
            CategorizationPolicy::FixedThreshold(FixedThresholds::default()),
        )
        .run(&rows)
        .unwrap()
    }

    #[test]
    fn report_has_every_section() {
        let run = run();
        let report = build_report("employees.csv", Utc::now(), &run, None, 5);

        assert!(report.starts_with("# Employee SWOT Risk Report"));
        for heading in [
            "## SWOT Distribution",
            "## Score Statistics",
            "## Thresholds",
            "## Department Risk",
            "## High Risk Employees",
            "## Top Performers",
            "## Alerts",
            "## Recommendations",
            "## Rejected Records",
        ] {
            assert!(report.contains(heading), "missing {heading}");
        }
        assert!(report.contains("Total employees analyzed: 11"));
        assert!(report.contains("missing Department"));
        assert!(!report.contains("## Category Movement"));
        assert!(!report.contains("## Anomalies"));
    }

    #[test]
    fn report_shows_anomalies_when_models_ran() {
        let rows: Vec<_> = (0..40)
            .map(|i| {
                let mut row = sample_row(&format!("E{i}"));
                row.performance_score = Some(((i % 5) + 1).to_string());
                row.sick_days = Some((i % 13).to_string());
                row.overtime_hours = Some(((i * 7) % 30).to_string());
                row.resigned = Some(if i % 4 == 0 { "True" } else { "False" }.to_string());
                row
            })
            .collect();
        let run = Pipeline::new(ScoringScheme::Baseline, CategorizationPolicy::Percentile)
            .with_models(ModelSelection::all())
            .run(&rows)
            .unwrap();
        let report = build_report("employees.csv", Utc::now(), &run, None, 5);
        assert!(report.contains("## Anomalies"));
        assert!(report.contains("of 40 assessed"));
    }

    #[test]
    fn report_lists_movements_when_available() {
        let run = run();
        let mut previous = Snapshot::capture("fixed", &run.records);
        previous.entries[0].category = Category::Strength;
        if run.records[0].category == Category::Strength {
            previous.entries[0].category = Category::Threat;
        }
        let movements = diff(Some(&previous), &run.records);
        let report = build_report("employees.csv", Utc::now(), &run, Some(&movements), 5);
        assert!(report.contains("## Category Movement"));
        assert!(report.contains("E0 (IT)"));
    }
}
