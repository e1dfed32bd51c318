use std::collections::BTreeMap;

use crate::error::AnalysisError;
use crate::models::{
    CategorizedRecord, Category, CategoryCounts, CategoryPercentages, Department,
    DepartmentAggregate, RiskTier,
};
use crate::stats::{mean, round2};

pub fn percentages(counts: &CategoryCounts, total: usize) -> CategoryPercentages {
    let pct = |count: usize| {
        if total == 0 {
            0.0
        } else {
            round2(count as f64 / total as f64 * 100.0)
        }
    };
    CategoryPercentages {
        strength: pct(counts.strength),
        opportunity: pct(counts.opportunity),
        weakness: pct(counts.weakness),
        threat: pct(counts.threat),
    }
}

/// Group categorized records by department, one aggregate per department
/// present, in department order.
pub fn aggregate_by_department(
    records: &[CategorizedRecord],
) -> Result<Vec<DepartmentAggregate>, AnalysisError> {
    if records.is_empty() {
        return Err(AnalysisError::EmptyDataset);
    }

    let mut groups: BTreeMap<Department, Vec<&CategorizedRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.department()).or_default().push(record);
    }

    let aggregates = groups
        .into_iter()
        .map(|(department, members)| {
            let total = members.len();
            let mut counts = CategoryCounts::default();
            for member in &members {
                counts.add(member.category);
            }

            let column = |f: fn(&CategorizedRecord) -> f64| -> f64 {
                let values: Vec<f64> = members.iter().map(|m| f(m)).collect();
                round2(mean(&values))
            };

            let attrition: Vec<f64> = members
                .iter()
                .filter_map(|m| m.scored.attrition_probability)
                .collect();

            let percentages = percentages(&counts, total);
            DepartmentAggregate {
                department,
                total,
                counts,
                avg_productivity: column(|r| r.scores().productivity),
                avg_engagement: column(|r| r.scores().engagement),
                avg_risk: column(|r| r.scores().risk),
                avg_attrition_probability: if attrition.is_empty() {
                    None
                } else {
                    Some((mean(&attrition) * 1000.0).round() / 1000.0)
                },
                risk_tier: RiskTier::from_threat_pct(percentages.get(Category::Threat)),
                percentages,
            }
        })
        .collect();

    Ok(aggregates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::tests::scored;
    use proptest::prelude::*;

    fn labeled(id: &str, department: Department, category: Category) -> CategorizedRecord {
        let mut record = scored(id, 3.0, 3.0, 2.0);
        record.employee.department = department;
        CategorizedRecord {
            scored: record,
            category,
        }
    }

    #[test]
    fn counts_and_tiers_per_department() {
        let records = vec![
            labeled("1", Department::IT, Category::Threat),
            labeled("2", Department::IT, Category::Strength),
            labeled("3", Department::IT, Category::Opportunity),
            labeled("4", Department::HR, Category::Opportunity),
            labeled("5", Department::HR, Category::Weakness),
        ];
        let aggregates = aggregate_by_department(&records).unwrap();
        assert_eq!(aggregates.len(), 2);

        let hr = &aggregates[0];
        assert_eq!(hr.department, Department::HR);
        assert_eq!(hr.total, 2);
        assert_eq!(hr.percentages.weakness, 50.0);
        assert_eq!(hr.risk_tier, RiskTier::Minimal);

        let it = &aggregates[1];
        assert_eq!(it.counts.threat, 1);
        assert_eq!(it.percentages.threat, 33.33);
        assert_eq!(it.risk_tier, RiskTier::High);
        assert_eq!(it.avg_attrition_probability, None);
    }

    #[test]
    fn risk_tier_boundaries() {
        assert_eq!(RiskTier::from_threat_pct(25.0), RiskTier::Medium);
        assert_eq!(RiskTier::from_threat_pct(25.01), RiskTier::High);
        assert_eq!(RiskTier::from_threat_pct(15.0), RiskTier::Low);
        assert_eq!(RiskTier::from_threat_pct(5.0), RiskTier::Minimal);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(
            aggregate_by_department(&[]).unwrap_err(),
            AnalysisError::EmptyDataset
        );
    }

    #[test]
    fn attrition_mean_is_reported_when_present() {
        let mut a = labeled("1", Department::Sales, Category::Opportunity);
        a.scored.attrition_probability = Some(0.2);
        let mut b = labeled("2", Department::Sales, Category::Threat);
        b.scored.attrition_probability = Some(0.6);
        let aggregates = aggregate_by_department(&[a, b]).unwrap();
        assert_eq!(aggregates[0].avg_attrition_probability, Some(0.4));
    }

    fn department_strategy() -> impl Strategy<Value = Department> {
        prop::sample::select(Department::ALL.to_vec())
    }

    fn category_strategy() -> impl Strategy<Value = Category> {
        prop::sample::select(Category::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn department_counts_sum_to_total(
            rows in prop::collection::vec((department_strategy(), category_strategy()), 1..80)
        ) {
            let records: Vec<CategorizedRecord> = rows
                .iter()
                .enumerate()
                .map(|(i, (dept, cat))| labeled(&i.to_string(), *dept, *cat))
                .collect();
            let forward = aggregate_by_department(&records).unwrap();

            let mut reversed = records.clone();
            reversed.reverse();
            let backward = aggregate_by_department(&reversed).unwrap();

            prop_assert_eq!(forward.iter().map(|a| a.total).sum::<usize>(), records.len());
            for aggregate in &forward {
                prop_assert_eq!(aggregate.counts.total(), aggregate.total);
            }
            prop_assert_eq!(forward, backward);
        }
    }
}
