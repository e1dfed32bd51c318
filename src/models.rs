use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One CSV row as it arrives, before validation. Every field is optional so a
/// bad cell rejects its own row instead of failing the whole file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEmployeeRow {
    #[serde(rename = "Employee_ID")]
    pub employee_id: Option<String>,
    #[serde(rename = "Department")]
    pub department: Option<String>,
    #[serde(rename = "Job_Title")]
    pub job_title: Option<String>,
    #[serde(rename = "Performance_Score")]
    pub performance_score: Option<String>,
    #[serde(rename = "Work_Hours_Per_Week")]
    pub work_hours_per_week: Option<String>,
    #[serde(rename = "Projects_Handled")]
    pub projects_handled: Option<String>,
    #[serde(rename = "Training_Hours")]
    pub training_hours: Option<String>,
    #[serde(rename = "Sick_Days")]
    pub sick_days: Option<String>,
    #[serde(rename = "Employee_Satisfaction_Score")]
    pub employee_satisfaction_score: Option<String>,
    #[serde(rename = "Overtime_Hours")]
    pub overtime_hours: Option<String>,
    #[serde(rename = "Years_At_Company")]
    pub years_at_company: Option<String>,
    #[serde(rename = "Promotions")]
    pub promotions: Option<String>,
    #[serde(rename = "Resigned")]
    pub resigned: Option<String>,
    #[serde(rename = "Remote_Work_Frequency")]
    pub remote_work_frequency: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Department {
    #[serde(rename = "Customer Support")]
    CustomerSupport,
    Engineering,
    Finance,
    HR,
    IT,
    Legal,
    Marketing,
    Operations,
    Sales,
}

impl Department {
    pub const ALL: [Department; 9] = [
        Department::CustomerSupport,
        Department::Engineering,
        Department::Finance,
        Department::HR,
        Department::IT,
        Department::Legal,
        Department::Marketing,
        Department::Operations,
        Department::Sales,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::CustomerSupport => "Customer Support",
            Department::Engineering => "Engineering",
            Department::Finance => "Finance",
            Department::HR => "HR",
            Department::IT => "IT",
            Department::Legal => "Legal",
            Department::Marketing => "Marketing",
            Department::Operations => "Operations",
            Department::Sales => "Sales",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Department::ALL
            .into_iter()
            .find(|dept| dept.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown department '{trimmed}'"))
    }
}

/// A validated employee row. Read-only for the rest of the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeRecord {
    pub employee_id: String,
    pub department: Department,
    pub job_title: Option<String>,
    pub performance_score: f64,
    pub work_hours_per_week: f64,
    pub projects_handled: f64,
    pub training_hours: f64,
    pub sick_days: f64,
    pub employee_satisfaction_score: f64,
    pub overtime_hours: f64,
    pub years_at_company: f64,
    pub promotions: f64,
    pub resigned: bool,
    pub remote_work_frequency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub productivity: f64,
    pub engagement: f64,
    pub risk: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnomalyLevel {
    High,
    Medium,
    Low,
}

impl fmt::Display for AnomalyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnomalyLevel::High => "High",
            AnomalyLevel::Medium => "Medium",
            AnomalyLevel::Low => "Low",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyAssessment {
    pub score: f64,
    pub outlier: bool,
    pub level: AnomalyLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AttritionRiskLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl AttritionRiskLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.7 {
            AttritionRiskLevel::VeryHigh
        } else if probability > 0.5 {
            AttritionRiskLevel::High
        } else if probability > 0.3 {
            AttritionRiskLevel::Medium
        } else if probability > 0.1 {
            AttritionRiskLevel::Low
        } else {
            AttritionRiskLevel::VeryLow
        }
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self, AttritionRiskLevel::High | AttritionRiskLevel::VeryHigh)
    }
}

impl fmt::Display for AttritionRiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AttritionRiskLevel::VeryLow => "Very Low",
            AttritionRiskLevel::Low => "Low",
            AttritionRiskLevel::Medium => "Medium",
            AttritionRiskLevel::High => "High",
            AttritionRiskLevel::VeryHigh => "Very High",
        };
        f.write_str(label)
    }
}

/// An employee with derived scores and whatever model annotations were
/// attached before categorization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub employee: EmployeeRecord,
    pub scores: Scores,
    pub work_life_balance: f64,
    pub tenure_factor: f64,
    pub cluster: Option<usize>,
    pub anomaly: Option<AnomalyAssessment>,
    pub attrition_probability: Option<f64>,
}

impl ScoredRecord {
    pub fn employee_id(&self) -> &str {
        &self.employee.employee_id
    }

    pub fn attrition_level(&self) -> Option<AttritionRiskLevel> {
        self.attrition_probability
            .map(AttritionRiskLevel::from_probability)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Strength,
    Opportunity,
    Weakness,
    Threat,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Strength,
        Category::Opportunity,
        Category::Weakness,
        Category::Threat,
    ];

    /// Higher is healthier; used to tell improvements from declines.
    pub fn standing(&self) -> u8 {
        match self {
            Category::Strength => 3,
            Category::Opportunity => 2,
            Category::Weakness => 1,
            Category::Threat => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Strength => "Strength",
            Category::Opportunity => "Opportunity",
            Category::Weakness => "Weakness",
            Category::Threat => "Threat",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown category '{value}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedRecord {
    pub scored: ScoredRecord,
    pub category: Category,
}

impl CategorizedRecord {
    pub fn employee_id(&self) -> &str {
        self.scored.employee_id()
    }

    pub fn department(&self) -> Department {
        self.scored.employee.department
    }

    pub fn scores(&self) -> &Scores {
        &self.scored.scores
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskTier {
    Minimal,
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn from_threat_pct(threat_pct: f64) -> Self {
        if threat_pct > 25.0 {
            RiskTier::High
        } else if threat_pct > 15.0 {
            RiskTier::Medium
        } else if threat_pct > 5.0 {
            RiskTier::Low
        } else {
            RiskTier::Minimal
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskTier::Minimal => "Minimal",
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub strength: usize,
    pub opportunity: usize,
    pub weakness: usize,
    pub threat: usize,
}

impl CategoryCounts {
    pub fn add(&mut self, category: Category) {
        match category {
            Category::Strength => self.strength += 1,
            Category::Opportunity => self.opportunity += 1,
            Category::Weakness => self.weakness += 1,
            Category::Threat => self.threat += 1,
        }
    }

    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Strength => self.strength,
            Category::Opportunity => self.opportunity,
            Category::Weakness => self.weakness,
            Category::Threat => self.threat,
        }
    }

    pub fn total(&self) -> usize {
        self.strength + self.opportunity + self.weakness + self.threat
    }

    pub fn from_records(records: &[CategorizedRecord]) -> Self {
        let mut counts = CategoryCounts::default();
        for record in records {
            counts.add(record.category);
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryPercentages {
    pub strength: f64,
    pub opportunity: f64,
    pub weakness: f64,
    pub threat: f64,
}

impl CategoryPercentages {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Strength => self.strength,
            Category::Opportunity => self.opportunity,
            Category::Weakness => self.weakness,
            Category::Threat => self.threat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentAggregate {
    pub department: Department,
    pub total: usize,
    pub counts: CategoryCounts,
    pub percentages: CategoryPercentages,
    pub avg_productivity: f64,
    pub avg_engagement: f64,
    pub avg_risk: f64,
    pub avg_attrition_probability: Option<f64>,
    pub risk_tier: RiskTier,
}

/// Alert severity. Declaration order is severity order, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AlertTier {
    Critical,
    High,
    Medium,
    Info,
}

impl fmt::Display for AlertTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertTier::Critical => "Critical",
            AlertTier::High => "High",
            AlertTier::Medium => "Medium",
            AlertTier::Info => "Info",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEntry {
    pub employee_id: String,
    pub department: Department,
    pub category: Category,
    pub tier: AlertTier,
    pub risk_score: f64,
    pub attrition_probability: Option<f64>,
    pub recommendation: String,
}

/// Flat per-employee view of a categorized record, for CSV and JSON export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeResult {
    pub employee_id: String,
    pub department: Department,
    pub job_title: Option<String>,
    pub category: Category,
    pub productivity: f64,
    pub engagement: f64,
    pub risk: f64,
    pub cluster: Option<usize>,
    pub anomaly_score: Option<f64>,
    pub anomaly_level: Option<AnomalyLevel>,
    pub outlier: Option<bool>,
    pub attrition_probability: Option<f64>,
    pub attrition_level: Option<AttritionRiskLevel>,
}

impl EmployeeResult {
    pub fn from_record(record: &CategorizedRecord) -> Self {
        let scored = &record.scored;
        EmployeeResult {
            employee_id: record.employee_id().to_string(),
            department: record.department(),
            job_title: scored.employee.job_title.clone(),
            category: record.category,
            productivity: scored.scores.productivity,
            engagement: scored.scores.engagement,
            risk: scored.scores.risk,
            cluster: scored.cluster,
            anomaly_score: scored.anomaly.map(|a| a.score),
            anomaly_level: scored.anomaly.map(|a| a.level),
            outlier: scored.anomaly.map(|a| a.outlier),
            attrition_probability: scored.attrition_probability,
            attrition_level: scored.attrition_level(),
        }
    }
}
