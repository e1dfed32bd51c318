use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::alerts::{AlertMode, AlertThresholds};
use crate::categorize::{CategorizationPolicy, FixedThresholds};
use crate::features::ScoringScheme;
use crate::ml::MlConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Absolute score cut-offs
    Fixed,
    /// Population quartiles
    Percentile,
    /// K-Means cluster means against population means
    Cluster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub top_n: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig { top_n: 10 }
    }
}

/// Settings for one analysis run, read from an optional TOML file and then
/// overridden by command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub scheme: ScoringScheme,
    pub policy: Option<PolicyKind>,
    pub fixed: FixedThresholds,
    pub alerts: AlertThresholds,
    pub ml: MlConfig,
    pub report: ReportConfig,
}

impl AnalysisConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid analysis config")
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_toml(&text)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn with_overrides(mut self, scheme: Option<ScoringScheme>, policy: Option<PolicyKind>) -> Self {
        if let Some(scheme) = scheme {
            self.scheme = scheme;
        }
        if policy.is_some() {
            self.policy = policy;
        }
        self
    }

    /// The selected categorization policy. A run without one is refused.
    pub fn categorization_policy(&self) -> anyhow::Result<CategorizationPolicy> {
        let kind = self.policy.context(
            "no categorization policy selected; pass --policy or set `policy` in the config file",
        )?;
        Ok(match kind {
            PolicyKind::Fixed => CategorizationPolicy::FixedThreshold(self.fixed),
            PolicyKind::Percentile => CategorizationPolicy::Percentile,
            PolicyKind::Cluster => CategorizationPolicy::ClusterRelative,
        })
    }

    pub fn alert_mode(policy: &CategorizationPolicy) -> AlertMode {
        if policy.is_fixed() {
            AlertMode::Absolute
        } else {
            AlertMode::Percentile
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AnalysisConfig::from_toml(
            r#"
            scheme = "normalized"
            policy = "fixed"

            [fixed]
            threat_min_risk = 3.0

            [ml]
            clusters = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.scheme, ScoringScheme::Normalized);
        assert_eq!(config.fixed.threat_min_risk, 3.0);
        assert_eq!(config.fixed.strength_min, 3.5);
        assert_eq!(config.ml.clusters, 5);
        assert_eq!(config.ml.seed, 42);
        assert_eq!(config.report.top_n, 10);
        assert_eq!(
            config.categorization_policy().unwrap(),
            CategorizationPolicy::FixedThreshold(config.fixed)
        );
    }

    #[test]
    fn missing_policy_is_refused() {
        let config = AnalysisConfig::default();
        assert!(config.categorization_policy().is_err());
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "policy = \"fixed\"").unwrap();
        let config = AnalysisConfig::load(Some(file.path()))
            .unwrap()
            .with_overrides(None, Some(PolicyKind::Percentile));
        assert_eq!(
            config.categorization_policy().unwrap(),
            CategorizationPolicy::Percentile
        );
        assert_eq!(
            AnalysisConfig::alert_mode(&CategorizationPolicy::Percentile),
            AlertMode::Percentile
        );
    }

    #[test]
    fn unknown_policy_name_fails_to_parse() {
        assert!(AnalysisConfig::from_toml("policy = \"vibes\"").is_err());
    }
}
