//! Scoring configuration and its structural invariants.

use crate::classify::BankRules;
use crate::composite::{CompositeWeights, PenaltyRule};
use crate::extract::MetricCatalog;
use crate::scorer::CategoryScorer;
use ranker_core::{Category, MetricName, RankingError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Allowed drift when checking that a weight table sums to 1.0
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// What a category scorer does when a metric it reads is absent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsencePolicy {
    /// Drop the sub-formula and renormalize the remaining weights
    Redistribute,
    /// Use this fixed sub-score in [0, 100]
    Substitute(f64),
}

/// Per-metric absence policy. Metrics without an entry use `fallback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbsencePolicies {
    pub fallback: AbsencePolicy,
    pub overrides: BTreeMap<MetricName, AbsencePolicy>,
}

impl Default for AbsencePolicies {
    fn default() -> Self {
        Self::uniform(AbsencePolicy::Redistribute)
    }
}

impl AbsencePolicies {
    pub fn uniform(policy: AbsencePolicy) -> Self {
        Self {
            fallback: policy,
            overrides: BTreeMap::new(),
        }
    }

    pub fn policy_for(&self, metric: MetricName) -> AbsencePolicy {
        self.overrides.get(&metric).copied().unwrap_or(self.fallback)
    }

    pub fn set(&mut self, metric: MetricName, policy: AbsencePolicy) {
        self.overrides.insert(metric, policy);
    }

    fn validate(&self) -> Result<(), RankingError> {
        let all = std::iter::once(("fallback".to_string(), self.fallback)).chain(
            self.overrides
                .iter()
                .map(|(m, p)| (m.to_string(), *p)),
        );
        for (label, policy) in all {
            if let AbsencePolicy::Substitute(v) = policy {
                if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                    return Err(RankingError::ConfigInvariant(format!(
                        "absence substitute for {} must be within [0, 100], got {}",
                        label, v
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub catalog: MetricCatalog,
    pub bank_rules: BankRules,
    pub bank_scorer: CategoryScorer,
    pub non_bank_scorer: CategoryScorer,
    pub bank_weights: CompositeWeights,
    pub non_bank_weights: CompositeWeights,
    pub absence: AbsencePolicies,
    pub penalties: Vec<PenaltyRule>,
    /// Decimal places of the displayed composite score
    pub display_precision: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            catalog: MetricCatalog::default(),
            bank_rules: BankRules::default(),
            bank_scorer: CategoryScorer::bank(),
            non_bank_scorer: CategoryScorer::non_bank(),
            bank_weights: CompositeWeights::bank(),
            non_bank_weights: CompositeWeights::non_bank(),
            absence: AbsencePolicies::default(),
            penalties: vec![PenaltyRule::negative_revenue_growth()],
            display_precision: 0,
        }
    }
}

/// Check that `weights` sum to 1.0 and are each positive and finite.
pub fn check_weights<I>(label: &str, weights: I) -> Result<(), RankingError>
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    for w in weights {
        if !w.is_finite() || w <= 0.0 {
            return Err(RankingError::ConfigInvariant(format!(
                "{}: weight {} must be positive and finite",
                label, w
            )));
        }
        sum += w;
        count += 1;
    }
    if count == 0 {
        return Err(RankingError::ConfigInvariant(format!("{}: no weights defined", label)));
    }
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(RankingError::ConfigInvariant(format!(
            "{}: weights sum to {:.6}, expected 1.0",
            label, sum
        )));
    }
    Ok(())
}

impl ScoringConfig {
    /// Read a JSON config file. Fields not present keep their defaults.
    pub fn load(path: &Path) -> Result<Self, RankingError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            RankingError::InvalidData(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Scorer for a category. Unclassified entities use the non-bank formulas.
    pub fn scorer_for(&self, category: Category) -> &CategoryScorer {
        match category {
            Category::Bank => &self.bank_scorer,
            Category::NonBank | Category::Unclassified => &self.non_bank_scorer,
        }
    }

    pub fn weights_for(&self, category: Category) -> &CompositeWeights {
        match category {
            Category::Bank => &self.bank_weights,
            Category::NonBank | Category::Unclassified => &self.non_bank_weights,
        }
    }

    /// Enforce every structural invariant. Any violation is fatal for the run.
    pub fn validate(&self) -> Result<(), RankingError> {
        self.validate_catalog()?;

        for (expected, scorer) in [
            (Category::Bank, &self.bank_scorer),
            (Category::NonBank, &self.non_bank_scorer),
        ] {
            if scorer.category != expected {
                return Err(RankingError::ConfigInvariant(format!(
                    "{:?} scorer is tagged {:?}",
                    expected, scorer.category
                )));
            }
            let label = format!("{:?} scorer", expected);
            check_weights(&label, scorer.formulas.iter().map(|f| f.weight))?;
            for formula in &scorer.formulas {
                formula.transform.validate().map_err(|e| {
                    RankingError::ConfigInvariant(format!("{} / {}: {}", label, formula.name, e))
                })?;
                self.require_aliases(formula.metric)?;
            }
        }

        for (label, weights) in [
            ("Bank composite", &self.bank_weights),
            ("NonBank composite", &self.non_bank_weights),
        ] {
            check_weights(label, weights.pillars.iter().map(|p| p.weight))?;
            for pillar in &weights.pillars {
                let pillar_label = format!("{} / {:?}", label, pillar.pillar);
                check_weights(&pillar_label, pillar.metrics.iter().map(|m| m.weight))?;
                for mw in &pillar.metrics {
                    self.require_aliases(mw.metric)?;
                }
            }
        }

        self.absence.validate()?;

        for rule in &self.penalties {
            if !(rule.factor > 0.0 && rule.factor <= 1.0) {
                return Err(RankingError::ConfigInvariant(format!(
                    "penalty factor for {} must be within (0, 1], got {}",
                    rule.metric, rule.factor
                )));
            }
            if !rule.threshold.is_finite() {
                return Err(RankingError::ConfigInvariant(format!(
                    "penalty threshold for {} must be finite",
                    rule.metric
                )));
            }
            self.require_aliases(rule.metric)?;
        }

        if self.display_precision > 6 {
            return Err(RankingError::ConfigInvariant(format!(
                "display precision {} exceeds 6 decimal places",
                self.display_precision
            )));
        }

        Ok(())
    }

    fn validate_catalog(&self) -> Result<(), RankingError> {
        for spec in &self.catalog.metrics {
            if spec.aliases.is_empty() || spec.aliases.iter().any(|a| a.trim().is_empty()) {
                return Err(RankingError::ConfigInvariant(format!(
                    "alias list for {} is empty or has a blank key",
                    spec.metric
                )));
            }
        }
        for (label, aliases) in [
            ("name", &self.catalog.name_aliases),
            ("sector", &self.catalog.sector_aliases),
            ("price", &self.catalog.price_aliases),
            ("market_cap", &self.catalog.market_cap_aliases),
            ("revenue", &self.catalog.revenue_aliases),
        ] {
            if aliases.is_empty() {
                return Err(RankingError::ConfigInvariant(format!(
                    "alias list for {} is empty",
                    label
                )));
            }
        }
        Ok(())
    }

    fn require_aliases(&self, metric: MetricName) -> Result<(), RankingError> {
        match self.catalog.spec(metric) {
            Some(_) => Ok(()),
            None => Err(RankingError::ConfigInvariant(format!(
                "{} is scored but has no alias list",
                metric
            ))),
        }
    }
}
