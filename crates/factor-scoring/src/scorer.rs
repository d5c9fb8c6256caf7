//! Category scorers.
//!
//! A [`CategoryScorer`] is a weighted list of sub-formulas, each mapping one
//! metric onto [0, 100] around a target value. Banks and non-banks differ only
//! in the formula list they carry.

use crate::config::{AbsencePolicies, AbsencePolicy};
use ranker_core::{clamp_score, Category, MetricName, MetricRecord, SubScore};
use serde::{Deserialize, Serialize};

/// Mapping of a raw metric onto [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// `floor` scores 0, `target` scores 100
    Linear { floor: f64, target: f64 },
    /// At or below `target` scores 100, `ceiling` scores 0.
    /// Negative multiples (loss-making, negative book) score 0.
    Inverse { target: f64, ceiling: f64 },
}

impl Transform {
    pub fn apply(&self, value: f64) -> f64 {
        let score = match *self {
            Transform::Linear { floor, target } => (value - floor) / (target - floor) * 100.0,
            Transform::Inverse { target, ceiling } => {
                if value < 0.0 {
                    0.0
                } else {
                    (ceiling - value) / (ceiling - target) * 100.0
                }
            }
        };
        clamp_score(score)
    }

    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Transform::Linear { floor, target } => {
                if !floor.is_finite() || !target.is_finite() {
                    return Err("linear anchors must be finite".to_string());
                }
                if floor >= target {
                    return Err(format!("linear floor {} must be below target {}", floor, target));
                }
            }
            Transform::Inverse { target, ceiling } => {
                if !target.is_finite() || !ceiling.is_finite() {
                    return Err("inverse anchors must be finite".to_string());
                }
                if target >= ceiling {
                    return Err(format!("inverse target {} must be below ceiling {}", target, ceiling));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubFormula {
    pub name: String,
    pub metric: MetricName,
    pub transform: Transform,
    pub weight: f64,
}

impl SubFormula {
    pub fn new(name: &str, metric: MetricName, transform: Transform, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            metric,
            transform,
            weight,
        }
    }
}

/// Bounded absolute score with its breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    /// Weighted blend of the breakdown, within [0, 100]
    pub raw: f64,
    pub breakdown: Vec<SubScore>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Scored(CategoryScore),
    /// Every metric the scorer reads is absent
    InsufficientData { missing: Vec<MetricName> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScorer {
    pub category: Category,
    pub formulas: Vec<SubFormula>,
}

impl CategoryScorer {
    pub fn bank() -> Self {
        use MetricName::*;
        Self {
            category: Category::Bank,
            formulas: vec![
                SubFormula::new("roe", Roe, Transform::Linear { floor: 0.0, target: 0.18 }, 0.30),
                SubFormula::new("roa", Roa, Transform::Linear { floor: 0.0, target: 0.015 }, 0.20),
                SubFormula::new("valuation_pb", PriceToBook, Transform::Inverse { target: 1.0, ceiling: 4.0 }, 0.20),
                SubFormula::new("growth", RevenueGrowth, Transform::Linear { floor: -0.10, target: 0.20 }, 0.20),
                SubFormula::new("momentum", OneYearReturn, Transform::Linear { floor: -0.20, target: 0.30 }, 0.10),
            ],
        }
    }

    pub fn non_bank() -> Self {
        use MetricName::*;
        Self {
            category: Category::NonBank,
            formulas: vec![
                SubFormula::new("roe", Roe, Transform::Linear { floor: 0.0, target: 0.20 }, 0.20),
                SubFormula::new("margins", ProfitMargin, Transform::Linear { floor: 0.0, target: 0.20 }, 0.15),
                SubFormula::new("valuation_ev_ebitda", EnterpriseToEbitda, Transform::Inverse { target: 8.0, ceiling: 30.0 }, 0.15),
                SubFormula::new("leverage", DebtToEquity, Transform::Inverse { target: 0.3, ceiling: 2.0 }, 0.15),
                SubFormula::new("growth", RevenueGrowth, Transform::Linear { floor: -0.10, target: 0.20 }, 0.20),
                SubFormula::new("momentum", OneYearReturn, Transform::Linear { floor: -0.20, target: 0.30 }, 0.15),
            ],
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.formulas.iter().map(|f| f.weight).sum()
    }

    pub fn metrics(&self) -> impl Iterator<Item = MetricName> + '_ {
        self.formulas.iter().map(|f| f.metric)
    }

    pub fn score(&self, record: &MetricRecord, absence: &AbsencePolicies) -> ScoreOutcome {
        let mut missing: Vec<MetricName> = Vec::new();
        for metric in self.metrics() {
            if !record.is_present(metric) && !missing.contains(&metric) {
                missing.push(metric);
            }
        }

        if self.metrics().all(|m| !record.is_present(m)) {
            return ScoreOutcome::InsufficientData { missing };
        }

        let mut breakdown = Vec::with_capacity(self.formulas.len());
        for formula in &self.formulas {
            match record.get(formula.metric) {
                Some(value) => breakdown.push(SubScore::new(
                    &formula.name,
                    formula.metric,
                    formula.transform.apply(value),
                    formula.weight,
                    false,
                )),
                None => match absence.policy_for(formula.metric) {
                    AbsencePolicy::Substitute(neutral) => breakdown.push(SubScore::new(
                        &formula.name,
                        formula.metric,
                        neutral,
                        formula.weight,
                        true,
                    )),
                    AbsencePolicy::Redistribute => {}
                },
            }
        }

        let total_weight: f64 = breakdown.iter().map(|s| s.weight).sum();
        if total_weight <= 0.0 {
            return ScoreOutcome::InsufficientData { missing };
        }
        for sub in &mut breakdown {
            sub.weight /= total_weight;
        }
        let raw = breakdown.iter().map(|s| s.value * s.weight).sum::<f64>();

        ScoreOutcome::Scored(CategoryScore {
            category: self.category,
            raw: clamp_score(raw),
            breakdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WEIGHT_TOLERANCE;

    fn full_non_bank() -> MetricRecord {
        MetricRecord::new()
            .with(MetricName::Roe, 0.20)
            .with(MetricName::ProfitMargin, 0.20)
            .with(MetricName::EnterpriseToEbitda, 8.0)
            .with(MetricName::DebtToEquity, 0.3)
            .with(MetricName::RevenueGrowth, 0.20)
            .with(MetricName::OneYearReturn, 0.30)
    }

    fn scored(outcome: ScoreOutcome) -> CategoryScore {
        match outcome {
            ScoreOutcome::Scored(s) => s,
            other => panic!("expected score, got {:?}", other),
        }
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((CategoryScorer::bank().total_weight() - 1.0).abs() < WEIGHT_TOLERANCE);
        assert!((CategoryScorer::non_bank().total_weight() - 1.0).abs() < WEIGHT_TOLERANCE);
    }

    #[test]
    fn test_linear_transform() {
        let t = Transform::Linear { floor: -0.10, target: 0.20 };
        assert!((t.apply(-0.10) - 0.0).abs() < 1e-9);
        assert!((t.apply(0.05) - 50.0).abs() < 1e-9);
        assert!((t.apply(0.20) - 100.0).abs() < 1e-9);
        assert_eq!(t.apply(5.0), 100.0);
        assert_eq!(t.apply(-5.0), 0.0);
    }

    #[test]
    fn test_inverse_transform() {
        let t = Transform::Inverse { target: 1.0, ceiling: 4.0 };
        assert_eq!(t.apply(0.5), 100.0);
        assert!((t.apply(2.5) - 50.0).abs() < 1e-9);
        assert_eq!(t.apply(10.0), 0.0);
        assert_eq!(t.apply(-2.0), 0.0);
    }

    #[test]
    fn test_transform_validation() {
        assert!(Transform::Linear { floor: 0.2, target: 0.1 }.validate().is_err());
        assert!(Transform::Inverse { target: 5.0, ceiling: 5.0 }.validate().is_err());
        assert!(Transform::Linear { floor: f64::NAN, target: 0.1 }.validate().is_err());
        assert!(Transform::Inverse { target: 1.0, ceiling: 4.0 }.validate().is_ok());
    }

    #[test]
    fn test_everything_at_target_scores_100() {
        let score = scored(CategoryScorer::non_bank().score(&full_non_bank(), &AbsencePolicies::default()));
        assert!((score.raw - 100.0).abs() < 1e-9);
        assert_eq!(score.breakdown.len(), 6);
    }

    #[test]
    fn test_extreme_inputs_stay_bounded() {
        let record = MetricRecord::new()
            .with(MetricName::Roe, 50.0)
            .with(MetricName::ProfitMargin, -30.0)
            .with(MetricName::EnterpriseToEbitda, 1e9)
            .with(MetricName::RevenueGrowth, -1e6);
        let score = scored(CategoryScorer::non_bank().score(&record, &AbsencePolicies::default()));
        assert!((0.0..=100.0).contains(&score.raw));
        assert!(score.breakdown.iter().all(|s| (0.0..=100.0).contains(&s.value)));
    }

    #[test]
    fn test_all_absent_is_insufficient_data() {
        let record = MetricRecord::new().with(MetricName::CurrentRatio, 1.5);
        match CategoryScorer::bank().score(&record, &AbsencePolicies::default()) {
            ScoreOutcome::InsufficientData { missing } => assert_eq!(missing.len(), 5),
            other => panic!("expected insufficient data, got {:?}", other),
        }
    }

    #[test]
    fn test_all_absent_is_insufficient_even_with_substitutes() {
        let absence = AbsencePolicies::uniform(AbsencePolicy::Substitute(50.0));
        let outcome = CategoryScorer::bank().score(&MetricRecord::new(), &absence);
        assert!(matches!(outcome, ScoreOutcome::InsufficientData { .. }));
    }

    #[test]
    fn test_redistribute_renormalizes_remaining_weights() {
        let mut record = full_non_bank();
        record.set(MetricName::DebtToEquity, f64::NAN);
        let score = scored(CategoryScorer::non_bank().score(&record, &AbsencePolicies::default()));
        assert_eq!(score.breakdown.len(), 5);
        let total: f64 = score.breakdown.iter().map(|s| s.weight).sum();
        assert!((total - 1.0).abs() < WEIGHT_TOLERANCE);
        // remaining sub-scores are all 100, so a missing metric neither helps nor hurts
        assert!((score.raw - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_substitute_policy_marks_sub_score() {
        let mut absence = AbsencePolicies::default();
        absence.set(MetricName::DebtToEquity, AbsencePolicy::Substitute(50.0));
        let record = MetricRecord::new().with(MetricName::Roe, 0.20);
        let score = scored(CategoryScorer::non_bank().score(&record, &absence));
        let leverage = score.breakdown.iter().find(|s| s.metric == MetricName::DebtToEquity).unwrap();
        assert!(leverage.substituted);
        assert_eq!(leverage.value, 50.0);
        // roe 100 at 0.20/0.35, leverage 50 at 0.15/0.35
        let expected = (100.0 * 0.20 + 50.0 * 0.15) / 0.35;
        assert!((score.raw - expected).abs() < 1e-9);
    }
}
