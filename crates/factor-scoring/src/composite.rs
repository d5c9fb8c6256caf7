//! Composite Ranking Module
//!
//! Blends percentile-based pillar scores into one composite per entity,
//! applies penalty rules, rounds for display and assigns positional ranks.

use crate::config::ScoringConfig;
use crate::engine::ScoredEntity;
use crate::percentile::PercentileTables;
use crate::scorer::CategoryScore;
use ranker_core::{clamp_score, Direction, Entity, MetricName, MetricRecord};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Composite components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    Momentum,
    Quality,
    Valuation,
    Stability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWeight {
    pub metric: MetricName,
    pub direction: Direction,
    pub weight: f64,
}

impl MetricWeight {
    pub fn higher(metric: MetricName, weight: f64) -> Self {
        Self { metric, direction: Direction::HigherIsBetter, weight }
    }

    pub fn lower(metric: MetricName, weight: f64) -> Self {
        Self { metric, direction: Direction::LowerIsBetter, weight }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarSpec {
    pub pillar: Pillar,
    pub weight: f64,
    pub metrics: Vec<MetricWeight>,
}

/// Pillar weight table for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub pillars: Vec<PillarSpec>,
}

impl CompositeWeights {
    pub fn non_bank() -> Self {
        use MetricName::*;
        let third = 1.0 / 3.0;
        Self {
            pillars: vec![
                PillarSpec {
                    pillar: Pillar::Momentum,
                    weight: 0.30,
                    metrics: vec![
                        MetricWeight::higher(RevenueGrowth, 0.6),
                        MetricWeight::higher(OneYearReturn, 0.4),
                    ],
                },
                PillarSpec {
                    pillar: Pillar::Quality,
                    weight: 0.40,
                    metrics: vec![
                        MetricWeight::higher(Roa, third),
                        MetricWeight::lower(DebtToEquity, third),
                        MetricWeight::higher(CurrentRatio, third),
                    ],
                },
                PillarSpec {
                    pillar: Pillar::Valuation,
                    weight: 0.15,
                    metrics: vec![MetricWeight::lower(EnterpriseToEbitda, 1.0)],
                },
                PillarSpec {
                    pillar: Pillar::Stability,
                    weight: 0.15,
                    metrics: vec![
                        MetricWeight::higher(ProfitMargin, 0.5),
                        MetricWeight::higher(FreeCashFlow, 0.5),
                    ],
                },
            ],
        }
    }

    pub fn bank() -> Self {
        use MetricName::*;
        Self {
            pillars: vec![
                PillarSpec {
                    pillar: Pillar::Momentum,
                    weight: 0.30,
                    metrics: vec![
                        MetricWeight::higher(RevenueGrowth, 0.6),
                        MetricWeight::higher(OneYearReturn, 0.4),
                    ],
                },
                PillarSpec {
                    pillar: Pillar::Quality,
                    weight: 0.40,
                    metrics: vec![
                        MetricWeight::higher(Roe, 0.5),
                        MetricWeight::higher(Roa, 0.5),
                    ],
                },
                PillarSpec {
                    pillar: Pillar::Valuation,
                    weight: 0.20,
                    metrics: vec![MetricWeight::lower(PriceToBook, 1.0)],
                },
                PillarSpec {
                    pillar: Pillar::Stability,
                    weight: 0.10,
                    metrics: vec![
                        MetricWeight::higher(ProfitMargin, 0.5),
                        MetricWeight::higher(EarningsGrowth, 0.5),
                    ],
                },
            ],
        }
    }

    /// Every (metric, direction) pair a percentile table is needed for
    pub fn metric_directions(&self) -> impl Iterator<Item = (MetricName, Direction)> + '_ {
        self.pillars
            .iter()
            .flat_map(|p| p.metrics.iter().map(|m| (m.metric, m.direction)))
    }

    /// Pillar scores for one entity. Absent percentiles drop out and the
    /// remaining weights are renormalized; a pillar with nothing left is absent.
    pub fn pillar_scores(&self, symbol: &str, tables: &PercentileTables) -> BTreeMap<Pillar, f64> {
        let mut scores = BTreeMap::new();
        for spec in &self.pillars {
            let mut weighted = 0.0;
            let mut weight = 0.0;
            for mw in &spec.metrics {
                if let Some(pct) = tables.get(mw.metric, mw.direction, symbol) {
                    weighted += pct * mw.weight;
                    weight += mw.weight;
                }
            }
            if weight > 0.0 {
                scores.insert(spec.pillar, clamp_score(weighted / weight));
            }
        }
        scores
    }

    /// Weighted blend of the present pillars, or `None` when no pillar is present.
    pub fn blend(&self, pillars: &BTreeMap<Pillar, f64>) -> Option<f64> {
        let mut weighted = 0.0;
        let mut weight = 0.0;
        for spec in &self.pillars {
            if let Some(score) = pillars.get(&spec.pillar) {
                weighted += score * spec.weight;
                weight += spec.weight;
            }
        }
        (weight > 0.0).then(|| clamp_score(weighted / weight))
    }
}

/// Multiplies the composite when `metric` is present and below `threshold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyRule {
    pub metric: MetricName,
    pub threshold: f64,
    pub factor: f64,
}

impl PenaltyRule {
    /// Shrinking revenue costs 35% of the composite
    pub fn negative_revenue_growth() -> Self {
        Self {
            metric: MetricName::RevenueGrowth,
            threshold: 0.0,
            factor: 0.65,
        }
    }

    pub fn triggers(&self, record: &MetricRecord) -> bool {
        record.get(self.metric).map_or(false, |v| v < self.threshold)
    }
}

/// Round half away from zero to `precision` decimal places.
///
/// Done in decimal arithmetic so values such as 62.5 or 0.125 round the way
/// they read rather than the way they happen to be stored in binary.
pub fn round_display(value: f64, precision: u32) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Post-penalty blend before rounding
    pub raw: f64,
    /// Rounded display score, used for sorting
    pub score: f64,
    pub penalty_applied: bool,
    /// Product of every triggered penalty factor (1.0 when none)
    pub penalty_factor: f64,
    pub pillars: BTreeMap<Pillar, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntity {
    /// 1-based position in the sorted output
    pub rank: usize,
    pub entity: Entity,
    pub record: MetricRecord,
    pub category_score: Option<CategoryScore>,
    pub composite: CompositeScore,
    /// Percentiles of the metrics this entity's category blends
    pub percentiles: BTreeMap<MetricName, f64>,
}

#[derive(Debug, Clone, Default)]
pub struct RankOutcome {
    pub ranked: Vec<RankedEntity>,
    /// Scored entities with no percentile in any pillar
    pub insufficient: Vec<(ScoredEntity, String)>,
}

/// Ranks scored entities by composite score
pub struct CompositeRanker {
    config: ScoringConfig,
}

impl Default for CompositeRanker {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeRanker {
    pub fn new() -> Self {
        Self {
            config: ScoringConfig::default(),
        }
    }

    pub fn with_config(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Composite for one entity, or `None` when no pillar has data.
    pub fn composite(
        &self,
        entity: &Entity,
        record: &MetricRecord,
        tables: &PercentileTables,
    ) -> Option<CompositeScore> {
        let weights = self.config.weights_for(entity.category);
        let pillars = weights.pillar_scores(&entity.symbol, tables);
        let blended = weights.blend(&pillars)?;

        let penalty_factor: f64 = self
            .config
            .penalties
            .iter()
            .filter(|rule| rule.triggers(record))
            .map(|rule| rule.factor)
            .product();
        let raw = clamp_score(blended * penalty_factor);

        Some(CompositeScore {
            raw,
            score: round_display(raw, self.config.display_precision),
            penalty_applied: penalty_factor < 1.0,
            penalty_factor,
            pillars,
        })
    }

    /// Score, sort descending by display score and assign positional ranks.
    /// The sort is stable: exact ties keep their input order.
    pub fn rank(&self, candidates: Vec<ScoredEntity>, tables: &PercentileTables) -> RankOutcome {
        let mut outcome = RankOutcome::default();

        for candidate in candidates {
            match self.composite(&candidate.entity, &candidate.record, tables) {
                Some(composite) => {
                    let percentiles = self
                        .config
                        .weights_for(candidate.entity.category)
                        .metric_directions()
                        .filter_map(|(metric, direction)| {
                            tables
                                .get(metric, direction, &candidate.entity.symbol)
                                .map(|p| (metric, p))
                        })
                        .collect();
                    outcome.ranked.push(RankedEntity {
                        rank: 0,
                        entity: candidate.entity,
                        record: candidate.record,
                        category_score: candidate.category_score,
                        composite,
                        percentiles,
                    });
                }
                None => {
                    tracing::warn!(
                        "{} has no percentile data for any composite pillar",
                        candidate.entity.symbol
                    );
                    outcome
                        .insufficient
                        .push((candidate, "no composite pillar has data".to_string()));
                }
            }
        }

        outcome
            .ranked
            .sort_by(|a, b| b.composite.score.total_cmp(&a.composite.score));
        for (i, ranked) in outcome.ranked.iter_mut().enumerate() {
            ranked.rank = i + 1;
        }

        outcome
    }
}
