use crate::classify::classify;
use crate::composite::{CompositeRanker, RankOutcome};
use crate::config::ScoringConfig;
use crate::extract::extract;
use crate::percentile::PercentileTables;
use crate::scorer::{CategoryScore, ScoreOutcome};
use ranker_core::{Entity, MetricName, MetricRecord, RankingError, RawRecord};

/// Entity that passed category scoring and is eligible for ranking
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntity {
    pub entity: Entity,
    pub record: MetricRecord,
    /// `None` when only composite pillar metrics are present
    pub category_score: Option<CategoryScore>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    Scored(ScoredEntity),
    /// Every metric the category scorer or the composite pillars read is absent
    Insufficient {
        entity: Entity,
        missing: Vec<MetricName>,
    },
}

/// Runs extraction, classification, scoring and ranking against one validated config
pub struct ScoringEngine {
    config: ScoringConfig,
    ranker: CompositeRanker,
}

impl ScoringEngine {
    /// Fails if the config breaks any structural invariant.
    pub fn new(config: ScoringConfig) -> Result<Self, RankingError> {
        config.validate()?;
        Ok(Self {
            ranker: CompositeRanker::with_config(config.clone()),
            config,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Extract, classify and score one raw record.
    pub fn prepare(&self, symbol: &str, name: &str, raw: &RawRecord) -> Prepared {
        let record = extract(raw, &self.config.catalog);

        let display_name = match name.trim() {
            "" => record.name.clone().unwrap_or_default(),
            given => given.to_string(),
        };
        let mut entity = Entity::new(symbol, &display_name);
        if let Some(sector) = &record.sector {
            entity.sector = sector.clone();
        }
        entity.category = classify(&entity.symbol, &entity.name, &self.config.bank_rules);

        tracing::debug!(
            "{} classified as {:?} with {} metrics present",
            entity.symbol,
            entity.category,
            record.present_count()
        );

        let scorer = self.config.scorer_for(entity.category);
        let category_score = match scorer.score(&record, &self.config.absence) {
            ScoreOutcome::Scored(category_score) => Some(category_score),
            ScoreOutcome::InsufficientData { mut missing } => {
                let weights = self.config.weights_for(entity.category);
                if weights.metric_directions().any(|(m, _)| record.is_present(m)) {
                    tracing::debug!(
                        "{} has no category score metrics, ranking on pillars only",
                        entity.symbol
                    );
                    None
                } else {
                    for (metric, _) in weights.metric_directions() {
                        if !missing.contains(&metric) {
                            missing.push(metric);
                        }
                    }
                    return Prepared::Insufficient { entity, missing };
                }
            }
        };

        Prepared::Scored(ScoredEntity {
            entity,
            record,
            category_score,
        })
    }

    /// Percentile tables over exactly this batch, for every metric either category blends.
    pub fn percentile_tables(&self, batch: &[ScoredEntity]) -> PercentileTables {
        PercentileTables::build(
            batch.iter().map(|s| (s.entity.symbol.as_str(), &s.record)),
            self.config
                .bank_weights
                .metric_directions()
                .chain(self.config.non_bank_weights.metric_directions()),
        )
    }

    pub fn rank(&self, batch: Vec<ScoredEntity>) -> RankOutcome {
        let tables = self.percentile_tables(&batch);
        self.ranker.rank(batch, &tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::Pillar;
    use ranker_core::Category;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn scored(prepared: Prepared) -> ScoredEntity {
        match prepared {
            Prepared::Scored(s) => s,
            other => panic!("expected scored entity, got {:?}", other),
        }
    }

    fn sample_batch(engine: &ScoringEngine) -> Vec<ScoredEntity> {
        let records = [
            ("TCS.NS", json!({"longName": "Tata Consultancy Services", "returnOnEquity": 0.45, "returnOnAssets": 0.25, "debtToEquity": 9.0, "currentRatio": 2.5, "revenueGrowth": 0.06, "52WeekChange": 0.12, "sector": "Technology"})),
            ("HDFCBANK.NS", json!({"longName": "HDFC Bank Limited", "returnOnEquity": 0.16, "returnOnAssets": 0.018, "priceToBook": 2.6, "revenueGrowth": 0.21})),
            ("TATASTEEL.NS", json!({"longName": "Tata Steel Limited", "returnOnEquity": 0.03, "returnOnAssets": 0.01, "debtToEquity": 110.0, "currentRatio": 0.9, "revenueGrowth": -0.04, "52WeekChange": -0.08})),
            ("INFY.NS", json!({"longName": "Infosys Limited", "returnOnEquity": 0.31, "returnOnAssets": 0.19, "debtToEquity": 8.5, "currentRatio": 2.3, "revenueGrowth": 0.04, "52WeekChange": 0.05})),
        ];
        records
            .iter()
            .map(|(symbol, value)| scored(engine.prepare(symbol, "", &raw(value.clone()))))
            .collect()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ScoringConfig::default();
        config.display_precision = 9;
        match ScoringEngine::new(config) {
            Err(e) => assert!(e.is_fatal()),
            Ok(_) => panic!("expected config error"),
        }
    }

    #[test]
    fn test_prepare_classifies_and_names() {
        let engine = ScoringEngine::new(ScoringConfig::default()).unwrap();
        let batch = sample_batch(&engine);
        assert_eq!(batch[0].entity.name, "Tata Consultancy Services");
        assert_eq!(batch[0].entity.sector, "Technology");
        assert_eq!(batch[0].entity.category, Category::NonBank);
        assert_eq!(batch[1].entity.category, Category::Bank);
        assert_eq!(batch[1].category_score.as_ref().unwrap().category, Category::Bank);
        // debtToEquity arrives in percent
        assert_eq!(batch[0].record.get(MetricName::DebtToEquity), Some(0.09));
    }

    #[test]
    fn test_universe_name_takes_precedence() {
        let engine = ScoringEngine::new(ScoringConfig::default()).unwrap();
        let prepared = scored(engine.prepare(
            "sbin.ns",
            "State Bank of India",
            &raw(json!({"longName": "STATE BK OF INDIA", "returnOnEquity": 0.17})),
        ));
        assert_eq!(prepared.entity.symbol, "SBIN.NS");
        assert_eq!(prepared.entity.name, "State Bank of India");
        assert_eq!(prepared.entity.category, Category::Bank);
    }

    #[test]
    fn test_all_absent_is_insufficient() {
        let engine = ScoringEngine::new(ScoringConfig::default()).unwrap();
        match engine.prepare("ZZZ", "Mystery Corp", &raw(json!({"currentPrice": 10.0}))) {
            Prepared::Insufficient { entity, missing } => {
                assert_eq!(entity.symbol, "ZZZ");
                // six category score metrics plus ROA, current ratio and free cash flow
                assert_eq!(missing.len(), 9);
                assert!(missing.contains(&MetricName::CurrentRatio));
            }
            other => panic!("expected insufficient, got {:?}", other),
        }
    }

    #[test]
    fn test_pillar_metrics_alone_are_sufficient() {
        let engine = ScoringEngine::new(ScoringConfig::default()).unwrap();
        let fields = json!({"returnOnAssets": 0.08, "currentRatio": 1.6, "freeCashflow": 2.0e9});
        let pillars_only = scored(engine.prepare("AAA", "Alpha Industries", &raw(fields)));
        assert_eq!(pillars_only.entity.category, Category::NonBank);
        assert!(pillars_only.category_score.is_none());

        let with_debt = json!({"returnOnAssets": 0.05, "currentRatio": 1.2, "freeCashflow": 1.0e9, "debtToEquity": 40.0});
        let with_debt = scored(engine.prepare("BBB", "Beta Industries", &raw(with_debt)));
        assert!(with_debt.category_score.is_some());

        let outcome = engine.rank(vec![pillars_only, with_debt]);
        assert_eq!(outcome.ranked.len(), 2);
        assert!(outcome.insufficient.is_empty());
        let alpha = outcome.ranked.iter().find(|r| r.entity.symbol == "AAA").unwrap();
        assert!(alpha.composite.pillars.contains_key(&Pillar::Quality));
    }

    #[test]
    fn test_rank_is_deterministic() {
        let engine = ScoringEngine::new(ScoringConfig::default()).unwrap();
        let first = engine.rank(sample_batch(&engine));
        let second = engine.rank(sample_batch(&engine));
        assert_eq!(first.ranked, second.ranked);
        assert_eq!(first.ranked.len(), 4);
        let ranks: Vec<usize> = first.ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        for pair in first.ranked.windows(2) {
            assert!(pair[0].composite.score >= pair[1].composite.score);
        }
    }

    #[test]
    fn test_negative_growth_is_penalized_in_batch() {
        let engine = ScoringEngine::new(ScoringConfig::default()).unwrap();
        let outcome = engine.rank(sample_batch(&engine));
        let steel = outcome
            .ranked
            .iter()
            .find(|r| r.entity.symbol == "TATASTEEL.NS")
            .unwrap();
        assert!(steel.composite.penalty_applied);
        assert_eq!(steel.rank, 4);
        assert!(outcome.ranked.iter().all(|r| (0.0..=100.0).contains(&r.composite.score)));
    }
}
