//! Factor scoring engine
//!
//! Turns raw provider records into bounded category scores, batch-relative
//! percentiles and a penalty-adjusted composite rank.

pub mod classify;
pub mod composite;
pub mod config;
pub mod engine;
pub mod extract;
pub mod percentile;
pub mod scorer;

pub use classify::{classify, BankRules};
pub use composite::{
    round_display, CompositeRanker, CompositeScore, CompositeWeights, MetricWeight, PenaltyRule,
    Pillar, PillarSpec, RankOutcome, RankedEntity,
};
pub use config::{AbsencePolicies, AbsencePolicy, ScoringConfig, WEIGHT_TOLERANCE};
pub use engine::{Prepared, ScoredEntity, ScoringEngine};
pub use extract::{extract, MetricCatalog, MetricSpec, RawUnit};
pub use percentile::{normalize, PercentileEntry, PercentileTable, PercentileTables};
pub use scorer::{CategoryScore, CategoryScorer, ScoreOutcome, SubFormula, Transform};
