//! Run report and JSON export.

use chrono::{DateTime, Utc};
use factor_scoring::{Pillar, RankedEntity};
use ranker_core::{Category, MetricName, RankingError, SubScore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExclusionReason {
    FetchFailure(String),
    InsufficientData(String),
}

/// Entity left out of the ranking, with why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub symbol: String,
    pub name: String,
    pub reason: ExclusionReason,
}

/// One row of the exported ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRecord {
    pub rank: usize,
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub category: Category,
    pub category_label: String,
    /// Rounded composite, the sort key
    pub score: f64,
    pub composite_raw: f64,
    pub penalty_applied: bool,
    /// Bounded category score, independent of the batch. `None` when the
    /// entity was ranked on pillar metrics alone.
    pub absolute_score: Option<f64>,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub revenue: Option<f64>,
    pub pillars: BTreeMap<Pillar, f64>,
    /// Every known metric; absent ones are `null`
    pub metrics: BTreeMap<MetricName, Option<f64>>,
    pub percentiles: BTreeMap<MetricName, f64>,
    pub sub_scores: Vec<SubScore>,
}

impl From<&RankedEntity> for RankedRecord {
    fn from(ranked: &RankedEntity) -> Self {
        Self {
            rank: ranked.rank,
            symbol: ranked.entity.symbol.clone(),
            name: ranked.entity.name.clone(),
            sector: ranked.entity.sector.clone(),
            category: ranked.entity.category,
            category_label: ranked.entity.category.to_label().to_string(),
            score: ranked.composite.score,
            composite_raw: ranked.composite.raw,
            penalty_applied: ranked.composite.penalty_applied,
            absolute_score: ranked.category_score.as_ref().map(|c| c.raw),
            price: ranked.record.price,
            market_cap: ranked.record.market_cap,
            revenue: ranked.record.revenue,
            pillars: ranked.composite.pillars.clone(),
            metrics: ranked.record.all_metrics(),
            percentiles: ranked.percentiles.clone(),
            sub_scores: ranked
                .category_score
                .as_ref()
                .map(|c| c.breakdown.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorLeader {
    pub sector: String,
    pub symbol: String,
    pub name: String,
    pub score: f64,
    pub rank: usize,
}

/// Best-ranked entity of each sector, ordered by leader score then rank.
pub fn sector_leaders(ranked: &[RankedRecord]) -> Vec<SectorLeader> {
    let mut seen = HashSet::new();
    let mut leaders: Vec<SectorLeader> = ranked
        .iter()
        .filter(|r| seen.insert(r.sector.as_str()))
        .map(|r| SectorLeader {
            sector: r.sector.clone(),
            symbol: r.symbol.clone(),
            name: r.name.clone(),
            score: r.score,
            rank: r.rank,
        })
        .collect();
    leaders.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.rank.cmp(&b.rank)));
    leaders
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub universe_size: usize,
    /// Entities whose provider fetch succeeded
    pub fetched: usize,
    pub ranked: Vec<RankedRecord>,
    pub excluded: Vec<Exclusion>,
    pub sector_leaders: Vec<SectorLeader>,
}

impl RunReport {
    pub fn new(universe_size: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            universe_size,
            fetched: 0,
            ranked: Vec::new(),
            excluded: Vec::new(),
            sector_leaders: Vec::new(),
        }
    }

    pub fn top(&self, n: usize) -> &[RankedRecord] {
        &self.ranked[..n.min(self.ranked.len())]
    }

    pub fn fetch_failures(&self) -> usize {
        self.excluded
            .iter()
            .filter(|e| matches!(e.reason, ExclusionReason::FetchFailure(_)))
            .count()
    }

    pub fn to_json(&self) -> Result<String, RankingError> {
        serde_json::to_string_pretty(self).map_err(|e| RankingError::InvalidData(e.to_string()))
    }

    /// Write the export, creating parent directories as needed.
    pub fn write_json(&self, path: &Path) -> Result<(), RankingError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        tracing::info!("Wrote {} ranked entities to {}", self.ranked.len(), path.display());
        Ok(())
    }
}
