use crate::report::{sector_leaders, Exclusion, ExclusionReason, RankedRecord, RunReport};
use crate::universe::UniverseEntry;
use factor_scoring::{Prepared, ScoringEngine};
use ranker_core::{DataProvider, RankingError, RawRecord};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Maximum fetches in flight
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    /// Appended to each symbol before it goes to the provider, e.g. ".NS"
    pub symbol_suffix: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            symbol_suffix: None,
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<(), RankingError> {
        if self.concurrency == 0 {
            return Err(RankingError::ConfigInvariant(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(RankingError::ConfigInvariant(
                "fetch timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Provider-side symbol. The suffix is not added twice.
    pub fn provider_symbol(&self, symbol: &str) -> String {
        match self.symbol_suffix.as_deref().map(str::trim) {
            Some(suffix) if !suffix.is_empty() && !symbol.ends_with(&suffix.to_uppercase()) => {
                format!("{}{}", symbol, suffix.to_uppercase())
            }
            _ => symbol.to_string(),
        }
    }
}

/// Fetch, score and rank one universe
pub struct RankingPipeline {
    provider: Arc<dyn DataProvider>,
    engine: ScoringEngine,
    options: PipelineOptions,
}

impl RankingPipeline {
    pub fn new(
        provider: Arc<dyn DataProvider>,
        engine: ScoringEngine,
        options: PipelineOptions,
    ) -> Result<Self, RankingError> {
        options.validate()?;
        Ok(Self {
            provider,
            engine,
            options,
        })
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Fetch every entry concurrently. The result vector is in universe order
    /// and a failure, timeout or panic affects only its own slot.
    pub async fn fetch_all(&self, universe: &[UniverseEntry]) -> Vec<Result<RawRecord, RankingError>> {
        let total = universe.len();
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();

        for (index, entry) in universe.iter().enumerate() {
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&semaphore);
            let completed = Arc::clone(&completed);
            let symbol = entry.symbol.clone();
            let provider_symbol = self.options.provider_symbol(&entry.symbol);
            let timeout = self.options.fetch_timeout;

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        // The timeout covers the request, not the wait for a throttle slot
                        provider.ready().await;
                        match tokio::time::timeout(timeout, provider.fetch(&provider_symbol)).await {
                            Ok(result) => result,
                            Err(_) => Err(RankingError::FetchFailure(format!(
                                "timed out after {}s",
                                timeout.as_secs_f64()
                            ))),
                        }
                    }
                    Err(e) => Err(RankingError::FetchFailure(e.to_string())),
                };

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                match &result {
                    Ok(raw) => tracing::info!("[{}/{}] {} => {} fields", done, total, symbol, raw.len()),
                    Err(e) => tracing::warn!("[{}/{}] {} failed: {}", done, total, symbol, e),
                }
                (index, result)
            });
        }

        let mut results: Vec<Result<RawRecord, RankingError>> = (0..total)
            .map(|_| Err(RankingError::FetchFailure("fetch task did not complete".to_string())))
            .collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = result,
                Err(e) => tracing::warn!("Fetch task aborted: {}", e),
            }
        }

        results
    }

    /// Run the whole batch.
    ///
    /// Only a fatal error (a broken configuration surfacing at fetch time)
    /// fails the run; every other problem becomes an [`Exclusion`].
    pub async fn run(&self, universe: &[UniverseEntry]) -> Result<RunReport, RankingError> {
        tracing::info!(
            "Ranking {} symbols via {} (concurrency={}, timeout={}s)",
            universe.len(),
            self.provider.name(),
            self.options.concurrency,
            self.options.fetch_timeout.as_secs_f64()
        );

        let fetched = self.fetch_all(universe).await;
        let mut report = RunReport::new(universe.len());
        let mut eligible = Vec::new();

        for (entry, result) in universe.iter().zip(fetched) {
            let raw = match result {
                Ok(raw) => raw,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    report.excluded.push(Exclusion {
                        symbol: entry.symbol.clone(),
                        name: entry.name.clone(),
                        reason: ExclusionReason::FetchFailure(e.to_string()),
                    });
                    continue;
                }
            };
            report.fetched += 1;

            match self.engine.prepare(&entry.symbol, &entry.name, &raw) {
                Prepared::Scored(scored) => eligible.push(scored),
                Prepared::Insufficient { entity, missing } => {
                    let missing: Vec<&str> = missing.iter().map(|m| m.as_str()).collect();
                    tracing::warn!("{} excluded: no scoreable metrics", entity.symbol);
                    report.excluded.push(Exclusion {
                        symbol: entity.symbol,
                        name: entity.name,
                        reason: ExclusionReason::InsufficientData(format!(
                            "no scoring or ranking metric present: {}",
                            missing.join(", ")
                        )),
                    });
                }
            }
        }

        let outcome = self.engine.rank(eligible);
        for (scored, reason) in outcome.insufficient {
            report.excluded.push(Exclusion {
                symbol: scored.entity.symbol,
                name: scored.entity.name,
                reason: ExclusionReason::InsufficientData(reason),
            });
        }

        report.ranked = outcome.ranked.iter().map(RankedRecord::from).collect();
        report.sector_leaders = sector_leaders(&report.ranked);

        tracing::info!(
            "Ranked {} of {} symbols ({} fetched, {} excluded)",
            report.ranked.len(),
            report.universe_size,
            report.fetched,
            report.excluded.len()
        );

        Ok(report)
    }
}
