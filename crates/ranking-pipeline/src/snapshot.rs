use async_trait::async_trait;
use factor_scoring::classify::strip_exchange_suffix;
use ranker_core::{normalize_symbol, DataProvider, RankingError, RawRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Offline provider backed by a JSON file of `{ "SYMBOL": { ...raw record... } }`.
///
/// Lookups try the symbol as given, then without its exchange suffix, so a
/// snapshot keyed by `INFY` also serves `INFY.NS`.
#[derive(Debug, Clone, Default)]
pub struct SnapshotProvider {
    records: HashMap<String, RawRecord>,
}

impl SnapshotProvider {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (String, RawRecord)>,
    {
        Self {
            records: records
                .into_iter()
                .map(|(symbol, raw)| (normalize_symbol(&symbol), raw))
                .collect(),
        }
    }

    pub fn parse(json: &str) -> Result<Self, RankingError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| RankingError::InvalidData(format!("snapshot: {}", e)))?;
        let Value::Object(entries) = value else {
            return Err(RankingError::InvalidData(
                "snapshot must be a JSON object keyed by symbol".to_string(),
            ));
        };

        let mut records = Vec::with_capacity(entries.len());
        for (symbol, raw) in entries {
            match raw {
                Value::Object(raw) => records.push((symbol, raw)),
                _ => {
                    return Err(RankingError::InvalidData(format!(
                        "snapshot entry for {} is not an object",
                        symbol
                    )))
                }
            }
        }
        Ok(Self::from_records(records))
    }

    pub fn load(path: &Path) -> Result<Self, RankingError> {
        let contents = std::fs::read_to_string(path)?;
        let provider = Self::parse(&contents)?;
        tracing::info!("Loaded snapshot of {} symbols from {}", provider.len(), path.display());
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DataProvider for SnapshotProvider {
    async fn fetch(&self, symbol: &str) -> Result<RawRecord, RankingError> {
        let symbol = normalize_symbol(symbol);
        self.records
            .get(&symbol)
            .or_else(|| self.records.get(strip_exchange_suffix(&symbol)))
            .cloned()
            .ok_or_else(|| RankingError::FetchFailure(format!("{} not in snapshot", symbol)))
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}
