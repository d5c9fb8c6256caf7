//! Batch-relative percentile normalisation.
//!
//! Percentile of `v` = 100 * (number of batch values strictly below `v`) / n,
//! i.e. the left insertion point of `v` in the sorted batch. Equal values share
//! a percentile. Lower-is-better metrics use `100 - p` of the same computation
//! so ties behave identically in both directions. Absent values are left out
//! of the distribution and get no entry.

use ranker_core::{Direction, MetricName, MetricRecord};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileEntry {
    pub symbol: String,
    /// Within [0, 100]
    pub percentile: f64,
}

/// Percentiles of one metric across the current batch, in batch order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileTable {
    pub metric: MetricName,
    pub direction: Direction,
    entries: Vec<PercentileEntry>,
}

impl PercentileTable {
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.symbol == symbol)
            .map(|e| e.percentile)
    }

    pub fn entries(&self) -> &[PercentileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compute one [`PercentileTable`] over `(symbol, value)` pairs.
pub fn normalize<'a, I>(values: I, metric: MetricName, direction: Direction) -> PercentileTable
where
    I: IntoIterator<Item = (&'a str, Option<f64>)>,
{
    let present: Vec<(&str, f64)> = values
        .into_iter()
        .filter_map(|(symbol, value)| value.filter(|v| v.is_finite()).map(|v| (symbol, v)))
        .collect();

    let mut sorted: Vec<f64> = present.iter().map(|(_, v)| *v).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;

    let entries = present
        .iter()
        .map(|(symbol, value)| {
            let below = sorted.partition_point(|x| x < value);
            let higher_is_better = 100.0 * below as f64 / n;
            let percentile = match direction {
                Direction::HigherIsBetter => higher_is_better,
                Direction::LowerIsBetter => 100.0 - higher_is_better,
            };
            PercentileEntry {
                symbol: symbol.to_string(),
                percentile,
            }
        })
        .collect();

    PercentileTable {
        metric,
        direction,
        entries,
    }
}

/// Every table needed by one run, built once and passed to the composite step
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PercentileTables {
    tables: Vec<PercentileTable>,
}

impl PercentileTables {
    pub fn build<'a, I, S>(batch: I, specs: S) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a MetricRecord)>,
        S: IntoIterator<Item = (MetricName, Direction)>,
    {
        let batch: Vec<(&str, &MetricRecord)> = batch.into_iter().collect();
        let specs: BTreeSet<(MetricName, Direction)> = specs.into_iter().collect();

        let tables = specs
            .into_iter()
            .map(|(metric, direction)| {
                let table = normalize(
                    batch.iter().map(|(symbol, record)| (*symbol, record.get(metric))),
                    metric,
                    direction,
                );
                tracing::debug!(
                    "percentiles for {} ({:?}): {} of {} entities",
                    metric,
                    direction,
                    table.len(),
                    batch.len()
                );
                table
            })
            .collect();

        Self { tables }
    }

    pub fn table(&self, metric: MetricName, direction: Direction) -> Option<&PercentileTable> {
        self.tables
            .iter()
            .find(|t| t.metric == metric && t.direction == direction)
    }

    pub fn get(&self, metric: MetricName, direction: Direction, symbol: &str) -> Option<f64> {
        self.table(metric, direction).and_then(|t| t.get(symbol))
    }

    pub fn tables(&self) -> &[PercentileTable] {
        &self.tables
    }
}
