//! Metric extraction from raw provider records.
//!
//! Each metric is looked up through an ordered list of alias keys. The first
//! alias that is present, non-null and numeric wins; if none match, the metric
//! is absent. Unit conversion happens here and nowhere else.

use ranker_core::{MetricName, MetricRecord, RawRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unit in which the provider reports a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawUnit {
    /// 0.15 means 15%. Stored unchanged.
    Fraction,
    /// 45.3 means 0.453. Divided by 100.
    Percent,
    /// A ratio such as P/B. Stored unchanged.
    Multiple,
    /// An absolute amount. Stored unchanged.
    Currency,
}

impl RawUnit {
    pub fn to_canonical(&self, raw: f64) -> f64 {
        match self {
            RawUnit::Percent => raw / 100.0,
            RawUnit::Fraction | RawUnit::Multiple | RawUnit::Currency => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub metric: MetricName,
    pub aliases: Vec<String>,
    pub unit: RawUnit,
}

impl MetricSpec {
    pub fn new(metric: MetricName, aliases: &[&str], unit: RawUnit) -> Self {
        Self {
            metric,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            unit,
        }
    }
}

/// Alias table for every metric plus the descriptive fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricCatalog {
    pub metrics: Vec<MetricSpec>,
    pub name_aliases: Vec<String>,
    pub sector_aliases: Vec<String>,
    pub price_aliases: Vec<String>,
    pub market_cap_aliases: Vec<String>,
    pub revenue_aliases: Vec<String>,
}

fn owned(aliases: &[&str]) -> Vec<String> {
    aliases.iter().map(|a| a.to_string()).collect()
}

impl Default for MetricCatalog {
    fn default() -> Self {
        use MetricName::*;
        Self {
            metrics: vec![
                MetricSpec::new(Roa, &["returnOnAssets", "roa"], RawUnit::Fraction),
                MetricSpec::new(Roe, &["returnOnEquity", "roe"], RawUnit::Fraction),
                MetricSpec::new(PriceToBook, &["priceToBook", "pb"], RawUnit::Multiple),
                MetricSpec::new(EnterpriseToEbitda, &["enterpriseToEbitda", "ev_ebitda"], RawUnit::Multiple),
                // Yahoo reports D/E as a percentage (45.3 for 0.453x)
                MetricSpec::new(DebtToEquity, &["debtToEquity", "de_ratio"], RawUnit::Percent),
                MetricSpec::new(CurrentRatio, &["currentRatio"], RawUnit::Multiple),
                MetricSpec::new(ProfitMargin, &["profitMargins", "profitMargin"], RawUnit::Fraction),
                MetricSpec::new(FreeCashFlow, &["freeCashflow", "leveredFreeCashFlow"], RawUnit::Currency),
                MetricSpec::new(RevenueGrowth, &["revenueGrowth", "quarterlyRevenueGrowth"], RawUnit::Fraction),
                MetricSpec::new(EarningsGrowth, &["earningsGrowth", "earningsQuarterlyGrowth"], RawUnit::Fraction),
                MetricSpec::new(OneYearReturn, &["52WeekChange", "fiftyTwoWeekChange", "one_year_return"], RawUnit::Fraction),
            ],
            name_aliases: owned(&["longName", "shortName"]),
            sector_aliases: owned(&["sector"]),
            price_aliases: owned(&["currentPrice", "regularMarketPrice"]),
            market_cap_aliases: owned(&["marketCap"]),
            revenue_aliases: owned(&["totalRevenue"]),
        }
    }
}

impl MetricCatalog {
    pub fn spec(&self, metric: MetricName) -> Option<&MetricSpec> {
        self.metrics.iter().find(|s| s.metric == metric)
    }
}

/// Coerce a JSON value to a finite number.
///
/// Accepts numbers, numeric strings and Yahoo-style `{"raw": n, "fmt": ".."}` objects.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(obj) => obj.get("raw").and_then(coerce_number),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// First alias whose value coerces to a finite number
pub fn lookup_number(raw: &RawRecord, aliases: &[String]) -> Option<f64> {
    aliases
        .iter()
        .filter_map(|key| raw.get(key))
        .filter(|v| !v.is_null())
        .find_map(coerce_number)
}

/// First alias holding a non-empty string
pub fn lookup_text(raw: &RawRecord, aliases: &[String]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|key| raw.get(key))
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Build a [`MetricRecord`] from a raw record. Never fails; missing data is absence.
pub fn extract(raw: &RawRecord, catalog: &MetricCatalog) -> MetricRecord {
    let mut record = MetricRecord::new();

    for spec in &catalog.metrics {
        match lookup_number(raw, &spec.aliases) {
            Some(value) => {
                record.set(spec.metric, spec.unit.to_canonical(value));
            }
            None => tracing::trace!("metric {} absent", spec.metric),
        }
    }

    record.name = lookup_text(raw, &catalog.name_aliases);
    record.sector = lookup_text(raw, &catalog.sector_aliases);
    record.price = lookup_number(raw, &catalog.price_aliases);
    record.market_cap = lookup_number(raw, &catalog.market_cap_aliases);
    record.revenue = lookup_number(raw, &catalog.revenue_aliases);

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_first_present_alias_wins() {
        let r = raw(json!({
            "revenueGrowth": 0.12,
            "quarterlyRevenueGrowth": 0.30,
        }));
        let record = extract(&r, &MetricCatalog::default());
        assert_eq!(record.get(MetricName::RevenueGrowth), Some(0.12));
    }

    #[test]
    fn test_null_alias_falls_through() {
        let r = raw(json!({
            "revenueGrowth": null,
            "quarterlyRevenueGrowth": 0.30,
        }));
        let record = extract(&r, &MetricCatalog::default());
        assert_eq!(record.get(MetricName::RevenueGrowth), Some(0.30));
    }

    #[test]
    fn test_unparseable_alias_falls_through() {
        let r = raw(json!({
            "freeCashflow": "N/A",
            "leveredFreeCashFlow": 1.5e9,
        }));
        let record = extract(&r, &MetricCatalog::default());
        assert_eq!(record.get(MetricName::FreeCashFlow), Some(1.5e9));
    }

    #[test]
    fn test_missing_metrics_are_absent_not_zero() {
        let record = extract(&RawRecord::new(), &MetricCatalog::default());
        assert_eq!(record.present_count(), 0);
        assert_eq!(record.get(MetricName::Roa), None);
        assert_eq!(record.name, None);
    }

    #[test]
    fn test_debt_to_equity_percent_converted_once() {
        let r = raw(json!({ "debtToEquity": 45.0 }));
        let record = extract(&r, &MetricCatalog::default());
        let de = record.get(MetricName::DebtToEquity).unwrap();
        assert!((de - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_yahoo_raw_objects_and_strings() {
        let r = raw(json!({
            "returnOnAssets": { "raw": 0.0812, "fmt": "8.12%" },
            "priceToBook": "3.4",
            "returnOnEquity": "Infinity",
            "currentRatio": true,
        }));
        let record = extract(&r, &MetricCatalog::default());
        assert_eq!(record.get(MetricName::Roa), Some(0.0812));
        assert_eq!(record.get(MetricName::PriceToBook), Some(3.4));
        assert_eq!(record.get(MetricName::Roe), None);
        assert_eq!(record.get(MetricName::CurrentRatio), None);
    }

    #[test]
    fn test_descriptive_fields() {
        let r = raw(json!({
            "longName": "  ",
            "shortName": "HDFC Bank",
            "sector": "Financial Services",
            "regularMarketPrice": 1650.5,
            "marketCap": 1.2e13,
        }));
        let record = extract(&r, &MetricCatalog::default());
        assert_eq!(record.name.as_deref(), Some("HDFC Bank"));
        assert_eq!(record.sector.as_deref(), Some("Financial Services"));
        assert_eq!(record.price, Some(1650.5));
        assert_eq!(record.market_cap, Some(1.2e13));
        assert_eq!(record.revenue, None);
    }

    #[test]
    fn test_default_catalog_covers_every_metric() {
        let catalog = MetricCatalog::default();
        for metric in MetricName::ALL {
            let spec = catalog.spec(metric).expect("spec for every metric");
            assert!(!spec.aliases.is_empty());
        }
    }
}
