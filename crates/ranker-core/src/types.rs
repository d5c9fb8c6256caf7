use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque per-symbol record as returned by a data provider
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// The fixed set of metrics the ranker understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    Roa,
    Roe,
    PriceToBook,
    EnterpriseToEbitda,
    DebtToEquity,
    CurrentRatio,
    ProfitMargin,
    FreeCashFlow,
    RevenueGrowth,
    EarningsGrowth,
    OneYearReturn,
}

impl MetricName {
    pub const ALL: [MetricName; 11] = [
        MetricName::Roa,
        MetricName::Roe,
        MetricName::PriceToBook,
        MetricName::EnterpriseToEbitda,
        MetricName::DebtToEquity,
        MetricName::CurrentRatio,
        MetricName::ProfitMargin,
        MetricName::FreeCashFlow,
        MetricName::RevenueGrowth,
        MetricName::EarningsGrowth,
        MetricName::OneYearReturn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Roa => "roa",
            MetricName::Roe => "roe",
            MetricName::PriceToBook => "price_to_book",
            MetricName::EnterpriseToEbitda => "enterprise_to_ebitda",
            MetricName::DebtToEquity => "debt_to_equity",
            MetricName::CurrentRatio => "current_ratio",
            MetricName::ProfitMargin => "profit_margin",
            MetricName::FreeCashFlow => "free_cash_flow",
            MetricName::RevenueGrowth => "revenue_growth",
            MetricName::EarningsGrowth => "earnings_growth",
            MetricName::OneYearReturn => "one_year_return",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scoring category of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Bank,
    NonBank,
    /// Initial state before the classifier has run
    Unclassified,
}

impl Category {
    /// Human-readable label for the category
    pub fn to_label(&self) -> &'static str {
        match self {
            Category::Bank => "Banking & Finance",
            Category::NonBank => "Non-Banking",
            Category::Unclassified => "Unclassified",
        }
    }
}

/// Whether a larger raw value is a better outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Trim and uppercase a ticker symbol.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// One company in the universe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub symbol: String,
    pub name: String,
    pub category: Category,
    pub sector: String,
}

impl Entity {
    pub fn new(symbol: &str, name: &str) -> Self {
        let symbol = normalize_symbol(symbol);
        let name = match name.trim() {
            "" => symbol.clone(),
            trimmed => trimmed.to_string(),
        };
        Self {
            symbol,
            name,
            category: Category::Unclassified,
            sector: "Unknown".to_string(),
        }
    }
}

/// Extracted metrics for one entity. Absent metrics have no entry, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    values: BTreeMap<MetricName, f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
}

impl MetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: MetricName) -> Option<f64> {
        self.values.get(&metric).copied()
    }

    /// Store a value. Non-finite values are treated as absent and return false.
    pub fn set(&mut self, metric: MetricName, value: f64) -> bool {
        if value.is_finite() {
            self.values.insert(metric, value);
            true
        } else {
            self.values.remove(&metric);
            false
        }
    }

    pub fn with(mut self, metric: MetricName, value: f64) -> Self {
        self.set(metric, value);
        self
    }

    pub fn is_present(&self, metric: MetricName) -> bool {
        self.values.contains_key(&metric)
    }

    pub fn present_count(&self) -> usize {
        self.values.len()
    }

    /// Every known metric with its value or `None`, in stable order
    pub fn all_metrics(&self) -> BTreeMap<MetricName, Option<f64>> {
        MetricName::ALL
            .iter()
            .map(|m| (*m, self.get(*m)))
            .collect()
    }
}

/// Clamp a score onto [0, 100]; NaN maps to 0.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// One bounded component of a category score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    pub name: String,
    pub metric: MetricName,
    /// Always within [0, 100]
    pub value: f64,
    /// Effective weight after any redistribution for absent metrics
    pub weight: f64,
    /// Set when the value is a configured stand-in for an absent metric
    pub substituted: bool,
}

impl SubScore {
    pub fn new(name: &str, metric: MetricName, value: f64, weight: f64, substituted: bool) -> Self {
        Self {
            name: name.to_string(),
            metric,
            value: clamp_score(value),
            weight,
            substituted,
        }
    }
}
