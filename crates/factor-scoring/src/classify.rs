use ranker_core::{normalize_symbol, Category};
use serde::{Deserialize, Serialize};

/// Static membership list plus name markers used to detect banks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankRules {
    pub symbols: Vec<String>,
    /// Compared case-insensitively against the display name
    pub name_markers: Vec<String>,
}

impl Default for BankRules {
    fn default() -> Self {
        let symbols = [
            // Nifty lenders and NBFCs
            "HDFCBANK", "ICICIBANK", "SBIN", "KOTAKBANK", "AXISBANK", "INDUSINDBK",
            "BAJFINANCE", "BAJAJFINSV", "SHRIRAMFIN",
            // US money-center banks
            "JPM", "BAC", "WFC", "C", "GS", "MS",
        ];
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            name_markers: vec!["bank".to_string()],
        }
    }
}

impl BankRules {
    pub fn contains_symbol(&self, symbol: &str) -> bool {
        let normalized = normalize_symbol(symbol);
        let base = strip_exchange_suffix(&normalized);
        self.symbols.iter().any(|s| {
            let member = s.trim();
            member.eq_ignore_ascii_case(&normalized) || member.eq_ignore_ascii_case(base)
        })
    }

    pub fn name_matches(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.name_markers
            .iter()
            .map(|m| m.trim().to_lowercase())
            .any(|m| !m.is_empty() && lowered.contains(&m))
    }
}

/// "HDFCBANK.NS" -> "HDFCBANK". Symbols without a suffix are returned unchanged.
pub fn strip_exchange_suffix(symbol: &str) -> &str {
    match symbol.rsplit_once('.') {
        Some((base, suffix))
            if !base.is_empty()
                && (1..=3).contains(&suffix.len())
                && suffix.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            base
        }
        _ => symbol,
    }
}

/// Assign a scoring category. Never returns [`Category::Unclassified`].
pub fn classify(symbol: &str, name: &str, rules: &BankRules) -> Category {
    if rules.contains_symbol(symbol) || rules.name_matches(name) {
        Category::Bank
    } else {
        Category::NonBank
    }
}
