use ranker_core::{normalize_symbol, RankingError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const SYMBOL_COLUMNS: &[&str] = &["symbol", "ticker"];
const NAME_COLUMNS: &[&str] = &["company", "security", "name", "company name"];

/// Nifty 50 constituents used when no universe file is given
const DEFAULT_UNIVERSE: &[(&str, &str)] = &[
    ("RELIANCE", "Reliance Industries Limited"),
    ("TCS", "Tata Consultancy Services Limited"),
    ("HDFCBANK", "HDFC Bank Limited"),
    ("ICICIBANK", "ICICI Bank Limited"),
    ("INFY", "Infosys Limited"),
    ("BHARTIARTL", "Bharti Airtel Limited"),
    ("ITC", "ITC Limited"),
    ("SBIN", "State Bank of India"),
    ("LT", "Larsen & Toubro Limited"),
    ("HINDUNILVR", "Hindustan Unilever Limited"),
    ("KOTAKBANK", "Kotak Mahindra Bank Limited"),
    ("AXISBANK", "Axis Bank Limited"),
    ("BAJFINANCE", "Bajaj Finance Limited"),
    ("HCLTECH", "HCL Technologies Limited"),
    ("MARUTI", "Maruti Suzuki India Limited"),
    ("SUNPHARMA", "Sun Pharmaceutical Industries Limited"),
    ("M&M", "Mahindra & Mahindra Limited"),
    ("TITAN", "Titan Company Limited"),
    ("ASIANPAINT", "Asian Paints Limited"),
    ("ULTRACEMCO", "UltraTech Cement Limited"),
    ("NTPC", "NTPC Limited"),
    ("POWERGRID", "Power Grid Corporation of India Limited"),
    ("TATAMOTORS", "Tata Motors Limited"),
    ("TATASTEEL", "Tata Steel Limited"),
    ("WIPRO", "Wipro Limited"),
    ("NESTLEIND", "Nestle India Limited"),
    ("ONGC", "Oil & Natural Gas Corporation Limited"),
    ("JSWSTEEL", "JSW Steel Limited"),
    ("COALINDIA", "Coal India Limited"),
    ("INDUSINDBK", "IndusInd Bank Limited"),
    ("ADANIENT", "Adani Enterprises Limited"),
    ("ADANIPORTS", "Adani Ports and Special Economic Zone Limited"),
    ("APOLLOHOSP", "Apollo Hospitals Enterprise Limited"),
    ("BAJAJ-AUTO", "Bajaj Auto Limited"),
    ("BAJAJFINSV", "Bajaj Finserv Limited"),
    ("BEL", "Bharat Electronics Limited"),
    ("BPCL", "Bharat Petroleum Corporation Limited"),
    ("BRITANNIA", "Britannia Industries Limited"),
    ("CIPLA", "Cipla Limited"),
    ("DRREDDY", "Dr. Reddy's Laboratories Limited"),
    ("EICHERMOT", "Eicher Motors Limited"),
    ("GRASIM", "Grasim Industries Limited"),
    ("HDFCLIFE", "HDFC Life Insurance Company Limited"),
    ("HEROMOTOCO", "Hero MotoCorp Limited"),
    ("HINDALCO", "Hindalco Industries Limited"),
    ("SBILIFE", "SBI Life Insurance Company Limited"),
    ("SHRIRAMFIN", "Shriram Finance Limited"),
    ("TATACONSUM", "Tata Consumer Products Limited"),
    ("TECHM", "Tech Mahindra Limited"),
    ("TRENT", "Trent Limited"),
];

/// One row of the universe file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub symbol: String,
    /// May be empty; the provider's name is used instead
    pub name: String,
}

impl UniverseEntry {
    pub fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            name: name.trim().to_string(),
        }
    }
}

pub fn default_universe() -> Vec<UniverseEntry> {
    DEFAULT_UNIVERSE
        .iter()
        .map(|(symbol, name)| UniverseEntry::new(symbol, name))
        .collect()
}

/// Universe from bare symbols, e.g. from the command line.
pub fn from_symbols<S: AsRef<str>>(symbols: &[S]) -> Vec<UniverseEntry> {
    dedupe(symbols.iter().map(|s| UniverseEntry::new(s.as_ref(), "")))
}

/// Drop empty symbols and later duplicates, keeping first-occurrence order.
fn dedupe<I: IntoIterator<Item = UniverseEntry>>(entries: I) -> Vec<UniverseEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| !e.symbol.is_empty())
        .filter(|e| seen.insert(e.symbol.clone()))
        .collect()
}

fn find_column(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim().trim_start_matches('\u{feff}').to_lowercase();
        candidates.contains(&h.as_str())
    })
}

/// Parse universe CSV text.
///
/// Needs a `symbol` or `ticker` column; a `company`, `security` or `name`
/// column is optional. Header matching ignores case and surrounding spaces.
pub fn parse_universe_csv(data: &str) -> Result<Vec<UniverseEntry>, RankingError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| RankingError::InvalidData(format!("universe header: {}", e)))?
        .clone();
    let symbol_col = find_column(&headers, SYMBOL_COLUMNS).ok_or_else(|| {
        RankingError::InvalidData("universe has no symbol or ticker column".to_string())
    })?;
    let name_col = find_column(&headers, NAME_COLUMNS);

    let mut entries = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| RankingError::InvalidData(format!("universe row: {}", e)))?;
        let symbol = record.get(symbol_col).unwrap_or("");
        let name = name_col.and_then(|i| record.get(i)).unwrap_or("");
        entries.push(UniverseEntry::new(symbol, name));
    }

    Ok(dedupe(entries))
}

/// Read a universe file. Non-UTF-8 files are decoded as Latin-1.
pub fn load_universe_csv(path: &Path) -> Result<Vec<UniverseEntry>, RankingError> {
    let bytes = std::fs::read(path)?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("{} is not UTF-8, decoding as Latin-1", path.display());
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };
    let entries = parse_universe_csv(&text)?;
    tracing::info!("Loaded {} symbols from {}", entries.len(), path.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_and_company_columns() {
        let csv = "Company Name,Industry,Symbol\nInfosys Ltd.,IT,infy\nTata Steel Ltd.,Metals, TATASTEEL \n";
        let entries = parse_universe_csv(csv).unwrap();
        assert_eq!(
            entries,
            vec![
                UniverseEntry::new("INFY", "Infosys Ltd."),
                UniverseEntry::new("TATASTEEL", "Tata Steel Ltd."),
            ]
        );
    }

    #[test]
    fn test_ticker_and_security_headers_with_bom() {
        let csv = "\u{feff}Ticker , Security\nAAPL,Apple Inc.\nMSFT,Microsoft\n";
        let entries = parse_universe_csv(csv).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].symbol, "AAPL");
        assert_eq!(entries[1].name, "Microsoft");
    }

    #[test]
    fn test_skips_empty_and_duplicate_symbols() {
        let csv = "symbol,name\nSBIN,State Bank\n,Blank Row\nsbin,Duplicate\nITC,ITC Ltd\n";
        let entries = parse_universe_csv(csv).unwrap();
        let symbols: Vec<&str> = entries.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["SBIN", "ITC"]);
        assert_eq!(entries[0].name, "State Bank");
    }

    #[test]
    fn test_missing_symbol_column_is_invalid() {
        let err = parse_universe_csv("company,sector\nFoo,Bar\n").unwrap_err();
        assert!(matches!(err, RankingError::InvalidData(_)));
    }

    #[test]
    fn test_name_column_optional() {
        let entries = parse_universe_csv("symbol\nWIPRO\n").unwrap();
        assert_eq!(entries, vec![UniverseEntry::new("WIPRO", "")]);
    }

    #[test]
    fn test_from_symbols_dedupes() {
        let entries = from_symbols(&["tcs", "INFY", "TCS", " "]);
        let symbols: Vec<&str> = entries.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["TCS", "INFY"]);
    }

    #[test]
    fn test_default_universe_is_unique() {
        let universe = default_universe();
        assert_eq!(dedupe(universe.clone()).len(), universe.len());
    }

    #[test]
    fn test_default_universe_is_full_nifty_50() {
        let universe = default_universe();
        assert_eq!(universe.len(), 50);
        assert!(universe.iter().all(|e| !e.name.is_empty()));
        assert!(universe.iter().any(|e| e.symbol == "BAJAJ-AUTO"));
    }
}
