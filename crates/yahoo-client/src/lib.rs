//! Yahoo Finance `quoteSummary` client.
//!
//! Fetches the financial, key-statistics, profile and price modules for a
//! symbol and flattens them into a single [`RawRecord`] for the extractor.

mod rate_limiter;

pub use rate_limiter::RateLimiter;

use async_trait::async_trait;
use ranker_core::{DataProvider, RankingError, RawRecord};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const BASE_URL: &str = "https://query2.finance.yahoo.com";
/// Requested modules, in merge priority order
const MODULES: [&str; 4] = ["financialData", "defaultKeyStatistics", "summaryProfile", "price"];
const MAX_RETRIES: u32 = 3;
/// Short enough that every retry fits inside a 30s fetch timeout
const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
    rate_limiter: RateLimiter,
    retry_wait: Duration,
}

impl YahooClient {
    /// `rate_limit` is the maximum number of requests per minute.
    pub fn new(rate_limit: usize) -> Self {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: BASE_URL.to_string(),
            rate_limiter: RateLimiter::per_minute(rate_limit),
            retry_wait: DEFAULT_RETRY_WAIT,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_wait(mut self, wait: Duration) -> Self {
        self.retry_wait = wait;
        self
    }

    fn summary_url(&self, symbol: &str) -> String {
        format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol)
    }

    /// Send a request with rate limiting and automatic 429 retry.
    ///
    /// With `slot_taken` the caller already waited on the limiter for the
    /// first attempt. Retries are counted against the window without waiting.
    async fn send_request(
        &self,
        builder: reqwest::RequestBuilder,
        slot_taken: bool,
    ) -> Result<reqwest::Response, RankingError> {
        let request = builder
            .build()
            .map_err(|e| RankingError::ApiError(e.to_string()))?;

        for attempt in 0..MAX_RETRIES {
            match attempt {
                0 if slot_taken => {}
                0 => self.rate_limiter.acquire().await,
                _ => self.rate_limiter.record().await,
            }
            let req_clone = request
                .try_clone()
                .ok_or_else(|| RankingError::ApiError("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| RankingError::FetchFailure(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            match backoff_after(attempt, MAX_RETRIES, self.retry_wait) {
                Some(wait) => {
                    tracing::warn!(
                        "Yahoo 429 rate limited, waiting {}s before retry {}/{}",
                        wait.as_secs(),
                        attempt + 1,
                        MAX_RETRIES - 1
                    );
                    tokio::time::sleep(wait).await;
                }
                None => tracing::warn!("Yahoo 429 rate limited, giving up after {} attempts", MAX_RETRIES),
            }
        }

        Err(RankingError::FetchFailure(format!(
            "Rate limited by Yahoo after {} attempts",
            MAX_RETRIES
        )))
    }

    /// Fetch and flatten the quote summary for one provider symbol.
    pub async fn get_summary(&self, symbol: &str) -> Result<RawRecord, RankingError> {
        self.summary(symbol, false).await
    }

    async fn summary(&self, symbol: &str, slot_taken: bool) -> Result<RawRecord, RankingError> {
        let response = self
            .send_request(
                self.client
                    .get(self.summary_url(symbol))
                    .query(&[("modules", MODULES.join(","))]),
                slot_taken,
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RankingError::FetchFailure(format!(
                "{}: HTTP {}: {}",
                symbol,
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RankingError::InvalidData(format!("{}: {}", symbol, e)))?;

        parse_summary(symbol, &body)
    }
}

#[async_trait]
impl DataProvider for YahooClient {
    async fn ready(&self) {
        self.rate_limiter.acquire().await;
    }

    /// Expects `ready` to have been awaited for this request.
    async fn fetch(&self, symbol: &str) -> Result<RawRecord, RankingError> {
        self.summary(symbol, true).await
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

/// Pull the first result out of a `quoteSummary` response body.
/// Wait before the next attempt, or `None` when `attempt` was the last one.
fn backoff_after(attempt: u32, max_attempts: u32, wait: Duration) -> Option<Duration> {
    (attempt + 1 < max_attempts).then_some(wait)
}

pub fn parse_summary(symbol: &str, body: &Value) -> Result<RawRecord, RankingError> {
    let summary = body
        .get("quoteSummary")
        .ok_or_else(|| RankingError::InvalidData(format!("{}: missing quoteSummary", symbol)))?;

    if let Some(error) = summary.get("error").filter(|e| !e.is_null()) {
        let description = error
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("unknown error");
        return Err(RankingError::FetchFailure(format!("{}: {}", symbol, description)));
    }

    let result = summary
        .get("result")
        .and_then(|r| r.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| RankingError::FetchFailure(format!("{}: no summary data", symbol)))?;

    Ok(flatten_summary(result))
}

/// Merge every module into one flat record.
///
/// `{"raw": n, "fmt": ".."}` wrappers collapse to `n`; empty wrappers and
/// nested objects without `raw` are dropped. When two modules carry the same
/// key the module earlier in [`MODULES`] wins; unknown modules come last.
pub fn flatten_summary(result: &Value) -> RawRecord {
    let mut record = RawRecord::new();
    let Some(modules) = result.as_object() else {
        return record;
    };

    let known = MODULES.iter().filter_map(|name| modules.get(*name));
    let unknown = modules
        .iter()
        .filter(|(name, _)| !MODULES.contains(&name.as_str()))
        .map(|(_, m)| m);

    for module in known.chain(unknown).filter_map(|m| m.as_object()) {
        for (key, value) in module {
            if record.contains_key(key) {
                continue;
            }
            let flat = match value {
                Value::Object(obj) => match obj.get("raw") {
                    Some(raw) if !raw.is_null() => raw.clone(),
                    _ => continue,
                },
                Value::Null | Value::Array(_) => continue,
                scalar => scalar.clone(),
            };
            record.insert(key.clone(), flat);
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_body() -> Value {
        json!({
            "quoteSummary": {
                "result": [{
                    "financialData": {
                        "currentPrice": {"raw": 1642.5, "fmt": "1,642.50"},
                        "returnOnEquity": {"raw": 0.164, "fmt": "16.40%"},
                        "debtToEquity": {},
                        "revenueGrowth": {"raw": -0.021, "fmt": "-2.10%"},
                        "financialCurrency": "INR"
                    },
                    "defaultKeyStatistics": {
                        "52WeekChange": {"raw": 0.087, "fmt": "8.70%"},
                        "priceToBook": {"raw": 2.71, "fmt": "2.71"},
                        "currentPrice": {"raw": 1.0, "fmt": "1.00"}
                    },
                    "summaryProfile": {
                        "sector": "Financial Services",
                        "industry": "Banks - Regional",
                        "companyOfficers": []
                    },
                    "price": {
                        "longName": "HDFC Bank Limited",
                        "marketCap": {"raw": 1.25e13, "fmt": "12.5T"}
                    }
                }],
                "error": null
            }
        })
    }

    #[test]
    fn test_flatten_takes_raw_values() {
        let record = parse_summary("HDFCBANK.NS", &sample_body()).unwrap();
        assert_eq!(record.get("returnOnEquity"), Some(&json!(0.164)));
        assert_eq!(record.get("52WeekChange"), Some(&json!(0.087)));
        assert_eq!(record.get("marketCap"), Some(&json!(1.25e13)));
        assert_eq!(record.get("sector"), Some(&json!("Financial Services")));
        assert_eq!(record.get("longName"), Some(&json!("HDFC Bank Limited")));
    }

    #[test]
    fn test_flatten_drops_empty_wrappers_and_arrays() {
        let record = parse_summary("HDFCBANK.NS", &sample_body()).unwrap();
        assert!(!record.contains_key("debtToEquity"));
        assert!(!record.contains_key("companyOfficers"));
    }

    #[test]
    fn test_first_module_wins_on_duplicate_keys() {
        let record = parse_summary("HDFCBANK.NS", &sample_body()).unwrap();
        assert_eq!(record.get("currentPrice"), Some(&json!(1642.5)));
    }

    #[test]
    fn test_error_payload_is_fetch_failure() {
        let body = json!({
            "quoteSummary": {
                "result": null,
                "error": {"code": "Not Found", "description": "Quote not found for ticker symbol: XXXX"}
            }
        });
        match parse_summary("XXXX", &body) {
            Err(RankingError::FetchFailure(msg)) => assert!(msg.contains("Quote not found")),
            other => panic!("expected fetch failure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_envelope_is_invalid_data() {
        assert!(matches!(
            parse_summary("X", &json!({"chart": {}})),
            Err(RankingError::InvalidData(_))
        ));
        assert!(matches!(
            parse_summary("X", &json!({"quoteSummary": {"result": [], "error": null}})),
            Err(RankingError::FetchFailure(_))
        ));
    }

    #[test]
    fn test_summary_url() {
        let client = YahooClient::new(60).with_base_url("http://localhost:9000/");
        assert_eq!(
            client.summary_url("TCS.NS"),
            "http://localhost:9000/v10/finance/quoteSummary/TCS.NS"
        );
    }

    #[test]
    fn test_no_backoff_after_final_attempt() {
        let wait = Duration::from_secs(5);
        assert_eq!(backoff_after(0, MAX_RETRIES, wait), Some(wait));
        assert_eq!(backoff_after(1, MAX_RETRIES, wait), Some(wait));
        assert_eq!(backoff_after(MAX_RETRIES - 1, MAX_RETRIES, wait), None);
    }

    #[test]
    fn test_default_backoff_fits_fetch_timeout() {
        let total: Duration = (0..MAX_RETRIES)
            .filter_map(|attempt| backoff_after(attempt, MAX_RETRIES, DEFAULT_RETRY_WAIT))
            .sum();
        assert!(total < Duration::from_secs(30));
    }
}
