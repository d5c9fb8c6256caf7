use async_trait::async_trait;
use crate::{RankingError, RawRecord};

/// Source of per-symbol raw key-value records (fields are never guaranteed present).
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Wait until the provider may issue one more request.
    ///
    /// Client-side throttling belongs here, not in `fetch`: batch callers
    /// await this before starting the fetch timeout, so queueing for a slot
    /// never counts against it.
    async fn ready(&self) {}

    async fn fetch(&self, symbol: &str) -> Result<RawRecord, RankingError>;

    /// Short label used in logs
    fn name(&self) -> &str {
        "provider"
    }
}
