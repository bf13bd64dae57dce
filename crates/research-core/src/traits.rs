use crate::{AnalysisError, CompanyProfile, DividendEvent, PriceBar, RawFundamental};
use async_trait::async_trait;

/// The out-of-scope data-retrieval collaborator. The core only requires these
/// four record shapes; transport, retries and API keys live behind the trait.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fundamental records by period, any granularity, any order.
    async fn fundamentals(&self, symbol: &str) -> Result<Vec<RawFundamental>, AnalysisError>;

    /// Daily bars covering roughly the trailing `days_back` calendar days.
    async fn daily_bars(&self, symbol: &str, days_back: i64) -> Result<Vec<PriceBar>, AnalysisError>;

    /// Most recent dividend events, up to `limit`.
    async fn dividends(&self, symbol: &str, limit: usize) -> Result<Vec<DividendEvent>, AnalysisError>;

    /// Static company context.
    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, AnalysisError>;
}
