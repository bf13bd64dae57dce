//! Session-scoped orchestration: one `ResearchSession` owns a market data
//! provider, memoizes every fetch for the lifetime of the session, and runs
//! the analysis engines over normalized inputs.

use chrono::{DateTime, Utc};
use research_core::AnalysisResult;
use serde::Serialize;

pub mod session;

pub use session::{BatchPolicy, BenchmarkSector, ResearchSession};

/// Everything the single-company engines produced for one symbol. Engines
/// that failed outright are absent; engines that ran but did not apply carry
/// their own `applicable` flag.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyReport {
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    pub dcf: Option<AnalysisResult>,
    pub dividend_growth: Option<AnalysisResult>,
    pub technical: Option<AnalysisResult>,
    pub earnings_quality: Option<AnalysisResult>,
    pub capital_allocation: Option<AnalysisResult>,
    pub esg: Option<AnalysisResult>,
}

impl CompanyReport {
    /// Results that ran and apply to this company.
    pub fn applicable_results(&self) -> Vec<&AnalysisResult> {
        [
            &self.dcf,
            &self.dividend_growth,
            &self.technical,
            &self.earnings_quality,
            &self.capital_allocation,
            &self.esg,
        ]
        .into_iter()
        .filter_map(|r| r.as_ref())
        .filter(|r| r.applicable)
        .collect()
    }
}
